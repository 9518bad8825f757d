//! Emitted theft-like events.

use serde::Serialize;

use crate::config::class_name;
use crate::ledger::LedgerEntry;
use crate::tracker::{ClassId, Rect};

/// An object that vanished next to a person caught running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TheftEvent {
    pub object_track_id: u64,
    pub object_class: ClassId,
    /// Last known box of the object
    pub object_bbox: Rect,
    pub person_track_id: u64,
    /// Distance between the person's and the object's box origins
    pub distance_px: f32,
    /// Frame on which the disappearance was processed
    pub frame_index: u64,
}

impl TheftEvent {
    pub fn new(object_track_id: u64, entry: &LedgerEntry, person_track_id: u64, distance_px: f32, frame_index: u64) -> Self {
        Self {
            object_track_id,
            object_class: entry.class_id,
            object_bbox: entry.bbox,
            person_track_id,
            distance_px,
            frame_index,
        }
    }

    pub fn object_name(&self) -> &'static str {
        class_name(self.object_class)
    }
}

impl std::fmt::Display for TheftEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} #{} taken by person #{} at frame {} ({:.0}px away)",
            self.object_name(),
            self.object_track_id,
            self.person_track_id,
            self.frame_index,
            self.distance_px
        )
    }
}
