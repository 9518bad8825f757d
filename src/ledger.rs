//! Last-known state of every watched (non-person) object.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::tracker::{ClassId, Rect, Track};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub bbox: Rect,
    pub last_seen_frame: u64,
    pub class_id: ClassId,
}

/// Per-object bookkeeping, keyed by track ID.
///
/// Entries are only removed through [`ObjectLedger::consume`], and a consumed
/// ID is never admitted again, so every disappearance is processed once.
#[derive(Debug, Default)]
pub struct ObjectLedger {
    entries: BTreeMap<u64, LedgerEntry>,
    consumed: BTreeSet<u64>,
}

impl ObjectLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert every confirmed track that is not of `person_class`.
    pub fn observe(&mut self, tracks: &[Track], person_class: ClassId, frame_index: u64) {
        for track in tracks
            .iter()
            .filter(|t| t.confirmed && t.class_id != person_class)
        {
            if self.consumed.contains(&track.track_id) {
                continue;
            }
            let entry = self.entries.entry(track.track_id).or_insert_with(|| {
                debug!(
                    "watching object #{} (class {}) from frame {}",
                    track.track_id, track.class_id, frame_index
                );
                LedgerEntry {
                    bbox: track.bbox,
                    last_seen_frame: frame_index,
                    class_id: track.class_id,
                }
            });
            entry.bbox = track.bbox;
            entry.last_seen_frame = entry.last_seen_frame.max(frame_index);
        }
    }

    pub fn entries(&self) -> &BTreeMap<u64, LedgerEntry> {
        &self.entries
    }

    pub fn get(&self, track_id: u64) -> Option<&LedgerEntry> {
        self.entries.get(&track_id)
    }

    /// Remove an entry for good.
    pub fn consume(&mut self, track_id: u64) -> Option<LedgerEntry> {
        self.consumed.insert(track_id);
        self.entries.remove(&track_id)
    }

    pub fn is_consumed(&self, track_id: u64) -> bool {
        self.consumed.contains(&track_id)
    }

    /// Drop consumed IDs for which `is_live` is false. Only safe for IDs the
    /// tracker can never hand out again.
    pub fn forget_consumed(&mut self, is_live: impl Fn(u64) -> bool) {
        self.consumed.retain(|&id| {
            let keep = is_live(id);
            if !keep {
                debug!("forgetting consumed object #{id}");
            }
            keep
        });
    }

    pub fn consumed_len(&self) -> usize {
        self.consumed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
