//! Disappearance detection and person correlation.
//!
//! Each frame the engine looks for watched objects that have been missing
//! for longer than the staleness threshold, pairs each one with the closest
//! person track, and confirms an event only when the pose says that person
//! is running. Every disappearance is consumed from the ledger whatever the
//! outcome.

use std::collections::HashSet;

use log::{debug, info};

use crate::event::TheftEvent;
use crate::ledger::ObjectLedger;
use crate::pose::{KneeDeltaHeuristic, PoseObservation};
use crate::tracker::{ClassId, Rect, Track};

/// Thresholds driving [`CorrelationEngine::check`].
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSettings {
    pub person_class: ClassId,
    pub proximity_threshold_px: f32,
    /// A ledger entry is disappeared once `frame - last_seen > staleness_frames`
    pub staleness_frames: u64,
    pub motion: KneeDeltaHeuristic,
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        Self {
            person_class: 0,
            proximity_threshold_px: 100.0,
            staleness_frames: 30,
            motion: KneeDeltaHeuristic::new(0.1),
        }
    }
}

/// How a disappearance was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Near a running person: an event was raised
    Confirmed(TheftEvent),
    /// Near a person, but the pose did not show running
    NotRunning { object_track_id: u64, person_track_id: u64 },
    /// Nobody within the proximity threshold
    Unattended { object_track_id: u64 },
}

#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    settings: CorrelationSettings,
}

impl CorrelationEngine {
    pub fn new(settings: CorrelationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CorrelationSettings {
        &self.settings
    }

    /// Whether an entry last seen at `last_seen` counts as gone at `frame_index`.
    pub fn is_stale(&self, last_seen: u64, frame_index: u64) -> bool {
        frame_index.saturating_sub(last_seen) > self.settings.staleness_frames
    }

    /// Closest person track to `origin_box` strictly inside the proximity
    /// threshold. Ties go to the earlier track.
    pub fn closest_person<'a>(&self, origin_box: &Rect, tracks: &'a [Track]) -> Option<(&'a Track, f32)> {
        tracks
            .iter()
            .filter(|t| t.confirmed && t.class_id == self.settings.person_class)
            .map(|t| (t, t.bbox.origin_distance(origin_box)))
            .filter(|&(_, d)| d < self.settings.proximity_threshold_px)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Process every disappearance in the ledger and return the outcomes.
    pub fn resolve(
        &self,
        ledger: &mut ObjectLedger,
        tracks: &[Track],
        pose: Option<&PoseObservation>,
        frame_index: u64,
        frame_height: u32,
    ) -> Vec<Outcome> {
        let present: HashSet<u64> = tracks
            .iter()
            .filter(|t| t.confirmed)
            .map(|t| t.track_id)
            .collect();

        let disappeared: Vec<u64> = ledger
            .entries()
            .iter()
            .filter(|(id, entry)| {
                !present.contains(*id) && self.is_stale(entry.last_seen_frame, frame_index)
            })
            .map(|(&id, _)| id)
            .collect();

        let running = self.settings.motion.is_running(pose, frame_height);
        let mut outcomes = Vec::with_capacity(disappeared.len());

        for object_id in disappeared {
            let Some(entry) = ledger.consume(object_id) else {
                continue;
            };

            let outcome = match self.closest_person(&entry.bbox, tracks) {
                None => Outcome::Unattended {
                    object_track_id: object_id,
                },
                Some((person, distance)) if running => Outcome::Confirmed(TheftEvent::new(
                    object_id,
                    &entry,
                    person.track_id,
                    distance,
                    frame_index,
                )),
                Some((person, _)) => Outcome::NotRunning {
                    object_track_id: object_id,
                    person_track_id: person.track_id,
                },
            };

            match &outcome {
                Outcome::Confirmed(event) => info!("confirmed: {event}"),
                Outcome::NotRunning {
                    object_track_id,
                    person_track_id,
                } => debug!(
                    "object #{object_track_id} gone near person #{person_track_id}, no running pose"
                ),
                Outcome::Unattended { object_track_id } => {
                    debug!("object #{object_track_id} gone with nobody nearby")
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Confirmed events only.
    pub fn check(
        &self,
        ledger: &mut ObjectLedger,
        tracks: &[Track],
        pose: Option<&PoseObservation>,
        frame_index: u64,
        frame_height: u32,
    ) -> Vec<TheftEvent> {
        self.resolve(ledger, tracks, pose, frame_index, frame_height)
            .into_iter()
            .filter_map(|outcome| match outcome {
                Outcome::Confirmed(event) => Some(event),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{LEFT_KNEE, Landmark, NUM_LANDMARKS, RIGHT_KNEE};

    const FRAME_HEIGHT: u32 = 480;

    fn running_pose() -> PoseObservation {
        let mut landmarks = vec![Landmark::new(0.0, 0.0, 1.0); NUM_LANDMARKS];
        landmarks[LEFT_KNEE] = Landmark::new(300.0, 300.0, 1.0);
        landmarks[RIGHT_KNEE] = Landmark::new(330.0, 372.0, 1.0);
        PoseObservation::new(landmarks)
    }

    fn standing_pose() -> PoseObservation {
        let mut pose = running_pose();
        pose.landmarks[RIGHT_KNEE].y = 305.0;
        pose
    }

    fn object(id: u64, x: f32, y: f32) -> Track {
        Track::new(id, Rect::new(x, y, 40.0, 50.0), 24, true)
    }

    fn person(id: u64, x: f32, y: f32) -> Track {
        Track::new(id, Rect::new(x, y, 60.0, 160.0), 0, true)
    }

    fn engine(staleness_frames: u64) -> CorrelationEngine {
        CorrelationEngine::new(CorrelationSettings {
            staleness_frames,
            ..CorrelationSettings::default()
        })
    }

    fn ledger_with_object(id: u64, last_seen: u64) -> ObjectLedger {
        let mut ledger = ObjectLedger::new();
        ledger.observe(&[object(id, 200.0, 200.0)], 0, last_seen);
        ledger
    }

    #[test]
    fn test_theft_scenario() {
        let engine = engine(30);
        let mut ledger = ledger_with_object(7, 100);
        // 80px from the backpack's last origin
        let tracks = vec![person(3, 248.0, 264.0)];

        let events = engine.check(&mut ledger, &tracks, Some(&running_pose()), 131, FRAME_HEIGHT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object_track_id, 7);
        assert_eq!(events[0].person_track_id, 3);
        assert_eq!(events[0].frame_index, 131);
        assert_eq!(events[0].object_class, 24);
        assert!((events[0].distance_px - 80.0).abs() < 1e-3);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_staleness_boundary() {
        let engine = engine(30);
        let tracks = vec![person(3, 200.0, 200.0)];
        let pose = running_pose();

        let mut ledger = ledger_with_object(7, 100);
        assert!(engine.check(&mut ledger, &tracks, Some(&pose), 129, FRAME_HEIGHT).is_empty());
        assert!(engine.check(&mut ledger, &tracks, Some(&pose), 130, FRAME_HEIGHT).is_empty());
        assert_eq!(ledger.len(), 1);

        assert_eq!(engine.check(&mut ledger, &tracks, Some(&pose), 131, FRAME_HEIGHT).len(), 1);
    }

    #[test]
    fn test_present_object_is_not_disappeared() {
        let engine = engine(30);
        let mut ledger = ledger_with_object(7, 100);
        let tracks = vec![person(3, 200.0, 200.0), object(7, 200.0, 200.0)];

        let outcomes = engine.resolve(&mut ledger, &tracks, Some(&running_pose()), 200, FRAME_HEIGHT);
        assert!(outcomes.is_empty());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_only_closest_person_inside_threshold() {
        let engine = engine(30);
        let mut ledger = ledger_with_object(7, 100);
        // 50px and 150px away
        let tracks = vec![person(4, 350.0, 200.0), person(3, 230.0, 240.0)];

        let (closest, distance) = engine
            .closest_person(&ledger.get(7).unwrap().bbox, &tracks)
            .unwrap();
        assert_eq!(closest.track_id, 3);
        assert!((distance - 50.0).abs() < 1e-3);

        let far_only = vec![person(4, 350.0, 200.0)];
        let outcomes = engine.resolve(&mut ledger, &far_only, Some(&running_pose()), 131, FRAME_HEIGHT);
        assert_eq!(outcomes, vec![Outcome::Unattended { object_track_id: 7 }]);
    }

    #[test]
    fn test_no_pose_never_confirms() {
        let engine = engine(30);
        let mut ledger = ledger_with_object(7, 100);
        let tracks = vec![person(3, 210.0, 210.0)];

        let outcomes = engine.resolve(&mut ledger, &tracks, None, 131, FRAME_HEIGHT);
        assert_eq!(
            outcomes,
            vec![Outcome::NotRunning {
                object_track_id: 7,
                person_track_id: 3
            }]
        );
        assert!(ledger.is_consumed(7));
    }

    #[test]
    fn test_single_shot_consumption() {
        let engine = engine(30);
        let mut ledger = ledger_with_object(7, 100);
        let tracks = vec![person(3, 210.0, 210.0)];

        let first = engine.check(&mut ledger, &tracks, Some(&standing_pose()), 131, FRAME_HEIGHT);
        assert!(first.is_empty());
        assert!(ledger.get(7).is_none());

        // the object shows up again and vanishes again: nothing more is raised
        ledger.observe(&[object(7, 200.0, 200.0)], 0, 140);
        let second = engine.check(&mut ledger, &tracks, Some(&running_pose()), 200, FRAME_HEIGHT);
        assert!(second.is_empty());
    }

    #[test]
    fn test_several_objects_same_person() {
        let engine = engine(30);
        let mut ledger = ObjectLedger::new();
        ledger.observe(&[object(7, 200.0, 200.0), object(8, 220.0, 210.0)], 0, 100);
        let tracks = vec![person(3, 210.0, 210.0)];

        let events = engine.check(&mut ledger, &tracks, Some(&running_pose()), 131, FRAME_HEIGHT);
        let ids: Vec<u64> = events.iter().map(|e| e.object_track_id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert!(events.iter().all(|e| e.person_track_id == 3));
    }
}
