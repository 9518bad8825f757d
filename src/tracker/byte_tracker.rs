//! Main BYTETracker algorithm implementation.

use std::collections::HashSet;

use log::{debug, trace};
use serde::Deserialize;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, ClassId, Detection};
use crate::tracker::rect::{Rect, iou_batch};
use crate::tracker::strack::{STrack, Track};
use crate::tracker::track_state::TrackState;

/// Configuration for the BYTETracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this score take part in the first association
    pub track_thresh: f32,
    /// Maximum fused IoU distance accepted in the first association
    pub match_thresh: f32,
    /// Minimum score for an unmatched detection to start a new track
    pub new_track_thresh: f32,
    /// Frames a lost track is kept for re-identification
    pub max_age: u32,
    /// Consecutive matched frames before a track is confirmed
    pub min_hits: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            match_thresh: 0.8,
            new_track_thresh: 0.5,
            max_age: 30,
            min_hits: 3,
        }
    }
}

/// Class-aware ByteTrack.
///
/// Track IDs come from a counter owned by the tracker, so two trackers fed
/// the same detections assign the same IDs in the same order.
pub struct BYTETracker {
    tracked_stracks: Vec<STrack>,
    lost_stracks: Vec<STrack>,
    frame_id: u32,
    next_id: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
}

/// Run one association round between `tracks` and `dets`.
fn associate(
    tracks: &[STrack],
    dets: &[STrack],
    thresh: f32,
    fuse: bool,
) -> AssignmentResult {
    let track_rects: Vec<Rect> = tracks.iter().map(|t| t.rect()).collect();
    let det_rects: Vec<Rect> = dets.iter().map(|t| t.rect()).collect();
    let mut dists = matching::iou_distance(&track_rects, &det_rects);

    if fuse {
        let det_wrappers: Vec<Detection> = dets
            .iter()
            .map(|t| Detection::from_rect(t.rect(), t.score, t.class_id))
            .collect();
        matching::fuse_score(&mut dists, &det_wrappers);
    }

    let track_classes: Vec<ClassId> = tracks.iter().map(|t| t.class_id).collect();
    let det_classes: Vec<ClassId> = dets.iter().map(|t| t.class_id).collect();
    matching::gate_classes(&mut dists, &track_classes, &det_classes);

    matching::linear_assignment(&dists, thresh)
}

impl BYTETracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracked_stracks: Vec::new(),
            lost_stracks: Vec::new(),
            frame_id: 0,
            next_id: 0,
            config,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether `track_id` is still tracked or waiting to be re-found.
    ///
    /// IDs are never reused, so once this is `false` the ID is gone for good.
    pub fn is_live(&self, track_id: u64) -> bool {
        self.tracked_stracks
            .iter()
            .chain(&self.lost_stracks)
            .any(|t| t.track_id == track_id)
    }

    /// Number of frames fed through `update` so far.
    pub fn frame_count(&self) -> u32 {
        self.frame_id
    }

    fn next_track_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Feed one frame of detections, get back every confirmed track that
    /// was matched this frame (all classes together).
    pub fn update(&mut self, detections: Vec<Detection>) -> Vec<Track> {
        self.frame_id += 1;
        let min_hits = self.config.min_hits;

        let mut activated_stracks = Vec::new();
        let mut refind_stracks = Vec::new();
        let mut lost_stracks = Vec::new();

        // Step 1: split detections into high-score and low-score
        let (detections, detections_second): (Vec<STrack>, Vec<STrack>) = {
            let mut high = Vec::new();
            let mut low = Vec::new();
            for det in &detections {
                if det.score >= self.config.track_thresh {
                    high.push(STrack::new(det));
                } else if det.score > 0.1 {
                    low.push(STrack::new(det));
                }
            }
            (high, low)
        };

        let (mut unconfirmed, tracked_stracks): (Vec<STrack>, Vec<STrack>) = self
            .tracked_stracks
            .drain(..)
            .partition(|t| !t.is_activated);

        let mut strack_pool = joint_stracks(tracked_stracks, &self.lost_stracks);

        // Step 2: first association, with high score detections
        STrack::multi_predict(&mut strack_pool, &self.kalman_filter);

        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = associate(&strack_pool, &detections, self.config.match_thresh, true);

        for (itracked, idet) in matches {
            let mut track = strack_pool[itracked].clone();
            let det = &detections[idet];
            if track.state == TrackState::Tracked {
                track.update(det, &self.kalman_filter, self.frame_id, min_hits);
                activated_stracks.push(track);
            } else {
                track.re_activate(det, &self.kalman_filter, self.frame_id);
                refind_stracks.push(track);
            }
        }

        // Step 3: second association, with low score detection boxes
        let r_tracked_stracks: Vec<STrack> = unmatched_tracks
            .iter()
            .filter(|&&idx| strack_pool[idx].state == TrackState::Tracked)
            .map(|&idx| strack_pool[idx].clone())
            .collect();

        let AssignmentResult {
            matches: matches_second,
            unmatched_tracks: unmatched_tracks_second,
            ..
        } = associate(&r_tracked_stracks, &detections_second, 0.5, false);

        for (itracked, idet) in matches_second {
            let mut track = r_tracked_stracks[itracked].clone();
            track.update(&detections_second[idet], &self.kalman_filter, self.frame_id, min_hits);
            activated_stracks.push(track);
        }

        for idx in unmatched_tracks_second {
            let mut track = r_tracked_stracks[idx].clone();
            track.mark_lost();
            lost_stracks.push(track);
        }

        // Unconfirmed tracks must match every frame until they are confirmed
        let detections_rem: Vec<STrack> = unmatched_detections
            .into_iter()
            .map(|idx| detections[idx].clone())
            .collect();

        let AssignmentResult {
            matches: matches_unconfirmed,
            unmatched_tracks: unmatched_unconfirmed,
            unmatched_detections: unmatched_new,
        } = associate(&unconfirmed, &detections_rem, 0.7, true);

        for (itracked, idet) in matches_unconfirmed {
            unconfirmed[itracked].update(&detections_rem[idet], &self.kalman_filter, self.frame_id, min_hits);
            activated_stracks.push(unconfirmed[itracked].clone());
        }
        for idx in unmatched_unconfirmed {
            let track = &mut unconfirmed[idx];
            track.mark_removed();
            trace!("dropped unconfirmed track {}", track.track_id);
        }

        // Step 4: init new stracks
        for idx in unmatched_new {
            let mut track = detections_rem[idx].clone();
            if track.score < self.config.new_track_thresh {
                continue;
            }
            let track_id = self.next_track_id();
            track.activate(&self.kalman_filter, track_id, self.frame_id, min_hits);
            debug!(
                "new track {} (class {}) at frame {}",
                track.track_id, track.class_id, self.frame_id
            );
            activated_stracks.push(track);
        }

        // Step 5: age out lost tracks
        for mut track in self.lost_stracks.drain(..) {
            if !track.state.is_alive() || self.frame_id - track.end_frame() > self.config.max_age {
                track.mark_removed();
                debug!("track {} aged out at frame {}", track.track_id, self.frame_id);
            } else {
                lost_stracks.push(track);
            }
        }

        self.tracked_stracks = activated_stracks
            .into_iter()
            .chain(refind_stracks)
            .filter(|t| t.state == TrackState::Tracked)
            .collect();

        let lost_stracks = sub_stracks(lost_stracks, &self.tracked_stracks);

        let (tracked, lost) = remove_duplicate_stracks(&self.tracked_stracks, &lost_stracks);
        self.tracked_stracks = tracked;
        self.lost_stracks = lost;

        self.tracked_stracks
            .iter()
            .filter(|t| t.is_activated)
            .map(STrack::view)
            .collect()
    }
}

/// Tracks of `tlista` followed by those of `tlistb` with an unseen ID.
fn joint_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let mut exists: HashSet<u64> = tlista.iter().map(|t| t.track_id).collect();
    let mut res = tlista;
    for t in tlistb {
        if exists.insert(t.track_id) {
            res.push(t.clone());
        }
    }
    res
}

fn sub_stracks(tlista: Vec<STrack>, tlistb: &[STrack]) -> Vec<STrack> {
    let b_ids: HashSet<u64> = tlistb.iter().map(|t| t.track_id).collect();
    tlista
        .into_iter()
        .filter(|t| !b_ids.contains(&t.track_id))
        .collect()
}

/// Resolve a track that is both tracked and lost in favour of the older one.
fn remove_duplicate_stracks(
    stracksa: &[STrack],
    stracksb: &[STrack],
) -> (Vec<STrack>, Vec<STrack>) {
    if stracksa.is_empty() || stracksb.is_empty() {
        return (stracksa.to_vec(), stracksb.to_vec());
    }

    let a_rects: Vec<Rect> = stracksa.iter().map(|t| t.rect()).collect();
    let b_rects: Vec<Rect> = stracksb.iter().map(|t| t.rect()).collect();
    let ious = iou_batch(&a_rects, &b_rects);

    let mut dupa = vec![false; stracksa.len()];
    let mut dupb = vec![false; stracksb.len()];

    let (rows, cols) = ious.dim();
    for i in 0..rows {
        for j in 0..cols {
            if ious[[i, j]] > 0.85 && stracksa[i].class_id == stracksb[j].class_id {
                let time_a = stracksa[i].frame_id - stracksa[i].start_frame;
                let time_b = stracksb[j].frame_id - stracksb[j].start_frame;
                if time_a > time_b {
                    dupb[j] = true;
                } else {
                    dupa[i] = true;
                }
            }
        }
    }

    let keep = |tracks: &[STrack], dup: &[bool]| -> Vec<STrack> {
        tracks
            .iter()
            .zip(dup)
            .filter(|&(_, &d)| !d)
            .map(|(t, _)| t.clone())
            .collect()
    };

    (keep(stracksa, &dupa), keep(stracksb, &dupb))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(dx: f32) -> Detection {
        Detection::new(100.0 + dx, 100.0, 160.0 + dx, 260.0, 0.9, 0)
    }

    #[test]
    fn test_tracks_confirm_after_min_hits() {
        let mut tracker = BYTETracker::new(TrackerConfig::default());
        assert!(tracker.update(vec![person(0.0)]).is_empty());
        assert!(tracker.update(vec![person(1.0)]).is_empty());

        let tracks = tracker.update(vec![person(2.0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 1);
        assert!(tracks[0].confirmed);
    }

    #[test]
    fn test_detection_at_confidence_floor_starts_track() {
        let config = TrackerConfig {
            min_hits: 1,
            ..TrackerConfig::default()
        };
        let mut tracker = BYTETracker::new(config);
        let tracks = tracker.update(vec![Detection::new(100.0, 100.0, 140.0, 150.0, 0.55, 24)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].class_id, 24);
    }

    #[test]
    fn test_new_track_thresh_gates_creation() {
        let config = TrackerConfig {
            min_hits: 1,
            new_track_thresh: 0.7,
            ..TrackerConfig::default()
        };
        let mut tracker = BYTETracker::new(config);
        let weak = || vec![Detection::new(100.0, 100.0, 140.0, 150.0, 0.6, 24)];
        for _ in 0..5 {
            assert!(tracker.update(weak()).is_empty());
        }

        let tracks = tracker.update(vec![Detection::new(100.0, 100.0, 140.0, 150.0, 0.75, 24)]);
        assert_eq!(tracks.len(), 1);
        // an established track keeps matching the weaker detections
        assert_eq!(tracker.update(weak())[0].track_id, tracks[0].track_id);
    }

    #[test]
    fn test_unconfirmed_track_dropped_on_miss() {
        let mut tracker = BYTETracker::new(TrackerConfig::default());
        tracker.update(vec![person(0.0)]);
        tracker.update(vec![]);
        tracker.update(vec![person(0.0)]);
        tracker.update(vec![person(0.0)]);

        // The first attempt was dropped, so the new streak gets a fresh ID
        let tracks = tracker.update(vec![person(0.0)]);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].track_id, 2);
    }

    #[test]
    fn test_overlapping_classes_keep_separate_ids() {
        let config = TrackerConfig {
            min_hits: 1,
            ..TrackerConfig::default()
        };
        let mut tracker = BYTETracker::new(config);
        let frame = || {
            vec![
                Detection::new(100.0, 100.0, 160.0, 260.0, 0.9, 0),
                Detection::new(100.0, 100.0, 160.0, 250.0, 0.9, 24),
            ]
        };

        let first = tracker.update(frame());
        let second = tracker.update(frame());
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        for track in &second {
            let original = first.iter().find(|t| t.track_id == track.track_id).unwrap();
            assert_eq!(original.class_id, track.class_id);
        }
    }

    #[test]
    fn test_lost_track_ages_out() {
        let config = TrackerConfig {
            min_hits: 1,
            max_age: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = BYTETracker::new(config);
        let id = tracker.update(vec![person(0.0)])[0].track_id;
        for _ in 0..4 {
            assert!(tracker.update(vec![]).is_empty());
        }

        assert!(!tracker.is_live(id));

        let tracks = tracker.update(vec![person(0.0)]);
        assert_eq!(tracks.len(), 1);
        assert_ne!(tracks[0].track_id, id);
    }

    #[test]
    fn test_lost_track_is_live_until_max_age() {
        let config = TrackerConfig {
            min_hits: 1,
            max_age: 2,
            ..TrackerConfig::default()
        };
        let mut tracker = BYTETracker::new(config);
        let id = tracker.update(vec![person(0.0)])[0].track_id;
        tracker.update(vec![]);
        tracker.update(vec![]);
        assert!(tracker.is_live(id));
        tracker.update(vec![]);
        assert!(!tracker.is_live(id));
    }
}
