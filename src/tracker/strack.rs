//! Single object track (STrack) and the read-only `Track` view handed to callers.

use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{ClassId, Detection};
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// What the rest of the pipeline sees of a track for the current frame.
///
/// Kalman state and age counters stay inside the tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    /// Stable identifier for the lifetime of the track
    pub track_id: u64,
    /// Current bounding box (Kalman estimate)
    pub bbox: Rect,
    /// Class of the detections feeding this track
    pub class_id: ClassId,
    /// Score of the latest matched detection
    pub score: f32,
    /// Survived the tracker's minimum hit streak
    pub confirmed: bool,
}

impl Track {
    pub fn new(track_id: u64, bbox: Rect, class_id: ClassId, confirmed: bool) -> Self {
        Self {
            track_id,
            bbox,
            class_id,
            score: 1.0,
            confirmed,
        }
    }
}

/// Single object track with its Kalman state.
#[derive(Debug, Clone)]
pub(crate) struct STrack {
    /// Unique track identifier, 0 until activated
    pub track_id: u64,
    pub state: TrackState,
    /// Reached the minimum hit streak (confirmed)
    pub is_activated: bool,
    pub score: f32,
    pub class_id: ClassId,
    /// Frame of the latest match
    pub frame_id: u32,
    pub start_frame: u32,
    /// Consecutive matched frames since (re)activation
    pub hits: u32,
    /// Kalman filter state mean (8-dim)
    pub mean: Option<Array1<f64>>,
    /// Kalman filter state covariance (8x8)
    pub covariance: Option<Array2<f64>>,
    /// Bounding box of the originating detection
    pub tlwh: Rect,
}

fn measurement(rect: &Rect) -> [f64; 4] {
    rect.to_xyah().map(f64::from)
}

impl STrack {
    pub fn new(det: &Detection) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            score: det.score,
            class_id: det.class_id,
            frame_id: 0,
            start_frame: 0,
            hits: 0,
            mean: None,
            covariance: None,
            tlwh: det.bbox,
        }
    }

    /// Current bounding box, from the Kalman mean once initialised.
    pub fn rect(&self) -> Rect {
        match &self.mean {
            Some(mean) => Rect::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.tlwh,
        }
    }

    pub fn end_frame(&self) -> u32 {
        self.frame_id
    }

    pub fn view(&self) -> Track {
        Track {
            track_id: self.track_id,
            bbox: self.rect(),
            class_id: self.class_id,
            score: self.score,
            confirmed: self.is_activated,
        }
    }

    pub fn activate(&mut self, kalman_filter: &KalmanFilter, track_id: u64, frame_id: u32, min_hits: u32) {
        self.track_id = track_id;

        let (mean, covariance) = kalman_filter.initiate(measurement(&self.tlwh));
        self.mean = Some(mean);
        self.covariance = Some(covariance);

        self.hits = 1;
        self.state = TrackState::Tracked;
        self.is_activated = self.hits >= min_hits;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    /// Bring a lost track back. It keeps its ID and confirmation.
    pub fn re_activate(&mut self, det: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(det, kalman_filter);
        self.hits = 1;
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
    }

    pub fn update(&mut self, det: &STrack, kalman_filter: &KalmanFilter, frame_id: u32, min_hits: u32) {
        self.correct(det, kalman_filter);
        self.hits += 1;
        self.state = TrackState::Tracked;
        self.is_activated = self.is_activated || self.hits >= min_hits;
        self.frame_id = frame_id;
    }

    fn correct(&mut self, det: &STrack, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let (new_mean, new_cov) = kalman_filter.update(mean, cov, measurement(&det.tlwh));
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
        self.score = det.score;
        self.tlwh = det.tlwh;
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let (Some(mean), Some(cov)) = (&self.mean, &self.covariance) {
            let mut mean_to_predict = mean.clone();
            if self.state != TrackState::Tracked {
                // freeze height velocity while lost
                mean_to_predict[7] = 0.0;
            }
            let (new_mean, new_cov) = kalman_filter.predict(&mean_to_predict, cov);
            self.mean = Some(new_mean);
            self.covariance = Some(new_cov);
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
        self.hits = 0;
    }

    pub fn mark_removed(&mut self) {
        self.state = TrackState::Removed;
    }

    pub fn multi_predict(stracks: &mut [STrack], kalman_filter: &KalmanFilter) {
        for strack in stracks.iter_mut() {
            strack.predict(kalman_filter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det() -> STrack {
        STrack::new(&Detection::new(10.0, 20.0, 50.0, 80.0, 0.9, 24))
    }

    #[test]
    fn test_confirmation_needs_hit_streak() {
        let kf = KalmanFilter::new();
        let mut track = det();
        track.activate(&kf, 1, 1, 3);
        assert!(!track.is_activated);

        track.update(&det(), &kf, 2, 3);
        assert!(!track.is_activated);
        track.update(&det(), &kf, 3, 3);
        assert!(track.is_activated);
        assert_eq!(track.view().class_id, 24);
    }

    #[test]
    fn test_single_hit_confirms_immediately() {
        let kf = KalmanFilter::new();
        let mut track = det();
        track.activate(&kf, 5, 1, 1);
        assert!(track.is_activated);
        assert_eq!(track.view().track_id, 5);
    }
}
