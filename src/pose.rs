//! Pose estimation contract and the running-gait heuristic.
//!
//! Landmarks follow the COCO-17 keypoint order used by YOLO pose models.

use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::integration::Frame;

pub const LEFT_KNEE: usize = 13;
pub const RIGHT_KNEE: usize = 14;
pub const NUM_LANDMARKS: usize = 17;

/// Limb connections between landmark indices, for drawing.
pub const SKELETON: [(usize, usize); 16] = [
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 11),
    (6, 12),
    (11, 12),
    (5, 7),
    (6, 8),
    (7, 9),
    (8, 10),
    (11, 13),
    (12, 14),
    (13, 15),
    (14, 16),
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// Pixel coordinates
    pub x: f32,
    pub y: f32,
    /// Backend confidence that the joint is visible, 0 when missing
    #[serde(default = "Landmark::default_visibility")]
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self { x, y, visibility }
    }

    fn default_visibility() -> f32 {
        1.0
    }
}

/// Body joints of the single subject found in a frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoseObservation {
    pub landmarks: Vec<Landmark>,
}

impl PoseObservation {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn landmark(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index).filter(|l| l.visibility > 0.0)
    }

    /// Vertical distance between the two knees, in pixels.
    pub fn knee_delta(&self) -> Option<f32> {
        let left = self.landmark(LEFT_KNEE)?;
        let right = self.landmark(RIGHT_KNEE)?;
        Some((left.y - right.y).abs())
    }
}

/// Pose inference backend. Returns `None` when nobody is in the frame.
pub trait PoseEstimator {
    fn estimate(&mut self, frame: &Frame) -> Result<Option<PoseObservation>, InferenceError>;
}

/// Backend for pipelines that run without pose inference.
///
/// Without a pose no disappearance is ever confirmed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPose;

impl PoseEstimator for NoPose {
    fn estimate(&mut self, _frame: &Frame) -> Result<Option<PoseObservation>, InferenceError> {
        Ok(None)
    }
}

/// Single-frame running detector: the knees sit at clearly different
/// heights, as in a mid-stride gait.
///
/// Known-weak: it looks at one frame, has no temporal smoothing, and fires on
/// any asymmetric pose (climbing a step, kneeling on one leg).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KneeDeltaHeuristic {
    /// Fraction of frame height the knee delta has to exceed
    pub fraction: f32,
}

impl KneeDeltaHeuristic {
    pub fn new(fraction: f32) -> Self {
        Self { fraction }
    }

    /// `false` when there is no pose or a knee is missing.
    pub fn is_running(&self, pose: Option<&PoseObservation>, frame_height: u32) -> bool {
        pose.and_then(PoseObservation::knee_delta)
            .is_some_and(|delta| delta > self.fraction * frame_height as f32)
    }
}
