//! Glue between inference backends and the watch logic.
//!
//! Backends implement [`ObjectDetector`] (and [`crate::pose::PoseEstimator`]);
//! [`WatchPipeline`] feeds their output through tracking, the object ledger,
//! correlation and the cooldown gate one frame at a time.

mod builder;
mod detector;
mod pipeline;
mod replay;

pub use builder::DetectionBuilder;
pub use detector::{Frame, ObjectDetector, retain_classes};
pub use pipeline::{FrameReport, RunSummary, WatchPipeline};
pub use replay::{ReplayDetector, ReplayLog, ReplayPoseEstimator, ReplayRecord};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};
