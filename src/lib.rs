//! Theft-like event inference over a video stream.
//!
//! Objects and people are tracked with a class-aware ByteTrack. When a
//! watched object vanishes for longer than the staleness threshold and a
//! person standing next to its last position is caught mid-stride, a
//! [`TheftEvent`] is raised and passed through a global cooldown gate.
//!
//! ```ignore
//! use theftwatch::{ImageSequenceSource, LogSink, ReplayLog, WatchConfig, WatchPipeline};
//!
//! let config = WatchConfig::from_yaml_file("watch.yaml")?;
//! let replay = ReplayLog::open(&config.detector.model)?;
//! let mut source = ImageSequenceSource::open("frames/", Some(30.0))?;
//! let mut pipeline = WatchPipeline::new(replay.detector(), replay.pose_estimator(), &config, Some(30.0))?;
//! let summary = pipeline.run(&mut source, &mut LogSink, |_, _| {})?;
//! ```

pub mod annotate;
pub mod config;
pub mod cooldown;
pub mod correlation;
pub mod error;
pub mod event;
pub mod integration;
pub mod ledger;
pub mod pose;
pub mod sink;
pub mod source;
pub mod tracker;

pub use annotate::Annotator;
pub use config::WatchConfig;
pub use cooldown::CooldownGate;
pub use correlation::{CorrelationEngine, CorrelationSettings, Outcome};
pub use error::{InferenceError, Result, WatchError};
pub use event::TheftEvent;
pub use integration::{
    DetectionBuilder, Frame, FrameReport, ObjectDetector, ReplayLog, RunSummary, WatchPipeline,
};
pub use ledger::{LedgerEntry, ObjectLedger};
pub use pose::{KneeDeltaHeuristic, Landmark, NoPose, PoseEstimator, PoseObservation};
pub use sink::{EventSink, JsonLinesSink, LogSink, MultiSink};
pub use source::{FrameSource, ImageSequenceSource, MemorySource};
pub use tracker::{BYTETracker, ClassId, Detection, Rect, Track, TrackerConfig};
