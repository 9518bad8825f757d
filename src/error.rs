//! Error types for the watch pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a detector or pose backend.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    /// The backend could not process this one frame; the stream goes on.
    #[error("inference failed on frame {frame}: {reason}")]
    Frame { frame: u64, reason: String },
    /// The backend itself is broken; no further frame can be processed.
    #[error("inference backend failed: {0}")]
    Backend(String),
}

/// Errors surfaced by the crate.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("cannot open frame source {}: {reason}", path.display())]
    SourceOpen { path: PathBuf, reason: String },

    #[error("frame size changed from {expected:?} to {got:?}")]
    FrameSize { expected: (u32, u32), got: (u32, u32) },

    #[error("invalid replay record on line {line}: {source}")]
    Replay {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl WatchError {
    /// Whether the error must stop a running stream.
    ///
    /// Per-frame decode and inference failures are skipped; a broken backend
    /// is not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::Inference(InferenceError::Backend(_)))
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
