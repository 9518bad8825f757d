//! Pipeline configuration, loaded from YAML.
//!
//! Every field has a default, so an empty document is a valid config:
//!
//! ```yaml
//! detector:
//!   model: recordings/store.jsonl
//!   confidence_threshold: 0.5
//!   tracked_classes: [0, 24, 26, 28]
//! tracker:
//!   new_track_thresh: 0.5
//!   max_age: 30
//!   min_hits: 3
//! correlation:
//!   proximity_threshold_px: 100
//!   staleness_threshold_frames: 30
//! cooldown_seconds: 5
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::error::{Result, WatchError};
use crate::tracker::{ClassId, TrackerConfig};

pub const PERSON: ClassId = 0;
pub const BACKPACK: ClassId = 24;
pub const HANDBAG: ClassId = 26;
pub const SUITCASE: ClassId = 28;
pub const LAPTOP: ClassId = 63;
pub const CELL_PHONE: ClassId = 67;

/// Human-readable name of a COCO class, for logs and overlays.
pub fn class_name(class_id: ClassId) -> &'static str {
    match class_id {
        PERSON => "person",
        BACKPACK => "backpack",
        HANDBAG => "handbag",
        SUITCASE => "suitcase",
        LAPTOP => "laptop",
        CELL_PHONE => "cell phone",
        39 => "bottle",
        73 => "book",
        _ => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Model handed to the detector backend
    pub model: PathBuf,
    pub confidence_threshold: f32,
    /// Classes kept after detection, everything else is dropped
    pub tracked_classes: BTreeSet<ClassId>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model: PathBuf::from("model.jsonl"),
            confidence_threshold: 0.5,
            tracked_classes: [PERSON, BACKPACK, HANDBAG, SUITCASE, LAPTOP, CELL_PHONE]
                .into_iter()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub person_class: ClassId,
    pub proximity_threshold_px: f32,
    /// Frames of absence before a ledger entry counts as disappeared.
    /// `None` means one second at the stream's frame rate.
    pub staleness_threshold_frames: Option<u64>,
    /// Knee height difference, as a fraction of frame height, read as running
    pub knee_delta_fraction: f32,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            person_class: PERSON,
            proximity_threshold_px: 100.0,
            staleness_threshold_frames: None,
            knee_delta_fraction: 0.10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub correlation: CorrelationConfig,
    pub cooldown_seconds: f64,
    /// Nominal frame rate, used when the source does not report one
    pub frame_rate: f32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            tracker: TrackerConfig::default(),
            correlation: CorrelationConfig::default(),
            cooldown_seconds: 5.0,
            frame_rate: 30.0,
        }
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(WatchError::Config(format!("{name} must be within [0, 1], got {value}")))
    }
}

impl WatchConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("detector.confidence_threshold", self.detector.confidence_threshold)?;
        check_unit("tracker.track_thresh", self.tracker.track_thresh)?;
        check_unit("tracker.match_thresh", self.tracker.match_thresh)?;
        check_unit("tracker.new_track_thresh", self.tracker.new_track_thresh)?;
        check_unit("correlation.knee_delta_fraction", self.correlation.knee_delta_fraction)?;

        if self.detector.tracked_classes.is_empty() {
            return Err(WatchError::Config("detector.tracked_classes is empty".into()));
        }
        if self.tracker.min_hits == 0 {
            return Err(WatchError::Config("tracker.min_hits must be at least 1".into()));
        }
        if !(self.frame_rate > 0.0) {
            return Err(WatchError::Config(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        if !(self.cooldown_seconds >= 0.0) || !self.cooldown_seconds.is_finite() {
            return Err(WatchError::Config(format!(
                "cooldown_seconds must be a non-negative number, got {}",
                self.cooldown_seconds
            )));
        }
        if !(self.correlation.proximity_threshold_px > 0.0) {
            return Err(WatchError::Config(
                "correlation.proximity_threshold_px must be positive".into(),
            ));
        }

        if self.tracker.new_track_thresh > self.detector.confidence_threshold {
            warn!(
                "tracker.new_track_thresh {} is above detector.confidence_threshold {}; \
                 detections in between are never tracked",
                self.tracker.new_track_thresh, self.detector.confidence_threshold
            );
        }
        if !self
            .detector
            .tracked_classes
            .contains(&self.correlation.person_class)
        {
            warn!(
                "person class {} is not tracked; no disappearance can ever be correlated",
                self.correlation.person_class
            );
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs_f64(self.cooldown_seconds)
    }

    /// Staleness threshold in frames, falling back to one second of stream.
    ///
    /// The fallback is at least one frame, so a single missed detection
    /// never counts as a disappearance.
    pub fn staleness_frames(&self, stream_fps: Option<f32>) -> u64 {
        self.correlation.staleness_threshold_frames.unwrap_or_else(|| {
            let fps = stream_fps.filter(|f| *f > 0.0).unwrap_or(self.frame_rate);
            (fps.round() as u64).max(1)
        })
    }
}
