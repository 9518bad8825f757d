//! Recorded inference results played back through the backend traits.
//!
//! A replay log is a JSON-lines file, one record per frame:
//!
//! ```text
//! {"frame": 1, "detections": [{"bbox": [120, 80, 180, 260], "score": 0.91, "class_id": 0}], "pose": {"landmarks": [{"x": 150, "y": 90}]}}
//! {"frame": 2, "failure": "decoder timeout"}
//! ```
//!
//! Frames without a record have no detections and no pose.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::Deserialize;

use crate::error::{InferenceError, Result, WatchError};
use crate::integration::{DetectionBuilder, Frame, ObjectDetector};
use crate::pose::{PoseEstimator, PoseObservation};
use crate::tracker::{ClassId, Detection};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordedDetection {
    /// TLBR pixel box
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: ClassId,
}

impl RecordedDetection {
    fn to_detection(&self) -> Detection {
        let [x1, y1, x2, y2] = self.bbox;
        DetectionBuilder::new()
            .tlbr(x1, y1, x2, y2)
            .score(self.score)
            .class(self.class_id)
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayRecord {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<RecordedDetection>,
    #[serde(default)]
    pub pose: Option<PoseObservation>,
    /// Recorded per-frame inference failure
    #[serde(default)]
    pub failure: Option<String>,
}

impl ReplayRecord {
    fn check(&self) -> std::result::Result<(), InferenceError> {
        match &self.failure {
            Some(reason) => Err(InferenceError::Frame {
                frame: self.frame,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Parsed replay log, shared by the detector and pose halves.
#[derive(Debug, Clone, Default)]
pub struct ReplayLog {
    records: Arc<BTreeMap<u64, ReplayRecord>>,
}

impl ReplayLog {
    pub fn parse(text: &str) -> Result<Self> {
        let mut records = BTreeMap::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record: ReplayRecord = serde_json::from_str(line)
                .map_err(|source| WatchError::Replay { line: n + 1, source })?;
            records.insert(record.frame, record);
        }
        Ok(Self {
            records: Arc::new(records),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let log = Self::parse(&fs::read_to_string(path)?)?;
        info!("loaded {} replay records from {}", log.len(), path.display());
        Ok(log)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, frame: u64) -> Option<&ReplayRecord> {
        self.records.get(&frame)
    }

    pub fn detector(&self) -> ReplayDetector {
        ReplayDetector { log: self.clone() }
    }

    pub fn pose_estimator(&self) -> ReplayPoseEstimator {
        ReplayPoseEstimator { log: self.clone() }
    }
}

#[derive(Debug, Clone)]
pub struct ReplayDetector {
    log: ReplayLog,
}

impl ObjectDetector for ReplayDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> std::result::Result<Vec<Detection>, InferenceError> {
        let Some(record) = self.log.record(frame.index) else {
            return Ok(Vec::new());
        };
        record.check()?;
        Ok(record
            .detections
            .iter()
            .filter(|d| d.score >= confidence_threshold)
            .map(RecordedDetection::to_detection)
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct ReplayPoseEstimator {
    log: ReplayLog,
}

impl PoseEstimator for ReplayPoseEstimator {
    fn estimate(&mut self, frame: &Frame) -> std::result::Result<Option<PoseObservation>, InferenceError> {
        let Some(record) = self.log.record(frame.index) else {
            return Ok(None);
        };
        record.check()?;
        Ok(record.pose.clone())
    }
}
