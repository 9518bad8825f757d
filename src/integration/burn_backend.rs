//! Burn inference backend for object detection.
//!
//! `BurnDetector` runs any detection model built with the Burn framework on
//! pipeline frames.
//!
//! # Example
//!
//! ```ignore
//! use theftwatch::integration::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! // Implement BurnModel for your detection model
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MyYoloModel::load("model.bin");
//! let detector = BurnDetector::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use image::imageops::{self, FilterType};
use thiserror::Error;

use super::{DetectionBuilder, Frame, ObjectDetector};
use crate::error::InferenceError;
use crate::tracker::{ClassId, Detection};

/// Error type for Burn detection failures.
#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    #[error("model expects {expected} input channels, got {got}")]
    UnsupportedChannels { expected: u32, got: u32 },
    #[error("empty frame {0}")]
    EmptyFrame(u64),
}

impl From<BurnDetectorError> for InferenceError {
    fn from(err: BurnDetectorError) -> Self {
        match err {
            // a model that cannot take RGB input never will
            BurnDetectorError::UnsupportedChannels { .. } => InferenceError::Backend(err.to_string()),
            BurnDetectorError::EmptyFrame(frame) => InferenceError::Frame {
                frame,
                reason: err.to_string(),
            },
        }
    }
}

/// Raw detection output from the model before filtering.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model,
    /// in model input pixels
    pub bbox: [f32; 4],
    pub score: f32,
    /// Class ID; detections without one are dropped
    pub class_id: Option<usize>,
}

/// Trait for Burn-based detection models.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on a `[batch, channels, height, width]` tensor
    /// normalised to [0, 1].
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640) // Default YOLO input size
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true // Most YOLO variants use XYWH
    }
}

/// Burn-based object detector implementing `ObjectDetector`.
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    pub fn new(model: M, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Resize the frame to the model input and lay it out as NCHW floats.
    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        if channels != 3 {
            return Err(BurnDetectorError::UnsupportedChannels {
                expected: channels,
                got: 3,
            });
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(BurnDetectorError::EmptyFrame(frame.index));
        }

        let resized = imageops::resize(&frame.image, target_w, target_h, FilterType::Triangle);
        let plane = (target_w * target_h) as usize;
        let mut data = vec![0.0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            3,
            target_h as usize,
            target_w as usize,
        ]))
    }

    /// Convert raw model outputs to frame-space detections.
    fn postprocess(&self, frame: &Frame, raw: Vec<RawDetection>, threshold: f32) -> Vec<Detection> {
        let (_, target_h, target_w) = self.model.input_size();
        let sx = frame.width() as f32 / target_w as f32;
        let sy = frame.height() as f32 / target_h as f32;

        raw.into_iter()
            .filter(|r| r.score >= threshold)
            .filter_map(|r| {
                let class_id = ClassId::try_from(r.class_id?).ok()?;
                let [p0, p1, p2, p3] = r.bbox;
                let builder = DetectionBuilder::new().score(r.score).class(class_id);
                let builder = if self.model.bbox_is_xywh() {
                    builder.xywh(p0, p1, p2, p3)
                } else {
                    builder.tlbr(p0, p1, p2, p3)
                };
                Some(builder.scale(sx, sy).build())
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> ObjectDetector for BurnDetector<B, M> {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let tensor = self.preprocess(frame)?;
        let raw = self.model.forward(tensor);
        Ok(self.postprocess(frame, raw, confidence_threshold))
    }
}
