//! Frames and the object detection backend contract.

use std::collections::BTreeSet;

use image::RgbImage;

use crate::error::InferenceError;
use crate::tracker::{ClassId, Detection};

/// A decoded frame and its position in the stream (1-based).
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any detection model to the pipeline.
///
/// # Example
///
/// ```ignore
/// use theftwatch::{Detection, Frame, InferenceError, ObjectDetector};
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl ObjectDetector for MyDetector {
///     fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>, InferenceError> {
///         // Run inference and return detections
///         Ok(vec![])
///     }
/// }
/// ```
pub trait ObjectDetector {
    /// Run inference on one frame.
    ///
    /// Detections scoring below `confidence_threshold` must not be returned.
    /// Return [`InferenceError::Frame`] when only this frame failed and
    /// [`InferenceError::Backend`] when the model can no longer be used.
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError>;
}

impl<T: ObjectDetector + ?Sized> ObjectDetector for Box<T> {
    fn detect(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        (**self).detect(frame, confidence_threshold)
    }
}

/// Keep only detections of the classes of interest that pass the threshold.
pub fn retain_classes(
    detections: Vec<Detection>,
    classes: &BTreeSet<ClassId>,
    confidence_threshold: f32,
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.score >= confidence_threshold && classes.contains(&d.class_id))
        .collect()
}
