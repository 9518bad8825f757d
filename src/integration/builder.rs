//! Builder for creating Detection objects from various box formats.

use crate::tracker::{ClassId, Detection};

/// Builder for creating `Detection` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct DetectionBuilder {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    class_id: ClassId,
}

impl DetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        (self.x1, self.y1, self.x2, self.y2) = (x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height),
    /// the layout YOLO heads emit.
    pub fn xywh(self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.tlbr(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.tlbr(x, y, x + w, y + h)
    }

    /// Map a box from model input space back to frame pixels.
    pub fn scale(mut self, sx: f32, sy: f32) -> Self {
        self.x1 *= sx;
        self.x2 *= sx;
        self.y1 *= sy;
        self.y2 *= sy;
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn class(mut self, class_id: ClassId) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn build(self) -> Detection {
        Detection::new(self.x1, self.y1, self.x2, self.y2, self.score, self.class_id)
    }
}
