use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Axis-aligned pixel box, stored as top-left corner plus size (TLWH).
///
/// The tracker's Kalman state works in XYAH (center x, center y,
/// width/height ratio, height); detectors usually hand out TLBR corners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[inline]
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// From corner coordinates `(x1, y1)` and `(x2, y2)`.
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline]
    pub fn from_xyah(cx: f32, cy: f32, aspect_ratio: f32, height: f32) -> Self {
        let width = aspect_ratio * height;
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x, self.y, self.right(), self.bottom()]
    }

    /// Aspect ratio is 0 for a degenerate (zero height) box.
    #[inline]
    pub fn to_xyah(&self) -> [f32; 4] {
        let aspect_ratio = if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        };
        [
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
            aspect_ratio,
            self.height,
        ]
    }

    /// Top-left corner, the reference point for person/object proximity.
    #[inline]
    pub fn origin(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn origin_distance(&self, other: &Rect) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    fn intersection_area(&self, other: &Rect) -> f32 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        w.max(0.0) * h.max(0.0)
    }

    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// Pairwise IoU, shape `(boxes_a.len(), boxes_b.len())`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    Array2::from_shape_fn((boxes_a.len(), boxes_b.len()), |(i, j)| {
        boxes_a[i].iou(&boxes_b[j])
    })
}
