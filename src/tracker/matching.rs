//! Matching utilities for multi-object tracking.

use crate::tracker::rect::{Rect, iou_batch};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// COCO-style class identifier as emitted by the detector.
pub type ClassId = u32;

/// One frame's raw observation, consumed by the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box (stored as TLWH, built from TLBR pixel coordinates)
    pub bbox: Rect,
    /// Detection confidence score in [0, 1]
    pub score: f32,
    /// Detected class
    pub class_id: ClassId,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: ClassId) -> Self {
        Self {
            bbox: Rect::from_tlbr(x1, y1, x2, y2),
            score,
            class_id,
        }
    }

    pub fn from_rect(bbox: Rect, score: f32, class_id: ClassId) -> Self {
        Self {
            bbox,
            score,
            class_id,
        }
    }
}

/// `1 - IoU` for every track/detection pair.
pub fn iou_distance(track_boxes: &[Rect], det_boxes: &[Rect]) -> Array2<f32> {
    iou_batch(track_boxes, det_boxes).mapv(|iou| 1.0 - iou)
}

/// Forbid matches between a track and a detection of another class.
///
/// Must run after `fuse_score`, which would otherwise scale the gate back
/// below the match threshold.
pub fn gate_classes(cost_matrix: &mut Array2<f32>, track_classes: &[ClassId], det_classes: &[ClassId]) {
    let (rows, cols) = cost_matrix.dim();
    for i in 0..rows {
        for j in 0..cols {
            if track_classes[i] != det_classes[j] {
                cost_matrix[[i, j]] = 1.0;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);

    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask: Vec<bool> = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && cost_matrix[[row_idx, col_idx]] <= thresh {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(err) => {
            log::warn!("linear assignment failed, leaving all tracks unmatched: {err:?}");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections: Vec<usize> = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}

pub fn fuse_score(cost_matrix: &mut Array2<f32>, detections: &[Detection]) {
    let (rows, cols) = cost_matrix.dim();
    for i in 0..rows {
        for j in 0..cols {
            let iou_sim = 1.0 - cost_matrix[[i, j]];
            let fused_sim = iou_sim * detections[j].score;
            cost_matrix[[i, j]] = 1.0 - fused_sim;
        }
    }
}
