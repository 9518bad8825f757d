//! Overlay rendering for display and recording. Never feeds back into
//! detection.

use std::path::Path;
use std::time::Instant;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut,
};
use imageproc::rect::Rect as PixelRect;

use crate::config::class_name;
use crate::error::{Result, WatchError};
use crate::integration::{Frame, FrameReport};
use crate::pose::{PoseObservation, SKELETON};
use crate::tracker::{ClassId, Rect};

pub const PERSON_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const OBJECT_COLOR: Rgb<u8> = Rgb([0, 120, 255]);
pub const SKELETON_COLOR: Rgb<u8> = Rgb([255, 220, 0]);
pub const ALERT_COLOR: Rgb<u8> = Rgb([220, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const BANNER_HEIGHT: u32 = 24;

/// Draws tracks, the pose skeleton and a status banner on copies of frames.
pub struct Annotator {
    font: Option<FontArc>,
    person_class: ClassId,
    /// Frames the alert banner stays up after a confirmed event
    alert_hold_frames: u64,
    last_alert_frame: Option<u64>,
    last_instant: Option<Instant>,
    fps: f32,
}

impl Annotator {
    pub fn new(person_class: ClassId) -> Self {
        Self {
            font: None,
            person_class,
            alert_hold_frames: 30,
            last_alert_frame: None,
            last_instant: None,
            fps: 0.0,
        }
    }

    /// Enable labels and FPS text using a TTF/OTF font.
    pub fn with_font_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| WatchError::Config(format!("bad font {}: {e}", path.display())))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn with_alert_hold(mut self, frames: u64) -> Self {
        self.alert_hold_frames = frames;
        self
    }

    /// Smoothed frames per second over the calls to `annotate`.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last_instant {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            if dt > 0.0 {
                let instant_fps = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    instant_fps
                } else {
                    0.9 * self.fps + 0.1 * instant_fps
                };
            }
        }
        self.last_instant = Some(now);
    }

    fn alert_active(&self, frame_index: u64) -> bool {
        self.last_alert_frame
            .is_some_and(|f| frame_index.saturating_sub(f) < self.alert_hold_frames)
    }

    pub fn annotate(&mut self, frame: &Frame, report: &FrameReport, now: Instant) -> RgbImage {
        self.tick(now);
        if !report.confirmed.is_empty() {
            self.last_alert_frame = Some(frame.index);
        }

        let mut canvas = frame.image.clone();
        if canvas.width() == 0 || canvas.height() == 0 {
            return canvas;
        }

        for track in &report.tracks {
            let color = if track.class_id == self.person_class {
                PERSON_COLOR
            } else {
                OBJECT_COLOR
            };
            if let Some(rect) = to_pixel_rect(&track.bbox, &canvas) {
                draw_hollow_rect_mut(&mut canvas, rect, color);
                let label = format!("#{} {}", track.track_id, class_name(track.class_id));
                self.label(&mut canvas, &label, rect.left(), rect.top() - 14);
            }
        }

        if let Some(pose) = &report.pose {
            draw_skeleton(&mut canvas, pose);
        }

        let alert = self.alert_active(frame.index);
        let banner = if alert { ALERT_COLOR } else { Rgb([40, 40, 40]) };
        let width = canvas.width();
        let banner_height = BANNER_HEIGHT.min(canvas.height());
        draw_filled_rect_mut(&mut canvas, PixelRect::at(0, 0).of_size(width, banner_height), banner);
        let status = if alert { "THEFT DETECTED" } else { "MONITORING" };
        let status = format!("{status}  frame {}  FPS {:.1}", frame.index, self.fps);
        self.label(&mut canvas, &status, 6, 4);

        canvas
    }

    fn label(&self, canvas: &mut RgbImage, text: &str, x: i32, y: i32) {
        if let Some(font) = &self.font {
            draw_text_mut(canvas, TEXT_COLOR, x, y.max(0), PxScale::from(14.0), font, text);
        }
    }
}

/// Clamp a track box to the canvas; `None` when nothing is left to draw.
fn to_pixel_rect(bbox: &Rect, canvas: &RgbImage) -> Option<PixelRect> {
    let [x1, y1, x2, y2] = bbox.to_tlbr();
    let x1 = x1.max(0.0).round() as i32;
    let y1 = y1.max(0.0).round() as i32;
    let x2 = x2.min(canvas.width() as f32 - 1.0).round() as i32;
    let y2 = y2.min(canvas.height() as f32 - 1.0).round() as i32;
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(PixelRect::at(x1, y1).of_size((x2 - x1) as u32, (y2 - y1) as u32))
}

fn draw_skeleton(canvas: &mut RgbImage, pose: &PoseObservation) {
    for &(a, b) in SKELETON.iter() {
        if let (Some(pa), Some(pb)) = (pose.landmark(a), pose.landmark(b)) {
            draw_line_segment_mut(canvas, (pa.x, pa.y), (pb.x, pb.y), SKELETON_COLOR);
        }
    }
    for landmark in pose.landmarks.iter().filter(|l| l.visibility > 0.0) {
        draw_filled_circle_mut(
            canvas,
            (landmark.x.round() as i32, landmark.y.round() as i32),
            2,
            SKELETON_COLOR,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TheftEvent;
    use crate::pose::{LEFT_KNEE, Landmark, NUM_LANDMARKS, RIGHT_KNEE};
    use crate::tracker::Track;
    use std::time::Duration;

    fn report(index: u64) -> FrameReport {
        FrameReport {
            frame_index: index,
            tracks: vec![
                Track::new(1, Rect::from_tlbr(40.0, 40.0, 100.0, 150.0), 0, true),
                Track::new(2, Rect::from_tlbr(120.0, 100.0, 150.0, 140.0), 24, true),
            ],
            ..FrameReport::default()
        }
    }

    #[test]
    fn test_boxes_and_banner() {
        let frame = Frame::new(1, RgbImage::new(200, 160));
        let mut annotator = Annotator::new(0);
        let canvas = annotator.annotate(&frame, &report(1), Instant::now());

        assert_eq!(canvas.get_pixel(40, 80), &PERSON_COLOR);
        assert_eq!(canvas.get_pixel(120, 120), &OBJECT_COLOR);
        assert_eq!(canvas.get_pixel(199, 5), &Rgb([40, 40, 40]));
        // the source frame is left alone
        assert_eq!(frame.image.get_pixel(40, 80), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_alert_banner_holds() {
        let mut annotator = Annotator::new(0).with_alert_hold(3);
        let t0 = Instant::now();
        let mut alert = report(1);
        alert.confirmed.push(TheftEvent {
            object_track_id: 2,
            object_class: 24,
            object_bbox: Rect::from_tlbr(120.0, 100.0, 150.0, 140.0),
            person_track_id: 1,
            distance_px: 90.0,
            frame_index: 1,
        });

        let canvas = annotator.annotate(&Frame::new(1, RgbImage::new(200, 160)), &alert, t0);
        assert_eq!(canvas.get_pixel(199, 5), &ALERT_COLOR);

        let later = t0 + Duration::from_millis(100);
        let canvas = annotator.annotate(&Frame::new(3, RgbImage::new(200, 160)), &report(3), later);
        assert_eq!(canvas.get_pixel(199, 5), &ALERT_COLOR);
        assert!((annotator.fps() - 10.0).abs() < 0.5);

        let canvas = annotator.annotate(&Frame::new(4, RgbImage::new(200, 160)), &report(4), later);
        assert_eq!(canvas.get_pixel(199, 5), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_empty_frame_passes_through() {
        let mut annotator = Annotator::new(0);
        let canvas = annotator.annotate(&Frame::new(1, RgbImage::new(0, 0)), &report(1), Instant::now());
        assert_eq!(canvas.dimensions(), (0, 0));
    }

    #[test]
    fn test_short_frame_banner_fits() {
        let canvas = Annotator::new(0).annotate(&Frame::new(1, RgbImage::new(50, 10)), &report(1), Instant::now());
        assert_eq!(canvas.get_pixel(49, 9), &Rgb([40, 40, 40]));
    }

    #[test]
    fn test_skeleton_drawn() {
        let mut landmarks = vec![Landmark::new(0.0, 0.0, 0.0); NUM_LANDMARKS];
        landmarks[LEFT_KNEE] = Landmark::new(50.0, 100.0, 1.0);
        landmarks[RIGHT_KNEE] = Landmark::new(70.0, 120.0, 1.0);
        landmarks[15] = Landmark::new(50.0, 140.0, 1.0);

        let mut with_pose = report(1);
        with_pose.tracks.clear();
        with_pose.pose = Some(PoseObservation::new(landmarks));

        let canvas = Annotator::new(0).annotate(&Frame::new(1, RgbImage::new(200, 160)), &with_pose, Instant::now());
        assert_eq!(canvas.get_pixel(50, 120), &SKELETON_COLOR);
        assert_eq!(canvas.get_pixel(70, 120), &SKELETON_COLOR);
    }
}
