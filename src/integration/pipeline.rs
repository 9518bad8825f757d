//! WatchPipeline: detection, tracking and theft inference for one stream.

use std::collections::BTreeSet;
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::config::WatchConfig;
use crate::cooldown::CooldownGate;
use crate::correlation::{CorrelationEngine, CorrelationSettings};
use crate::error::Result;
use crate::event::TheftEvent;
use crate::ledger::ObjectLedger;
use crate::pose::{KneeDeltaHeuristic, PoseEstimator, PoseObservation};
use crate::sink::EventSink;
use crate::source::FrameSource;
use crate::tracker::{BYTETracker, ClassId, Track};

use super::{Frame, ObjectDetector, retain_classes};

/// Everything the pipeline worked out for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame_index: u64,
    /// Confirmed tracks of every class
    pub tracks: Vec<Track>,
    pub pose: Option<PoseObservation>,
    /// Events confirmed by correlation this frame
    pub confirmed: Vec<TheftEvent>,
    /// The part of `confirmed` that passed the cooldown gate
    pub emitted: Vec<TheftEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames read from the source, including skipped ones
    pub frames: u64,
    pub skipped: u64,
    pub confirmed: u64,
    pub emitted: u64,
}

/// Detector, pose estimator and all per-stream state.
///
/// Built at stream start and dropped at stream end; the ledger and the
/// cooldown state live and die with it.
pub struct WatchPipeline<D: ObjectDetector, P: PoseEstimator> {
    detector: D,
    pose_estimator: P,
    tracker: BYTETracker,
    ledger: ObjectLedger,
    engine: CorrelationEngine,
    gate: CooldownGate,
    confidence_threshold: f32,
    tracked_classes: BTreeSet<ClassId>,
    person_class: ClassId,
    frame_index: u64,
}

impl<D: ObjectDetector, P: PoseEstimator> WatchPipeline<D, P> {
    /// `stream_fps` sets the default staleness threshold when the config
    /// does not give one.
    pub fn new(detector: D, pose_estimator: P, config: &WatchConfig, stream_fps: Option<f32>) -> Result<Self> {
        config.validate()?;

        let settings = CorrelationSettings {
            person_class: config.correlation.person_class,
            proximity_threshold_px: config.correlation.proximity_threshold_px,
            staleness_frames: config.staleness_frames(stream_fps),
            motion: KneeDeltaHeuristic::new(config.correlation.knee_delta_fraction),
        };
        info!(
            "pipeline ready: classes {:?}, proximity {}px, staleness {} frames, cooldown {:?}",
            config.detector.tracked_classes,
            settings.proximity_threshold_px,
            settings.staleness_frames,
            config.cooldown()
        );

        Ok(Self {
            detector,
            pose_estimator,
            tracker: BYTETracker::new(config.tracker.clone()),
            ledger: ObjectLedger::new(),
            engine: CorrelationEngine::new(settings),
            gate: CooldownGate::new(config.cooldown()),
            confidence_threshold: config.detector.confidence_threshold,
            tracked_classes: config.detector.tracked_classes.clone(),
            person_class: config.correlation.person_class,
            frame_index: 0,
        })
    }

    /// Index the next frame read from a source will get.
    fn advance(&mut self) -> u64 {
        self.frame_index += 1;
        self.frame_index
    }

    /// Process a single frame.
    ///
    /// Both inference calls happen before any state changes, so a failed
    /// frame leaves tracker, ledger and cooldown untouched.
    pub fn process_frame(&mut self, frame: &Frame, now: Instant) -> Result<FrameReport> {
        self.frame_index = self.frame_index.max(frame.index);

        let detections = self.detector.detect(frame, self.confidence_threshold)?;
        let pose = self.pose_estimator.estimate(frame)?;

        let detections = retain_classes(detections, &self.tracked_classes, self.confidence_threshold);
        let tracks = self.tracker.update(detections);
        let tracker = &self.tracker;
        self.ledger.forget_consumed(|id| tracker.is_live(id));
        self.ledger.observe(&tracks, self.person_class, frame.index);

        let confirmed = self.engine.check(
            &mut self.ledger,
            &tracks,
            pose.as_ref(),
            frame.index,
            frame.height(),
        );
        let emitted = self.gate.admit(confirmed.clone(), now);

        debug!(
            "frame {}: {} tracks, {} watched, {} confirmed, {} emitted",
            frame.index,
            tracks.len(),
            self.ledger.len(),
            confirmed.len(),
            emitted.len()
        );

        Ok(FrameReport {
            frame_index: frame.index,
            tracks,
            pose,
            confirmed,
            emitted,
        })
    }

    /// Run until the source is exhausted or a fatal error occurs.
    ///
    /// Admitted events go to `sink`; `on_frame` sees every processed frame,
    /// for display or recording.
    pub fn run<S, K, F>(&mut self, source: &mut S, sink: &mut K, mut on_frame: F) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: EventSink + ?Sized,
        F: FnMut(&Frame, &FrameReport),
    {
        let mut summary = RunSummary::default();

        while let Some(next) = source.next_frame() {
            let index = self.advance();
            summary.frames += 1;

            let image = match next {
                Ok(image) => image,
                Err(err) => {
                    warn!("skipping frame {index}: {err}");
                    summary.skipped += 1;
                    continue;
                }
            };
            let frame = Frame::new(index, image);

            match self.process_frame(&frame, Instant::now()) {
                Ok(report) => {
                    summary.confirmed += report.confirmed.len() as u64;
                    summary.emitted += report.emitted.len() as u64;
                    for event in &report.emitted {
                        sink.emit(event);
                    }
                    on_frame(&frame, &report);
                }
                Err(err) if err.is_fatal() => {
                    error!("stopping at frame {index}: {err}");
                    return Err(err);
                }
                Err(err) => {
                    warn!("skipping frame {index}: {err}");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            "frame source exhausted after {} frames ({} skipped, {} confirmed, {} emitted)",
            summary.frames, summary.skipped, summary.confirmed, summary.emitted
        );
        Ok(summary)
    }

    pub fn ledger(&self) -> &ObjectLedger {
        &self.ledger
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tracker(&self) -> &BYTETracker {
        &self.tracker
    }
}
