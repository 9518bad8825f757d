//! Alert delivery collaborators.
//!
//! Sinks are fire-and-forget: the pipeline never waits for or retries a
//! delivery, and a sink reports its own failures through the log.

use std::io::Write;

use chrono::{DateTime, Utc};
use log::{error, warn};
use serde::Serialize;

use crate::event::TheftEvent;

pub trait EventSink {
    fn emit(&mut self, event: &TheftEvent);
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&mut self, event: &TheftEvent) {
        (**self).emit(event)
    }
}

/// Collects events in memory.
impl EventSink for Vec<TheftEvent> {
    fn emit(&mut self, event: &TheftEvent) {
        self.push(event.clone());
    }
}

/// Writes every alert to the log at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: &TheftEvent) {
        warn!("Threat Detected: theft ({event})");
    }
}

#[derive(Serialize)]
struct AlertRecord<'a> {
    timestamp: DateTime<Utc>,
    threat: &'static str,
    #[serde(flatten)]
    event: &'a TheftEvent,
}

/// Appends one JSON object per alert, the durable event log.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write(&mut self, event: &TheftEvent) -> std::io::Result<()> {
        let record = AlertRecord {
            timestamp: Utc::now(),
            threat: "theft",
            event,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: &TheftEvent) {
        if let Err(err) = self.write(event) {
            error!("failed to record event for object #{}: {err}", event.object_track_id);
        }
    }
}

/// Sends every alert to each inner sink in turn.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for MultiSink {
    fn emit(&mut self, event: &TheftEvent) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Rect;

    fn event() -> TheftEvent {
        TheftEvent {
            object_track_id: 7,
            object_class: 24,
            object_bbox: Rect::new(200.0, 200.0, 40.0, 50.0),
            person_track_id: 3,
            distance_px: 80.0,
            frame_index: 131,
        }
    }

    #[test]
    fn test_json_lines_record() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.emit(&event());
        sink.emit(&event());

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["threat"], "theft");
        assert_eq!(value["object_track_id"], 7);
        assert_eq!(value["person_track_id"], 3);
        assert_eq!(value["frame_index"], 131);
        assert_eq!(value["object_bbox"]["x"], 200.0);
        assert!(value["timestamp"].is_string());
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_delivery_failure_is_swallowed() {
        let mut sink = MultiSink::new().with(JsonLinesSink::new(BrokenWriter)).with(LogSink);
        assert_eq!(sink.len(), 2);
        sink.emit(&event());
    }
}
