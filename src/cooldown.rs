//! Global rate limiter for outgoing alerts.

use std::time::{Duration, Instant};

use log::debug;

use crate::event::TheftEvent;

/// Lets at most one event through per cooldown window.
///
/// The window is shared by every object and person: a burst of confirmed
/// events collapses into a single alert.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_emitted: Option<Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_emitted: None,
        }
    }

    pub fn last_emitted(&self) -> Option<Instant> {
        self.last_emitted
    }

    fn is_open(&self, now: Instant) -> bool {
        self.last_emitted
            .is_none_or(|last| now.saturating_duration_since(last) > self.cooldown)
    }

    /// The subset of `events` to send out at `now`.
    pub fn admit(&mut self, events: Vec<TheftEvent>, now: Instant) -> Vec<TheftEvent> {
        let mut admitted = Vec::new();
        for event in events {
            if self.is_open(now) {
                self.last_emitted = Some(now);
                admitted.push(event);
            } else {
                debug!("cooldown active, suppressing: {event}");
            }
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Rect;

    fn event(object_track_id: u64) -> TheftEvent {
        TheftEvent {
            object_track_id,
            object_class: 24,
            object_bbox: Rect::new(0.0, 0.0, 10.0, 10.0),
            person_track_id: 3,
            distance_px: 20.0,
            frame_index: 131,
        }
    }

    #[test]
    fn test_cooldown_suppression() {
        let mut gate = CooldownGate::new(Duration::from_secs(5));
        let t0 = Instant::now();
        let at = |secs| t0 + Duration::from_secs(secs);

        assert_eq!(gate.admit(vec![event(1)], at(0)).len(), 1);
        assert!(gate.admit(vec![event(2)], at(1)).is_empty());
        assert!(gate.admit(vec![event(3)], at(2)).is_empty());
        // exactly at the boundary the window is still closed
        assert!(gate.admit(vec![event(4)], at(5)).is_empty());

        let admitted = gate.admit(vec![event(5)], at(6));
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].object_track_id, 5);
        assert_eq!(gate.last_emitted(), Some(at(6)));
    }

    #[test]
    fn test_burst_collapses_to_one() {
        let mut gate = CooldownGate::new(Duration::from_secs(5));
        let admitted = gate.admit(vec![event(1), event(2), event(3)], Instant::now());
        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].object_track_id, 1);
    }

    #[test]
    fn test_suppressed_events_do_not_extend_window() {
        let mut gate = CooldownGate::new(Duration::from_secs(5));
        let t0 = Instant::now();
        gate.admit(vec![event(1)], t0);
        gate.admit(vec![event(2)], t0 + Duration::from_secs(4));
        assert_eq!(gate.admit(vec![event(3)], t0 + Duration::from_secs(6)).len(), 1);
    }
}
