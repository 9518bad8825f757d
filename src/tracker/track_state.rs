/// Lifecycle of a track inside the tracker.
///
/// Only `Tracked` tracks are reported to callers; `Lost` tracks are kept for
/// re-identification until they exceed the tracker's `max_age`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created this frame, no Kalman state yet
    #[default]
    New,
    /// Matched to a detection in the latest frame
    Tracked,
    /// Missed one or more frames, still eligible for re-matching
    Lost,
    /// Aged out or dropped as an unconfirmed false start
    Removed,
}

impl TrackState {
    /// Whether the track should still take part in association.
    pub fn is_alive(self) -> bool {
        matches!(self, TrackState::Tracked | TrackState::Lost)
    }
}
