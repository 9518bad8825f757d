//! Identity tracker: class-aware ByteTrack with confirmation and age limits.

mod byte_tracker;
mod kalman_filter;
mod matching;
mod rect;
mod strack;
mod track_state;

pub use byte_tracker::{BYTETracker, TrackerConfig};
pub use matching::{ClassId, Detection};
pub use rect::Rect;
pub use strack::Track;
pub use track_state::TrackState;
