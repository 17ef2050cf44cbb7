//! Per-kind playback: state model, transport session and shuffle selection.

pub mod session;
pub mod shuffle;
pub mod state;

pub use session::PlaybackSession;
pub use shuffle::RandomPicker;
pub use state::{format_time, PlaybackState, PlaybackStatus};
