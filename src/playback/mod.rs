//! Timed Playback Control
//!
//! State machines that move the playhead on their own schedule:
//! - Loop controller (seek back at the loop end)
//! - Marker jump synchronizer (beat-aligned jump behind a countdown)
//! - Countdown display

pub mod countdown;
pub mod jump;
pub mod looping;

pub use countdown::Countdown;
pub use jump::{JumpActivation, JumpPhase, JumpToken, MarkerJumpSynchronizer, PendingJump};
pub use looping::{ActiveLoop, LoopController};

use crate::engine::{AudioBackend, TrackRegistry, Transport};
use crate::notice::Notices;

/// Everything a playback state machine may touch during one call
pub struct PlaybackContext<'a> {
    pub tracks: &'a mut TrackRegistry,
    pub transport: &'a mut Transport,
    pub backend: &'a mut dyn AudioBackend,
    pub notices: &'a mut Notices,
}

/// Whole milliseconds (with microsecond precision) to a `Duration`
pub(crate) fn millis(ms: f64) -> std::time::Duration {
    if ms.is_finite() && ms > 0.0 {
        std::time::Duration::from_micros((ms * 1000.0).round() as u64)
    } else {
        std::time::Duration::ZERO
    }
}
