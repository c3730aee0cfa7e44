//! Audio Engine Module
//!
//! Synchronized multi-track playback:
//! - Playback element and backend seam
//! - Track registry and effective-gain computation
//! - Transport state machine
//! - Virtual-clock timers and bounded seek barriers

pub mod element;
pub mod registry;
pub mod simulated;
pub mod sync;
pub mod timer;
pub mod track;
pub mod transport;

pub use element::{seek_element, AudioBackend, AudioSource, PlaybackElement};
pub use registry::{TrackRegistry, TrackSettings};
pub use simulated::{ElementProbe, SimulatedBackend, SimulatedElement};
pub use sync::{BarrierStatus, SeekBarrier};
pub use timer::{TimerId, TimerQueue};
pub use track::{display_name, Track, TrackId, TrackInfo, TrackRole};
pub use transport::{Transport, TransportState};
