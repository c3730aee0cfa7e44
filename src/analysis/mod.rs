//! Click Track Analysis
//!
//! Amplitude-based beat extraction from a decoded click track:
//! - WAV decoding to a single channel
//! - Peak detection with a refractory window
//! - Beat grid queries used by the marker jump

pub mod beats;
pub mod decode;

pub use beats::{detect_beats, BeatGrid, BeatMarker, ClickBeat, DetectorOptions};
pub use decode::{decode_wav_channel0, detect_beats_from_wav, DecodedAudio};
