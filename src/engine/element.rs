//! Audio backend seam
//!
//! A [`PlaybackElement`] is one playing source with its own gain and pan
//! controls (the per-track signal path). An [`AudioBackend`] is the shared
//! processing context of a loaded project: it opens elements and decodes
//! sources for analysis.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::{decode_wav_channel0, DecodedAudio};
use crate::error::Result;

/// Where a track's audio comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioSource {
    pub url: String,
}

impl AudioSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(path.display().to_string())
    }
}

/// One playing source plus its gain and pan stage
pub trait PlaybackElement {
    /// Start or continue playback
    fn play(&mut self);

    fn pause(&mut self);

    fn is_paused(&self) -> bool;

    /// Current position in seconds
    fn position(&self) -> f64;

    /// Total length in seconds, 0 when unknown
    fn duration(&self) -> f64;

    /// Assign the position directly
    fn set_position(&mut self, secs: f64);

    /// Low-latency seek. Returns false when the element has no such
    /// primitive, in which case the caller assigns the position directly.
    fn fast_seek(&mut self, _secs: f64) -> bool {
        false
    }

    /// True while a seek has been issued but not completed
    fn is_seeking(&self) -> bool;

    /// Applied amplitude multiplier
    fn gain(&self) -> f32;

    fn set_gain(&mut self, gain: f32);

    /// Applied stereo pan in [-1, 1]
    fn pan(&self) -> f32;

    fn set_pan(&mut self, pan: f32);

    /// Meter tap after the gain stage: peak output level of the last frame,
    /// in [0, 1]. Elements without a meter report 0.
    fn meter(&self) -> f32 {
        0.0
    }

    /// Called once per scheduling frame. Elements driven by a hardware
    /// clock ignore it.
    fn on_frame(&mut self, _elapsed: Duration) {}
}

/// Shared processing context of one loaded project
pub trait AudioBackend {
    /// Open an independent playback element for a source
    fn open(&mut self, source: &AudioSource) -> Result<Box<dyn PlaybackElement>>;

    /// Resume the processing context (no-op when already running)
    fn resume(&mut self);

    /// Release the context
    fn close(&mut self);

    /// Decode the first channel of a source for beat detection
    fn decode(&mut self, source: &AudioSource) -> Result<DecodedAudio> {
        decode_wav_channel0(Path::new(&source.url))
    }
}

/// Seek an element, preferring its low-latency primitive
pub fn seek_element(element: &mut dyn PlaybackElement, secs: f64) {
    if !element.fast_seek(secs) {
        element.set_position(secs);
    }
}
