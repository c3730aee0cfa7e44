//! Mixer configuration
//!
//! Timing constants for the loop and jump state machines, detector
//! parameters and the defaults applied to freshly loaded tracks.
//! Every field has a default, so a partial JSON file only overrides
//! what it names.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::DetectorOptions;
use crate::error::{MixerError, Result};

/// Default volume for a track with no saved state
pub const DEFAULT_TRACK_VOLUME: f32 = 75.0;

/// Default master volume
pub const DEFAULT_MASTER_VOLUME: f32 = 75.0;

/// Default number of countdown beats before a marker jump
pub const DEFAULT_COUNT_BEATS: u32 = 4;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Beat detector parameters
    pub detector: DetectorOptions,

    /// Loop controller timing
    pub looping: LoopTiming,

    /// Marker jump timing
    pub jump: JumpTiming,

    /// Debounce before the state is written to the store (ms)
    pub autosave_debounce_ms: u64,

    /// Volume given to tracks without saved state (0-100)
    pub default_track_volume: f32,

    /// Master volume at startup (0-100)
    pub default_master_volume: f32,

    /// Countdown beats for new projects
    pub default_count_beats: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorOptions::default(),
            looping: LoopTiming::default(),
            jump: JumpTiming::default(),
            autosave_debounce_ms: 500,
            default_track_volume: DEFAULT_TRACK_VOLUME,
            default_master_volume: DEFAULT_MASTER_VOLUME,
            default_count_beats: DEFAULT_COUNT_BEATS,
        }
    }
}

/// Timing of the loop boundary seek
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopTiming {
    /// How far before the loop end the seek back is issued (ms)
    pub pre_seek_ms: u64,
    /// Upper bound on waiting for every track to finish seeking (ms)
    pub seek_timeout_ms: u64,
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self {
            pre_seek_ms: 50,
            seek_timeout_ms: 4000,
        }
    }
}

impl LoopTiming {
    /// Pre-seek buffer in seconds
    pub fn pre_seek_secs(&self) -> f64 {
        self.pre_seek_ms as f64 / 1000.0
    }

    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }
}

/// Timing of the marker jump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpTiming {
    /// The synchronized seek starts this long before the countdown ends (ms)
    pub pre_buffer_ms: u64,
    /// Upper bound on waiting for every track to finish seeking (ms)
    pub seek_timeout_ms: u64,
    /// Interval between playback-advance polls (ms)
    pub advance_poll_ms: u64,
    /// Upper bound on waiting for the guide to advance again (ms)
    pub advance_timeout_ms: u64,
    /// Minimum position delta that counts as "advancing" (seconds)
    pub advance_threshold_secs: f64,
    /// Gain of the guide preview instance
    pub preview_gain: f32,
}

impl Default for JumpTiming {
    fn default() -> Self {
        Self {
            pre_buffer_ms: 50,
            seek_timeout_ms: 6000,
            advance_poll_ms: 50,
            advance_timeout_ms: 2500,
            advance_threshold_secs: 0.02,
            preview_gain: 0.9,
        }
    }
}

impl JumpTiming {
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_millis(self.seek_timeout_ms)
    }

    pub fn advance_poll(&self) -> Duration {
        Duration::from_millis(self.advance_poll_ms)
    }

    pub fn advance_timeout(&self) -> Duration {
        Duration::from_millis(self.advance_timeout_ms)
    }
}

impl MixerConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| MixerError::StateRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: MixerConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}
