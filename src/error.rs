//! Error handling for Stagemix
//!
//! Precondition failures carry enough context to be shown to the operator
//! as a warning. Timeouts are never errors: the engine proceeds after the
//! bound elapses.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Stagemix operations
pub type Result<T> = std::result::Result<T, MixerError>;

/// Main error type for Stagemix operations
#[derive(Error, Debug)]
pub enum MixerError {
    // Precondition failures
    #[error("No tracks loaded")]
    NoTracksLoaded,

    #[error("No beats detected; run beat detection on the click track first")]
    NoBeatsDetected,

    #[error("No guide track found")]
    NoGuideTrack,

    #[error("No click track found")]
    NoClickTrack,

    #[error("No strong beat ahead of {current_time:.3}s")]
    NoStrongBeatAhead { current_time: f64 },

    #[error("Insufficient lead-in before marker '{marker}': needs {lead_in:.3}s, marker is at {marker_time:.3}s")]
    InsufficientLeadIn {
        marker: String,
        marker_time: f64,
        lead_in: f64,
    },

    #[error("Unknown track: {id}")]
    UnknownTrack { id: u32 },

    #[error("Unknown project index: {index}")]
    UnknownProject { index: usize },

    #[error("Unknown marker: {reason}")]
    UnknownMarker { reason: String },

    #[error("Invalid loop: {reason}")]
    InvalidLoop { reason: String },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    // Detection failures
    #[error("Beat detection failed: {reason}")]
    BeatDetection { reason: String },

    // Backend failures
    #[error("Audio source unavailable: {url}")]
    SourceUnavailable { url: String },

    // Storage failures
    #[error("Failed to read state file: {path}: {source}")]
    StateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file: {path}: {source}")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixerError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixerError::NoTracksLoaded => "NO_TRACKS_LOADED",
            MixerError::NoBeatsDetected => "NO_BEATS_DETECTED",
            MixerError::NoGuideTrack => "NO_GUIDE_TRACK",
            MixerError::NoClickTrack => "NO_CLICK_TRACK",
            MixerError::NoStrongBeatAhead { .. } => "NO_STRONG_BEAT_AHEAD",
            MixerError::InsufficientLeadIn { .. } => "INSUFFICIENT_LEAD_IN",
            MixerError::UnknownTrack { .. } => "UNKNOWN_TRACK",
            MixerError::UnknownProject { .. } => "UNKNOWN_PROJECT",
            MixerError::UnknownMarker { .. } => "UNKNOWN_MARKER",
            MixerError::InvalidLoop { .. } => "INVALID_LOOP",
            MixerError::InvalidSetting { .. } => "INVALID_SETTING",
            MixerError::BeatDetection { .. } => "BEAT_DETECTION_FAILED",
            MixerError::SourceUnavailable { .. } => "SOURCE_UNAVAILABLE",
            MixerError::StateRead { .. } => "STATE_READ_ERROR",
            MixerError::StateWrite { .. } => "STATE_WRITE_ERROR",
            MixerError::Io(_) => "IO_ERROR",
            MixerError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// True for failures that leave the mixer untouched and only need to be
    /// shown to the operator.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            MixerError::NoTracksLoaded
                | MixerError::NoBeatsDetected
                | MixerError::NoGuideTrack
                | MixerError::NoClickTrack
                | MixerError::NoStrongBeatAhead { .. }
                | MixerError::InsufficientLeadIn { .. }
                | MixerError::UnknownTrack { .. }
                | MixerError::UnknownProject { .. }
                | MixerError::UnknownMarker { .. }
                | MixerError::InvalidLoop { .. }
                | MixerError::InvalidSetting { .. }
        )
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            MixerError::StateRead { .. } | MixerError::StateWrite { .. } | MixerError::Io(_) => {
                true
            }
            MixerError::BeatDetection { .. } | MixerError::SourceUnavailable { .. } => true,
            other => other.is_precondition(),
        }
    }

    /// Get a user-friendly message for this error
    pub fn friendly_message(&self) -> String {
        match self {
            MixerError::NoTracksLoaded => "Load audio files first.".to_string(),
            MixerError::NoBeatsDetected => {
                "No beats detected yet. Automate the mix first.".to_string()
            }
            MixerError::NoGuideTrack => "No guide track found.".to_string(),
            MixerError::NoClickTrack => "No click track found.".to_string(),
            MixerError::NoStrongBeatAhead { .. } => "No more strong beats ahead.".to_string(),
            MixerError::InsufficientLeadIn { marker, .. } => {
                format!("Not enough beats before marker '{}'.", marker)
            }
            MixerError::BeatDetection { reason } => {
                format!("Could not detect the click accents: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}
