//! Tracks
//!
//! A track is one stem of a project: its mixer settings plus the playback
//! element that renders it. The role of a track is inferred from its display
//! name and decides how the automatic mix routes it and which track the
//! marker jump masks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::element::{AudioSource, PlaybackElement};

/// Stable handle of a track within the loaded project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a track is used for on stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackRole {
    /// Metronome stem, source of beat detection
    Click,
    /// Spoken cues for the band, masked during a marker jump
    Guide,
    #[default]
    Other,
}

impl TrackRole {
    /// Infer the role from a display name (case-insensitive substring test)
    ///
    /// "click" wins over "guia", so "Click Guia" is a click track. The jump
    /// still finds it as a guide through [`TrackRole::names_guide`].
    ///
    /// # Example
    /// ```
    /// use stagemix::engine::TrackRole;
    /// assert_eq!(TrackRole::classify("CLICK 120"), TrackRole::Click);
    /// assert_eq!(TrackRole::classify("Guía"), TrackRole::Guide);
    /// assert_eq!(TrackRole::classify("Bass"), TrackRole::Other);
    /// ```
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("click") {
            TrackRole::Click
        } else if Self::names_guide(name) {
            TrackRole::Guide
        } else {
            TrackRole::Other
        }
    }

    /// True when the name mentions a guide, whatever role it was given
    pub fn names_guide(name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.contains("guia") || lower.contains("guía")
    }

    pub fn is_click_or_guide(self) -> bool {
        matches!(self, TrackRole::Click | TrackRole::Guide)
    }
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRole::Click => write!(f, "Click"),
            TrackRole::Guide => write!(f, "Guide"),
            TrackRole::Other => write!(f, "Other"),
        }
    }
}

/// Mixer settings of a track, without its element
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub name: String,
    pub role: TrackRole,
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
    pub soloed: bool,
    pub position: f64,
    pub duration: f64,
    /// Post-gain peak level of the last frame
    pub level: f32,
}

/// One loaded stem
pub struct Track {
    pub(crate) id: TrackId,
    pub(crate) name: String,
    pub(crate) role: TrackRole,
    pub(crate) source: AudioSource,
    /// 0-100
    pub(crate) volume: f32,
    /// -100 (left) to 100 (right)
    pub(crate) pan: f32,
    pub(crate) muted: bool,
    pub(crate) soloed: bool,
    /// Forced silent by the marker jump
    pub(crate) masked: bool,
    pub(crate) element: Box<dyn PlaybackElement>,
}

impl Track {
    pub fn new(
        id: TrackId,
        name: impl Into<String>,
        source: AudioSource,
        element: Box<dyn PlaybackElement>,
    ) -> Self {
        let name = name.into();
        Self {
            id,
            role: TrackRole::classify(&name),
            name,
            source,
            volume: crate::config::DEFAULT_TRACK_VOLUME,
            pan: 0.0,
            muted: false,
            soloed: false,
            masked: false,
            element,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> TrackRole {
        self.role
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn pan(&self) -> f32 {
        self.pan
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_soloed(&self) -> bool {
        self.soloed
    }

    pub fn is_masked(&self) -> bool {
        self.masked
    }

    pub fn element(&self) -> &dyn PlaybackElement {
        self.element.as_ref()
    }

    pub fn element_mut(&mut self) -> &mut dyn PlaybackElement {
        self.element.as_mut()
    }

    pub fn info(&self) -> TrackInfo {
        TrackInfo {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            volume: self.volume,
            pan: self.pan,
            muted: self.muted,
            soloed: self.soloed,
            position: self.element.position(),
            duration: self.element.duration(),
            level: self.element.meter(),
        }
    }
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("volume", &self.volume)
            .field("pan", &self.pan)
            .field("muted", &self.muted)
            .field("soloed", &self.soloed)
            .field("masked", &self.masked)
            .finish_non_exhaustive()
    }
}

/// Display name for an ingested file: `.mp3` / `.wav` stripped, any case
pub fn display_name(file_name: &str) -> String {
    for ext in [".mp3", ".wav"] {
        let cut = file_name.len().saturating_sub(ext.len());
        if let Some(tail) = file_name.get(cut..) {
            if tail.eq_ignore_ascii_case(ext) {
                return file_name[..cut].to_string();
            }
        }
    }
    file_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Click", TrackRole::Click ; "plain click")]
    #[test_case("01 - CLICK track", TrackRole::Click ; "upper case click")]
    #[test_case("Guia", TrackRole::Guide ; "guia")]
    #[test_case("GUÍA voz", TrackRole::Guide ; "accented upper case")]
    #[test_case("guía", TrackRole::Guide ; "accented")]
    #[test_case("Bajo", TrackRole::Other ; "other")]
    #[test_case("Click Guia", TrackRole::Click ; "click wins")]
    fn test_classify(name: &str, role: TrackRole) {
        assert_eq!(TrackRole::classify(name), role);
    }

    #[test]
    fn test_click_or_guide() {
        assert!(TrackRole::Click.is_click_or_guide());
        assert!(TrackRole::Guide.is_click_or_guide());
        assert!(!TrackRole::Other.is_click_or_guide());
    }

    #[test_case("Bass.mp3", "Bass" ; "mp3")]
    #[test_case("Click.WAV", "Click" ; "upper case wav")]
    #[test_case("Keys.flac", "Keys.flac" ; "other extension kept")]
    #[test_case(".wav", "" ; "bare extension")]
    #[test_case("Guía.Mp3", "Guía" ; "mixed case non ascii name")]
    fn test_display_name(file: &str, expected: &str) {
        assert_eq!(display_name(file), expected);
    }
}
