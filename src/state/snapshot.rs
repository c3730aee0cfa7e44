//! Persisted State Schema
//!
//! The JSON shape written by autosave and export, and read by restore and
//! import. Field names are camelCase; every array may be missing and reads
//! back empty, and numeric settings fall back to their defaults when
//! missing or zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{BeatMarker, ClickBeat};
use crate::config::{DEFAULT_COUNT_BEATS, DEFAULT_MASTER_VOLUME};
use crate::error::Result;
use crate::markers::UserMarker;

/// Tempo recorded for projects that never had one
pub const DEFAULT_BPM: f64 = 120.0;

/// Timeline zoom of a fresh project
pub const DEFAULT_ZOOM: f64 = 1.0;

fn default_bpm() -> f64 {
    DEFAULT_BPM
}

fn default_zoom() -> f64 {
    DEFAULT_ZOOM
}

fn default_count_beats() -> u32 {
    DEFAULT_COUNT_BEATS
}

fn default_master_volume() -> f32 {
    DEFAULT_MASTER_VOLUME
}

/// Mixer settings of one track, matched by name on load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTrack {
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub muted: bool,
}

/// Everything remembered about a project except its audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedProject {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<SavedTrack>,
    #[serde(default)]
    pub beat_markers: Vec<BeatMarker>,
    #[serde(default)]
    pub beat_labels: Vec<String>,
    #[serde(default)]
    pub click_beats: Vec<ClickBeat>,
    #[serde(default)]
    pub user_markers: Vec<UserMarker>,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default = "default_zoom")]
    pub zoom_level: f64,
    #[serde(default = "default_count_beats")]
    pub count_beats: u32,
}

impl SavedProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
            beat_markers: Vec::new(),
            beat_labels: Vec::new(),
            click_beats: Vec::new(),
            user_markers: Vec::new(),
            bpm: DEFAULT_BPM,
            zoom_level: DEFAULT_ZOOM,
            count_beats: DEFAULT_COUNT_BEATS,
        }
    }

    /// Replace zero or non-finite settings with their defaults
    pub fn normalized(mut self) -> Self {
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            self.bpm = DEFAULT_BPM;
        }
        if !(self.zoom_level.is_finite() && self.zoom_level > 0.0) {
            self.zoom_level = DEFAULT_ZOOM;
        }
        if self.count_beats == 0 {
            self.count_beats = DEFAULT_COUNT_BEATS;
        }
        self
    }

    /// Saved settings of the track with this display name
    pub fn track(&self, name: &str) -> Option<&SavedTrack> {
        self.tracks.iter().find(|t| t.name == name)
    }
}

/// Top-level persisted state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MixerState {
    #[serde(default)]
    pub projects: Vec<SavedProject>,
    /// Sorted by name, so output is deterministic
    #[serde(default)]
    pub custom_marker_types: BTreeMap<String, String>,
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
}

impl Default for MixerState {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            custom_marker_types: BTreeMap::new(),
            master_volume: DEFAULT_MASTER_VOLUME,
        }
    }
}

impl MixerState {
    /// Parse a state document, normalising every project
    pub fn from_json(json: &str) -> Result<Self> {
        let mut state: MixerState = serde_json::from_str(json)?;
        state.projects = state
            .projects
            .into_iter()
            .map(SavedProject::normalized)
            .collect();
        if !state.master_volume.is_finite() {
            state.master_volume = DEFAULT_MASTER_VOLUME;
        }
        state.master_volume = state.master_volume.clamp(0.0, 100.0);
        Ok(state)
    }

    /// Pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_arrays_read_back_empty() {
        let state = MixerState::from_json(r#"{ "projects": [ { "name": "Domingo" } ] }"#).unwrap();
        let project = &state.projects[0];
        assert_eq!(project.name, "Domingo");
        assert!(project.tracks.is_empty());
        assert!(project.click_beats.is_empty());
        assert!(project.user_markers.is_empty());
        assert_eq!(project.bpm, 120.0);
        assert_eq!(project.zoom_level, 1.0);
        assert_eq!(project.count_beats, 4);
        assert_eq!(state.master_volume, 75.0);
        assert!(state.custom_marker_types.is_empty());
    }

    #[test]
    fn test_zero_settings_fall_back_to_defaults() {
        let state = MixerState::from_json(
            r#"{ "projects": [ { "name": "A", "bpm": 0, "zoomLevel": 0, "countBeats": 0 } ] }"#,
        )
        .unwrap();
        assert_eq!(state.projects[0].bpm, 120.0);
        assert_eq!(state.projects[0].zoom_level, 1.0);
        assert_eq!(state.projects[0].count_beats, 4);
    }

    #[test]
    fn test_round_trip_keeps_field_names() {
        let mut project = SavedProject::new("Ensayo");
        project.tracks.push(SavedTrack {
            name: "Guia".to_string(),
            volume: 60.0,
            pan: -100.0,
            url: "guia.wav".to_string(),
            muted: true,
        });
        project.user_markers.push(UserMarker {
            time: 4.0,
            name: "Coro 1".to_string(),
            beat_number: 9,
            percentage: 10.0,
            color: "#45B7D1".to_string(),
        });
        let mut state = MixerState::default();
        state.projects.push(project);
        state
            .custom_marker_types
            .insert("Tag".to_string(), "#10b981".to_string());

        let json = state.to_json_pretty().unwrap();
        assert!(json.contains("\"userMarkers\""));
        assert!(json.contains("\"beatNumber\""));
        assert!(json.contains("\"customMarkerTypes\""));
        assert!(json.contains("\"masterVolume\""));

        assert_eq!(MixerState::from_json(&json).unwrap(), state);
    }

    #[test]
    fn test_custom_types_are_sorted() {
        let state = MixerState::from_json(
            r##"{ "customMarkerTypes": { "Zeta": "#000", "Alpha": "#fff" } }"##,
        )
        .unwrap();
        let json = state.to_json_pretty().unwrap();
        let alpha = json.find("Alpha").unwrap();
        let zeta = json.find("Zeta").unwrap();
        assert!(alpha < zeta);
    }

    #[test]
    fn test_saved_track_lookup() {
        let mut project = SavedProject::new("A");
        project.tracks.push(SavedTrack {
            name: "Bass".to_string(),
            volume: 50.0,
            pan: 0.0,
            url: String::new(),
            muted: false,
        });
        assert!(project.track("Bass").is_some());
        assert!(project.track("Keys").is_none());
    }
}
