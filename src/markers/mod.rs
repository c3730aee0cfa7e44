//! Song Section Markers
//!
//! User markers annotate the timeline with named, colored song sections.
//! They are kept in insertion order (the order they are persisted in); every
//! neighbor query works on a time-sorted view.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::ClickBeat;
use crate::error::{MixerError, Result};

/// Built-in section types and their colors
pub const DEFAULT_MARKER_TYPES: &[(&str, &str)] = &[
    ("Intro 1", "#FF6B6B"),
    ("Intro 2", "#FF8787"),
    ("Intro 3", "#FFA5A5"),
    ("Intro 4", "#FFC2C2"),
    ("Intro 5", "#FFE0E0"),
    ("Verso 1", "#9B59B6"),
    ("Verso 2", "#A569BD"),
    ("Verso 3", "#AF7AC5"),
    ("Verso 4", "#BB8FCE"),
    ("Verso 5", "#C39BD3"),
    ("Precoro 1", "#4ECDC4"),
    ("Precoro 2", "#5DD6CE"),
    ("Precoro 3", "#6CDFD8"),
    ("Precoro 4", "#7BE8E2"),
    ("Precoro 5", "#8AF1EC"),
    ("Coro 1", "#45B7D1"),
    ("Coro 2", "#5AC1D6"),
    ("Coro 3", "#6FCBDB"),
    ("Coro 4", "#84D5E0"),
    ("Coro 5", "#99DFE5"),
    ("Puente 1", "#E67E22"),
    ("Puente 2", "#EB984E"),
    ("Puente 3", "#F0B27A"),
    ("Puente 4", "#F5CBA7"),
    ("Puente 5", "#FAE5D3"),
    ("Instrumental", "#95E1D3"),
    ("Interludio", "#F38181"),
    ("Corte", "#AA4465"),
    ("Solo", "#FDCB6E"),
    ("Batería", "#6C5CE7"),
    ("Baja Intensidad", "#74B9FF"),
    ("Final", "#FF7675"),
    ("Toda la Banda", "#2ECC71"),
    ("Solo Voces", "#E91E63"),
    ("Solo Piano", "#3498DB"),
    ("Solo Guitarra", "#F39C12"),
];

/// A named section marker on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMarker {
    /// Time in seconds
    pub time: f64,
    /// Section label
    pub name: String,
    /// Number of the beat the marker was placed on
    pub beat_number: u32,
    /// Position as a percentage of the track duration
    pub percentage: f64,
    /// CSS-style color
    pub color: String,
}

impl UserMarker {
    /// Place a marker on a detected beat
    pub fn on_beat(beat: &ClickBeat, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            time: beat.time,
            name: name.into(),
            beat_number: beat.number,
            percentage: beat.percentage,
            color: color.into(),
        }
    }
}

/// The markers immediately before and after a time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurroundingMarkers {
    /// Last marker at or before the time
    pub prev: Option<UserMarker>,
    /// First marker strictly after the time
    pub next: Option<UserMarker>,
}

impl SurroundingMarkers {
    /// Both neighbors, when the time lies between two markers
    pub fn section(&self) -> Option<(&UserMarker, &UserMarker)> {
        Some((self.prev.as_ref()?, self.next.as_ref()?))
    }
}

/// Markers of one project, insertion-ordered
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerSet {
    markers: Vec<UserMarker>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(markers: Vec<UserMarker>) -> Self {
        Self { markers }
    }

    pub fn add(&mut self, marker: UserMarker) {
        log::debug!("[MARKERS] Added '{}' at {:.3}s", marker.name, marker.time);
        self.markers.push(marker);
    }

    /// Remove by insertion index
    pub fn remove(&mut self, index: usize) -> Result<UserMarker> {
        if index >= self.markers.len() {
            return Err(MixerError::UnknownMarker {
                reason: format!("no marker at index {}", index),
            });
        }
        Ok(self.markers.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&UserMarker> {
        self.markers.get(index)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Markers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &UserMarker> {
        self.markers.iter()
    }

    pub fn as_slice(&self) -> &[UserMarker] {
        &self.markers
    }

    /// Markers sorted by time (stable for equal times)
    pub fn sorted(&self) -> Vec<&UserMarker> {
        let mut sorted: Vec<&UserMarker> = self.markers.iter().collect();
        sorted.sort_by(|a, b| a.time.total_cmp(&b.time));
        sorted
    }

    /// Marker placed exactly at `time`
    pub fn find_at(&self, time: f64) -> Option<&UserMarker> {
        self.markers.iter().find(|m| m.time == time)
    }

    /// Neighbors of `time`; `None` with fewer than two markers
    pub fn surrounding(&self, time: f64) -> Option<SurroundingMarkers> {
        if self.markers.len() < 2 {
            return None;
        }
        let sorted = self.sorted();
        let prev = sorted.iter().rev().find(|m| m.time <= time).map(|m| (*m).clone());
        let next = sorted.iter().find(|m| m.time > time).map(|m| (*m).clone());
        Some(SurroundingMarkers { prev, next })
    }

    /// True when both times are markers, `start < end`, and no marker lies
    /// strictly between them
    pub fn are_adjacent(&self, start: f64, end: f64) -> bool {
        if start >= end || self.find_at(start).is_none() || self.find_at(end).is_none() {
            return false;
        }
        !self.markers.iter().any(|m| m.time > start && m.time < end)
    }
}

/// Section types offered when placing a marker
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkerPalette {
    custom: BTreeMap<String, String>,
}

impl MarkerPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom(custom: BTreeMap<String, String>) -> Self {
        Self { custom }
    }

    /// Register or recolor a custom section type
    pub fn add_custom_type(&mut self, name: impl Into<String>, color: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(MixerError::InvalidSetting {
                name: "marker type",
                reason: "name is empty".to_string(),
            });
        }
        self.custom.insert(name, color.into());
        Ok(())
    }

    pub fn custom_types(&self) -> &BTreeMap<String, String> {
        &self.custom
    }

    /// Color of a section type; custom types shadow built-in ones
    pub fn color_of(&self, name: &str) -> Option<&str> {
        self.custom.get(name).map(String::as_str).or_else(|| {
            DEFAULT_MARKER_TYPES
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, c)| *c)
        })
    }

    /// Every type: built-ins in their canonical order, then custom types by name
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = DEFAULT_MARKER_TYPES
            .iter()
            .map(|(n, c)| {
                let color = self.custom.get(*n).map(String::as_str).unwrap_or(*c);
                (n.to_string(), color.to_string())
            })
            .collect();
        entries.extend(
            self.custom
                .iter()
                .filter(|(n, _)| !DEFAULT_MARKER_TYPES.iter().any(|(d, _)| *d == n.as_str()))
                .map(|(n, c)| (n.clone(), c.clone())),
        );
        entries
    }

    /// Build a marker for `beat` using the palette color of `name`
    pub fn marker_for_beat(&self, beat: &ClickBeat, name: &str) -> Result<UserMarker> {
        let color = self.color_of(name).ok_or_else(|| MixerError::UnknownMarker {
            reason: format!("unknown marker type '{}'", name),
        })?;
        Ok(UserMarker::on_beat(beat, name, color))
    }
}
