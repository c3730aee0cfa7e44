//! Track Registry & Mixer Graph
//!
//! Owns the tracks of the loaded project and is the single place where the
//! effective gain of a track is computed:
//!
//! ```text
//! gain = 0                               if masked, muted, or another track is soloed
//! gain = volume/100 × master/100         otherwise
//! ```
//!
//! Every mutation re-applies gain and pan to the affected elements before
//! returning, so the element controls never lag behind the mixer settings.

use std::time::Duration;

use crate::engine::element::{seek_element, AudioSource, PlaybackElement};
use crate::engine::track::{Track, TrackId, TrackInfo, TrackRole};
use crate::error::{MixerError, Result};

/// Initial mixer settings for a track being added
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSettings {
    pub volume: f32,
    pub pan: f32,
    pub muted: bool,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            volume: crate::config::DEFAULT_TRACK_VOLUME,
            pan: 0.0,
            muted: false,
        }
    }
}

/// Ordered set of tracks plus the master bus
#[derive(Debug)]
pub struct TrackRegistry {
    tracks: Vec<Track>,
    next_id: u32,
    master_volume: f32,
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MASTER_VOLUME)
    }
}

fn check_finite(name: &'static str, value: f32) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MixerError::InvalidSetting {
            name,
            reason: format!("{} is not a number", value),
        })
    }
}

impl TrackRegistry {
    pub fn new(master_volume: f32) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 0,
            master_volume: if master_volume.is_finite() {
                master_volume.clamp(0.0, 100.0)
            } else {
                crate::config::DEFAULT_MASTER_VOLUME
            },
        }
    }

    // ========================================================================
    // Membership
    // ========================================================================

    /// Add a track and apply its settings to the element
    pub fn add(
        &mut self,
        name: impl Into<String>,
        source: AudioSource,
        element: Box<dyn PlaybackElement>,
        settings: TrackSettings,
    ) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;

        let mut track = Track::new(id, name, source, element);
        if settings.volume.is_finite() {
            track.volume = settings.volume.clamp(0.0, 100.0);
        }
        if settings.pan.is_finite() {
            track.pan = settings.pan.clamp(-100.0, 100.0);
        }
        track.muted = settings.muted;

        log::debug!(
            "[MIXER] Added {} '{}' ({}) vol={} pan={} muted={}",
            id,
            track.name,
            track.role,
            track.volume,
            track.pan,
            track.muted
        );

        self.tracks.push(track);
        self.apply_all();
        id
    }

    /// Drop every track, returning them in load order
    pub fn clear(&mut self) -> Vec<Track> {
        std::mem::take(&mut self.tracks)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn get(&self, id: TrackId) -> Result<&Track> {
        self.tracks
            .iter()
            .find(|t| t.id == id)
            .ok_or(MixerError::UnknownTrack { id: id.0 })
    }

    fn get_mut(&mut self, id: TrackId) -> Result<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(MixerError::UnknownTrack { id: id.0 })
    }

    /// Track whose clock stands for the whole project (the first loaded)
    pub fn reference(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// First track with the given role
    pub fn find_role(&self, role: TrackRole) -> Option<TrackId> {
        self.tracks.iter().find(|t| t.role == role).map(|t| t.id)
    }

    /// Guide track to mask during a jump; falls back to any track whose
    /// name mentions a guide when none was classified as one
    pub fn find_guide(&self) -> Option<TrackId> {
        self.find_role(TrackRole::Guide).or_else(|| {
            self.tracks
                .iter()
                .find(|t| TrackRole::names_guide(&t.name))
                .map(|t| t.id)
        })
    }

    pub fn find_by_name(&self, name: &str) -> Option<TrackId> {
        self.tracks.iter().find(|t| t.name == name).map(|t| t.id)
    }

    pub fn infos(&self) -> Vec<TrackInfo> {
        self.tracks.iter().map(Track::info).collect()
    }

    // ========================================================================
    // Gain computation
    // ========================================================================

    fn any_soloed(&self) -> bool {
        self.tracks.iter().any(|t| t.soloed)
    }

    fn compute_gain(track: &Track, any_soloed: bool, master: f32) -> f32 {
        if track.masked || track.muted || (any_soloed && !track.soloed) {
            return 0.0;
        }
        (track.volume / 100.0) * (master / 100.0)
    }

    /// Gain the track should currently have, in [0, 1]
    pub fn effective_gain(&self, id: TrackId) -> Result<f32> {
        let track = self.get(id)?;
        Ok(Self::compute_gain(track, self.any_soloed(), self.master_volume))
    }

    /// Push computed gain and pan into every element
    pub fn apply_all(&mut self) {
        let any_soloed = self.any_soloed();
        let master = self.master_volume;
        for track in &mut self.tracks {
            let gain = Self::compute_gain(track, any_soloed, master);
            track.element.set_gain(gain);
            track.element.set_pan(track.pan / 100.0);
        }
    }

    // ========================================================================
    // Mixer commands
    // ========================================================================

    /// Set a track's volume (clamped to 0-100)
    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> Result<()> {
        check_finite("volume", volume)?;
        self.get_mut(id)?.volume = volume.clamp(0.0, 100.0);
        self.apply_all();
        Ok(())
    }

    /// Set a track's pan (clamped to -100..100); mute and solo do not apply
    pub fn set_pan(&mut self, id: TrackId, pan: f32) -> Result<()> {
        check_finite("pan", pan)?;
        let track = self.get_mut(id)?;
        track.pan = pan.clamp(-100.0, 100.0);
        let applied = track.pan / 100.0;
        track.element.set_pan(applied);
        Ok(())
    }

    pub fn set_mute(&mut self, id: TrackId, muted: bool) -> Result<()> {
        self.get_mut(id)?.muted = muted;
        self.apply_all();
        Ok(())
    }

    /// Flip the mute flag; returns the new state
    pub fn toggle_mute(&mut self, id: TrackId) -> Result<bool> {
        let track = self.get_mut(id)?;
        track.muted = !track.muted;
        let muted = track.muted;
        self.apply_all();
        Ok(muted)
    }

    /// Exclusive solo. Soloing a track un-solos every other one; toggling the
    /// soloed track releases solo for everyone. Returns the new state.
    pub fn toggle_solo(&mut self, id: TrackId) -> Result<bool> {
        let soloed = !self.get(id)?.soloed;
        for track in &mut self.tracks {
            track.soloed = soloed && track.id == id;
        }
        self.apply_all();
        log::debug!(
            "[MIXER] Solo {} {}",
            id,
            if soloed { "on" } else { "off" }
        );
        Ok(soloed)
    }

    /// Set the master volume (clamped to 0-100) and recompute every track
    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        check_finite("master volume", volume)?;
        self.master_volume = volume.clamp(0.0, 100.0);
        self.apply_all();
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Force a track silent without touching its mute flag. Returns the gain
    /// that was applied before masking.
    pub fn mask(&mut self, id: TrackId) -> Result<f32> {
        let track = self.get_mut(id)?;
        let previous = track.element.gain();
        track.masked = true;
        track.element.set_gain(0.0);
        Ok(previous)
    }

    /// Lift a mask; the gain is recomputed from the current settings
    pub fn unmask(&mut self, id: TrackId) -> Result<()> {
        let track = self.get_mut(id)?;
        if !track.masked {
            return Ok(());
        }
        track.masked = false;
        self.apply_all();
        Ok(())
    }

    /// Route click and guide hard left and everything else hard right
    pub fn automate_panning(&mut self) {
        for track in &mut self.tracks {
            track.pan = if track.role.is_click_or_guide() {
                -100.0
            } else {
                100.0
            };
        }
        self.apply_all();
        log::info!("[MIXER] Automatic panning applied to {} tracks", self.tracks.len());
    }

    // ========================================================================
    // Element fan-out
    // ========================================================================

    /// Seek every track in the same call, preferring fast seek
    pub fn seek_all(&mut self, secs: f64) {
        for track in &mut self.tracks {
            seek_element(track.element.as_mut(), secs);
        }
    }

    /// Assign every track's position directly
    pub fn seek_direct(&mut self, secs: f64) {
        for track in &mut self.tracks {
            track.element.set_position(secs);
        }
    }

    pub fn play_all(&mut self) {
        for track in &mut self.tracks {
            track.element.play();
        }
    }

    pub fn pause_all(&mut self) {
        for track in &mut self.tracks {
            track.element.pause();
        }
    }

    /// Play only the tracks that are currently paused
    pub fn resume_paused(&mut self) -> usize {
        let mut resumed = 0;
        for track in &mut self.tracks {
            if track.element.is_paused() {
                track.element.play();
                resumed += 1;
            }
        }
        resumed
    }

    /// True when no track has a seek in flight
    pub fn all_seeks_complete(&self) -> bool {
        self.tracks.iter().all(|t| !t.element.is_seeking())
    }

    pub fn on_frame(&mut self, elapsed: Duration) {
        for track in &mut self.tracks {
            track.element.on_frame(elapsed);
        }
    }
}
