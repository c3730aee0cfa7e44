//! Mixer Engine
//!
//! The façade UI and persistence collaborators talk to. It owns the loaded
//! project's tracks, the transport, the loop controller and the marker jump
//! synchronizer, and drives them from a single frame callback:
//!
//! ```text
//! advance(frame):
//!   elements advance -> jump timers fire / barrier polled
//!     -> transport tick -> loop check -> autosave
//! ```
//!
//! Commands that fail a precondition return the error and also leave a
//! warning [`Notice`] for the operator.

use std::fmt;
use std::time::Duration;

use crate::analysis::{self, BeatGrid, ClickBeat};
use crate::config::MixerConfig;
use crate::engine::{
    AudioBackend, AudioSource, TrackId, TrackInfo, TrackRegistry, TrackRole, TrackSettings,
    Transport, TransportState,
};
use crate::error::{MixerError, Result};
use crate::markers::{MarkerPalette, MarkerSet, SurroundingMarkers, UserMarker};
use crate::notice::{Notice, Notices};
use crate::playback::{
    ActiveLoop, JumpActivation, JumpPhase, LoopController, MarkerJumpSynchronizer, PendingJump,
    PlaybackContext,
};
use crate::state::{Autosave, MixerState, ProjectLibrary, SavedProject, SavedTrack, StateStore};

/// Smallest timeline zoom
pub const MIN_ZOOM: f64 = 0.5;

/// Largest timeline zoom
pub const MAX_ZOOM: f64 = 4.0;

/// Zoom change per zoom-in / zoom-out
pub const ZOOM_STEP: f64 = 0.5;

/// Synchronized stem mixer
pub struct MixerEngine {
    config: MixerConfig,
    tracks: TrackRegistry,
    transport: Transport,
    backend: Box<dyn AudioBackend>,
    notices: Notices,
    jump: MarkerJumpSynchronizer,
    looping: LoopController,
    markers: MarkerSet,
    palette: MarkerPalette,
    beats: BeatGrid,
    library: ProjectLibrary,
    store: Option<Box<dyn StateStore>>,
    autosave: Autosave,
    zoom: f64,
    count_beats: u32,
    /// Virtual time since creation
    clock: Duration,
}

impl fmt::Debug for MixerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixerEngine")
            .field("tracks", &self.tracks.len())
            .field("transport", &self.transport)
            .field("jump", &self.jump.phase())
            .field("loop", &self.looping.active())
            .field("markers", &self.markers.len())
            .field("beats", &self.beats.len())
            .field("projects", &self.library.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl MixerEngine {
    /// Create an engine with nothing loaded
    pub fn new(config: MixerConfig, backend: Box<dyn AudioBackend>) -> Self {
        Self {
            tracks: TrackRegistry::new(config.default_master_volume),
            transport: Transport::new(),
            backend,
            notices: Notices::new(),
            jump: MarkerJumpSynchronizer::new(config.jump.clone()),
            looping: LoopController::new(config.looping.clone()),
            markers: MarkerSet::new(),
            palette: MarkerPalette::new(),
            beats: BeatGrid::default(),
            library: ProjectLibrary::new(),
            store: None,
            autosave: Autosave::new(config.autosave_debounce()),
            zoom: crate::state::DEFAULT_ZOOM,
            count_beats: config.default_count_beats.max(1),
            clock: Duration::ZERO,
            config,
        }
    }

    /// Persist state through `store` whenever autosave fires
    pub fn with_store(mut self, store: Box<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Push precondition failures to the operator before handing them back
    fn reported<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.notices.report(e);
        }
        result
    }

    // ========================================================================
    // Frame driver
    // ========================================================================

    /// Advance the virtual clock by one frame
    pub fn advance(&mut self, frame: Duration) {
        self.clock += frame;
        self.tracks.on_frame(frame);

        let mut ctx = PlaybackContext {
            tracks: &mut self.tracks,
            transport: &mut self.transport,
            backend: self.backend.as_mut(),
            notices: &mut self.notices,
        };
        self.jump.on_frame(&mut ctx, frame);

        self.transport.tick(&self.tracks);
        self.looping.check(
            &mut self.tracks,
            &mut self.transport,
            self.clock,
            self.jump.is_in_flight(),
        );

        if self.autosave.on_frame(frame) {
            self.write_state();
        }
    }

    /// Stop everything and flush unsaved state; later continuations are no-ops
    pub fn shutdown(&mut self) {
        self.jump.shutdown();
        self.transport.stop(&mut self.tracks);
        if self.autosave.is_pending() {
            self.autosave.cancel();
            self.write_state();
        }
        self.backend.close();
        log::info!("[MIXER] Shut down");
    }

    // ========================================================================
    // Projects
    // ========================================================================

    /// Add a project or re-attach sources to an existing one; returns its index
    pub fn add_project(&mut self, name: &str, sources: Vec<(String, AudioSource)>) -> usize {
        let index = self.library.add_project(name, sources);
        self.autosave.mark_dirty();
        index
    }

    /// Load a project: every track is opened through the backend and gets
    /// its saved volume, pan and mute. Returns the number of tracks loaded.
    ///
    /// # Errors
    /// * `UnknownProject` - If `index` is out of range
    pub fn load_project(&mut self, index: usize) -> Result<usize> {
        let result = self.load_project_at(index);
        self.reported(result)
    }

    fn load_project_at(&mut self, index: usize) -> Result<usize> {
        let project = self
            .library
            .get(index)
            .cloned()
            .ok_or(MixerError::UnknownProject { index })?;

        self.unload();
        self.library.set_current(index)?;

        let saved = project.saved.normalized();
        self.beats = BeatGrid::new(saved.click_beats.clone());
        self.markers = MarkerSet::from_vec(saved.user_markers.clone());
        self.zoom = saved.zoom_level.clamp(MIN_ZOOM, MAX_ZOOM);
        self.count_beats = saved.count_beats.max(1);

        for (name, source) in &project.sources {
            let element = match self.backend.open(source) {
                Ok(element) => element,
                Err(e) => {
                    log::warn!("[MIXER] Skipping '{}': {}", name, e);
                    self.notices.report(&e);
                    continue;
                }
            };
            let settings = match saved.track(name) {
                Some(t) => TrackSettings {
                    volume: t.volume,
                    pan: t.pan,
                    muted: t.muted,
                },
                None => TrackSettings {
                    volume: self.config.default_track_volume,
                    ..TrackSettings::default()
                },
            };
            self.tracks.add(name.clone(), source.clone(), element, settings);
        }
        self.transport.tick(&self.tracks);

        if !project.sources.is_empty() {
            self.save_current_project_state();
        }
        self.autosave.mark_dirty();

        log::info!(
            "[MIXER] Loaded '{}': {} tracks, {} beats, {} markers",
            project.name,
            self.tracks.len(),
            self.beats.len(),
            self.markers.len()
        );
        Ok(self.tracks.len())
    }

    /// Delete a project; deleting the loaded one loads a neighbour
    ///
    /// # Errors
    /// * `UnknownProject` - If `index` is out of range
    pub fn delete_project(&mut self, index: usize) -> Result<()> {
        let was_current = self.library.current_index() == Some(index);
        let result = self.library.delete_project(index);
        let next = self.reported(result)?;

        if was_current {
            self.unload();
        }
        if let Some(next) = next {
            self.load_project(next)?;
        }
        self.autosave.mark_dirty();
        Ok(())
    }

    /// Stop audio, cancel the jump and drop the loaded project's state
    fn unload(&mut self) {
        let mut ctx = PlaybackContext {
            tracks: &mut self.tracks,
            transport: &mut self.transport,
            backend: self.backend.as_mut(),
            notices: &mut self.notices,
        };
        self.jump.cancel(&mut ctx, true);
        self.transport.stop(&mut self.tracks);
        self.looping.clear();

        if !self.tracks.is_empty() {
            self.tracks.clear();
            self.backend.close();
        }
        self.transport.reset();
        self.beats = BeatGrid::default();
        self.markers.clear();
    }

    /// Settings of the loaded project as they are right now
    fn current_saved(&self) -> Option<SavedProject> {
        let project = self.library.current()?;
        let mut saved = project.saved.clone();
        saved.beat_markers = self.beats.beat_markers();
        saved.click_beats = self.beats.beats().to_vec();
        saved.user_markers = self.markers.as_slice().to_vec();
        saved.zoom_level = self.zoom;
        saved.count_beats = self.count_beats;
        if !self.tracks.is_empty() {
            saved.tracks = self
                .tracks
                .iter()
                .map(|t| SavedTrack {
                    name: t.name().to_string(),
                    volume: t.volume(),
                    pan: t.pan(),
                    url: t.source().url.clone(),
                    muted: t.is_muted(),
                })
                .collect();
        }
        Some(saved)
    }

    /// Write tracks, beats, markers, zoom and count beats back into the
    /// loaded project
    pub fn save_current_project_state(&mut self) {
        if let Some(saved) = self.current_saved() {
            if let Some(project) = self.library.current_mut() {
                project.saved = saved;
            }
        }
    }

    pub fn library(&self) -> &ProjectLibrary {
        &self.library
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Everything that is persisted, with the loaded project's live settings
    pub fn snapshot(&self) -> MixerState {
        let mut projects = self.library.saved_projects();
        if let (Some(index), Some(saved)) = (self.library.current_index(), self.current_saved()) {
            if let Some(slot) = projects.get_mut(index) {
                *slot = saved;
            }
        }
        MixerState {
            projects,
            custom_marker_types: self.palette.custom_types().clone(),
            master_volume: self.tracks.master_volume(),
        }
    }

    /// Replace the project library and global settings
    ///
    /// The loaded project is unloaded; restored projects have no sources
    /// until they are ingested again.
    pub fn restore(&mut self, state: MixerState) {
        self.apply_state(state);
        self.autosave.mark_dirty();
    }

    fn apply_state(&mut self, state: MixerState) {
        self.unload();
        self.library = ProjectLibrary::from_state(&state);
        self.palette = MarkerPalette::with_custom(state.custom_marker_types);
        if let Err(e) = self.tracks.set_master_volume(state.master_volume) {
            log::warn!("[STATE] Ignoring stored master volume: {}", e);
        }
        log::info!("[STATE] Restored {} projects", self.library.len());
    }

    /// Restore from the configured store; returns whether anything was stored
    pub fn restore_from_store(&mut self) -> Result<bool> {
        let loaded = match self.store.as_ref() {
            Some(store) => store.load(),
            None => return Ok(false),
        };
        match self.reported(loaded)? {
            Some(state) => {
                self.apply_state(state);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Pretty JSON export of [`MixerEngine::snapshot`]
    pub fn export_json(&self) -> Result<String> {
        self.snapshot().to_json_pretty()
    }

    /// Import a JSON export; missing arrays read back empty
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let state = MixerState::from_json(json);
        let state = self.reported(state)?;
        self.restore(state);
        Ok(())
    }

    /// Write the snapshot through the store now
    pub fn persist(&mut self) -> Result<()> {
        self.save_current_project_state();
        let state = self.snapshot();
        match self.store.as_mut() {
            Some(store) => store.save(&state),
            None => Ok(()),
        }
    }

    fn write_state(&mut self) {
        if let Err(e) = self.persist() {
            log::warn!("[STATE] Autosave failed: {}", e);
            self.notices.report(&e);
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    pub fn play(&mut self) {
        self.transport.play(&mut self.tracks, self.backend.as_mut());
    }

    pub fn pause(&mut self) {
        self.transport.pause(&mut self.tracks);
    }

    pub fn resume(&mut self) {
        self.transport.resume(&mut self.tracks, self.backend.as_mut());
    }

    pub fn toggle_pause(&mut self) {
        self.transport.toggle_pause(&mut self.tracks, self.backend.as_mut());
    }

    /// Stop and rewind; a pending jump is dropped without a notice
    pub fn stop(&mut self) {
        let mut ctx = PlaybackContext {
            tracks: &mut self.tracks,
            transport: &mut self.transport,
            backend: self.backend.as_mut(),
            notices: &mut self.notices,
        };
        self.jump.cancel(&mut ctx, true);
        self.transport.stop(&mut self.tracks);
    }

    /// Seek to a percentage (0-100) of the reference track
    pub fn seek(&mut self, percentage: f64) {
        self.transport.seek_percentage(&mut self.tracks, percentage);
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn current_time(&self) -> f64 {
        self.transport.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn progress(&self) -> f64 {
        self.transport.progress()
    }

    /// Virtual time since the engine was created
    pub fn now(&self) -> Duration {
        self.clock
    }

    // ========================================================================
    // Mixer
    // ========================================================================

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    pub fn track_infos(&self) -> Vec<TrackInfo> {
        self.tracks.infos()
    }

    pub fn find_track(&self, name: &str) -> Option<TrackId> {
        self.tracks.find_by_name(name)
    }

    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> Result<()> {
        let result = self.tracks.set_volume(id, volume);
        self.mixer_changed(result)
    }

    pub fn set_pan(&mut self, id: TrackId, pan: f32) -> Result<()> {
        let result = self.tracks.set_pan(id, pan);
        self.mixer_changed(result)
    }

    pub fn set_mute(&mut self, id: TrackId, muted: bool) -> Result<()> {
        let result = self.tracks.set_mute(id, muted);
        self.mixer_changed(result)
    }

    pub fn toggle_mute(&mut self, id: TrackId) -> Result<bool> {
        let result = self.tracks.toggle_mute(id);
        self.mixer_changed(result)
    }

    pub fn toggle_solo(&mut self, id: TrackId) -> Result<bool> {
        let result = self.tracks.toggle_solo(id);
        self.mixer_changed(result)
    }

    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        let result = self.tracks.set_master_volume(volume);
        self.mixer_changed(result)
    }

    pub fn master_volume(&self) -> f32 {
        self.tracks.master_volume()
    }

    fn mixer_changed<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.autosave.mark_dirty();
        }
        self.reported(result)
    }

    /// Pan click and guide hard left, the band hard right, then detect beats
    /// on the click track if there is one. Returns the number of beats found.
    ///
    /// # Errors
    /// * `NoTracksLoaded` - If nothing is loaded
    /// * `BeatDetection` - If the click track cannot be decoded
    pub fn automate_mix(&mut self) -> Result<Option<usize>> {
        if self.tracks.is_empty() {
            return self.reported(Err(MixerError::NoTracksLoaded));
        }
        self.tracks.automate_panning();
        self.autosave.mark_dirty();

        if self.tracks.find_role(TrackRole::Click).is_none() {
            log::info!("[MIXER] No click track, beat detection skipped");
            return Ok(None);
        }
        self.detect_beats().map(Some)
    }

    // ========================================================================
    // Beats
    // ========================================================================

    /// Run beat detection on the click track
    ///
    /// On a decode failure the beat list is left empty.
    ///
    /// # Errors
    /// * `NoTracksLoaded`, `NoClickTrack` - Nothing to analyse
    /// * `BeatDetection` - The click track could not be decoded
    pub fn detect_beats(&mut self) -> Result<usize> {
        let result = self.run_detection();
        self.reported(result)
    }

    fn run_detection(&mut self) -> Result<usize> {
        if self.tracks.is_empty() {
            return Err(MixerError::NoTracksLoaded);
        }
        let click = self
            .tracks
            .find_role(TrackRole::Click)
            .ok_or(MixerError::NoClickTrack)?;
        let track = self.tracks.get(click)?;
        let source = track.source().clone();
        let element_duration = track.element().duration();

        let decoded = match self.backend.decode(&source) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.beats = BeatGrid::default();
                self.autosave.mark_dirty();
                return Err(match e {
                    MixerError::BeatDetection { .. } => e,
                    other => MixerError::BeatDetection {
                        reason: other.to_string(),
                    },
                });
            }
        };

        let duration = if element_duration > 0.0 {
            element_duration
        } else {
            decoded.duration_secs()
        };
        let beats = analysis::detect_beats(
            &decoded.samples,
            decoded.sample_rate,
            duration,
            &self.config.detector,
        );
        self.beats = BeatGrid::new(beats);
        self.autosave.mark_dirty();

        let count = self.beats.len();
        match self.beats.estimated_bpm() {
            Some(bpm) => log::info!("[BEATS] {} beats on '{}' (~{:.1} BPM)", count, source.url, bpm),
            None => log::info!("[BEATS] {} beats on '{}'", count, source.url),
        }
        self.notices.success(format!("{} beats detected", count));
        Ok(count)
    }

    pub fn beats(&self) -> &BeatGrid {
        &self.beats
    }

    // ========================================================================
    // Markers
    // ========================================================================

    pub fn markers(&self) -> &MarkerSet {
        &self.markers
    }

    pub fn palette(&self) -> &MarkerPalette {
        &self.palette
    }

    /// Add a marker; a marker landing inside the active loop clears it
    pub fn add_marker(&mut self, marker: UserMarker) {
        self.markers.add(marker);
        self.looping.revalidate(&self.markers);
        self.autosave.mark_dirty();
    }

    /// Remove a marker by insertion index; removing a loop bound clears the loop
    pub fn remove_marker(&mut self, index: usize) -> Result<UserMarker> {
        let result = self.markers.remove(index);
        let removed = self.reported(result)?;
        self.looping.revalidate(&self.markers);
        self.autosave.mark_dirty();
        Ok(removed)
    }

    /// Place a marker of a palette type on a detected beat
    ///
    /// # Errors
    /// * `UnknownMarker` - If no beat has that number or the type is unknown
    pub fn add_marker_from_beat(&mut self, beat_number: u32, type_name: &str) -> Result<UserMarker> {
        let result = self.marker_on_beat(beat_number, type_name);
        let marker = self.reported(result)?;
        self.add_marker(marker.clone());
        Ok(marker)
    }

    fn marker_on_beat(&self, beat_number: u32, type_name: &str) -> Result<UserMarker> {
        let beat: &ClickBeat = self
            .beats
            .beats()
            .iter()
            .find(|b| b.number == beat_number)
            .ok_or_else(|| MixerError::UnknownMarker {
                reason: format!("no beat number {}", beat_number),
            })?;
        self.palette.marker_for_beat(beat, type_name)
    }

    pub fn add_custom_marker_type(&mut self, name: &str, color: &str) -> Result<()> {
        let result = self.palette.add_custom_type(name, color);
        self.reported(result)?;
        self.autosave.mark_dirty();
        Ok(())
    }

    /// Markers just before and after the playhead
    pub fn surrounding_markers(&self) -> Option<SurroundingMarkers> {
        self.markers.surrounding(self.transport.current_time())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    /// Loop between two markers, given by insertion index
    pub fn set_loop(&mut self, start: usize, end: usize) -> Result<ActiveLoop> {
        let result = self.loop_between(start, end);
        self.reported(result)
    }

    fn loop_between(&mut self, start: usize, end: usize) -> Result<ActiveLoop> {
        let marker = |index: usize| MixerError::UnknownMarker {
            reason: format!("no marker at index {}", index),
        };
        let start = self.markers.get(start).cloned().ok_or_else(|| marker(start))?;
        let end = self.markers.get(end).cloned().ok_or_else(|| marker(end))?;
        self.looping.set_loop(&self.markers, &start, &end)
    }

    /// Loop the section the playhead is in
    pub fn loop_current_section(&mut self) -> Result<ActiveLoop> {
        let result = self
            .looping
            .loop_current_section(&self.markers, self.transport.current_time());
        self.reported(result)
    }

    pub fn clear_loop(&mut self) {
        self.looping.clear();
    }

    pub fn active_loop(&self) -> Option<&ActiveLoop> {
        self.looping.active()
    }

    pub fn loop_crossings(&self) -> u32 {
        self.looping.crossings()
    }

    // ========================================================================
    // Marker jumps
    // ========================================================================

    /// Jump to a marker (insertion index) on the next strong beat, or move
    /// straight there when not playing
    ///
    /// # Errors
    /// * `UnknownMarker` - No marker at `index`
    /// * `NoTracksLoaded`, `NoBeatsDetected`, `NoGuideTrack`,
    ///   `NoStrongBeatAhead`, `InsufficientLeadIn` - See
    ///   [`MarkerJumpSynchronizer::activate`]
    pub fn activate_marker(&mut self, index: usize) -> Result<JumpActivation> {
        let result = match self.markers.get(index).cloned() {
            Some(marker) => {
                let mut ctx = PlaybackContext {
                    tracks: &mut self.tracks,
                    transport: &mut self.transport,
                    backend: self.backend.as_mut(),
                    notices: &mut self.notices,
                };
                self.jump
                    .activate(&mut ctx, &marker, &self.beats, self.count_beats)
            }
            None => Err(MixerError::UnknownMarker {
                reason: format!("no marker at index {}", index),
            }),
        };
        self.reported(result)
    }

    /// Cancel the pending jump; returns whether one was pending
    pub fn cancel_jump(&mut self) -> bool {
        let mut ctx = PlaybackContext {
            tracks: &mut self.tracks,
            transport: &mut self.transport,
            backend: self.backend.as_mut(),
            notices: &mut self.notices,
        };
        self.jump.cancel(&mut ctx, false)
    }

    pub fn jump_phase(&self) -> JumpPhase {
        self.jump.phase()
    }

    pub fn pending_jump(&self) -> Option<&PendingJump> {
        self.jump.pending()
    }

    pub fn completed_jumps(&self) -> u32 {
        self.jump.completed_jumps()
    }

    /// Countdown number to show, while a jump countdown runs
    pub fn countdown_value(&self) -> Option<u32> {
        self.jump.countdown_value()
    }

    // ========================================================================
    // View settings
    // ========================================================================

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f64 {
        if self.zoom < MAX_ZOOM {
            self.zoom = (self.zoom + ZOOM_STEP).min(MAX_ZOOM);
            self.autosave.mark_dirty();
        }
        self.zoom
    }

    pub fn zoom_out(&mut self) -> f64 {
        if self.zoom > MIN_ZOOM {
            self.zoom = (self.zoom - ZOOM_STEP).max(MIN_ZOOM);
            self.autosave.mark_dirty();
        }
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<f64> {
        if !zoom.is_finite() {
            return self.reported(Err(MixerError::InvalidSetting {
                name: "zoom",
                reason: format!("{} is not a number", zoom),
            }));
        }
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.autosave.mark_dirty();
        Ok(self.zoom)
    }

    pub fn count_beats(&self) -> u32 {
        self.count_beats
    }

    /// Countdown length for later jumps (at least one beat)
    pub fn set_count_beats(&mut self, count: u32) -> Result<()> {
        if count == 0 {
            return self.reported(Err(MixerError::InvalidSetting {
                name: "count beats",
                reason: "at least one beat is needed".to_string(),
            }));
        }
        self.count_beats = count;
        self.autosave.mark_dirty();
        Ok(())
    }

    // ========================================================================
    // Notices
    // ========================================================================

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub fn config(&self) -> &MixerConfig {
        &self.config
    }
}
