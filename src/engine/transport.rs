//! Transport State Machine for Stagemix
//!
//! Plays, pauses, stops and seeks every track of the loaded project as one
//! unit. The transport keeps no clock of its own: [`Transport::tick`] reads
//! the reference track (the first loaded) and publishes current time,
//! duration and progress from it.
//!
//! With zero tracks loaded every operation is a no-op.

use std::fmt;

use crate::engine::element::AudioBackend;
use crate::engine::registry::TrackRegistry;

/// Transport states representing the current playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    /// Nothing playing, position at the start (default state)
    #[default]
    Stopped,
    /// Audio is actively playing
    Playing,
    /// Playback halted mid-song
    Paused,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "Stopped"),
            TransportState::Playing => write!(f, "Playing"),
            TransportState::Paused => write!(f, "Paused"),
        }
    }
}

/// Drives all tracks together and tracks the published playhead
///
/// The Transport handles:
/// - State transitions (play, pause, resume, stop)
/// - Synchronized seeks (fast seek preferred, direct assignment otherwise)
/// - Playhead, duration and progress published on every tick
#[derive(Debug, Clone, Default)]
pub struct Transport {
    /// Current transport state
    state: TransportState,

    /// Reference track position in seconds, as of the last tick or seek
    current_time: f64,

    /// Reference track duration in seconds
    duration: f64,
}

impl Transport {
    /// Create a stopped transport
    ///
    /// # Example
    /// ```
    /// use stagemix::engine::Transport;
    /// let transport = Transport::new();
    /// assert!(transport.is_stopped());
    /// assert_eq!(transport.current_time(), 0.0);
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the published playhead (a new project is being loaded)
    pub fn reset(&mut self) {
        self.state = TransportState::Stopped;
        self.current_time = 0.0;
        self.duration = 0.0;
    }

    // ========================================================================
    // Standard Transport Controls
    // ========================================================================

    /// Start playback of every track from its current position
    ///
    /// Resumes the backend's processing context first.
    ///
    /// # Example
    /// ```
    /// use stagemix::engine::{AudioBackend, AudioSource, SimulatedBackend, TrackRegistry, TrackSettings, Transport};
    ///
    /// let mut backend = SimulatedBackend::new();
    /// backend.add_source("bass.wav", 30.0);
    /// let source = AudioSource::new("bass.wav");
    /// let element = backend.open(&source).unwrap();
    ///
    /// let mut tracks = TrackRegistry::default();
    /// tracks.add("Bass", source, element, TrackSettings::default());
    ///
    /// let mut transport = Transport::new();
    /// transport.play(&mut tracks, &mut backend);
    /// assert!(transport.is_playing());
    /// ```
    pub fn play(&mut self, tracks: &mut TrackRegistry, backend: &mut dyn AudioBackend) {
        if tracks.is_empty() {
            log::debug!("[TRANSPORT] Play ignored, no tracks loaded");
            return;
        }
        backend.resume();
        tracks.play_all();
        self.state = TransportState::Playing;
        log::debug!("[TRANSPORT] Play from {:.3}s", self.current_time);
    }

    /// Pause every track
    ///
    /// State transitions:
    /// - Playing -> Paused
    /// - Paused / Stopped -> unchanged
    pub fn pause(&mut self, tracks: &mut TrackRegistry) {
        if tracks.is_empty() {
            return;
        }
        tracks.pause_all();
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            log::debug!("[TRANSPORT] Paused at {:.3}s", self.current_time);
        }
    }

    /// Continue after a pause
    pub fn resume(&mut self, tracks: &mut TrackRegistry, backend: &mut dyn AudioBackend) {
        self.play(tracks, backend);
    }

    /// Pause when playing, resume otherwise
    pub fn toggle_pause(&mut self, tracks: &mut TrackRegistry, backend: &mut dyn AudioBackend) {
        if self.is_playing() {
            self.pause(tracks);
        } else {
            self.resume(tracks, backend);
        }
    }

    /// Pause every track and put them back at the start
    ///
    /// State transitions: Any -> Stopped (position reset to 0)
    pub fn stop(&mut self, tracks: &mut TrackRegistry) {
        if tracks.is_empty() {
            return;
        }
        tracks.pause_all();
        tracks.seek_direct(0.0);
        self.state = TransportState::Stopped;
        self.current_time = 0.0;
        log::debug!("[TRANSPORT] Stopped, playhead reset to 0");
    }

    /// Seek every track in the same call, preferring fast seek
    ///
    /// # Arguments
    /// * `time` - Target position in seconds (clamped to >= 0)
    pub fn seek_all(&mut self, tracks: &mut TrackRegistry, time: f64) {
        if tracks.is_empty() {
            return;
        }
        let time = time.max(0.0);
        tracks.seek_all(time);
        self.current_time = time;
        log::debug!("[TRANSPORT] Seek to {:.3}s", time);
    }

    /// Assign every track's position directly, bypassing fast seek
    pub fn seek_direct(&mut self, tracks: &mut TrackRegistry, time: f64) {
        if tracks.is_empty() {
            return;
        }
        let time = time.max(0.0);
        tracks.seek_direct(time);
        self.current_time = time;
        log::debug!("[TRANSPORT] Direct seek to {:.3}s", time);
    }

    /// Seek to a percentage (0-100) of the reference track's duration
    pub fn seek_percentage(&mut self, tracks: &mut TrackRegistry, percentage: f64) {
        let duration = match tracks.reference() {
            Some(track) => track.element().duration(),
            None => return,
        };
        if duration <= 0.0 || !percentage.is_finite() {
            return;
        }
        let time = percentage.clamp(0.0, 100.0) / 100.0 * duration;
        self.seek_all(tracks, time);
    }

    /// Publish the reference track's position and duration
    pub fn tick(&mut self, tracks: &TrackRegistry) {
        if let Some(reference) = tracks.reference() {
            self.current_time = reference.element().position();
            self.duration = reference.element().duration();
        }
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    /// Check if transport is currently playing
    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Check if transport is currently paused
    pub fn is_paused(&self) -> bool {
        self.state == TransportState::Paused
    }

    /// Check if transport is stopped
    pub fn is_stopped(&self) -> bool {
        self.state == TransportState::Stopped
    }

    /// Get the current transport state
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Playhead in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Reference duration in seconds (0 before the first tick)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Playhead as a percentage of the duration
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::element::AudioSource;
    use crate::engine::registry::TrackSettings;
    use crate::engine::simulated::SimulatedBackend;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn setup(names: &[&str]) -> (Transport, TrackRegistry, SimulatedBackend) {
        let mut backend = SimulatedBackend::new();
        let mut tracks = TrackRegistry::default();
        for name in names {
            let url = format!("{}.wav", name);
            backend.add_source(url.clone(), 20.0);
            let source = AudioSource::new(url);
            let element = backend.open(&source).unwrap();
            tracks.add(*name, source, element, TrackSettings::default());
        }
        (Transport::new(), tracks, backend)
    }

    // ------------------------------------------------------------------------
    // Basic State Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_default_state_is_stopped() {
        let transport = Transport::new();
        assert!(transport.is_stopped());
        assert!(!transport.is_playing());
        assert_eq!(transport.state(), TransportState::Stopped);
        assert_eq!(transport.progress(), 0.0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TransportState::Stopped.to_string(), "Stopped");
        assert_eq!(TransportState::Playing.to_string(), "Playing");
        assert_eq!(TransportState::Paused.to_string(), "Paused");
    }

    // ------------------------------------------------------------------------
    // State Transition Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_play_starts_every_track_and_resumes_backend() {
        let (mut transport, mut tracks, mut backend) = setup(&["Click", "Bass"]);
        transport.play(&mut tracks, &mut backend);

        assert!(transport.is_playing());
        assert_eq!(backend.resume_count(), 1);
        assert!(backend.probes().iter().all(|p| !p.paused));
    }

    #[test]
    fn test_play_with_no_tracks_is_noop() {
        let (mut transport, mut tracks, mut backend) = setup(&[]);
        transport.play(&mut tracks, &mut backend);
        assert!(transport.is_stopped());
        assert_eq!(backend.resume_count(), 0);
    }

    #[test]
    fn test_playing_to_paused() {
        let (mut transport, mut tracks, mut backend) = setup(&["Bass"]);
        transport.play(&mut tracks, &mut backend);
        transport.pause(&mut tracks);
        assert!(transport.is_paused());
        assert!(backend.probe(0).unwrap().paused);
    }

    #[test]
    fn test_pause_when_stopped_stays_stopped() {
        let (mut transport, mut tracks, _backend) = setup(&["Bass"]);
        transport.pause(&mut tracks);
        assert!(transport.is_stopped());
    }

    #[test]
    fn test_toggle_pause() {
        let (mut transport, mut tracks, mut backend) = setup(&["Bass"]);
        transport.toggle_pause(&mut tracks, &mut backend);
        assert!(transport.is_playing());
        transport.toggle_pause(&mut tracks, &mut backend);
        assert!(transport.is_paused());
        transport.toggle_pause(&mut tracks, &mut backend);
        assert!(transport.is_playing());
    }

    #[test]
    fn test_stop_resets_positions() {
        let (mut transport, mut tracks, mut backend) = setup(&["Click", "Bass"]);
        transport.play(&mut tracks, &mut backend);
        tracks.on_frame(Duration::from_millis(500));
        transport.tick(&tracks);
        assert!(transport.current_time() > 0.0);

        transport.stop(&mut tracks);
        assert!(transport.is_stopped());
        assert_eq!(transport.current_time(), 0.0);
        for probe in backend.probes() {
            assert!(probe.paused);
            assert_eq!(probe.position, 0.0);
        }
    }

    // ------------------------------------------------------------------------
    // Seek Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_seek_all_commands_every_track() {
        let (mut transport, mut tracks, backend) = setup(&["Click", "Guia", "Bass"]);
        transport.seek_all(&mut tracks, 7.5);
        for probe in backend.probes() {
            assert_eq!(probe.last_seek, Some(7.5));
            assert_eq!(probe.seeks, 1);
        }
        assert_eq!(transport.current_time(), 7.5);
    }

    #[test]
    fn test_seek_clamps_negative() {
        let (mut transport, mut tracks, _backend) = setup(&["Bass"]);
        transport.seek_all(&mut tracks, -3.0);
        assert_eq!(transport.current_time(), 0.0);
    }

    #[test]
    fn test_seek_percentage() {
        let (mut transport, mut tracks, backend) = setup(&["Bass"]);
        transport.seek_percentage(&mut tracks, 25.0);
        assert_relative_eq!(backend.probe(0).unwrap().position, 5.0);

        transport.seek_percentage(&mut tracks, 140.0);
        assert_relative_eq!(backend.probe(0).unwrap().position, 20.0);
    }

    #[test]
    fn test_tick_publishes_reference_track() {
        let (mut transport, mut tracks, mut backend) = setup(&["Click", "Bass"]);
        transport.play(&mut tracks, &mut backend);
        tracks.on_frame(Duration::from_secs(5));
        transport.tick(&tracks);

        assert_relative_eq!(transport.current_time(), 5.0);
        assert_relative_eq!(transport.duration(), 20.0);
        assert_relative_eq!(transport.progress(), 25.0);
    }

    #[test]
    fn test_reset() {
        let (mut transport, mut tracks, mut backend) = setup(&["Bass"]);
        transport.play(&mut tracks, &mut backend);
        transport.tick(&tracks);
        transport.reset();
        assert!(transport.is_stopped());
        assert_eq!(transport.duration(), 0.0);
    }
}
