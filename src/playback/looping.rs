//! Loop Controller
//!
//! Loops playback between two adjacent markers. The check runs after every
//! transport tick: once the reference position comes within the pre-seek
//! buffer of the loop end, every track is sent back to the loop start and a
//! guard is raised until all tracks finished seeking (or the bound elapsed),
//! so a single crossing never causes more than one seek.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LoopTiming;
use crate::engine::{BarrierStatus, SeekBarrier, TrackRegistry, Transport};
use crate::error::{MixerError, Result};
use crate::markers::{MarkerSet, UserMarker};

/// Loop region between two markers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveLoop {
    pub start_time: f64,
    pub end_time: f64,
    pub start_percentage: f64,
    pub end_percentage: f64,
}

impl ActiveLoop {
    pub fn between(start: &UserMarker, end: &UserMarker) -> Self {
        Self {
            start_time: start.time,
            end_time: end.time,
            start_percentage: start.percentage,
            end_percentage: end.percentage,
        }
    }

    pub fn length(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Watches the playhead and seeks back at the loop boundary
#[derive(Debug, Clone, Default)]
pub struct LoopController {
    active: Option<ActiveLoop>,
    /// Raised from the seek-back until every track finished seeking
    guard: Option<SeekBarrier>,
    timing: LoopTiming,
    crossings: u32,
}

impl LoopController {
    pub fn new(timing: LoopTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    /// Loop between two markers of `markers`
    ///
    /// # Errors
    /// * `InvalidLoop` - If `start` is not before `end`, either is not a
    ///   marker of the set, or another marker lies between them
    pub fn set_loop(
        &mut self,
        markers: &MarkerSet,
        start: &UserMarker,
        end: &UserMarker,
    ) -> Result<ActiveLoop> {
        if start.time >= end.time {
            return Err(MixerError::InvalidLoop {
                reason: format!(
                    "start {:.3}s must be before end {:.3}s",
                    start.time, end.time
                ),
            });
        }
        if markers.find_at(start.time).is_none() || markers.find_at(end.time).is_none() {
            return Err(MixerError::InvalidLoop {
                reason: "loop bounds must be markers of the project".to_string(),
            });
        }
        if !markers.are_adjacent(start.time, end.time) {
            return Err(MixerError::InvalidLoop {
                reason: format!("'{}' and '{}' are not adjacent", start.name, end.name),
            });
        }

        let active = ActiveLoop::between(start, end);
        self.active = Some(active);
        self.guard = None;
        log::info!(
            "[LOOP] {} -> {} ({:.3}s - {:.3}s)",
            start.name,
            end.name,
            start.time,
            end.time
        );
        Ok(active)
    }

    /// Loop the section the playhead is currently in
    pub fn loop_current_section(&mut self, markers: &MarkerSet, time: f64) -> Result<ActiveLoop> {
        let around = markers
            .surrounding(time)
            .ok_or_else(|| MixerError::InvalidLoop {
                reason: "at least two markers are needed".to_string(),
            })?;
        let (prev, next) = around.section().ok_or_else(|| MixerError::InvalidLoop {
            reason: format!("{:.3}s is not between two markers", time),
        })?;
        self.set_loop(markers, prev, next)
    }

    pub fn clear(&mut self) {
        if self.active.take().is_some() {
            log::info!("[LOOP] Cleared");
        }
        self.guard = None;
    }

    /// Drop the loop once its bounds are no longer two adjacent markers
    ///
    /// Returns true when the loop was cleared.
    pub fn revalidate(&mut self, markers: &MarkerSet) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        if markers.are_adjacent(active.start_time, active.end_time) {
            return false;
        }
        log::info!(
            "[LOOP] {:.3}s-{:.3}s no longer spans one section",
            active.start_time,
            active.end_time
        );
        self.clear();
        true
    }

    pub fn active(&self) -> Option<&ActiveLoop> {
        self.active.as_ref()
    }

    /// True while a seek-back is in flight
    pub fn is_seeking(&self) -> bool {
        self.guard.is_some()
    }

    /// Number of seek-backs issued since creation
    pub fn crossings(&self) -> u32 {
        self.crossings
    }

    /// Run after every transport tick; does nothing unless the transport is
    /// playing
    ///
    /// # Arguments
    /// * `now` - Current virtual time
    /// * `jump_in_flight` - A marker jump owns the playhead; stay out of its way
    pub fn check(
        &mut self,
        tracks: &mut TrackRegistry,
        transport: &mut Transport,
        now: Duration,
        jump_in_flight: bool,
    ) {
        let active = match self.active {
            Some(active) if !tracks.is_empty() => active,
            _ => {
                self.guard = None;
                return;
            }
        };

        // Scrubbing a stopped or paused transport never loops or starts audio
        if !transport.is_playing() {
            return;
        }

        if let Some(barrier) = self.guard {
            let status = barrier.poll(now, tracks.all_seeks_complete());
            if !status.is_open() {
                return;
            }
            if status == BarrierStatus::TimedOut {
                log::debug!(
                    "[LOOP] Seek wait timed out after {:?}, resuming anyway",
                    barrier.waited(now)
                );
            }
            // Some backends briefly pause on seek
            tracks.resume_paused();
            self.guard = None;
            return;
        }

        if jump_in_flight {
            return;
        }

        if transport.current_time() >= active.end_time - self.timing.pre_seek_secs() {
            transport.seek_all(tracks, active.start_time);
            self.guard = Some(SeekBarrier::new(now, self.timing.seek_timeout()));
            self.crossings += 1;
            log::debug!(
                "[LOOP] Boundary at {:.3}s, back to {:.3}s",
                active.end_time,
                active.start_time
            );
        }
    }
}
