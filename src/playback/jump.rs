//! Marker Jump Synchronizer
//!
//! Jumps live from the current position to a marker without an audible
//! seam. The jump waits for the next strong beat, then masks the guide track
//! and plays an independent preview of the guide from a lead-in point before
//! the marker while a countdown runs. Shortly before the countdown ends every
//! track seeks to the marker; the jump completes only when both the countdown
//! has ended and the tracks are audibly playing again.
//!
//! ```text
//! Idle -> WaitingForStrongBeat -> CountdownMasking -> Finalizing -> Idle
//!   \____________________ cancel ____________________/-> Cancelled -> Idle
//! ```
//!
//! Every deferred step carries the [`JumpToken`] of the jump that scheduled
//! it and is dropped when the token no longer matches the pending jump or the
//! synchronizer has been shut down.

use std::fmt;
use std::time::Duration;

use crate::analysis::{BeatGrid, ClickBeat};
use crate::config::JumpTiming;
use crate::engine::{AudioSource, BarrierStatus, PlaybackElement, SeekBarrier, TimerQueue, TrackId};
use crate::error::{MixerError, Result};
use crate::markers::UserMarker;
use crate::playback::countdown::Countdown;
use crate::playback::{millis, PlaybackContext};

/// Identity of a pending jump: the bit pattern of its target marker time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpToken(u64);

impl JumpToken {
    pub fn for_marker(marker: &UserMarker) -> Self {
        Self(marker.time.to_bits())
    }
}

/// Where the synchronizer currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JumpPhase {
    #[default]
    Idle,
    /// Waiting for the next strong beat to start the countdown
    WaitingForStrongBeat,
    /// Guide masked, preview and countdown running
    CountdownMasking,
    /// Tracks seeking to the marker and spinning back up
    Finalizing,
    /// The last jump was cancelled; becomes Idle on the next frame
    Cancelled,
}

impl JumpPhase {
    /// True while a jump owns the playhead
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            JumpPhase::WaitingForStrongBeat | JumpPhase::CountdownMasking | JumpPhase::Finalizing
        )
    }
}

impl fmt::Display for JumpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpPhase::Idle => write!(f, "Idle"),
            JumpPhase::WaitingForStrongBeat => write!(f, "WaitingForStrongBeat"),
            JumpPhase::CountdownMasking => write!(f, "CountdownMasking"),
            JumpPhase::Finalizing => write!(f, "Finalizing"),
            JumpPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A scheduled jump
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJump {
    pub marker: UserMarker,
    /// Average beat duration in milliseconds
    pub beat_ms: f64,
    pub token: JumpToken,
    /// Strong beat the countdown starts on
    pub strong_beat: ClickBeat,
    /// Where the guide preview starts (seconds)
    pub preview_start: f64,
    pub count_beats: u32,
}

/// Result of a successful activation
#[derive(Debug, Clone, PartialEq)]
pub enum JumpActivation {
    /// Transport was not playing; tracks were moved to the marker directly
    Positioned { time: f64 },
    /// A jump was scheduled; the countdown starts after `wait`
    Scheduled { wait: Duration, strong_beat: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpStep {
    StrongBeat,
    Cut,
    Seek,
    AdvancePoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JumpTask {
    token: JumpToken,
    step: JumpStep,
}

#[derive(Debug, Clone, Copy)]
enum Finalize {
    NotStarted,
    Seeking(SeekBarrier),
    AwaitingAdvance { started: Duration, last: f64 },
    Done,
}

struct ActiveJump {
    pending: PendingJump,
    guide: TrackId,
    masked: bool,
    preview: Option<Box<dyn PlaybackElement>>,
    countdown: Option<Countdown>,
    cut_reached: bool,
    tracks_ready: bool,
    completed: bool,
    finalize: Finalize,
}

impl fmt::Debug for ActiveJump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveJump")
            .field("pending", &self.pending)
            .field("guide", &self.guide)
            .field("masked", &self.masked)
            .field("preview", &self.preview.is_some())
            .field("cut_reached", &self.cut_reached)
            .field("tracks_ready", &self.tracks_ready)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

/// Schedules and completes beat-aligned marker jumps
#[derive(Debug)]
pub struct MarkerJumpSynchronizer {
    timing: JumpTiming,
    timers: TimerQueue<JumpTask>,
    phase: JumpPhase,
    active: Option<ActiveJump>,
    /// False once the owner is shut down; every continuation checks it
    live: bool,
    completed_jumps: u32,
}

impl Default for MarkerJumpSynchronizer {
    fn default() -> Self {
        Self::new(JumpTiming::default())
    }
}

impl MarkerJumpSynchronizer {
    pub fn new(timing: JumpTiming) -> Self {
        Self {
            timing,
            timers: TimerQueue::new(),
            phase: JumpPhase::Idle,
            active: None,
            live: true,
            completed_jumps: 0,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn phase(&self) -> JumpPhase {
        self.phase
    }

    pub fn is_in_flight(&self) -> bool {
        self.phase.is_in_flight()
    }

    pub fn pending(&self) -> Option<&PendingJump> {
        self.active.as_ref().map(|a| &a.pending)
    }

    /// Countdown number to display, if one is running
    pub fn countdown_value(&self) -> Option<u32> {
        let countdown = self.active.as_ref()?.countdown?;
        countdown.value(self.timers.now())
    }

    /// Number of jumps that reached the marker
    pub fn completed_jumps(&self) -> u32 {
        self.completed_jumps
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Virtual time of the synchronizer's clock
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    fn token_matches(&self, token: JumpToken) -> bool {
        self.live
            && self
                .active
                .as_ref()
                .is_some_and(|a| !a.completed && a.pending.token == token)
    }

    // ========================================================================
    // Activation
    // ========================================================================

    /// Activate a marker
    ///
    /// When the transport is not playing the tracks are simply moved to the
    /// marker. Otherwise a jump is scheduled for the next strong beat. A
    /// rejected activation leaves any pending jump untouched; an accepted one
    /// silently supersedes it.
    ///
    /// # Errors
    /// * `NoTracksLoaded`, `NoBeatsDetected` - Checked first, in that order
    /// * `NoGuideTrack`, `NoStrongBeatAhead`, `InsufficientLeadIn` - Only
    ///   checked while playing
    pub fn activate(
        &mut self,
        ctx: &mut PlaybackContext<'_>,
        marker: &UserMarker,
        beats: &BeatGrid,
        count_beats: u32,
    ) -> Result<JumpActivation> {
        if ctx.tracks.is_empty() {
            return Err(MixerError::NoTracksLoaded);
        }
        if beats.is_empty() {
            return Err(MixerError::NoBeatsDetected);
        }

        if !ctx.transport.is_playing() {
            ctx.transport.seek_direct(ctx.tracks, marker.time);
            ctx.notices.success(format!("Position: {}", marker.name));
            log::debug!("[JUMP] Not playing, positioned at '{}'", marker.name);
            return Ok(JumpActivation::Positioned { time: marker.time });
        }

        let guide = ctx.tracks.find_guide().ok_or(MixerError::NoGuideTrack)?;

        let now = ctx.transport.current_time();
        let strong_beat = *beats
            .next_strong_after(now)
            .ok_or(MixerError::NoStrongBeatAhead { current_time: now })?;

        let avg = beats.average_beat_duration();
        let lead_in = f64::from(count_beats) * avg;
        let preview_start = marker.time - lead_in;
        if preview_start < 0.0 {
            return Err(MixerError::InsufficientLeadIn {
                marker: marker.name.clone(),
                marker_time: marker.time,
                lead_in,
            });
        }

        self.cancel(ctx, true);

        let wait = millis((strong_beat.time - now) * 1000.0);
        let token = JumpToken::for_marker(marker);
        self.active = Some(ActiveJump {
            pending: PendingJump {
                marker: marker.clone(),
                beat_ms: avg * 1000.0,
                token,
                strong_beat,
                preview_start,
                count_beats,
            },
            guide,
            masked: false,
            preview: None,
            countdown: None,
            cut_reached: false,
            tracks_ready: false,
            completed: false,
            finalize: Finalize::NotStarted,
        });
        self.timers.schedule(
            wait,
            JumpTask {
                token,
                step: JumpStep::StrongBeat,
            },
        );
        self.phase = JumpPhase::WaitingForStrongBeat;

        ctx.notices.info("Waiting for the next strong beat...");
        log::info!(
            "[JUMP] '{}' at {:.3}s scheduled, strong beat {:.3}s in {:?}",
            marker.name,
            marker.time,
            strong_beat.time,
            wait
        );

        Ok(JumpActivation::Scheduled {
            wait,
            strong_beat: strong_beat.time,
        })
    }

    // ========================================================================
    // Frame driver
    // ========================================================================

    /// Advance the clock, fire due steps and poll the seek barrier
    pub fn on_frame(&mut self, ctx: &mut PlaybackContext<'_>, elapsed: Duration) {
        if self.phase == JumpPhase::Cancelled {
            self.phase = JumpPhase::Idle;
        }

        self.timers.advance(elapsed);
        if let Some(preview) = self.active.as_mut().and_then(|a| a.preview.as_mut()) {
            preview.on_frame(elapsed);
        }

        while let Some(task) = self.timers.pop_due() {
            if !self.token_matches(task.token) {
                log::debug!("[JUMP] Dropping stale {:?}", task.step);
                continue;
            }
            match task.step {
                JumpStep::StrongBeat => self.start_countdown(ctx, task.token),
                JumpStep::Cut => {
                    if let Some(active) = self.active.as_mut() {
                        active.cut_reached = true;
                    }
                    log::debug!("[JUMP] Countdown cut reached");
                    self.try_complete(ctx);
                }
                JumpStep::Seek => self.start_seek(ctx),
                JumpStep::AdvancePoll => self.poll_advance(ctx, task.token),
            }
        }

        self.poll_seek_barrier(ctx);
    }

    fn start_countdown(&mut self, ctx: &mut PlaybackContext<'_>, token: JumpToken) {
        let now = self.timers.now();
        let timing = self.timing.clone();
        let Some(active) = self.active.as_mut() else {
            return;
        };

        if active.masked {
            return;
        }
        let guide_source: AudioSource = match ctx.tracks.get(active.guide) {
            Ok(track) => track.source().clone(),
            Err(e) => {
                log::warn!("[JUMP] Guide track vanished: {}", e);
                self.cancel(ctx, true);
                return;
            }
        };

        match ctx.tracks.mask(active.guide) {
            Ok(prior) => {
                active.masked = true;
                log::debug!("[JUMP] Guide masked (gain was {:.3})", prior);
            }
            Err(e) => log::warn!("[JUMP] Could not mask guide: {}", e),
        }

        // A failing preview must not stop the jump
        match ctx.backend.open(&guide_source) {
            Ok(mut preview) => {
                preview.set_position(active.pending.preview_start);
                preview.set_gain(timing.preview_gain);
                preview.play();
                active.preview = Some(preview);
            }
            Err(e) => log::warn!("[JUMP] Guide preview unavailable: {}", e),
        }

        let beat = millis(active.pending.beat_ms);
        let countdown = Countdown::new(active.pending.count_beats, beat, now);
        active.countdown = Some(countdown);

        let countdown_ms = active.pending.beat_ms * f64::from(active.pending.count_beats);
        let cut_delay = millis(countdown_ms);
        let seek_delay = millis((countdown_ms - timing.pre_buffer_ms as f64).max(0.0));

        self.timers.schedule(
            cut_delay,
            JumpTask {
                token,
                step: JumpStep::Cut,
            },
        );
        self.timers.schedule(
            seek_delay,
            JumpTask {
                token,
                step: JumpStep::Seek,
            },
        );
        self.phase = JumpPhase::CountdownMasking;

        log::debug!(
            "[JUMP] Countdown of {} beats started, seek in {:?}, cut in {:?}",
            active.pending.count_beats,
            seek_delay,
            cut_delay
        );
    }

    fn start_seek(&mut self, ctx: &mut PlaybackContext<'_>) {
        let now = self.timers.now();
        let timeout = self.timing.seek_timeout();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if !matches!(active.finalize, Finalize::NotStarted) {
            return;
        }

        ctx.transport.seek_all(ctx.tracks, active.pending.marker.time);
        active.finalize = Finalize::Seeking(SeekBarrier::new(now, timeout));
        self.phase = JumpPhase::Finalizing;
        log::debug!(
            "[JUMP] Seeking all tracks to {:.3}s",
            active.pending.marker.time
        );
    }

    fn poll_seek_barrier(&mut self, ctx: &mut PlaybackContext<'_>) {
        let now = self.timers.now();
        let poll = self.timing.advance_poll();
        let live = self.live;
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Finalize::Seeking(barrier) = active.finalize else {
            return;
        };

        let status = barrier.poll(now, ctx.tracks.all_seeks_complete());
        if !status.is_open() {
            return;
        }
        if status == BarrierStatus::TimedOut {
            log::debug!(
                "[JUMP] Seek wait timed out after {:?}, playing anyway",
                barrier.waited(now)
            );
        }
        if !live {
            active.finalize = Finalize::Done;
            return;
        }

        // Some backends briefly pause on seek
        ctx.tracks.play_all();
        let last = ctx
            .tracks
            .get(active.guide)
            .map(|t| t.element().position())
            .unwrap_or(active.pending.marker.time);
        active.finalize = Finalize::AwaitingAdvance {
            started: now,
            last,
        };
        let token = active.pending.token;
        self.timers.schedule(
            poll,
            JumpTask {
                token,
                step: JumpStep::AdvancePoll,
            },
        );
    }

    fn poll_advance(&mut self, ctx: &mut PlaybackContext<'_>, token: JumpToken) {
        let now = self.timers.now();
        let timing = self.timing.clone();
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let Finalize::AwaitingAdvance { started, last } = active.finalize else {
            return;
        };

        let (position, paused) = match ctx.tracks.get(active.guide) {
            Ok(track) => (track.element().position(), track.element().is_paused()),
            Err(_) => (last, true),
        };

        let advanced = !paused && position - last > timing.advance_threshold_secs;
        let timed_out = now.saturating_sub(started) >= timing.advance_timeout();
        if advanced || timed_out {
            if timed_out && !advanced {
                log::debug!("[JUMP] Guide did not advance within {:?}", timing.advance_timeout());
            }
            active.finalize = Finalize::Done;
            active.tracks_ready = true;
            log::debug!("[JUMP] Tracks ready at {:.3}s", position);
            self.try_complete(ctx);
            return;
        }

        active.finalize = Finalize::AwaitingAdvance {
            started,
            last: position,
        };
        self.timers.schedule(
            timing.advance_poll(),
            JumpTask {
                token,
                step: JumpStep::AdvancePoll,
            },
        );
    }

    // ========================================================================
    // Completion & cancellation
    // ========================================================================

    /// Finish the jump once the countdown has ended and the tracks are
    /// playing again. Safe to call any number of times.
    fn try_complete(&mut self, ctx: &mut PlaybackContext<'_>) {
        if !self.live {
            return;
        }
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.completed || !active.cut_reached || !active.tracks_ready {
            return;
        }
        active.completed = true;

        if let Some(mut preview) = active.preview.take() {
            preview.pause();
        }
        if active.masked {
            if let Err(e) = ctx.tracks.unmask(active.guide) {
                log::warn!("[JUMP] Could not restore guide: {}", e);
            }
            active.masked = false;
        }

        let name = active.pending.marker.name.clone();
        self.active = None;
        self.timers.cancel_where(|_| true);
        self.phase = JumpPhase::Idle;
        self.completed_jumps += 1;

        ctx.notices.success(format!("Jumped to {}", name));
        log::info!("[JUMP] Completed at '{}'", name);
    }

    /// Abandon the pending jump, if any
    ///
    /// Clears timers, stops the preview, restores the guide and hides the
    /// countdown. Reports a notice unless `silent`. Returns whether a jump was
    /// pending.
    pub fn cancel(&mut self, ctx: &mut PlaybackContext<'_>, silent: bool) -> bool {
        self.timers.cancel_where(|_| true);

        let Some(mut active) = self.active.take() else {
            return false;
        };

        if let Some(mut preview) = active.preview.take() {
            preview.pause();
        }
        if active.masked {
            if let Err(e) = ctx.tracks.unmask(active.guide) {
                log::debug!("[JUMP] Guide not restored on cancel: {}", e);
            }
        }
        self.phase = JumpPhase::Cancelled;

        if !silent {
            ctx.notices.info("Jump cancelled");
        }
        log::info!(
            "[JUMP] Cancelled '{}'{}",
            active.pending.marker.name,
            if silent { " (silent)" } else { "" }
        );
        true
    }

    /// Stop accepting continuations; every later step is a no-op
    pub fn shutdown(&mut self) {
        self.live = false;
        self.timers.cancel_where(|_| true);
        if let Some(active) = self.active.as_mut() {
            if let Some(mut preview) = active.preview.take() {
                preview.pause();
            }
        }
    }
}
