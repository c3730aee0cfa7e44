//! Debounced autosave
//!
//! Every state change re-arms a single timer; the state is written only once
//! the changes have been quiet for the debounce interval.

use std::time::Duration;

use crate::engine::{TimerId, TimerQueue};

/// Tracks when the next autosave is due
#[derive(Debug, Clone)]
pub struct Autosave {
    debounce: Duration,
    timers: TimerQueue<()>,
    pending: Option<TimerId>,
    enabled: bool,
}

impl Default for Autosave {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl Autosave {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            timers: TimerQueue::new(),
            pending: None,
            enabled: true,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// While disabled, changes are not recorded and nothing is due
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a state change; restarts the debounce window
    pub fn mark_dirty(&mut self) {
        if !self.enabled {
            return;
        }
        if let Some(id) = self.pending.take() {
            self.timers.cancel(id);
        }
        self.pending = Some(self.timers.schedule(self.debounce, ()));
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(id) = self.pending.take() {
            self.timers.cancel(id);
        }
    }

    /// Advance the clock; true when a write is due now
    pub fn on_frame(&mut self, elapsed: Duration) -> bool {
        self.timers.advance(elapsed);
        if self.timers.pop_due().is_some() {
            self.pending = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(100);

    #[test]
    fn test_writes_once_after_quiet_period() {
        let mut autosave = Autosave::default();
        autosave.mark_dirty();
        let mut writes = 0;
        for _ in 0..10 {
            if autosave.on_frame(FRAME) {
                writes += 1;
            }
        }
        assert_eq!(writes, 1);
        assert!(!autosave.is_pending());
    }

    #[test]
    fn test_changes_rearm_the_timer() {
        let mut autosave = Autosave::default();
        autosave.mark_dirty();
        for _ in 0..4 {
            assert!(!autosave.on_frame(FRAME));
            autosave.mark_dirty();
        }
        assert!(!autosave.on_frame(FRAME));
        for _ in 0..3 {
            assert!(!autosave.on_frame(FRAME));
        }
        assert!(autosave.on_frame(FRAME));
    }

    #[test]
    fn test_disabled_ignores_changes() {
        let mut autosave = Autosave::default();
        autosave.set_enabled(false);
        autosave.mark_dirty();
        assert!(!autosave.is_pending());
        assert!(!autosave.on_frame(Duration::from_secs(1)));
    }
}
