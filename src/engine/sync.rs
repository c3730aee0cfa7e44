//! Seek barrier
//!
//! After a synchronized seek every track must report completion before
//! playback resumes. The wait is bounded: once the deadline passes the
//! barrier opens anyway and the caller proceeds.

use std::time::Duration;

/// Outcome of polling a [`SeekBarrier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierStatus {
    /// Some track is still seeking
    Pending,
    /// Every track finished seeking
    Complete,
    /// The bound elapsed first
    TimedOut,
}

impl BarrierStatus {
    pub fn is_open(self) -> bool {
        !matches!(self, BarrierStatus::Pending)
    }
}

/// Bounded wait for seek completion on all tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekBarrier {
    started: Duration,
    deadline: Duration,
}

impl SeekBarrier {
    /// Start waiting at `now` for at most `timeout`
    pub fn new(now: Duration, timeout: Duration) -> Self {
        Self {
            started: now,
            deadline: now + timeout,
        }
    }

    /// Check the barrier
    ///
    /// # Arguments
    /// * `now` - Current virtual time
    /// * `all_complete` - Whether every track has finished seeking
    pub fn poll(&self, now: Duration, all_complete: bool) -> BarrierStatus {
        if all_complete {
            BarrierStatus::Complete
        } else if now >= self.deadline {
            BarrierStatus::TimedOut
        } else {
            BarrierStatus::Pending
        }
    }

    /// Time spent waiting so far
    pub fn waited(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started)
    }
}
