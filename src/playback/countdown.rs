//! Jump countdown display
//!
//! The countdown is derived from the virtual clock instead of being
//! decremented by its own timer, so it can never drift from the cut timer
//! that ends it.

use std::time::Duration;

/// A countdown of `count` beats started at a given instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    count: u32,
    beat: Duration,
    started: Duration,
}

impl Countdown {
    pub fn new(count: u32, beat: Duration, started: Duration) -> Self {
        Self {
            count,
            beat,
            started,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn beat(&self) -> Duration {
        self.beat
    }

    /// Total length of the countdown
    pub fn total(&self) -> Duration {
        self.beat * self.count
    }

    /// Number to display at `now`; `None` once the countdown has run out
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use stagemix::playback::Countdown;
    ///
    /// let countdown = Countdown::new(4, Duration::from_millis(500), Duration::ZERO);
    /// assert_eq!(countdown.value(Duration::ZERO), Some(4));
    /// assert_eq!(countdown.value(Duration::from_millis(1600)), Some(1));
    /// assert_eq!(countdown.value(Duration::from_millis(2000)), None);
    /// ```
    pub fn value(&self, now: Duration) -> Option<u32> {
        let elapsed = now.saturating_sub(self.started);
        let ticks = if self.beat.is_zero() {
            u128::from(self.count)
        } else {
            elapsed.as_micros() / self.beat.as_micros().max(1)
        };
        let remaining = u128::from(self.count).saturating_sub(ticks);
        if remaining == 0 {
            None
        } else {
            u32::try_from(remaining).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_down_once_per_beat() {
        let countdown = Countdown::new(4, Duration::from_millis(500), Duration::from_secs(10));
        let at = |ms: u64| countdown.value(Duration::from_secs(10) + Duration::from_millis(ms));
        assert_eq!(at(0), Some(4));
        assert_eq!(at(499), Some(4));
        assert_eq!(at(500), Some(3));
        assert_eq!(at(1000), Some(2));
        assert_eq!(at(1999), Some(1));
        assert_eq!(at(2000), None);
    }

    #[test]
    fn test_total() {
        let countdown = Countdown::new(8, Duration::from_millis(250), Duration::ZERO);
        assert_eq!(countdown.total(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_beat_is_hidden() {
        let countdown = Countdown::new(4, Duration::ZERO, Duration::ZERO);
        assert_eq!(countdown.value(Duration::ZERO), None);
    }
}
