//! Timer queue on the engine's virtual clock
//!
//! Deferred work is stored as plain data (`T`), not closures, and handed back
//! to the owner when due. The owner re-validates whatever token the payload
//! carries before acting on it.

use std::collections::BTreeMap;
use std::time::Duration;

/// Handle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// Deadline-ordered tasks; equal deadlines fire in scheduling order
#[derive(Debug, Clone)]
pub struct TimerQueue<T> {
    now: Duration,
    next_seq: u64,
    tasks: BTreeMap<(Duration, u64), T>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            tasks: BTreeMap::new(),
        }
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to fire `delay` from now
    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert((self.now + delay, seq), task);
        TimerId(seq)
    }

    /// Remove a task before it fires; returns it when it was still pending
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let key = self.tasks.keys().find(|(_, seq)| *seq == id.0).copied()?;
        self.tasks.remove(&key)
    }

    /// Drop every task matching the predicate
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, task| !pred(task));
        before - self.tasks.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.tasks.keys().any(|(_, seq)| *seq == id.0)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Move the clock forward without firing anything
    pub fn advance(&mut self, elapsed: Duration) {
        self.now += elapsed;
    }

    /// Pop the earliest task whose deadline has passed
    ///
    /// Popping one at a time lets the owner schedule follow-up tasks while
    /// draining; a follow-up with zero delay fires in the same frame.
    pub fn pop_due(&mut self) -> Option<T> {
        let key = *self.tasks.keys().next()?;
        if key.0 > self.now {
            return None;
        }
        self.tasks.remove(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn drain(queue: &mut TimerQueue<&'static str>) -> Vec<&'static str> {
        std::iter::from_fn(|| queue.pop_due()).collect()
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(30), "c");
        queue.schedule(ms(10), "a");
        queue.schedule(ms(20), "b");

        queue.advance(ms(25));
        assert_eq!(drain(&mut queue), vec!["a", "b"]);
        queue.advance(ms(5));
        assert_eq!(drain(&mut queue), vec!["c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_deadlines_keep_scheduling_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(10), "first");
        queue.schedule(ms(10), "second");
        queue.advance(ms(10));
        assert_eq!(drain(&mut queue), vec!["first", "second"]);
    }

    #[test]
    fn test_cancel() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(ms(10), "gone");
        queue.schedule(ms(10), "kept");
        assert!(queue.is_pending(id));
        assert_eq!(queue.cancel(id), Some("gone"));
        assert_eq!(queue.cancel(id), None);

        queue.advance(ms(10));
        assert_eq!(drain(&mut queue), vec!["kept"]);
    }

    #[test]
    fn test_cancel_where() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(1), "jump");
        queue.schedule(ms(2), "save");
        queue.schedule(ms(3), "jump");
        assert_eq!(queue.cancel_where(|t| *t == "jump"), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_zero_delay_is_due_immediately() {
        let mut queue = TimerQueue::new();
        queue.advance(ms(100));
        queue.schedule(Duration::ZERO, "now");
        assert_eq!(queue.pop_due(), Some("now"));
    }
}
