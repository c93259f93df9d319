//! Tagged timers
//!
//! One pending deadline per key. Starting a timer replaces any earlier one
//! for the same key; cancelling is idempotent. Timers fire only from
//! [`TaggedTimers::take_due`], which the owner calls from its own context.

use std::time::Instant;

/// Keyed one-shot deadlines
#[derive(Debug, Clone)]
pub struct TaggedTimers<K> {
    pending: Vec<(K, Instant)>,
}

impl<K> Default for TaggedTimers<K> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<K: Copy + Eq> TaggedTimers<K> {
    /// Create an empty timer set
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` for `deadline`, replacing any earlier deadline for it
    pub fn start(&mut self, key: K, deadline: Instant) {
        self.cancel(key);
        self.pending.push((key, deadline));
    }

    /// Disarm `key`
    pub fn cancel(&mut self, key: K) {
        self.pending.retain(|(k, _)| *k != key);
    }

    /// Disarm everything
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    /// Whether `key` is armed
    pub fn is_pending(&self, key: K) -> bool {
        self.pending.iter().any(|(k, _)| *k == key)
    }

    /// Deadline of `key`, if armed
    pub fn deadline(&self, key: K) -> Option<Instant> {
        self.pending
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, deadline)| *deadline)
    }

    /// Remove and return every key due at `now`, earliest first
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(K, Instant)> = Vec::new();
        self.pending.retain(|&(key, deadline)| {
            if deadline <= now {
                due.push((key, deadline));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(_, deadline)| *deadline);
        due.into_iter().map(|(key, _)| key).collect()
    }

    /// Number of armed timers
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no timer is armed
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Key {
        A,
        B,
    }

    #[test]
    fn restarting_replaces_previous_deadline() {
        let base = Instant::now();
        let mut timers = TaggedTimers::new();
        timers.start(Key::A, base + Duration::from_millis(10));
        timers.start(Key::A, base + Duration::from_millis(50));

        assert_eq!(timers.len(), 1);
        assert!(timers.take_due(base + Duration::from_millis(20)).is_empty());
        assert_eq!(timers.take_due(base + Duration::from_millis(50)), vec![Key::A]);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let base = Instant::now();
        let mut timers = TaggedTimers::new();
        timers.start(Key::A, base);
        timers.cancel(Key::A);
        timers.cancel(Key::A);
        timers.cancel(Key::B);
        assert!(!timers.is_pending(Key::A));
        timers.cancel_all();
        timers.cancel_all();
        assert!(timers.take_due(base + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn due_timers_fire_earliest_first() {
        let base = Instant::now();
        let mut timers = TaggedTimers::new();
        timers.start(Key::B, base + Duration::from_millis(30));
        timers.start(Key::A, base + Duration::from_millis(10));
        assert_eq!(
            timers.take_due(base + Duration::from_millis(40)),
            vec![Key::A, Key::B]
        );
    }
}
