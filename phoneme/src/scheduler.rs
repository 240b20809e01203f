//! Per-key debounce.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

struct Pending<V> {
    deadline: Instant,
    payload: V,
}

/// Coalesces bursts of updates per key.
///
/// Each [`Debouncer::schedule`] replaces the key's payload and pushes its
/// deadline to `now + delay`. A key fires once no update arrived for
/// `delay`, or immediately on [`Debouncer::drain`].
pub struct Debouncer<K, V> {
    delay: Duration,
    pending: BTreeMap<K, Pending<V>>,
}

impl<K: Ord + Clone, V> Debouncer<K, V> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: BTreeMap::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn schedule(&mut self, key: K, payload: V, now: Instant) {
        self.pending.insert(
            key,
            Pending {
                deadline: now + self.delay,
                payload,
            },
        );
    }

    pub fn cancel(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key).map(|p| p.payload)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline among pending keys.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Removes and returns every key whose deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        due.into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (k, p.payload)))
            .collect()
    }

    /// Removes and returns everything, due or not.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(k, p)| (k, p.payload))
            .collect()
    }
}
