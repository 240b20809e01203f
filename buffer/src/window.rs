//! Single-owner sliding window.

use std::collections::VecDeque;

/// A fixed-capacity FIFO owned by a single consumer.
///
/// Unlike [`RingBuffer`](crate::RingBuffer) the window holds arbitrary
/// (non-`Copy`) items and is not shared; it is meant for per-tick
/// histories such as the last N feature frames. Pushing onto a full
/// window evicts and returns the oldest item.
///
/// ```
/// use phonic_buffer::SlidingWindow;
///
/// let mut win = SlidingWindow::new(2);
/// win.push("a");
/// win.push("b");
/// assert!(win.is_full());
/// assert_eq!(win.push("c"), Some("a"));
/// assert_eq!(win.iter().copied().collect::<Vec<_>>(), vec!["b", "c"]);
/// ```
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    /// Creates an empty window.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an item, evicting the oldest one when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true when the window holds exactly `capacity` items.
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Returns the most recently pushed item.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut win = SlidingWindow::new(3);
        assert!(win.is_empty());
        assert_eq!(win.push(1), None);
        assert_eq!(win.push(2), None);
        assert!(!win.is_full());
        assert_eq!(win.push(3), None);
        assert!(win.is_full());
        assert_eq!(win.len(), 3);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut win = SlidingWindow::new(3);
        for i in 1..=5 {
            win.push(i);
        }
        assert_eq!(win.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(win.latest(), Some(&5));
    }

    #[test]
    fn test_clear() {
        let mut win = SlidingWindow::new(2);
        win.push(String::from("x"));
        win.clear();
        assert!(win.is_empty());
        assert_eq!(win.capacity(), 2);
        assert_eq!(win.latest(), None);
    }
}
