//! Fixed-size sample history that drops the oldest items.

use std::sync::Arc;

use parking_lot::Mutex;

/// Shared history of the most recent `capacity` items.
///
/// Storage is allocated once. A producer (typically the audio callback)
/// keeps writing and the oldest items fall off; any clone can read the
/// window out at any time, oldest first. Used for the analysis window and
/// for the pre-onset part of a clip.
///
/// A ring is *primed* after `capacity` items have gone in. From then on
/// [`RingBuffer::to_vec`] always returns exactly `capacity` items.
///
/// ```
/// use phonic_buffer::RingBuffer;
///
/// // 300 ms of pre-roll at 1 kHz.
/// let pre = RingBuffer::<f32>::new(300);
/// let feed = pre.clone();
/// for n in 0..1000 {
///     feed.push(n as f32);
/// }
/// assert!(pre.is_primed());
/// assert_eq!(pre.to_vec().first(), Some(&700.0));
/// ```
pub struct RingBuffer<T> {
    inner: Arc<Mutex<RingBufferState<T>>>,
}

struct RingBufferState<T> {
    buf: Vec<T>,
    // Index of the slot the next write lands in.
    cursor: usize,
    // Number of valid slots, saturates at capacity.
    filled: usize,
    // Total items ever written since the last reset.
    written: u64,
}

impl<T> Clone for RingBuffer<T> {
    fn clone(&self) -> Self {
        RingBuffer {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Panics on a zero capacity.
    pub fn new(capacity: usize) -> Self {
        assert_ne!(capacity, 0, "ring capacity is zero");
        RingBuffer {
            inner: Arc::new(Mutex::new(RingBufferState {
                buf: vec![T::default(); capacity],
                cursor: 0,
                filled: 0,
                written: 0,
            })),
        }
    }

    /// Items currently held, at most `capacity`.
    pub fn len(&self) -> usize {
        self.inner.lock().filled
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().filled == 0
    }

    /// Returns true once the buffer has been completely filled at least once.
    pub fn is_primed(&self) -> bool {
        let state = self.inner.lock();
        state.filled == state.buf.len()
    }

    /// Returns the total number of items written since creation or the last reset.
    pub fn written(&self) -> u64 {
        self.inner.lock().written
    }

    /// Clears all data. The storage is kept.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.buf.fill(T::default());
        state.cursor = 0;
        state.filled = 0;
        state.written = 0;
    }

    /// Appends a block of items.
    pub fn write(&self, data: &[T]) {
        let mut state = self.inner.lock();
        let capacity = state.buf.len();

        // Only the tail that fits can survive a write longer than the ring.
        let skip = data.len().saturating_sub(capacity);
        let data = &data[skip..];
        state.written += skip as u64;

        let mut remaining = data;
        while !remaining.is_empty() {
            let cursor = state.cursor;
            let n = remaining.len().min(capacity - cursor);
            state.buf[cursor..cursor + n].copy_from_slice(&remaining[..n]);
            state.cursor = (cursor + n) % capacity;
            state.filled = (state.filled + n).min(capacity);
            state.written += n as u64;
            remaining = &remaining[n..];
        }
    }

    /// Appends one item.
    pub fn push(&self, item: T) {
        let mut state = self.inner.lock();
        let capacity = state.buf.len();
        let cursor = state.cursor;
        state.buf[cursor] = item;
        state.cursor = (cursor + 1) % capacity;
        state.filled = (state.filled + 1).min(capacity);
        state.written += 1;
    }

    /// Snapshot of the held items, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        let state = self.inner.lock();
        let capacity = state.buf.len();
        let mut result = Vec::with_capacity(state.filled);
        if state.filled < capacity {
            result.extend_from_slice(&state.buf[..state.filled]);
        } else {
            result.extend_from_slice(&state.buf[state.cursor..]);
            result.extend_from_slice(&state.buf[..state.cursor]);
        }
        result
    }

    /// Copies the most recent `out.len()` elements into `out`, oldest first.
    ///
    /// When fewer elements are available the front of `out` is filled
    /// with `T::default()`. Returns the number of real elements copied.
    pub fn copy_latest(&self, out: &mut [T]) -> usize {
        let state = self.inner.lock();
        let capacity = state.buf.len();
        let n = out.len().min(state.filled);
        let pad = out.len() - n;
        out[..pad].fill(T::default());

        // Start index of the n most recent items.
        let start = (state.cursor + capacity - n) % capacity;
        let first = n.min(capacity - start);
        out[pad..pad + first].copy_from_slice(&state.buf[start..start + first]);
        out[pad + first..].copy_from_slice(&state.buf[..n - first]);
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn partial_fill_is_not_primed() {
        let ring = RingBuffer::<i32>::new(4);
        ring.write(&[1, 2, 3]);
        assert_eq!(ring.to_vec(), vec![1, 2, 3]);
        assert!(!ring.is_primed());
    }

    #[test]
    fn full_ring_drops_oldest() {
        let ring = RingBuffer::<i32>::new(3);
        ring.write(&[1, 2, 3]);
        assert!(ring.is_primed());

        ring.write(&[4, 5]);
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.to_vec(), vec![3, 4, 5]);
    }

    #[test]
    fn oversized_block_keeps_tail() {
        let ring = RingBuffer::<i32>::new(3);
        ring.write(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(ring.to_vec(), vec![5, 6, 7]);
        assert_eq!(ring.written(), 7);
    }

    #[test]
    fn uneven_blocks_stay_ordered() {
        let ring = RingBuffer::<i32>::new(5);
        // Odd-sized writes force the cursor through every wrap position.
        let mut next = 0;
        for chunk in [3usize, 4, 2, 7, 1, 5] {
            let data: Vec<i32> = (next..next + chunk as i32).collect();
            next += chunk as i32;
            ring.write(&data);
        }
        assert_eq!(ring.to_vec(), vec![17, 18, 19, 20, 21]);
    }

    #[test]
    fn single_pushes_wrap() {
        let ring = RingBuffer::<i32>::new(5);
        (0..20).for_each(|n| ring.push(n));
        assert_eq!(ring.to_vec(), vec![15, 16, 17, 18, 19]);
    }

    #[test]
    fn copy_latest_takes_newest() {
        let ring = RingBuffer::<i32>::new(4);
        ring.write(&[1, 2, 3, 4, 5, 6]);

        let mut out = [0; 3];
        assert_eq!(ring.copy_latest(&mut out), 3);
        assert_eq!(out, [4, 5, 6]);
    }

    #[test]
    fn copy_latest_zero_pads_front() {
        let ring = RingBuffer::<i32>::new(8);
        ring.write(&[7, 8]);

        let mut out = [9; 4];
        assert_eq!(ring.copy_latest(&mut out), 2);
        assert_eq!(out, [0, 0, 7, 8]);
    }

    #[test]
    fn reset_forgets_history() {
        let ring = RingBuffer::<f32>::new(4);
        ring.write(&[0.1, 0.2, 0.3, 0.4]);
        ring.reset();
        assert!(ring.is_empty());
        assert!(!ring.is_primed());
        assert_eq!(ring.written(), 0);
        assert_eq!(ring.capacity(), 4);
        assert!(ring.to_vec().is_empty());
    }

    #[test]
    fn reader_sees_writer_clone() {
        let ring = RingBuffer::<i32>::new(16);
        let feed = ring.clone();

        thread::spawn(move || (0..1000).for_each(|n| feed.push(n)))
            .join()
            .unwrap();

        let window = ring.to_vec();
        assert_eq!(window.len(), 16);
        assert_eq!(window[15], 999);
        assert!(window.windows(2).all(|w| w[1] == w[0] + 1));
    }
}
