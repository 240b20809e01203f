//! The sliding pattern buffer and its representative frame.
//!
//! About half a second of feature frames is kept; matching compares only
//! the most energetic one, re-normalized to max 1.

use phonic_buffer::SlidingWindow;

use crate::features::FeatureVector;

/// Default number of frames in a pattern.
pub const PATTERN_LENGTH: usize = 30;

/// The last `N` feature vectors, oldest first.
///
/// Matching only runs once the buffer is full.
pub struct PatternBuffer {
    frames: SlidingWindow<FeatureVector>,
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(PATTERN_LENGTH)
    }
}

impl PatternBuffer {
    pub fn new(length: usize) -> Self {
        Self {
            frames: SlidingWindow::new(length.max(1)),
        }
    }

    pub fn push(&mut self, frame: FeatureVector) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.frames.capacity()
    }

    pub fn is_ready(&self) -> bool {
        self.frames.is_full()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn frames(&self) -> impl Iterator<Item = &FeatureVector> {
        self.frames.iter()
    }

    pub fn latest(&self) -> Option<&FeatureVector> {
        self.frames.latest()
    }

    /// The highest-energy frame, rescaled to max 1.
    ///
    /// Ties resolve to the earliest frame.
    pub fn representative(&self) -> Option<FeatureVector> {
        let mut best: Option<(&FeatureVector, f32)> = None;
        for frame in self.frames.iter() {
            let energy = frame.energy();
            if best.is_none_or(|(_, e)| energy > e) {
                best = Some((frame, energy));
            }
        }
        best.map(|(frame, _)| frame.to_normalized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(v: f32) -> FeatureVector {
        FeatureVector::new(vec![v; 4])
    }

    #[test]
    fn keeps_last_n_pushes() {
        let mut buf = PatternBuffer::new(30);
        for i in 1..=31 {
            buf.push(frame(i as f32 / 100.0));
            assert!(buf.len() <= 30);
        }
        assert!(buf.is_ready());
        let firsts: Vec<f32> = buf.frames().map(|f| f.as_slice()[0]).collect();
        let expected: Vec<f32> = (2..=31).map(|i| i as f32 / 100.0).collect();
        assert_eq!(firsts, expected);
    }

    #[test]
    fn not_ready_until_full() {
        let mut buf = PatternBuffer::new(3);
        buf.push(frame(0.1));
        buf.push(frame(0.1));
        assert!(!buf.is_ready());
        buf.push(frame(0.1));
        assert!(buf.is_ready());
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn representative_is_loudest_frame_normalized() {
        let mut buf = PatternBuffer::new(3);
        buf.push(FeatureVector::new(vec![0.1, 0.1]));
        buf.push(FeatureVector::new(vec![0.2, 0.4]));
        buf.push(FeatureVector::new(vec![0.3, 0.1]));
        let rep = buf.representative().unwrap();
        assert_eq!(rep.as_slice(), &[0.5, 1.0]);
    }

    #[test]
    fn representative_ties_pick_earliest() {
        let mut buf = PatternBuffer::new(2);
        buf.push(FeatureVector::new(vec![0.4, 0.2]));
        buf.push(FeatureVector::new(vec![0.2, 0.4]));
        assert_eq!(buf.representative().unwrap().as_slice(), &[1.0, 0.5]);
        assert!(PatternBuffer::new(2).representative().is_none());
    }
}
