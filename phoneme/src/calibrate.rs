//! Calibration: collecting positive snapshots for one letter.
//!
//! The calibrator watches every tick for a peak, freezes the pattern that
//! produced it and asks the onset capture for a clip. The take then waits
//! for the caller to accept or retry it; no further peaks are taken until
//! it does.

use std::time::Instant;

use phonic_audio::{CaptureError, CaptureHandle, OnsetCapture};

use crate::features::{FeatureVector, Features};
use crate::letter::{Letter, ProfileId};
use crate::onset::{Onset, PeakConfig, PeakDetector};
use crate::pattern::PatternBuffer;

/// Positive snapshots suggested per letter.
pub const SNAPSHOTS_NEEDED: usize = 5;

/// A frozen peak awaiting accept or retry.
pub struct PendingTake {
    pub pattern: FeatureVector,
    pub onset: Onset,
    capture: Option<CaptureHandle>,
}

impl PendingTake {
    pub fn has_clip(&self) -> bool {
        self.capture.is_some()
    }

    /// Splits the take into its pattern and the clip still being recorded.
    pub fn into_parts(self) -> (FeatureVector, Option<CaptureHandle>) {
        (self.pattern, self.capture)
    }
}

pub struct Calibrator {
    letter: Letter,
    owner: ProfileId,
    peak: PeakDetector,
    pending: Option<PendingTake>,
    accepted: usize,
}

impl Calibrator {
    pub fn new(letter: Letter, owner: ProfileId, config: PeakConfig) -> Self {
        Self {
            letter,
            owner,
            peak: PeakDetector::new(config),
            pending: None,
            accepted: 0,
        }
    }

    pub fn letter(&self) -> Letter {
        self.letter
    }

    pub fn owner(&self) -> &ProfileId {
        &self.owner
    }

    /// Checks one tick for a peak.
    ///
    /// On a peak the buffer's representative pattern (or the live frame if
    /// the buffer is still empty) is frozen and a clip is requested. A
    /// silent pattern is not taken.
    pub fn observe(
        &mut self,
        features: &Features,
        buffer: &PatternBuffer,
        now: Instant,
        capture: &OnsetCapture,
    ) -> Option<Onset> {
        if self.pending.is_some() {
            return None;
        }
        let onset = self
            .peak
            .detect(features.volume, features.concentration, self.letter, now)?;

        let pattern = buffer
            .representative()
            .unwrap_or_else(|| features.pattern.to_normalized());
        if pattern.is_silent() {
            return None;
        }

        let handle = match capture.capture() {
            Ok(handle) => Some(handle),
            Err(CaptureError::Busy) => {
                tracing::debug!(letter = %self.letter, "calibrate: capture busy, taking pattern only");
                None
            }
            Err(CaptureError::NotBuffering) => None,
        };

        tracing::info!(
            letter = %self.letter,
            volume = onset.volume,
            concentration = onset.concentration,
            "calibrate: peak"
        );
        self.pending = Some(PendingTake {
            pattern,
            onset,
            capture: handle,
        });
        Some(onset)
    }

    pub fn pending(&self) -> Option<&PendingTake> {
        self.pending.as_ref()
    }

    pub fn take(&mut self) -> Option<PendingTake> {
        self.pending.take()
    }

    /// Discards the pending take.
    pub fn retry(&mut self) {
        self.pending = None;
        self.peak.reset();
    }

    pub fn record_accepted(&mut self) {
        self.accepted += 1;
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn remaining(&self) -> usize {
        SNAPSHOTS_NEEDED.saturating_sub(self.accepted)
    }

    pub fn is_complete(&self) -> bool {
        self.accepted >= SNAPSHOTS_NEEDED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use phonic_audio::{CaptureConfig, Format};

    use crate::features::FEATURE_BINS;

    fn features(volume: f32, concentration: f32) -> Features {
        let mut v = vec![0.05; FEATURE_BINS];
        v[10] = 0.6;
        Features {
            pattern: FeatureVector::new(v),
            volume,
            concentration,
        }
    }

    fn capture() -> OnsetCapture {
        let c = OnsetCapture::new(Format::mono(1000), CaptureConfig::default());
        c.start_buffering();
        c
    }

    fn calibrator(c: char) -> Calibrator {
        Calibrator::new(
            Letter::new(c).unwrap(),
            ProfileId::new("kid-1").unwrap(),
            PeakConfig::default(),
        )
    }

    #[test]
    fn peak_freezes_pattern_and_requests_clip() {
        let mut cal = calibrator('m');
        let cap = capture();
        let buffer = PatternBuffer::default();
        let t0 = Instant::now();

        assert!(cal.observe(&features(1.0, 3.0), &buffer, t0, &cap).is_none());
        let onset = cal.observe(&features(3.0, 1.6), &buffer, t0, &cap).unwrap();
        assert_eq!(onset.volume, 3.0);
        assert!(cap.is_capturing());

        let take = cal.pending().unwrap();
        assert!(take.has_clip());
        assert_eq!(take.pattern.max(), 1.0);

        // Held until accept or retry.
        assert!(
            cal.observe(&features(3.0, 1.6), &buffer, t0 + Duration::from_secs(1), &cap)
                .is_none()
        );
    }

    #[test]
    fn fricatives_need_more_concentration() {
        let mut cal = calibrator('s');
        let cap = capture();
        let buffer = PatternBuffer::default();
        let t0 = Instant::now();
        assert!(cal.observe(&features(20.0, 1.7), &buffer, t0, &cap).is_none());
        assert!(cal.observe(&features(20.0, 1.9), &buffer, t0, &cap).is_some());
    }

    #[test]
    fn silent_frame_is_not_taken() {
        let mut cal = calibrator('m');
        let cap = capture();
        let silent = Features {
            pattern: FeatureVector::new(vec![0.0; FEATURE_BINS]),
            volume: 5.0,
            concentration: 2.0,
        };
        assert!(cal.observe(&silent, &PatternBuffer::default(), Instant::now(), &cap).is_none());
        assert!(cal.pending().is_none());
        assert!(!cap.is_capturing());
    }

    #[test]
    fn retry_and_progress() {
        let mut cal = calibrator('m');
        let cap = capture();
        let buffer = PatternBuffer::default();
        let t0 = Instant::now();

        cal.observe(&features(3.0, 1.6), &buffer, t0, &cap);
        cal.retry();
        assert!(cal.pending().is_none());
        assert_eq!(cal.remaining(), SNAPSHOTS_NEEDED);

        for _ in 0..SNAPSHOTS_NEEDED {
            cal.record_accepted();
        }
        assert!(cal.is_complete());
        assert_eq!(cal.remaining(), 0);
    }

    #[test]
    fn take_without_audio_has_no_clip() {
        let mut cal = calibrator('m');
        let cap = OnsetCapture::new(Format::mono(1000), CaptureConfig::default());
        cal.observe(&features(3.0, 1.6), &PatternBuffer::default(), Instant::now(), &cap);

        let take = cal.take().unwrap();
        assert!(!take.has_clip());
        let (pattern, clip) = take.into_parts();
        assert!(!pattern.is_silent());
        assert!(clip.is_none());
    }
}
