//! Exemplar matching with an explicit reject class.
//!
//! The current pattern is compared against every positive and negative
//! snapshot relevant to the target letter. Negatives veto: when the best
//! negative beats the best positive by `reject_margin` the sound is
//! rejected no matter how good the positive match is. A strong positive
//! is still not enough on its own; the target must also be the letter the
//! pattern sounds most like across the whole store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exemplar::ExemplarStore;
use crate::features::FeatureVector;
use crate::letter::Letter;
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// A positive score must exceed this to accept.
    pub accept_threshold: f32,
    /// Reject when `negative - positive >= reject_margin`.
    pub reject_margin: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            accept_threshold: 80.0,
            reject_margin: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected,
    /// The target passed its own test but another letter matched better.
    Outranked(Letter),
    None,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accepted => f.write_str("accepted"),
            Decision::Rejected => f.write_str("rejected"),
            Decision::Outranked(by) => write!(f, "outranked-by-{by}"),
            Decision::None => f.write_str("none"),
        }
    }
}

/// Full classification detail for one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchInfo {
    pub target: Letter,
    pub positive: Option<Snapshot>,
    pub positive_score: f32,
    pub negative: Option<Snapshot>,
    pub negative_score: f32,
    pub decision: Decision,
    /// What the pattern sounds most like across all letters.
    pub prediction: MatchResult,
}

/// Best letter across the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub score: f32,
    /// `None` when no letter scores above zero.
    pub predicted: Option<Letter>,
}

/// Similarity in `[0, 100]` from the mean absolute difference.
///
/// Compares over the shorter of the two vectors; identical vectors score 100.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let total: f32 = a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum();
    (100.0 - total / n as f32 * 100.0).max(0.0)
}

type Best<'a> = Option<(&'a Snapshot, f32)>;

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Best positive and best negative among `letter`'s candidates.
    fn best<'a>(&self, pattern: &FeatureVector, letter: Letter, store: &'a ExemplarStore) -> (Best<'a>, Best<'a>) {
        let mut positive: Best<'a> = None;
        let mut negative: Best<'a> = None;

        for snap in store.candidates(letter) {
            let score = similarity(pattern.as_slice(), snap.pattern.as_slice());
            let slot = if snap.is_negative {
                &mut negative
            } else {
                &mut positive
            };
            if slot.is_none_or(|(_, best)| score > best) {
                *slot = Some((snap, score));
            }
        }
        (positive, negative)
    }

    fn vetoed(&self, positive_score: f32, negative: Best<'_>) -> bool {
        negative.is_some_and(|(_, score)| score - positive_score >= self.config.reject_margin)
    }

    /// How well `pattern` fits `letter`: its best positive score, or zero
    /// when a negative vetoes it.
    pub fn letter_score(&self, pattern: &FeatureVector, letter: Letter, store: &ExemplarStore) -> f32 {
        let (positive, negative) = self.best(pattern, letter, store);
        let score = positive.map_or(0.0, |(_, s)| s);
        if self.vetoed(score, negative) { 0.0 } else { score }
    }

    /// Classifies `pattern` (the buffer's representative) against `target`.
    pub fn evaluate(&self, pattern: &FeatureVector, target: Letter, store: &ExemplarStore) -> MatchInfo {
        let (positive, negative) = self.best(pattern, target, store);
        let positive_score = positive.map_or(0.0, |(_, s)| s);
        let negative_score = negative.map_or(0.0, |(_, s)| s);
        let prediction = self.predict(pattern, store);

        let decision = if self.vetoed(positive_score, negative) {
            Decision::Rejected
        } else if positive.is_some() && positive_score > self.config.accept_threshold {
            match prediction.predicted {
                Some(letter) if letter == target => Decision::Accepted,
                Some(letter) => Decision::Outranked(letter),
                None => Decision::None,
            }
        } else {
            Decision::None
        };

        MatchInfo {
            target,
            positive: positive.map(|(s, _)| s.clone()),
            positive_score,
            negative: negative.map(|(s, _)| s.clone()),
            negative_score,
            decision,
            prediction,
        }
    }

    /// What the pattern sounds most like, regardless of target.
    ///
    /// Every letter is scored with [`Matcher::letter_score`]; ties go to the
    /// alphabetically earlier letter.
    pub fn predict(&self, pattern: &FeatureVector, store: &ExemplarStore) -> MatchResult {
        let mut best = MatchResult::default();
        for letter in store.letters() {
            let score = self.letter_score(pattern, letter, store);
            if score > best.score {
                best = MatchResult {
                    score,
                    predicted: Some(letter),
                };
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_BINS;
    use crate::letter::ProfileId;

    fn letter(c: char) -> Letter {
        Letter::new(c).unwrap()
    }

    fn kid() -> ProfileId {
        ProfileId::new("kid").unwrap()
    }

    fn flat(v: f32) -> FeatureVector {
        FeatureVector::new(vec![v; FEATURE_BINS])
    }

    /// A pattern whose first `k` bins are 1 and the rest 0.
    fn step(k: usize) -> FeatureVector {
        FeatureVector::new((0..FEATURE_BINS).map(|i| if i < k { 1.0 } else { 0.0 }).collect())
    }

    #[test]
    fn similarity_range() {
        assert_eq!(similarity(&[0.2, 0.4], &[0.2, 0.4]), 100.0);
        assert_eq!(similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(similarity(&[0.0, 1.0], &[0.5, 1.0]), 75.0);
        assert_eq!(similarity(&[], &[1.0]), 0.0);
        // Shorter length wins.
        assert_eq!(similarity(&[1.0], &[1.0, 0.0, 0.0]), 100.0);
    }

    #[test]
    fn identical_positive_accepts_at_max() {
        let mut store = ExemplarStore::default();
        let m = letter('m');
        store.calibrate_letter(m);
        store.add_positive(m, &step(16), kid(), None).unwrap();

        let info = Matcher::default().evaluate(&step(16), m, &store);
        assert_eq!(info.decision, Decision::Accepted);
        assert_eq!(info.positive_score, 100.0);
        assert!(info.negative.is_none());
    }

    #[test]
    fn negative_vetoes_strong_positive() {
        let mut store = ExemplarStore::default();
        let s = letter('s');
        store.calibrate_letter(s);
        // Live pattern is step(32). Positive differs in 6 bins (90.6),
        // negative is identical (100).
        store.add_positive(s, &step(26), kid(), None).unwrap();
        store.add_negative(s, &step(32), kid(), None).unwrap();

        let info = Matcher::default().evaluate(&step(32), s, &store);
        assert!(info.positive_score > 80.0);
        assert_eq!(info.decision, Decision::Rejected);
        assert!(info.negative_score - info.positive_score >= 5.0);
    }

    #[test]
    fn close_negative_does_not_veto() {
        let mut store = ExemplarStore::default();
        let s = letter('s');
        store.calibrate_letter(s);
        store.add_positive(s, &step(32), kid(), None).unwrap();
        store.add_negative(s, &step(30), kid(), None).unwrap();

        let info = Matcher::default().evaluate(&step(31), s, &store);
        assert_eq!(info.positive_score, info.negative_score);
        assert_eq!(info.decision, Decision::Accepted);
    }

    #[test]
    fn foreign_global_negative_vetoes() {
        let mut store = ExemplarStore::default();
        let (a, t) = (letter('a'), letter('t'));
        store.calibrate_letter(a);
        store.calibrate_letter(t);
        store.add_positive(a, &step(20), kid(), None).unwrap();
        store.add_global_negative(t, &step(40), kid(), None).unwrap();

        let info = Matcher::default().evaluate(&step(40), a, &store);
        assert_eq!(info.decision, Decision::Rejected);
        assert_eq!(info.negative.unwrap().label, t);
    }

    #[test]
    fn weak_positive_is_none() {
        let mut store = ExemplarStore::default();
        let a = letter('a');
        store.calibrate_letter(a);
        store.add_positive(a, &step(64), kid(), None).unwrap();
        // 0.5 everywhere vs 1.0 everywhere -> 50.
        let info = Matcher::default().evaluate(&flat(0.5), a, &store);
        assert_eq!(info.positive_score, 50.0);
        assert_eq!(info.decision, Decision::None);
    }

    #[test]
    fn no_positives_is_well_formed() {
        let mut store = ExemplarStore::default();
        let a = letter('a');
        store.calibrate_letter(a);
        let info = Matcher::default().evaluate(&step(8), a, &store);
        assert!(info.positive.is_none());
        assert_eq!(info.positive_score, 0.0);
        assert_eq!(info.decision, Decision::None);
    }

    #[test]
    fn predict_reports_best_letter() {
        let mut store = ExemplarStore::default();
        let (m, s) = (letter('m'), letter('s'));
        store.calibrate_letter(m);
        store.calibrate_letter(s);
        store.add_positive(m, &step(10), kid(), None).unwrap();
        store.add_positive(s, &step(50), kid(), None).unwrap();

        let result = Matcher::default().predict(&step(48), &store);
        assert_eq!(result.predicted, Some(s));
        assert!(result.score > 90.0);

        let empty = Matcher::default().predict(&step(48), &ExemplarStore::default());
        assert_eq!(empty.predicted, None);
    }

    #[test]
    fn closer_letter_outranks_target() {
        let mut store = ExemplarStore::default();
        let (m, n) = (letter('m'), letter('n'));
        store.calibrate_letter(m);
        store.calibrate_letter(n);
        store.add_positive(m, &step(20), kid(), None).unwrap();
        store.add_positive(n, &step(24), kid(), None).unwrap();

        // Clearly n, yet still 93.75 against m.
        let info = Matcher::default().evaluate(&step(24), m, &store);
        assert_eq!(info.positive_score, 93.75);
        assert_eq!(info.decision, Decision::Outranked(n));
        assert_eq!(info.prediction.predicted, Some(n));

        let info = Matcher::default().evaluate(&step(24), n, &store);
        assert_eq!(info.decision, Decision::Accepted);
    }

    #[test]
    fn vetoed_letter_is_not_predicted() {
        let mut store = ExemplarStore::default();
        let (m, n) = (letter('m'), letter('n'));
        store.calibrate_letter(m);
        store.calibrate_letter(n);
        store.add_positive(m, &step(20), kid(), None).unwrap();
        // n has the best positive, but its own negative sits right on the sound.
        store.add_positive(n, &step(30), kid(), None).unwrap();
        store.add_negative(n, &step(24), kid(), None).unwrap();

        let matcher = Matcher::default();
        assert_eq!(matcher.letter_score(&step(24), n, &store), 0.0);

        let result = matcher.predict(&step(24), &store);
        assert_eq!(result.predicted, Some(m));
        assert_eq!(result.score, 93.75);

        let info = matcher.evaluate(&step(24), m, &store);
        assert_eq!(info.decision, Decision::Accepted);
    }

    #[test]
    fn decision_display() {
        assert_eq!(Decision::Outranked(letter('n')).to_string(), "outranked-by-n");
        assert_eq!(Decision::Accepted.to_string(), "accepted");
    }
}
