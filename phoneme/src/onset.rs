//! Onset detection.
//!
//! [`OnsetDetector`] gates match evaluation during a game session. Its
//! cooldown starts only when a match is accepted, so rejected evaluations
//! may fire again on the next tick.
//!
//! [`PeakDetector`] gates snapshot capture during calibration. It is more
//! liberal and its shorter cooldown starts on every peak.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::letter::{Letter, PhoneticClass};

/// Volume and concentration an onset must strictly exceed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub volume: f32,
    pub concentration: f32,
}

/// The volume and concentration that triggered an onset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Onset {
    pub volume: f32,
    pub concentration: f32,
}

/// Match-trigger thresholds per phonetic class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    pub nasal: Thresholds,
    pub liquid: Thresholds,
    /// Vowels, plosives and fricatives.
    pub default: Thresholds,
    pub cooldown_ms: u64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self {
            nasal: Thresholds {
                volume: 2.0,
                concentration: 1.5,
            },
            liquid: Thresholds {
                volume: 8.0,
                concentration: 2.0,
            },
            default: Thresholds {
                volume: 15.0,
                concentration: 2.0,
            },
            cooldown_ms: 1500,
        }
    }
}

impl OnsetConfig {
    pub fn thresholds(&self, letter: Letter) -> Thresholds {
        match letter.class() {
            PhoneticClass::Nasal => self.nasal,
            PhoneticClass::Liquid => self.liquid,
            _ => self.default,
        }
    }
}

pub struct OnsetDetector {
    config: OnsetConfig,
    last_accept: Option<Instant>,
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig) -> Self {
        Self {
            config,
            last_accept: None,
        }
    }

    pub fn config(&self) -> &OnsetConfig {
        &self.config
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.config.cooldown_ms)
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.last_accept
            .is_some_and(|t| now.saturating_duration_since(t) < self.cooldown())
    }

    /// Returns the onset if `letter` should be evaluated now.
    pub fn should_trigger(
        &self,
        volume: f32,
        concentration: f32,
        letter: Letter,
        now: Instant,
    ) -> Option<Onset> {
        if self.in_cooldown(now) {
            return None;
        }
        let t = self.config.thresholds(letter);
        (volume > t.volume && concentration > t.concentration).then_some(Onset {
            volume,
            concentration,
        })
    }

    /// Starts the cooldown.
    pub fn mark_accepted(&mut self, now: Instant) {
        self.last_accept = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_accept = None;
    }
}

/// Calibration peak thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    pub volume_nasal: f32,
    pub volume_default: f32,
    /// Nasals and liquids.
    pub concentration_soft: f32,
    pub concentration_fricative: f32,
    pub concentration_default: f32,
    pub cooldown_ms: u64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            volume_nasal: 2.0,
            volume_default: 15.0,
            concentration_soft: 1.5,
            concentration_fricative: 1.8,
            concentration_default: 2.0,
            cooldown_ms: 500,
        }
    }
}

impl PeakConfig {
    pub fn thresholds(&self, letter: Letter) -> Thresholds {
        let class = letter.class();
        let volume = match class {
            PhoneticClass::Nasal => self.volume_nasal,
            _ => self.volume_default,
        };
        let concentration = match class {
            PhoneticClass::Nasal | PhoneticClass::Liquid => self.concentration_soft,
            PhoneticClass::Fricative => self.concentration_fricative,
            _ => self.concentration_default,
        };
        Thresholds {
            volume,
            concentration,
        }
    }
}

pub struct PeakDetector {
    config: PeakConfig,
    last_peak: Option<Instant>,
}

impl PeakDetector {
    pub fn new(config: PeakConfig) -> Self {
        Self {
            config,
            last_peak: None,
        }
    }

    /// Returns the onset and starts the cooldown if this tick is a peak.
    pub fn detect(
        &mut self,
        volume: f32,
        concentration: f32,
        letter: Letter,
        now: Instant,
    ) -> Option<Onset> {
        let cooldown = Duration::from_millis(self.config.cooldown_ms);
        if self
            .last_peak
            .is_some_and(|t| now.saturating_duration_since(t) < cooldown)
        {
            return None;
        }
        let t = self.config.thresholds(letter);
        if volume > t.volume && concentration > t.concentration {
            self.last_peak = Some(now);
            Some(Onset {
                volume,
                concentration,
            })
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.last_peak = None;
    }
}
