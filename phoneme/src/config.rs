//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```yaml
//! onset:
//!   cooldown_ms: 1000
//! matcher:
//!   accept_threshold: 75
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use phonic_audio::{AnalyserConfig, CaptureConfig};

use crate::error::PhonemeError;
use crate::features::FEATURE_BINS;
use crate::matcher::MatcherConfig;
use crate::onset::{OnsetConfig, PeakConfig};
use crate::pattern::PATTERN_LENGTH;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub bins: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self { bins: FEATURE_BINS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub length: usize,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            length: PATTERN_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    pub debounce_ms: u64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self { debounce_ms: 2000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub pre_onset_ms: u64,
    pub post_onset_ms: u64,
    pub grace_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            pre_onset_ms: 300,
            post_onset_ms: 700,
            grace_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserSettings {
    pub fft_size: usize,
    pub smoothing: f64,
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        let d = AnalyserConfig::default();
        Self {
            fft_size: d.fft_size,
            smoothing: d.smoothing,
            min_db: d.min_db,
            max_db: d.max_db,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub features: FeatureSettings,
    pub pattern: PatternSettings,
    pub onset: OnsetConfig,
    pub peak: PeakConfig,
    pub matcher: MatcherConfig,
    pub persistence: PersistenceSettings,
    pub capture: CaptureSettings,
    pub analyser: AnalyserSettings,
}

impl EngineConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, PhonemeError> {
        let cfg: Self = serde_yaml::from_str(s).map_err(|e| PhonemeError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(s: &str) -> Result<Self, PhonemeError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| PhonemeError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a `.json` file as JSON and anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PhonemeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PhonemeError::Config(format!("{}: {e}", path.display())))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    pub fn validate(&self) -> Result<(), PhonemeError> {
        if self.features.bins == 0 {
            return Err(PhonemeError::Config("features.bins must be positive".into()));
        }
        if self.pattern.length == 0 {
            return Err(PhonemeError::Config("pattern.length must be positive".into()));
        }
        if self.analyser.fft_size < 2 * self.features.bins {
            return Err(PhonemeError::Config(format!(
                "analyser.fft_size {} yields fewer bins than features.bins {}",
                self.analyser.fft_size, self.features.bins
            )));
        }
        if !(0.0..1.0).contains(&self.analyser.smoothing) {
            return Err(PhonemeError::Config("analyser.smoothing must be in [0, 1)".into()));
        }
        if self.analyser.min_db >= self.analyser.max_db {
            return Err(PhonemeError::Config("analyser.min_db must be below max_db".into()));
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            pre_onset: Duration::from_millis(self.capture.pre_onset_ms),
            post_onset: Duration::from_millis(self.capture.post_onset_ms),
            grace: Duration::from_millis(self.capture.grace_ms),
        }
    }

    pub fn analyser_config(&self) -> AnalyserConfig {
        AnalyserConfig {
            fft_size: self.analyser.fft_size,
            smoothing: self.analyser.smoothing,
            min_db: self.analyser.min_db,
            max_db: self.analyser.max_db,
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persistence.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.features.bins, 64);
        assert_eq!(cfg.pattern.length, 30);
        assert_eq!(cfg.onset.cooldown_ms, 1500);
        assert_eq!(cfg.peak.cooldown_ms, 500);
        assert_eq!(cfg.matcher.accept_threshold, 80.0);
        assert_eq!(cfg.debounce(), Duration::from_secs(2));
        assert_eq!(cfg.capture_config(), CaptureConfig::default());
        assert_eq!(cfg.analyser_config(), AnalyserConfig::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let cfg = EngineConfig::from_yaml_str(
            "onset:\n  cooldown_ms: 1000\n  nasal:\n    volume: 3\n    concentration: 1.2\nmatcher:\n  accept_threshold: 75\n",
        )
        .unwrap();
        assert_eq!(cfg.onset.cooldown_ms, 1000);
        assert_eq!(cfg.onset.nasal.volume, 3.0);
        assert_eq!(cfg.onset.liquid.volume, 8.0);
        assert_eq!(cfg.matcher.accept_threshold, 75.0);
        assert_eq!(cfg.matcher.reject_margin, 5.0);
    }

    #[test]
    fn json_and_validation() {
        let cfg = EngineConfig::from_json_str(r#"{"persistence":{"debounce_ms":500}}"#).unwrap();
        assert_eq!(cfg.debounce(), Duration::from_millis(500));

        assert!(matches!(
            EngineConfig::from_json_str(r#"{"pattern":{"length":0}}"#),
            Err(PhonemeError::Config(_))
        ));
        assert!(EngineConfig::from_yaml_str("analyser:\n  fft_size: 64\n").is_err());
        assert!(EngineConfig::from_yaml_str("onset: [1, 2]").is_err());
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("engine.json");
        std::fs::write(&json, r#"{"capture":{"post_onset_ms":500}}"#).unwrap();
        assert_eq!(EngineConfig::load(&json).unwrap().capture.post_onset_ms, 500);

        let yaml = dir.path().join("engine.yaml");
        std::fs::write(&yaml, "capture:\n  pre_onset_ms: 200\n").unwrap();
        assert_eq!(EngineConfig::load(&yaml).unwrap().capture.pre_onset_ms, 200);

        assert!(EngineConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
