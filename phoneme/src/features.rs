//! Spectral features computed once per tick.

use serde::{Deserialize, Serialize};

/// Default number of feature bins.
pub const FEATURE_BINS: usize = 64;

/// Full scale of a byte frequency bin.
const BYTE_SCALE: f32 = 255.0;

/// A fixed-length vector of magnitudes in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    /// Wraps values, clamping into `[0, 1]` and zeroing non-finite entries.
    pub fn new(values: Vec<f32>) -> Self {
        FeatureVector(
            values
                .into_iter()
                .map(|v| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 })
                .collect(),
        )
    }

    /// Scales `values` so the largest becomes 1. All-zero input stays zero.
    pub fn normalized(values: &[f32]) -> Self {
        let max = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max);
        if max > 0.0 {
            FeatureVector::new(values.iter().map(|v| v / max).collect())
        } else {
            FeatureVector::new(values.to_vec())
        }
    }

    /// This vector rescaled to max 1.
    pub fn to_normalized(&self) -> Self {
        FeatureVector::normalized(&self.0)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all bins.
    pub fn energy(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }

    /// True when every bin is zero (or there are none).
    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// One tick's worth of features.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Features {
    /// Downsampled spectrum on the byte scale (`bin / 255`).
    pub pattern: FeatureVector,
    /// Mean spectrum magnitude, `mean / 128 * 100`.
    pub volume: f32,
    /// Peak-to-mean ratio of the downsampled spectrum.
    pub concentration: f32,
}

/// Turns byte frequency data into [`Features`].
///
/// Pure: the same spectrum always yields the same features.
#[derive(Debug, Clone, Copy)]
pub struct FeatureExtractor {
    bins: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FEATURE_BINS)
    }
}

impl FeatureExtractor {
    pub fn new(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn extract(&self, spectrum: &[u8]) -> Features {
        let grouped = self.downsample(spectrum);
        Features {
            volume: volume(spectrum),
            concentration: concentration(&grouped),
            pattern: FeatureVector::new(grouped.iter().map(|v| v / BYTE_SCALE).collect()),
        }
    }

    /// Means of `bins` contiguous groups of `floor(len / bins)` values.
    ///
    /// A spectrum shorter than `bins` uses groups of one and leaves the
    /// trailing bins at zero.
    pub fn downsample(&self, spectrum: &[u8]) -> Vec<f32> {
        let group = (spectrum.len() / self.bins).max(1);
        (0..self.bins)
            .map(|i| {
                let start = (i * group).min(spectrum.len());
                let end = (start + group).min(spectrum.len());
                let sum: u32 = spectrum[start..end].iter().map(|&b| b as u32).sum();
                sum as f32 / group as f32
            })
            .collect()
    }
}

/// Mean magnitude scaled so a flat half-scale spectrum reads 100.
pub fn volume(spectrum: &[u8]) -> f32 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let sum: u64 = spectrum.iter().map(|&b| b as u64).sum();
    sum as f32 / spectrum.len() as f32 / 128.0 * 100.0
}

/// Peak-to-mean ratio; 0 for an all-zero vector.
pub fn concentration(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    if mean <= 0.0 {
        return 0.0;
    }
    values.iter().copied().fold(0.0, f32::max) / mean
}
