//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a monophonic signal
//! using time-domain autocorrelation (ACF2+), the same approach used by
//! many browser and pedal tuners for plucked strings.
//!
//! ## Features
//! - RMS noise gate to reject silence
//! - Edge trimming of near-silent leading/trailing samples
//! - Autocorrelation peak picking past the zero-lag lobe
//! - Parabolic interpolation for sub-sample accuracy

use serde::{Deserialize, Serialize};

use crate::audio::SampleWindow;
use crate::error::{Result, TuningError};

/// A frequency estimate in Hz, or `None` when the frame carries no usable pitch.
pub type PitchEstimate = Option<f32>;

/// Tunables for the autocorrelation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Windows with an RMS below this are treated as silence.
    pub silence_rms: f32,
    /// Amplitude that marks the start/end of the interior region kept for analysis.
    pub trim_threshold: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            silence_rms: 0.01,
            trim_threshold: 0.2,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.silence_rms.is_finite() && self.silence_rms >= 0.0) {
            return Err(TuningError::InvalidParameter {
                name: "estimator.silence_rms",
                reason: format!("{} is not a non-negative number", self.silence_rms),
            });
        }
        if !(self.trim_threshold.is_finite() && self.trim_threshold >= 0.0) {
            return Err(TuningError::InvalidParameter {
                name: "estimator.trim_threshold",
                reason: format!("{} is not a non-negative number", self.trim_threshold),
            });
        }
        Ok(())
    }
}

/// Root-mean-square level of a buffer. An empty buffer has an RMS of zero.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Stateless ACF2+ pitch estimator.
#[derive(Debug, Clone, Default)]
pub struct PitchEstimator {
    config: EstimatorConfig,
}

impl PitchEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimates the fundamental frequency of one sample window.
    ///
    /// # Arguments
    /// * `window` - Samples and the rate they were captured at
    ///
    /// # Returns
    /// * `Some(frequency)` - Estimated frequency in Hz
    /// * `None` - Silence, too few samples after trimming, or no usable
    ///   autocorrelation peak
    pub fn estimate(&self, window: &SampleWindow) -> PitchEstimate {
        self.estimate_with_rms(window, rms(&window.samples))
    }

    /// Same as [`estimate`](Self::estimate) for callers that already know the
    /// window's RMS.
    pub(crate) fn estimate_with_rms(&self, window: &SampleWindow, level: f32) -> PitchEstimate {
        // --- Noise Gate ---
        if level < self.config.silence_rms {
            return None;
        }

        let slice = trim_edges(&window.samples, self.config.trim_threshold);
        if slice.len() < 3 {
            return None;
        }

        let acf = autocorrelate(slice);
        let lag = find_period(&acf)?;

        let frequency = window.sample_rate / lag;
        if frequency.is_finite() && frequency > 0.0 {
            Some(frequency)
        } else {
            None
        }
    }
}

/// Returns the interior of `samples` between the first and last sample whose
/// magnitude reaches `threshold`. A side with no such sample keeps its
/// original boundary.
pub fn trim_edges(samples: &[f32], threshold: f32) -> &[f32] {
    let start = samples
        .iter()
        .position(|s| s.abs() >= threshold)
        .unwrap_or(0);
    let end = samples
        .iter()
        .rposition(|s| s.abs() >= threshold)
        .map_or(samples.len(), |i| i + 1);

    if start >= end {
        return samples;
    }
    &samples[start..end]
}

/// Autocorrelation of `slice` for every lag from 0 to `slice.len() - 1`.
///
/// `C[i] = Σ slice[j] * slice[j + i]` over all valid `j`. Quadratic in the
/// slice length.
pub fn autocorrelate(slice: &[f32]) -> Vec<f32> {
    let n = slice.len();
    (0..n)
        .map(|lag| {
            slice[..n - lag]
                .iter()
                .zip(&slice[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Picks the fundamental period (in samples, fractional) from an
/// autocorrelation array.
///
/// Skips the descent of the zero-lag lobe, takes the highest remaining peak
/// and refines it with a parabola through its neighbours.
fn find_period(acf: &[f32]) -> Option<f32> {
    let len = acf.len();

    // Walk down the zero-lag lobe.
    let mut descent_end = 0;
    while descent_end + 1 < len && acf[descent_end] > acf[descent_end + 1] {
        descent_end += 1;
    }
    if descent_end + 1 >= len {
        // Never turned back up: no periodicity inside the slice.
        return None;
    }

    let mut best_lag = descent_end;
    let mut best_value = f32::NEG_INFINITY;
    for (lag, &value) in acf.iter().enumerate().skip(descent_end) {
        if value > best_value {
            best_value = value;
            best_lag = lag;
        }
    }
    if best_lag == 0 {
        return None;
    }

    // --- Parabolic interpolation for better precision ---
    let mut period = best_lag as f32;
    if best_lag + 1 < len {
        let x1 = acf[best_lag - 1];
        let x2 = acf[best_lag];
        let x3 = acf[best_lag + 1];
        let a = (x1 + x3 - 2.0 * x2) / 2.0;
        let b = (x3 - x1) / 2.0;
        // A first maximum never has a flat parabola except through rounding.
        if a != 0.0 {
            period -= b / (2.0 * a);
        }
    }

    (period.is_finite() && period > 0.0).then_some(period)
}
