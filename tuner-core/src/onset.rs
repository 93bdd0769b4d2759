//! Energy-ratio onset detection.
//!
//! A pluck shows up as a jump in frame RMS. Comparing each frame against the
//! previous one is enough to know how long the current note has been ringing,
//! which is all the smoother needs.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuningError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// Current RMS must exceed the previous frame's RMS by this factor.
    pub ratio: f32,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        Self { ratio: 1.3 }
    }
}

impl OnsetConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.ratio.is_finite() && self.ratio > 0.0) {
            return Err(TuningError::InvalidParameter {
                name: "onset.ratio",
                reason: format!("{} is not a positive number", self.ratio),
            });
        }
        Ok(())
    }
}

/// Per-session onset state.
#[derive(Debug, Clone, Default)]
pub struct OnsetDetector {
    config: OnsetConfig,
    previous_rms: f32,
    last_onset: f64,
}

impl OnsetDetector {
    pub fn new(config: OnsetConfig) -> Self {
        Self {
            config,
            previous_rms: 0.0,
            last_onset: 0.0,
        }
    }

    /// Feeds one frame's RMS level observed at `now` (seconds).
    ///
    /// Returns `true` when the frame is an onset.
    pub fn update(&mut self, rms: f32, now: f64) -> bool {
        let onset = rms > self.previous_rms * self.config.ratio;
        if onset {
            log::debug!(
                "onset at {:.3}s (rms {:.4} > {:.4} x {})",
                now,
                rms,
                self.previous_rms,
                self.config.ratio
            );
            self.last_onset = now;
        }
        self.previous_rms = rms;
        onset
    }

    /// Seconds elapsed between the last onset and `now`.
    pub fn seconds_since_onset(&self, now: f64) -> f64 {
        now - self.last_onset
    }

    pub fn previous_rms(&self) -> f32 {
        self.previous_rms
    }

    pub fn last_onset(&self) -> f64 {
        self.last_onset
    }

    pub fn reset(&mut self) {
        self.previous_rms = 0.0;
        self.last_onset = 0.0;
    }
}
