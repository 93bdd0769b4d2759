//! Dead-zone hysteresis for the "in tune" indicator.
//!
//! The smoothed detune still wanders by fractions of a cent around zero. The
//! gate only latches `tuned` once the value has stayed inside the dead zone
//! for a hold time, and snaps the displayed value to exactly zero while
//! latched.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuningError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Half-width of the dead zone in cents.
    pub deadzone_cents: f32,
    /// Time the value must stay inside the dead zone before latching.
    pub hold_secs: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            deadzone_cents: 0.2,
            hold_secs: 0.2,
        }
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.deadzone_cents.is_finite() && self.deadzone_cents >= 0.0) {
            return Err(TuningError::InvalidParameter {
                name: "stability.deadzone_cents",
                reason: format!("{} is not a non-negative number", self.deadzone_cents),
            });
        }
        if !(self.hold_secs.is_finite() && self.hold_secs >= 0.0) {
            return Err(TuningError::InvalidParameter {
                name: "stability.hold_secs",
                reason: format!("{} is not a non-negative duration", self.hold_secs),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Outside the dead zone.
    Active,
    /// Inside the dead zone, hold time not reached yet.
    Settling,
    /// Latched in tune.
    Tuned,
}

/// Value the gate lets through for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateOutput {
    /// Detune to display, in semitones. Exactly zero while tuned.
    pub detune: f32,
    pub state: GateState,
}

impl GateOutput {
    pub fn tuned(&self) -> bool {
        self.state == GateState::Tuned
    }

    pub fn cents(&self) -> f32 {
        self.detune * 100.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct StabilityGate {
    config: StabilityConfig,
    deadzone_start: Option<f64>,
    tuned: bool,
}

impl StabilityGate {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            deadzone_start: None,
            tuned: false,
        }
    }

    /// Advances the gate with the smoothed detune (semitones) seen at `now`.
    pub fn update(&mut self, smoothed_detune: f32, now: f64) -> GateOutput {
        let cents = smoothed_detune * 100.0;

        if cents.abs() >= self.config.deadzone_cents {
            if self.tuned {
                log::debug!("left dead zone at {:.3}s ({:+.3} cents)", now, cents);
            }
            self.deadzone_start = None;
            self.tuned = false;
            return GateOutput {
                detune: smoothed_detune,
                state: GateState::Active,
            };
        }

        let start = *self.deadzone_start.get_or_insert(now);
        if now - start >= self.config.hold_secs {
            if !self.tuned {
                log::debug!("latched in tune at {:.3}s", now);
            }
            self.tuned = true;
            GateOutput {
                detune: 0.0,
                state: GateState::Tuned,
            }
        } else {
            self.tuned = false;
            GateOutput {
                detune: smoothed_detune,
                state: GateState::Settling,
            }
        }
    }

    pub fn is_tuned(&self) -> bool {
        self.tuned
    }

    pub fn deadzone_start(&self) -> Option<f64> {
        self.deadzone_start
    }

    pub fn reset(&mut self) {
        self.deadzone_start = None;
        self.tuned = false;
    }
}
