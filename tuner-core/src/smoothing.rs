//! # Adaptive Smoothing Module
//!
//! Exponential moving average over the detune value whose weight grows with
//! the time since the last onset. Right after a pluck the estimate is noisy,
//! so new readings barely move the output; once the note rings the output
//! follows the string more closely.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuningError};

/// One step of the smoothing schedule: `alpha` applies from `from_secs` after
/// an onset until the next tier starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmoothingTier {
    pub from_secs: f64,
    pub alpha: f32,
}

/// Step function from seconds-since-onset to EMA coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SmoothingSchedule {
    tiers: Vec<SmoothingTier>,
}

impl Default for SmoothingSchedule {
    fn default() -> Self {
        Self {
            tiers: vec![
                SmoothingTier { from_secs: 0.0, alpha: 0.00075 },
                SmoothingTier { from_secs: 0.05, alpha: 0.001875 },
                SmoothingTier { from_secs: 0.5, alpha: 0.00375 },
            ],
        }
    }
}

impl SmoothingSchedule {
    /// Builds a schedule, checking that it starts at zero and that both the
    /// tier starts and the coefficients strictly increase.
    pub fn new(tiers: Vec<SmoothingTier>) -> Result<Self> {
        let schedule = Self { tiers };
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<()> {
        let first = self
            .tiers
            .first()
            .ok_or_else(|| TuningError::InvalidSchedule("no tiers".into()))?;
        if first.from_secs != 0.0 {
            return Err(TuningError::InvalidSchedule(format!(
                "first tier must start at 0 s, not {} s",
                first.from_secs
            )));
        }
        for tier in &self.tiers {
            if !(tier.alpha > 0.0 && tier.alpha <= 1.0) {
                return Err(TuningError::InvalidSchedule(format!(
                    "alpha {} is outside (0, 1]",
                    tier.alpha
                )));
            }
            if !tier.from_secs.is_finite() {
                return Err(TuningError::InvalidSchedule(format!(
                    "tier start {} is not finite",
                    tier.from_secs
                )));
            }
        }
        for pair in self.tiers.windows(2) {
            if pair[1].from_secs <= pair[0].from_secs || pair[1].alpha <= pair[0].alpha {
                return Err(TuningError::InvalidSchedule(format!(
                    "tiers must increase in start and alpha ({:?} then {:?})",
                    pair[0], pair[1]
                )));
            }
        }
        Ok(())
    }

    pub fn tiers(&self) -> &[SmoothingTier] {
        &self.tiers
    }

    /// Coefficient for a note that has been ringing for `elapsed` seconds.
    pub fn alpha_for(&self, elapsed: f64) -> f32 {
        self.tiers
            .iter()
            .rev()
            .find(|tier| elapsed >= tier.from_secs)
            .or(self.tiers.first())
            .map_or(1.0, |tier| tier.alpha)
    }
}

/// Fractional distance in semitones from the nearest equal-tempered note.
///
/// Positive is sharp. The result lies in [-0.5, 0.5].
pub fn raw_detune(frequency: f32, reference_hz: f32) -> f32 {
    let note_number = crate::tuning::note_number(frequency, reference_hz);
    note_number - note_number.round()
}

/// EMA state for the detune value.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveSmoother {
    schedule: SmoothingSchedule,
    smoothed_detune: f32,
}

impl AdaptiveSmoother {
    pub fn new(schedule: SmoothingSchedule) -> Self {
        Self {
            schedule,
            smoothed_detune: 0.0,
        }
    }

    /// Blends `raw_detune` (semitones) into the running value.
    pub fn update(&mut self, raw_detune: f32, seconds_since_onset: f64) -> f32 {
        let alpha = self.schedule.alpha_for(seconds_since_onset);
        self.smoothed_detune = alpha * raw_detune + (1.0 - alpha) * self.smoothed_detune;
        self.smoothed_detune
    }

    pub fn smoothed_detune(&self) -> f32 {
        self.smoothed_detune
    }

    pub fn schedule(&self) -> &SmoothingSchedule {
        &self.schedule
    }

    pub fn reset(&mut self) {
        self.smoothed_detune = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn default_schedule_steps_up() {
        let schedule = SmoothingSchedule::default();
        assert!(schedule.validate().is_ok());
        assert_eq!(schedule.alpha_for(0.0), 0.00075);
        assert_eq!(schedule.alpha_for(0.049), 0.00075);
        assert_eq!(schedule.alpha_for(0.05), 0.001875);
        assert_eq!(schedule.alpha_for(0.3), 0.001875);
        assert_eq!(schedule.alpha_for(0.5), 0.00375);
        assert_eq!(schedule.alpha_for(120.0), 0.00375);
    }

    #[test]
    fn negative_elapsed_uses_first_tier() {
        assert_eq!(SmoothingSchedule::default().alpha_for(-1.0), 0.00075);
    }

    #[test]
    fn rejects_bad_schedules() {
        assert!(SmoothingSchedule::new(vec![]).is_err());
        assert!(
            SmoothingSchedule::new(vec![SmoothingTier { from_secs: 0.1, alpha: 0.1 }]).is_err()
        );
        assert!(
            SmoothingSchedule::new(vec![
                SmoothingTier { from_secs: 0.0, alpha: 0.2 },
                SmoothingTier { from_secs: 0.2, alpha: 0.1 },
            ])
            .is_err()
        );
        assert!(
            SmoothingSchedule::new(vec![
                SmoothingTier { from_secs: 0.0, alpha: 0.02 },
                SmoothingTier { from_secs: 0.05, alpha: 1.5 },
            ])
            .is_err()
        );
        assert!(
            SmoothingSchedule::new(vec![
                SmoothingTier { from_secs: 0.0, alpha: 0.02 },
                SmoothingTier { from_secs: 0.05, alpha: 0.05 },
                SmoothingTier { from_secs: 0.2, alpha: 0.2 },
            ])
            .is_ok()
        );
    }

    #[test]
    fn raw_detune_is_fractional_semitone() {
        assert_abs_diff_eq!(raw_detune(440.0, 440.0), 0.0);
        // Ten cents sharp of A4.
        let sharp = 440.0 * 2f32.powf(0.1 / 12.0);
        assert_abs_diff_eq!(raw_detune(sharp, 440.0), 0.1, epsilon = 1e-4);
        // A quarter tone below A4 rounds to A4 from below.
        let flat = 440.0 * 2f32.powf(-0.25 / 12.0);
        assert_abs_diff_eq!(raw_detune(flat, 440.0), -0.25, epsilon = 1e-4);
    }

    #[test]
    fn single_step_is_weighted_average() {
        let schedule = SmoothingSchedule::new(vec![SmoothingTier { from_secs: 0.0, alpha: 0.25 }])
            .expect("schedule");
        let mut smoother = AdaptiveSmoother::new(schedule);
        assert_abs_diff_eq!(smoother.update(0.4, 1.0), 0.1);
        assert_abs_diff_eq!(smoother.update(0.4, 1.0), 0.175);
        smoother.reset();
        assert_eq!(smoother.smoothed_detune(), 0.0);
    }

    proptest! {
        #[test]
        fn converges_without_overshoot(
            target in -0.5f32..0.5,
            start in -0.5f32..0.5,
            frames in 1usize..400,
        ) {
            let schedule = SmoothingSchedule::new(vec![
                SmoothingTier { from_secs: 0.0, alpha: 0.02 },
                SmoothingTier { from_secs: 0.05, alpha: 0.05 },
                SmoothingTier { from_secs: 0.2, alpha: 0.2 },
            ]).expect("schedule");
            let mut smoother = AdaptiveSmoother::new(schedule);
            smoother.smoothed_detune = start;

            let mut previous_gap = (target - start).abs();
            for frame in 0..frames {
                let value = smoother.update(target, frame as f64 / 60.0);
                let gap = (target - value).abs();
                prop_assert!(gap <= previous_gap + 1e-6);
                // Never crosses to the other side of the target.
                prop_assert!((value - target) * (start - target) >= -1e-6);
                previous_gap = gap;
            }
        }
    }
}
