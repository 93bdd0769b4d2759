//! # Needle Display Mapping
//!
//! Converts a cent deviation into a needle angle for an arc gauge. The first
//! couple of cents around zero get a linear, generous share of the arc; the
//! rest of the range is compressed with a power law so a string that is far
//! off still lands on the gauge.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TuningError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Full-scale deviation in cents; larger values are clamped.
    pub range_cents: f32,
    /// Needle angle at full scale, in radians.
    pub max_angle: f32,
    /// Width of the linear region around zero, in cents.
    pub inner_threshold_cents: f32,
    /// Needle angle at the edge of the linear region, in radians.
    pub inner_angle: f32,
    /// Power-law exponent for the outer region; below 1 compresses.
    pub exponent: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let max_angle = std::f32::consts::FRAC_PI_3;
        Self {
            range_cents: 100.0,
            max_angle,
            inner_threshold_cents: 2.0,
            inner_angle: max_angle / 3.0,
            exponent: 0.3,
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &'static str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(TuningError::InvalidParameter {
                    name,
                    reason: format!("{value} is not a positive number"),
                })
            }
        };
        positive("display.range_cents", self.range_cents)?;
        positive("display.max_angle", self.max_angle)?;
        positive("display.inner_threshold_cents", self.inner_threshold_cents)?;
        positive("display.inner_angle", self.inner_angle)?;
        positive("display.exponent", self.exponent)?;
        if self.inner_threshold_cents >= self.range_cents {
            return Err(TuningError::InvalidParameter {
                name: "display.inner_threshold_cents",
                reason: "must be below range_cents".into(),
            });
        }
        if self.inner_angle > self.max_angle {
            return Err(TuningError::InvalidParameter {
                name: "display.inner_angle",
                reason: "must not exceed max_angle".into(),
            });
        }
        Ok(())
    }
}

/// One tick mark on the gauge scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaugeTick {
    pub cents: f32,
    /// Offset from vertical, in radians.
    pub angle: f32,
    /// Major ticks carry a label.
    pub major: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DisplayMapper {
    config: DisplayConfig,
}

impl DisplayMapper {
    pub fn new(config: DisplayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Needle angle in radians for a deviation in cents.
    ///
    /// Odd-symmetric, zero at zero, non-decreasing in magnitude and bounded
    /// by `max_angle`.
    pub fn needle_angle(&self, cents: f32) -> f32 {
        let c = &self.config;
        if cents.is_nan() {
            return 0.0;
        }
        let clamped = cents.clamp(-c.range_cents, c.range_cents);
        let magnitude = clamped.abs();

        let offset = if magnitude <= c.inner_threshold_cents {
            magnitude / c.inner_threshold_cents * c.inner_angle
        } else {
            let rest = (magnitude - c.inner_threshold_cents)
                / (c.range_cents - c.inner_threshold_cents);
            c.inner_angle + rest.powf(c.exponent) * (c.max_angle - c.inner_angle)
        };

        offset.min(c.max_angle).copysign(clamped)
    }

    /// Angle of a scale mark at `cents`, using a single power curve across
    /// the whole range.
    pub fn tick_angle(&self, cents: f32) -> f32 {
        let c = &self.config;
        let norm = (cents / c.range_cents).clamp(-1.0, 1.0);
        (norm.abs().powf(c.exponent) * c.max_angle).copysign(norm)
    }

    /// Evenly spaced scale marks from `-range` to `+range`; every fifth is major.
    pub fn gauge_ticks(&self, count: usize) -> Vec<GaugeTick> {
        let range = self.config.range_cents;
        if count == 0 {
            return Vec::new();
        }
        (0..=count)
            .map(|i| {
                let cents = -range + i as f32 * 2.0 * range / count as f32;
                GaugeTick {
                    cents,
                    angle: self.tick_angle(cents),
                    major: i % 5 == 0,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::f32::consts::FRAC_PI_3;

    #[test]
    fn zero_is_vertical() {
        let mapper = DisplayMapper::default();
        assert_eq!(mapper.needle_angle(0.0), 0.0);
        assert_eq!(mapper.needle_angle(-0.0), 0.0);
        assert_eq!(mapper.tick_angle(0.0), 0.0);
    }

    #[test]
    fn region_edges() {
        let mapper = DisplayMapper::default();
        assert_relative_eq!(mapper.needle_angle(1.0), FRAC_PI_3 / 6.0);
        assert_relative_eq!(mapper.needle_angle(2.0), FRAC_PI_3 / 3.0);
        assert_relative_eq!(mapper.needle_angle(100.0), FRAC_PI_3);
        assert_relative_eq!(mapper.needle_angle(-100.0), -FRAC_PI_3);
        assert_relative_eq!(mapper.needle_angle(250.0), FRAC_PI_3);
    }

    #[test]
    fn outer_region_is_compressed() {
        let mapper = DisplayMapper::default();
        // Half-way through the outer range already covers most of the arc.
        let half = mapper.needle_angle(51.0);
        let expected = FRAC_PI_3 / 3.0 + 0.5f32.powf(0.3) * (FRAC_PI_3 * 2.0 / 3.0);
        assert_relative_eq!(half, expected, max_relative = 1e-5);
        assert!(half > 0.8 * FRAC_PI_3);
    }

    #[test]
    fn nan_does_not_move_needle() {
        assert_eq!(DisplayMapper::default().needle_angle(f32::NAN), 0.0);
    }

    #[test]
    fn twenty_ticks_every_ten_cents() {
        let ticks = DisplayMapper::default().gauge_ticks(20);
        assert_eq!(ticks.len(), 21);
        assert_eq!(ticks[0].cents, -100.0);
        assert_eq!(ticks[10].cents, 0.0);
        assert_eq!(ticks[20].cents, 100.0);
        assert!(ticks[0].major && ticks[5].major && !ticks[6].major);
        assert_relative_eq!(ticks[20].angle, FRAC_PI_3);
        assert!(ticks.windows(2).all(|w| w[0].angle < w[1].angle));
    }

    #[test]
    fn rejects_inverted_regions() {
        let config = DisplayConfig {
            inner_threshold_cents: 150.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(DisplayConfig::default().validate().is_ok());
    }

    proptest! {
        #[test]
        fn needle_curve_is_odd_monotone_and_bounded(a in -100.0f32..=100.0, b in -100.0f32..=100.0) {
            let mapper = DisplayMapper::default();
            let angle = mapper.needle_angle(a);
            prop_assert_eq!(mapper.needle_angle(-a), -angle);
            prop_assert!(angle.abs() <= FRAC_PI_3);
            if a.abs() <= b.abs() {
                prop_assert!(angle.abs() <= mapper.needle_angle(b).abs());
            }
        }
    }
}
