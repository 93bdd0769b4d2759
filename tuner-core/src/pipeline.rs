//! # Tracking Pipeline
//!
//! [`TunerPipeline`] owns all per-session state (onset, smoothing and gate)
//! and runs one sample window through every stage:
//!
//! estimate → onset → smoothing → gate → {display angle, target match}
//!
//! It never reads a clock. The caller passes a monotonic timestamp with each
//! window, which keeps the pipeline deterministic and easy to drive from a
//! capture thread, a file, or a test.

use crate::audio::SampleWindow;
use crate::config::PipelineConfig;
use crate::display::DisplayMapper;
use crate::error::Result;
use crate::onset::OnsetDetector;
use crate::pitch::{self, PitchEstimator};
use crate::smoothing::{self, AdaptiveSmoother};
use crate::stability::StabilityGate;
use crate::tuning::{self, TuningConfiguration};
use crate::PipelineOutput;

#[derive(Debug, Clone)]
pub struct TunerPipeline {
    config: PipelineConfig,
    tuning: TuningConfiguration,
    estimator: PitchEstimator,
    onset: OnsetDetector,
    smoother: AdaptiveSmoother,
    gate: StabilityGate,
    mapper: DisplayMapper,
}

impl Default for TunerPipeline {
    fn default() -> Self {
        Self::build(PipelineConfig::default(), TuningConfiguration::default())
    }
}

impl TunerPipeline {
    /// Creates a pipeline after validating `config`.
    pub fn new(config: PipelineConfig, tuning: TuningConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, tuning))
    }

    fn build(config: PipelineConfig, tuning: TuningConfiguration) -> Self {
        Self {
            estimator: PitchEstimator::new(config.estimator),
            onset: OnsetDetector::new(config.onset),
            smoother: AdaptiveSmoother::new(config.smoothing.clone()),
            gate: StabilityGate::new(config.stability),
            mapper: DisplayMapper::new(config.display),
            config,
            tuning,
        }
    }

    /// Runs one window captured at `now` (seconds, monotonic).
    ///
    /// # Returns
    /// * `Some(output)` - A pitch was found; all state advanced by one frame
    /// * `None` - No usable pitch; state is left untouched
    pub fn process(&mut self, window: &SampleWindow, now: f64) -> Option<PipelineOutput> {
        let level = pitch::rms(&window.samples);
        let frequency = self.estimator.estimate_with_rms(window, level)?;
        Some(self.track(frequency, level, now))
    }

    /// Advances the tracking state with an externally estimated frequency.
    ///
    /// `level` is the RMS of the frame the estimate came from; it drives
    /// onset detection.
    pub fn track(&mut self, frequency: f32, level: f32, now: f64) -> PipelineOutput {
        let reference_hz = self.tuning.reference_hz();

        self.onset.update(level, now);
        let since_onset = self.onset.seconds_since_onset(now);

        let raw_detune = smoothing::raw_detune(frequency, reference_hz);
        let smoothed = self.smoother.update(raw_detune, since_onset);
        let gated = self.gate.update(smoothed, now);

        let matched = tuning::match_frequency(frequency, &self.tuning);
        let cents = gated.cents();

        PipelineOutput {
            frequency_hz: frequency,
            note: matched.note,
            raw_detune_cents: raw_detune * 100.0,
            stabilized_detune_cents: cents,
            tuned: gated.tuned(),
            gate_state: gated.state,
            angle_radians: self.mapper.needle_angle(cents),
            nearest_target_index: matched.target_index,
        }
    }

    /// Swaps the tuning configuration, e.g. on a preset change.
    ///
    /// Tracking state carries over: the string being played has not changed.
    pub fn set_tuning(&mut self, tuning: TuningConfiguration) {
        log::info!(
            "tuning changed: A4 = {} Hz, {} targets",
            tuning.reference_hz(),
            tuning.targets().len()
        );
        self.tuning = tuning;
    }

    pub fn tuning(&self) -> &TuningConfiguration {
        &self.tuning
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn display(&self) -> &DisplayMapper {
        &self.mapper
    }

    pub fn smoothed_detune(&self) -> f32 {
        self.smoother.smoothed_detune()
    }

    pub fn seconds_since_onset(&self, now: f64) -> f64 {
        self.onset.seconds_since_onset(now)
    }

    /// Clears onset, smoothing and gate state for a fresh session.
    pub fn reset(&mut self) {
        self.onset.reset();
        self.smoother.reset();
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoothing::{SmoothingSchedule, SmoothingTier};
    use crate::stability::GateState;
    use approx::assert_abs_diff_eq;

    const FRAME: f64 = 1.0 / 60.0;

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            smoothing: SmoothingSchedule::new(vec![SmoothingTier { from_secs: 0.0, alpha: 0.5 }])
                .unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn silent_frame_leaves_state_alone() {
        let mut pipeline = TunerPipeline::default();
        pipeline.track(445.0, 0.3, 0.0);
        let before = pipeline.smoothed_detune();

        let silence = SampleWindow::new(vec![0.0; 2048], 44_100.0);
        assert!(pipeline.process(&silence, FRAME).is_none());
        assert_eq!(pipeline.smoothed_detune(), before);
        assert_eq!(pipeline.seconds_since_onset(1.0), 1.0);
    }

    #[test]
    fn sharp_note_deflects_right() {
        let tuning = TuningConfiguration::new(440.0, &["A4"]).unwrap();
        let mut pipeline = TunerPipeline::new(fast_config(), tuning).unwrap();

        let sharp = 440.0 * 2f32.powf(10.0 / 1200.0);
        let mut out = pipeline.track(sharp, 0.3, 0.0);
        for frame in 1..60 {
            out = pipeline.track(sharp, 0.3, frame as f64 * FRAME);
        }
        assert_abs_diff_eq!(out.raw_detune_cents, 10.0, epsilon = 0.01);
        assert_abs_diff_eq!(out.stabilized_detune_cents, 10.0, epsilon = 0.01);
        assert_eq!(out.gate_state, GateState::Active);
        assert!(out.angle_radians > 0.0);
        assert_eq!(out.note.to_string(), "A4");
        assert_eq!(out.nearest_target_index, Some(0));
    }

    #[test]
    fn leaving_tune_clears_latch() {
        let mut pipeline = TunerPipeline::new(fast_config(), TuningConfiguration::default()).unwrap();
        let mut now = 0.0;
        let mut out = pipeline.track(440.0, 0.3, now);
        while now < 0.25 {
            now += FRAME;
            out = pipeline.track(440.0, 0.3, now);
        }
        assert!(out.tuned);
        assert_eq!(out.angle_radians, 0.0);

        let out = pipeline.track(440.0 * 2f32.powf(5.0 / 1200.0), 0.3, now + FRAME);
        assert!(!out.tuned);
        assert_eq!(out.gate_state, GateState::Active);
        assert!(out.stabilized_detune_cents > 0.2);
    }

    #[test]
    fn preset_swap_rematches_targets() {
        let mut pipeline = TunerPipeline::default();
        assert_eq!(pipeline.track(110.0, 0.3, 0.0).nearest_target_index, None);

        pipeline.set_tuning(TuningConfiguration::new(440.0, &["E2", "A2", "D3"]).unwrap());
        assert_eq!(pipeline.track(110.0, 0.3, FRAME).nearest_target_index, Some(1));
    }

    #[test]
    fn reset_starts_over() {
        let mut pipeline = TunerPipeline::new(fast_config(), TuningConfiguration::default()).unwrap();
        pipeline.track(450.0, 0.3, 2.0);
        assert!(pipeline.smoothed_detune() != 0.0);
        pipeline.reset();
        assert_eq!(pipeline.smoothed_detune(), 0.0);
        assert_eq!(pipeline.seconds_since_onset(2.0), 2.0);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = PipelineConfig {
            smoothing: SmoothingSchedule::new(vec![SmoothingTier { from_secs: 0.0, alpha: 0.1 }])
                .unwrap(),
            stability: crate::stability::StabilityConfig {
                deadzone_cents: -1.0,
                hold_secs: 0.2,
            },
            ..Default::default()
        };
        assert!(TunerPipeline::new(config, TuningConfiguration::default()).is_err());
    }
}
