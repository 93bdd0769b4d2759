// tuner-core/src/lib.rs

//! The core logic for the string tuner.
//! This crate turns fixed-size windows of microphone samples into a steady
//! tuning reading: autocorrelation pitch estimation, onset-aware smoothing,
//! a dead-zone "in tune" latch, target matching and the needle curve.
//! It is completely headless and contains no GUI code.

pub mod audio;
pub mod config;
pub mod display;
pub mod error;
pub mod onset;
pub mod pipeline;
pub mod pitch;
pub mod presets;
pub mod smoothing;
pub mod stability;
pub mod tuning;

pub use audio::SampleWindow;
pub use config::PipelineConfig;
pub use error::TuningError;
pub use pipeline::TunerPipeline;
pub use presets::PresetRegistry;
pub use tuning::{NoteName, TuningConfiguration};

/// Represents the result of a single tracked audio frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// The estimated fundamental frequency in Hz.
    pub frequency_hz: f32,
    /// The nearest equal-tempered note.
    pub note: NoteName,
    /// Unsmoothed deviation from `note` in cents.
    pub raw_detune_cents: f32,
    /// Smoothed, gated deviation in cents. Exactly zero while tuned.
    pub stabilized_detune_cents: f32,
    /// Whether the in-tune latch is set.
    pub tuned: bool,
    pub gate_state: stability::GateState,
    /// Needle deflection from vertical, in radians. Positive is sharp.
    pub angle_radians: f32,
    /// Index of the closest configured target, if any are configured.
    pub nearest_target_index: Option<usize>,
}

impl PipelineOutput {
    pub fn note_name(&self) -> &'static str {
        self.note.pitch_class()
    }

    pub fn octave(&self) -> i32 {
        self.note.octave()
    }
}
