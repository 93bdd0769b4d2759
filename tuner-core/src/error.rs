//! Configuration errors.
//!
//! Everything here is raised once, while presets or pipeline settings are
//! loaded. Frame processing never fails: a frame without a usable pitch is an
//! ordinary `None`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("invalid note name {0:?}: expected pitch class and octave, e.g. \"E2\" or \"C#3\"")]
    InvalidNoteName(String),
    #[error("invalid reference frequency {0} Hz: must be finite and positive")]
    InvalidReference(f32),
    #[error("preset {0:?} has no target notes")]
    EmptyPreset(String),
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    #[error("invalid smoothing schedule: {0}")]
    InvalidSchedule(String),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TuningError>;
