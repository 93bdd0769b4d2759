//! Pipeline configuration.
//!
//! Every numeric knob of the tracker lives here so a session can override
//! the defaults from a JSON file. Sections and fields that are left out keep
//! their defaults:
//!
//! ```json
//! {
//!   "smoothing": [
//!     { "from_secs": 0.0, "alpha": 0.02 },
//!     { "from_secs": 0.05, "alpha": 0.05 },
//!     { "from_secs": 0.2, "alpha": 0.2 }
//!   ],
//!   "stability": { "deadzone_cents": 0.5 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::display::DisplayConfig;
use crate::error::Result;
use crate::onset::OnsetConfig;
use crate::pitch::EstimatorConfig;
use crate::smoothing::SmoothingSchedule;
use crate::stability::StabilityConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub estimator: EstimatorConfig,
    pub onset: OnsetConfig,
    pub smoothing: SmoothingSchedule,
    pub stability: StabilityConfig,
    pub display: DisplayConfig,
}

impl PipelineConfig {
    /// Checks every section; the first problem found is returned.
    pub fn validate(&self) -> Result<()> {
        self.estimator.validate()?;
        self.onset.validate()?;
        self.smoothing.validate()?;
        self.stability.validate()?;
        self.display.validate()?;
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json(&data)?;
        log::info!("loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
