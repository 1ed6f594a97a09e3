//! Validator configuration.

use serde::{Deserialize, Serialize};

use crate::error::{PlanningError, Result};

/// Motion validation parameters.
///
/// Missing keys in TOML input take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    /// Contact distance threshold (m). Zero reports only touching or
    /// penetrating pairs.
    pub contact_distance: f64,
    /// Longest valid segment as a fraction of the state space's maximum
    /// extent.
    pub longest_valid_segment_fraction: f64,
    /// Multiplier on the number of sub-segments per edge.
    pub longest_valid_segment_count_factor: u32,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            contact_distance: 0.0,
            longest_valid_segment_fraction: 0.01,
            longest_valid_segment_count_factor: 1,
        }
    }
}

impl ValidatorSettings {
    /// Parse and validate settings from TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.contact_distance.is_finite() && self.contact_distance >= 0.0) {
            return Err(PlanningError::InvalidSettings(
                "contact_distance must be non-negative".into(),
            ));
        }
        let fraction = self.longest_valid_segment_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(PlanningError::InvalidSettings(
                "longest_valid_segment_fraction must be in (0, 1]".into(),
            ));
        }
        if self.longest_valid_segment_count_factor == 0 {
            return Err(PlanningError::InvalidSettings(
                "longest_valid_segment_count_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
