//! Noise detection configuration

use serde::{Deserialize, Serialize};
use crate::NoiseError;

/// Noise detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// RMS level (0-1) that counts as noise
    pub threshold: f32,

    /// Noise is over once the level falls below `threshold * release_ratio`
    pub release_ratio: f32,

    /// Microphone polling interval (milliseconds)
    pub sample_interval_ms: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            release_ratio: 0.8,
            sample_interval_ms: 50,
        }
    }
}

impl NoiseConfig {
    /// Level below which a noise episode ends
    pub fn release_level(&self) -> f32 {
        self.threshold * self.release_ratio
    }

    pub fn validate(&self) -> Result<(), NoiseError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(NoiseError::Config(format!(
                "threshold {} outside (0, 1]",
                self.threshold
            )));
        }
        if !(self.release_ratio > 0.0 && self.release_ratio <= 1.0) {
            return Err(NoiseError::Config(format!(
                "release_ratio {} outside (0, 1]",
                self.release_ratio
            )));
        }
        if self.sample_interval_ms == 0 {
            return Err(NoiseError::Config("sample_interval_ms must be non-zero".into()));
        }
        Ok(())
    }
}
