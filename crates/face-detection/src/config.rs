//! Face detection configuration

use serde::{Deserialize, Serialize};

/// Face detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Frame sampling interval (milliseconds)
    pub sample_interval_ms: u64,

    /// Maximum nose-to-eye-midpoint horizontal offset, as a fraction of frame width
    pub orientation_threshold: f32,

    /// Minimum detector score for a face to count
    pub score_threshold: f32,

    /// Model location handed to the landmark backend
    pub model_path: Option<String>,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            orientation_threshold: 0.015,
            score_threshold: 0.3,
            model_path: None,
        }
    }
}
