//! Ephemeral per-sample detector output

use serde::{Deserialize, Serialize};

/// One detector sample, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    pub timestamp_ms: u64,
    /// Number of faces the landmark model found (0 for audio samples)
    pub faces_found: u32,
    /// Orientation verdict, only meaningful when exactly one face was found
    pub face_aligned: Option<bool>,
    /// RMS microphone level, only set for audio samples
    pub audio_level: Option<f32>,
}

impl DetectionFrame {
    pub fn face(timestamp_ms: u64, faces_found: u32, face_aligned: Option<bool>) -> Self {
        Self {
            timestamp_ms,
            faces_found,
            face_aligned,
            audio_level: None,
        }
    }

    pub fn audio(timestamp_ms: u64, level: f32) -> Self {
        Self {
            timestamp_ms,
            faces_found: 0,
            face_aligned: None,
            audio_level: Some(level),
        }
    }
}
