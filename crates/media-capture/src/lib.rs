//! Media Capture for the Proctoring Core
//!
//! Provides the frame and sample types the detectors consume, plus the
//! source traits the host page implements:
//! - Webcam frames for face presence/orientation detection
//! - Microphone chunks for noise detection
//!
//! Permission prompts and device access live on the host side; a source
//! only reports whether it could be opened and whether it is still live.

pub mod audio;
pub mod detection;
pub mod frame;
pub mod health;
pub mod source;

pub use audio::AudioChunk;
pub use detection::DetectionFrame;
pub use frame::VideoFrame;
pub use health::DetectorHealth;
pub use source::{AudioSource, VideoSource};

use thiserror::Error;

/// Capture error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Source not opened")]
    NotOpened,
}

/// Source kind, used in logs and failure reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// User-facing webcam
    Camera,
    /// Microphone input
    Microphone,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::Microphone => write!(f, "microphone"),
        }
    }
}
