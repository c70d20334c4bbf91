//! Ambient Noise Detection
//!
//! Watches microphone loudness and emits one event per threshold
//! crossing. Sustained noise is a single episode: the detector re-arms
//! only after the level drops below the release level.

mod config;

pub use config::NoiseConfig;

use std::time::Duration;

use media_capture::{AudioChunk, AudioSource, CaptureError, DetectionFrame, DetectorHealth, SourceKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Noise detection error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NoiseError {
    #[error("Invalid noise configuration: {0}")]
    Config(String),

    #[error("Microphone error: {0}")]
    Capture(#[from] CaptureError),
}

/// One logical noise episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseEvent {
    /// When the level crossed the threshold
    pub timestamp_ms: u64,
    /// RMS level of the crossing chunk
    pub level: f32,
}

/// Edge-triggered noise detector
pub struct NoiseDetector {
    config: NoiseConfig,
    health: DetectorHealth,
    /// Inside a noise episode
    active: bool,
    last_frame: Option<DetectionFrame>,
    episodes: u64,
}

impl NoiseDetector {
    pub fn new(config: NoiseConfig) -> Result<Self, NoiseError> {
        config.validate()?;
        Ok(Self {
            config,
            health: DetectorHealth::Idle,
            active: false,
            last_frame: None,
            episodes: 0,
        })
    }

    /// Open the microphone. A failure leaves the detector disabled.
    pub fn start(&mut self, source: &mut dyn AudioSource) -> &DetectorHealth {
        match source.open() {
            Ok(()) => {
                info!(
                    "Noise detection running, threshold {} release {}",
                    self.config.threshold,
                    self.config.release_level()
                );
                self.health = DetectorHealth::Running;
            }
            Err(e) => self.disable(e),
        }
        &self.health
    }

    /// Poll the source once
    pub fn sample(&mut self, source: &mut dyn AudioSource) -> Option<NoiseEvent> {
        if !self.health.is_running() {
            return None;
        }
        match source.read() {
            Ok(Some(chunk)) => self.process(&chunk),
            Ok(None) => None,
            Err(e) => {
                self.disable(e);
                None
            }
        }
    }

    /// Feed one chunk, returning an event on an upward crossing
    pub fn process(&mut self, chunk: &AudioChunk) -> Option<NoiseEvent> {
        let level = chunk.rms();
        self.last_frame = Some(DetectionFrame::audio(chunk.timestamp_ms, level));

        if self.active {
            if level < self.config.release_level() {
                debug!("Noise episode ended at {}ms (level {:.3})", chunk.timestamp_ms, level);
                self.active = false;
            }
            return None;
        }

        if level >= self.config.threshold {
            self.active = true;
            self.episodes += 1;
            info!(
                "Noise detected at {}ms (level {:.3}, episode {})",
                chunk.timestamp_ms, level, self.episodes
            );
            return Some(NoiseEvent {
                timestamp_ms: chunk.timestamp_ms,
                level,
            });
        }
        None
    }

    /// Release the microphone
    pub fn stop(&mut self, source: &mut dyn AudioSource) {
        if self.health.is_running() {
            source.close();
            info!("Noise detection stopped after {} episodes", self.episodes);
        }
        if !self.health.is_disabled() {
            self.health = DetectorHealth::Stopped;
        }
    }

    fn disable(&mut self, err: CaptureError) {
        match &err {
            CaptureError::PermissionDenied(_) => {
                warn!("Noise detection disabled, {} permission denied: {}", SourceKind::Microphone, err)
            }
            _ => error!("Noise detection disabled: {}", err),
        }
        self.health = DetectorHealth::Disabled {
            reason: err.to_string(),
        };
    }

    pub fn health(&self) -> &DetectorHealth {
        &self.health
    }

    pub fn in_episode(&self) -> bool {
        self.active
    }

    pub fn last_frame(&self) -> Option<DetectionFrame> {
        self.last_frame
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.config.sample_interval_ms)
    }
}

/// Scripted microphone for tests and the simulator
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Microphone replaying queued constant-level chunks, silence when empty
    #[derive(Default)]
    pub struct ScriptedMicrophone {
        pub deny: bool,
        pub opened: bool,
        levels: VecDeque<f32>,
        clock_ms: u64,
    }

    impl ScriptedMicrophone {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_level(&mut self, level: f32) {
            self.levels.push_back(level);
        }
    }

    impl AudioSource for ScriptedMicrophone {
        fn open(&mut self) -> Result<(), CaptureError> {
            if self.deny {
                return Err(CaptureError::PermissionDenied("microphone blocked by user".into()));
            }
            self.opened = true;
            Ok(())
        }

        fn read(&mut self) -> Result<Option<AudioChunk>, CaptureError> {
            if !self.opened {
                return Err(CaptureError::NotOpened);
            }
            self.clock_ms += 50;
            let level = self.levels.pop_front().unwrap_or(0.0);
            Ok(Some(AudioChunk::new(vec![level; 800], 16_000, self.clock_ms)))
        }

        fn close(&mut self) {
            self.opened = false;
        }
    }
}
