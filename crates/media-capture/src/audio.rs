//! Microphone sample chunks

use serde::{Deserialize, Serialize};

/// A block of mono PCM samples normalised to [-1.0, 1.0]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Capture timestamp of the first sample (epoch milliseconds)
    pub timestamp_ms: u64,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, timestamp_ms: u64) -> Self {
        Self {
            samples,
            sample_rate,
            timestamp_ms,
        }
    }

    /// Root-mean-square level, 0.0 for an empty chunk
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum_sq / self.samples.len() as f32).sqrt()
    }

    /// Chunk duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_constant_signal() {
        let chunk = AudioChunk::new(vec![0.5; 100], 16_000, 0);
        assert!((chunk.rms() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_rms_of_empty_chunk() {
        let chunk = AudioChunk::default();
        assert_eq!(chunk.rms(), 0.0);
        assert_eq!(chunk.duration_ms(), 0);
    }

    #[test]
    fn test_duration() {
        let chunk = AudioChunk::new(vec![0.0; 800], 16_000, 0);
        assert_eq!(chunk.duration_ms(), 50);
    }
}
