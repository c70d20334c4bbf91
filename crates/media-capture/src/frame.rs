//! Video frame types

/// One sampled webcam frame
///
/// The detectors never read pixels themselves; the landmark model does.
/// Width and height matter because the orientation test is proportional
/// to the frame width.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3), may be empty for synthetic frames
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (epoch milliseconds)
    pub timestamp_ms: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ms: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ms,
            sequence,
        }
    }

    /// Create a frame with dimensions only (no pixel payload)
    pub fn blank(width: u32, height: u32, timestamp_ms: u64, sequence: u32) -> Self {
        Self::new(Vec::new(), width, height, timestamp_ms, sequence)
    }

    /// Whether a point lies inside the visible frame with positive coordinates
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x > 0.0 && y > 0.0 && x < self.width as f32 && y < self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_rejects_non_positive() {
        let frame = VideoFrame::blank(640, 480, 0, 0);
        assert!(frame.contains(10.0, 10.0));
        assert!(!frame.contains(0.0, 10.0));
        assert!(!frame.contains(10.0, -1.0));
        assert!(!frame.contains(641.0, 10.0));
    }
}
