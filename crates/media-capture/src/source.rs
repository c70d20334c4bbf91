//! Source traits implemented by the host page

use crate::{AudioChunk, CaptureError, VideoFrame};

/// Webcam access
///
/// `open` is called once at session setup and is where a permission
/// denial surfaces. `capture` is polled on the face sampling tick.
pub trait VideoSource: Send {
    /// Request camera access and start the stream
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Whether the video element is still playing a live stream
    fn is_live(&self) -> bool;

    /// Grab the current frame, `None` if no frame is ready yet
    fn capture(&mut self) -> Result<Option<VideoFrame>, CaptureError>;

    /// Stop the stream and release the device
    fn close(&mut self);
}

/// Microphone access
pub trait AudioSource: Send {
    /// Request microphone access and start the stream
    fn open(&mut self) -> Result<(), CaptureError>;

    /// Drain the samples captured since the last read
    fn read(&mut self) -> Result<Option<AudioChunk>, CaptureError>;

    /// Stop the stream and release the device
    fn close(&mut self);
}
