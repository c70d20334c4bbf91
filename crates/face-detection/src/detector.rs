//! Face landmark detection

use media_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::{FaceConfig, FaceError};

/// Number of points in the 68-point facial landmark layout
pub const LANDMARK_COUNT: usize = 68;

/// Index of the nose tip landmark
pub const NOSE_TIP: usize = 30;

/// Landmark index range of the left eye
pub const LEFT_EYE: std::ops::Range<usize> = 36..42;

/// Landmark index range of the right eye
pub const RIGHT_EYE: std::ops::Range<usize> = 42..48;

/// A landmark position in frame pixel coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Centroid of a set of points, `None` when empty
    pub fn centroid(points: &[Point]) -> Option<Point> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f32;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }
}

/// One detected face
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceDetection {
    /// Detector confidence
    pub score: f32,
    /// 68 landmarks (jaw, brows, nose, eyes, mouth)
    pub landmarks: Vec<Point>,
}

impl FaceDetection {
    pub fn new(score: f32, landmarks: Vec<Point>) -> Self {
        Self { score, landmarks }
    }

    /// Left eye landmarks, `None` if the layout is truncated
    pub fn left_eye(&self) -> Option<&[Point]> {
        self.landmarks.get(LEFT_EYE)
    }

    /// Right eye landmarks, `None` if the layout is truncated
    pub fn right_eye(&self) -> Option<&[Point]> {
        self.landmarks.get(RIGHT_EYE)
    }

    pub fn nose_tip(&self) -> Option<Point> {
        self.landmarks.get(NOSE_TIP).copied()
    }
}

/// Inference backend producing faces with landmarks
///
/// The host supplies the implementation (a browser-side model, an ONNX
/// session, or a scripted fake in tests).
pub trait LandmarkModel: Send {
    /// Load model weights. Called once at setup.
    fn load(&mut self, config: &FaceConfig) -> Result<(), FaceError>;

    /// Run detection plus landmark regression on one frame
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceDetection>, FaceError>;
}

/// Face detector wrapping a landmark backend
pub struct FaceDetector {
    score_threshold: f32,
    model: Box<dyn LandmarkModel>,
    loaded: bool,
}

impl FaceDetector {
    pub fn new(config: &FaceConfig, model: Box<dyn LandmarkModel>) -> Self {
        Self {
            score_threshold: config.score_threshold,
            model,
            loaded: false,
        }
    }

    /// Load the backend model
    pub fn load(&mut self, config: &FaceConfig) -> Result<(), FaceError> {
        match &config.model_path {
            Some(path) => info!("Loading face landmark model from {}", path),
            None => info!("Loading face landmark model from backend default"),
        }
        self.model.load(config)?;
        self.loaded = true;
        Ok(())
    }

    /// Detect faces in frame, dropping low-confidence candidates
    pub fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<FaceDetection>, FaceError> {
        if !self.loaded {
            return Err(FaceError::ModelNotLoaded);
        }
        let mut faces = self.model.detect(frame)?;
        let before = faces.len();
        faces.retain(|f| f.score >= self.score_threshold);
        if faces.len() != before {
            debug!(
                "Dropped {} face candidates below score {}",
                before - faces.len(),
                self.score_threshold
            );
        }
        Ok(faces)
    }
}
