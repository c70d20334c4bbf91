//! Face Presence and Orientation Detection
//!
//! Samples the webcam on a fixed interval and classifies each frame:
//! - Single face, aligned (eyes visible, facing the screen)
//! - Single face, misaligned
//! - No face (no user present)
//! - Multiple faces (multiple people present)
//!
//! Setup and inference failures disable the detector for the session.
//! They are logged and never reported as violations.

pub mod analysis;
pub mod classify;
pub mod config;
pub mod detector;

pub use analysis::{FaceAnalysis, FaceStatus, Indicator, IndicatorColor, IndicatorIcon};
pub use config::FaceConfig;
pub use detector::{FaceDetection, FaceDetector, LandmarkModel, Point};

use std::time::Duration;

use media_capture::{CaptureError, DetectionFrame, DetectorHealth, SourceKind, VideoFrame, VideoSource};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Face detection error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Camera error: {0}")]
    Capture(#[from] CaptureError),
}

/// Face monitor driving one detector for one session
pub struct FaceMonitor {
    config: FaceConfig,
    detector: FaceDetector,
    health: DetectorHealth,
    indicator: Indicator,
    last_flagged: bool,
}

impl FaceMonitor {
    /// Create a new face monitor with configuration
    pub fn new(config: FaceConfig, model: Box<dyn LandmarkModel>) -> Self {
        Self {
            detector: FaceDetector::new(&config, model),
            health: DetectorHealth::Idle,
            indicator: Indicator::default(),
            last_flagged: false,
            config,
        }
    }

    /// Load the model and open the camera
    ///
    /// Never fails: a setup error leaves the monitor disabled.
    pub fn start(&mut self, source: &mut dyn VideoSource) -> &DetectorHealth {
        if let Err(e) = self.detector.load(&self.config) {
            self.disable(e);
            return &self.health;
        }
        if let Err(e) = source.open() {
            self.disable(e.into());
            return &self.health;
        }
        info!("Face detection running, sampling every {}ms", self.config.sample_interval_ms);
        self.health = DetectorHealth::Running;
        &self.health
    }

    /// One sampling tick
    ///
    /// Returns `None` when the detector is not running, the stream is not
    /// live, or no frame is ready yet.
    pub fn sample(&mut self, source: &mut dyn VideoSource) -> Option<FaceAnalysis> {
        if !self.health.is_running() || !source.is_live() {
            return None;
        }
        let frame = match source.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                self.disable(e.into());
                return None;
            }
        };
        match self.analyze(&frame) {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                self.disable(e);
                None
            }
        }
    }

    /// Classify a single frame and update the indicator
    pub fn analyze(&mut self, frame: &VideoFrame) -> Result<FaceAnalysis, FaceError> {
        let faces = self.detector.detect(frame)?;
        let status = classify::classify(&faces, frame, self.config.orientation_threshold);

        let flagged = status.is_flagged();
        let newly_flagged = flagged && !self.last_flagged;
        self.last_flagged = flagged;
        self.indicator = Indicator::from(status);

        if newly_flagged {
            debug!("Face anomaly at {}ms: {}", frame.timestamp_ms, status.describe());
        }

        let face_aligned = (faces.len() == 1).then_some(status == FaceStatus::Aligned);

        Ok(FaceAnalysis {
            status,
            indicator: self.indicator,
            frame: DetectionFrame::face(frame.timestamp_ms, faces.len() as u32, face_aligned),
            newly_flagged,
        })
    }

    /// Stop sampling and release the camera
    pub fn stop(&mut self, source: &mut dyn VideoSource) {
        if self.health.is_running() {
            source.close();
            info!("Face detection stopped");
        }
        if !self.health.is_disabled() {
            self.health = DetectorHealth::Stopped;
        }
    }

    fn disable(&mut self, err: FaceError) {
        match &err {
            FaceError::Capture(CaptureError::PermissionDenied(_)) => {
                warn!("Face detection disabled, {} permission denied: {}", SourceKind::Camera, err)
            }
            _ => error!("Face detection disabled: {}", err),
        }
        self.health = DetectorHealth::Disabled {
            reason: err.to_string(),
        };
    }

    pub fn health(&self) -> &DetectorHealth {
        &self.health
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.config.sample_interval_ms)
    }
}

/// Scripted landmark model and camera for tests and the simulator
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// Replays queued detection results, repeating the last one when empty
    #[derive(Default)]
    pub struct ScriptedLandmarkModel {
        pub fail_load: Option<String>,
        script: VecDeque<Result<Vec<FaceDetection>, FaceError>>,
        last: Vec<FaceDetection>,
    }

    impl ScriptedLandmarkModel {
        pub fn new() -> Self {
            Self::default()
        }

        /// A model whose weights never load
        pub fn failing_load(reason: impl Into<String>) -> Self {
            Self {
                fail_load: Some(reason.into()),
                ..Self::default()
            }
        }

        pub fn push(&mut self, faces: Vec<FaceDetection>) {
            self.script.push_back(Ok(faces));
        }

        pub fn push_error(&mut self, err: FaceError) {
            self.script.push_back(Err(err));
        }
    }

    impl LandmarkModel for ScriptedLandmarkModel {
        fn load(&mut self, _config: &FaceConfig) -> Result<(), FaceError> {
            match &self.fail_load {
                Some(reason) => Err(FaceError::ModelLoad(reason.clone())),
                None => Ok(()),
            }
        }

        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceDetection>, FaceError> {
            match self.script.pop_front() {
                Some(Ok(faces)) => {
                    self.last = faces.clone();
                    Ok(faces)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last.clone()),
            }
        }
    }

    /// A frontal face centred horizontally at `cx` in a 640x480 frame
    pub fn frontal_face(cx: f32) -> FaceDetection {
        let mut landmarks = vec![Point::new(cx, 240.0); detector::LANDMARK_COUNT];
        for (i, p) in landmarks[detector::LEFT_EYE].iter_mut().enumerate() {
            *p = Point::new(cx - 40.0 + i as f32 * 2.0, 200.0);
        }
        for (i, p) in landmarks[detector::RIGHT_EYE].iter_mut().enumerate() {
            *p = Point::new(cx + 30.0 + i as f32 * 2.0, 200.0);
        }
        // Eye centroids at cx - 35 and cx + 35
        landmarks[detector::NOSE_TIP] = Point::new(cx, 250.0);
        FaceDetection::new(0.9, landmarks)
    }

    /// Camera producing blank frames of a fixed size
    pub struct StaticCamera {
        pub width: u32,
        pub height: u32,
        pub live: bool,
        pub deny: bool,
        pub opened: bool,
        sequence: u32,
    }

    impl StaticCamera {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                live: true,
                deny: false,
                opened: false,
                sequence: 0,
            }
        }
    }

    impl VideoSource for StaticCamera {
        fn open(&mut self) -> Result<(), CaptureError> {
            if self.deny {
                return Err(CaptureError::PermissionDenied("camera blocked by user".into()));
            }
            self.opened = true;
            Ok(())
        }

        fn is_live(&self) -> bool {
            self.opened && self.live
        }

        fn capture(&mut self) -> Result<Option<VideoFrame>, CaptureError> {
            if !self.opened {
                return Err(CaptureError::NotOpened);
            }
            self.sequence += 1;
            Ok(Some(VideoFrame::blank(
                self.width,
                self.height,
                self.sequence as u64 * 100,
                self.sequence,
            )))
        }

        fn close(&mut self) {
            self.opened = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{frontal_face, ScriptedLandmarkModel, StaticCamera};
    use super::*;

    fn monitor(model: ScriptedLandmarkModel) -> FaceMonitor {
        FaceMonitor::new(FaceConfig::default(), Box::new(model))
    }

    #[test]
    fn test_model_load_failure_disables_silently() {
        let mut face = monitor(ScriptedLandmarkModel::failing_load("404 /models"));
        let mut camera = StaticCamera::new(640, 480);

        assert!(face.start(&mut camera).is_disabled());
        assert!(face.sample(&mut camera).is_none());
        assert!(!camera.opened);
    }

    #[test]
    fn test_permission_denied_disables_silently() {
        let mut face = monitor(ScriptedLandmarkModel::new());
        let mut camera = StaticCamera::new(640, 480);
        camera.deny = true;

        assert!(face.start(&mut camera).is_disabled());
        assert!(face.sample(&mut camera).is_none());
    }

    #[test]
    fn test_inference_error_disables_for_session() {
        let mut model = ScriptedLandmarkModel::new();
        model.push_error(FaceError::Inference("backend lost".into()));
        model.push(vec![]);
        let mut face = monitor(model);
        let mut camera = StaticCamera::new(640, 480);
        face.start(&mut camera);

        assert!(face.sample(&mut camera).is_none());
        assert!(face.health().is_disabled());
        // The queued "no face" result is never consumed
        assert!(face.sample(&mut camera).is_none());
    }

    #[test]
    fn test_stream_not_live_is_not_sampled() {
        let mut face = monitor(ScriptedLandmarkModel::new());
        let mut camera = StaticCamera::new(640, 480);
        face.start(&mut camera);
        camera.live = false;

        assert!(face.sample(&mut camera).is_none());
        assert!(face.health().is_running());
    }

    #[test]
    fn test_flag_edge_only_on_transition() {
        let mut model = ScriptedLandmarkModel::new();
        model.push(vec![]);
        model.push(vec![]);
        model.push(vec![frontal_face(320.0)]);
        model.push(vec![frontal_face(200.0), frontal_face(420.0)]);
        let mut face = monitor(model);
        let mut camera = StaticCamera::new(640, 480);
        face.start(&mut camera);

        let a = face.sample(&mut camera).unwrap();
        assert_eq!(a.status, FaceStatus::NoFace);
        assert!(a.newly_flagged);

        let b = face.sample(&mut camera).unwrap();
        assert!(b.is_flagged());
        assert!(!b.newly_flagged);

        let c = face.sample(&mut camera).unwrap();
        assert_eq!(c.status, FaceStatus::Aligned);
        assert_eq!(c.frame.face_aligned, Some(true));
        assert_eq!(face.indicator().color, IndicatorColor::Green);

        let d = face.sample(&mut camera).unwrap();
        assert_eq!(d.status, FaceStatus::MultipleFaces);
        assert!(d.newly_flagged);
        assert_eq!(d.frame.faces_found, 2);
        assert_eq!(d.frame.face_aligned, None);
        assert_eq!(face.indicator().icon, IndicatorIcon::Users);
    }

    #[test]
    fn test_low_score_faces_are_ignored() {
        let mut model = ScriptedLandmarkModel::new();
        let mut ghost = frontal_face(420.0);
        ghost.score = 0.1;
        model.push(vec![frontal_face(320.0), ghost]);
        let mut face = monitor(model);
        let mut camera = StaticCamera::new(640, 480);
        face.start(&mut camera);

        assert_eq!(face.sample(&mut camera).unwrap().status, FaceStatus::Aligned);
    }

    #[test]
    fn test_indicator_starts_gray() {
        let face = monitor(ScriptedLandmarkModel::new());
        assert_eq!(face.indicator().color, IndicatorColor::Gray);
    }

    #[test]
    fn test_stop_releases_camera() {
        let mut face = monitor(ScriptedLandmarkModel::new());
        let mut camera = StaticCamera::new(640, 480);
        face.start(&mut camera);
        face.stop(&mut camera);

        assert!(!camera.opened);
        assert_eq!(face.health(), &DetectorHealth::Stopped);
    }
}
