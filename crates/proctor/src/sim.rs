//! Scripted session replay against fake browser, camera and microphone

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use assessment_session::{
    admit_device, Clock, ProctorConfig, SessionContext, SessionController, SessionError,
    SessionEvent, SessionRuntime, SessionSnapshot, SubmissionPayload, SubmitError, Submitter,
    TokioClock,
};
use device_guard::{DeviceGuard, DeviceProfile};
use face_detection::testing::{frontal_face, ScriptedLandmarkModel, StaticCamera};
use face_detection::FaceMonitor;
use focus_guard::testing::FakeFocusProvider;
use focus_guard::{FocusEvent, FocusGuard};
use noise_detection::testing::ScriptedMicrophone;
use noise_detection::NoiseDetector;
use session_store::{MemoryStore, SessionStore, SqliteStore};

use crate::Settings;

/// Test configuration the simulator mounts, in the backend's shape
pub const SAMPLE_TEST_CONFIG: &str = r#"{
    "fullScreenMode": true,
    "faceDetection": true,
    "deviceRestriction": true,
    "noiseDetection": true,
    "duration": {"hours": "0", "minutes": "10"},
    "resultVisibility": "Immediate release"
}"#;

/// Submitter that logs the JSON body instead of posting it
pub struct LoggingSubmitter;

impl Submitter for LoggingSubmitter {
    fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<(), SubmitError>> + Send {
        let body = payload.to_json();
        async move {
            let body = body?;
            info!("POST /api/mcq/submit_assessment/ {}", body);
            Ok::<(), SubmitError>(())
        }
    }
}

fn scripted_face() -> ScriptedLandmarkModel {
    let mut model = ScriptedLandmarkModel::new();
    let aligned = || vec![frontal_face(320.0)];
    let anomalies = [
        vec![],
        vec![frontal_face(180.0), frontal_face(460.0)],
        vec![],
    ];
    for anomaly in anomalies {
        for _ in 0..12 {
            model.push(aligned());
        }
        model.push(anomaly);
    }
    model.push(aligned());
    model
}

fn scripted_microphone() -> ScriptedMicrophone {
    let mut microphone = ScriptedMicrophone::new();
    for episode in 0..2 {
        for _ in 0..(10 + episode * 20) {
            microphone.push_level(0.02);
        }
        microphone.push_level(0.6);
        microphone.push_level(0.4);
    }
    microphone
}

/// Run one scripted attempt to completion
pub async fn simulate(settings: &Settings) -> Result<SessionSnapshot, SessionError> {
    let proctor = ProctorConfig::from_json(SAMPLE_TEST_CONFIG)?;
    let device = admit_device(
        &DeviceGuard::new(settings.device.clone()),
        &DeviceProfile::desktop(),
        &proctor,
    )?;
    info!("Device admitted as {:?}", device);

    let store: Arc<dyn SessionStore> = match &settings.store_path {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    let clock = TokioClock::starting_now();
    let context = SessionContext {
        session_id: uuid::Uuid::new_v4().to_string(),
        contest_id: "demo-contest".to_string(),
        question_ids: (1..=5).map(|i| format!("q{}", i)).collect(),
    };
    let controller = SessionController::resume(
        context,
        &proctor,
        settings.session.clone(),
        store,
        clock.now_ms(),
    )?;

    let provider = FakeFocusProvider::new();
    let noise = NoiseDetector::new(settings.noise.clone())
        .map_err(|e| SessionError::Config(e.to_string()))?;

    let mut handle = SessionRuntime::new(
        controller,
        Arc::new(clock),
        Arc::new(LoggingSubmitter),
        Arc::new(provider.clone()),
        FocusGuard::new(settings.focus.clone(), proctor.full_screen_mode),
    )
    .with_face(
        FaceMonitor::new(settings.face.clone(), Box::new(scripted_face())),
        Box::new(StaticCamera::new(640, 480)),
    )
    .with_noise(noise, Box::new(scripted_microphone()))
    .spawn();

    handle.answer("q1", "B").await?;
    handle.answer("q3", "A").await?;
    handle.toggle_review("q4").await?;

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        provider.emit(FocusEvent::FullscreenExited);
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.return_to_fullscreen().await?;
    }
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    provider.emit(FocusEvent::WindowBlurred);
    provider.emit(FocusEvent::WindowFocused);

    // Acknowledgements can race the task exiting after termination
    while let Some(event) = handle.next_event().await {
        match event {
            SessionEvent::Warning(warning) => {
                info!("{}", warning.message);
                let _ = handle.acknowledge_warning();
            }
            SessionEvent::NoiseNotice => {
                let _ = handle.acknowledge_noise();
            }
            SessionEvent::SubmissionFailed { error } => {
                warn!("Submission failed ({}), retrying", error);
                let _ = handle.retry_submission();
            }
            SessionEvent::Terminated(reason) => {
                info!("Session terminated: {:?}", reason);
                break;
            }
            other => debug!("{:?}", other),
        }
    }

    handle.join().await
}
