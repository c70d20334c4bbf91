//! Async session runtime
//!
//! One task owns the controller and every detector. All state changes
//! happen inside its `select!` loop, so concurrent triggers are serialized
//! and the controller needs no locking.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use device_guard::{DeviceClass, DeviceGuard, DeviceProfile};
use face_detection::{FaceAnalysis, FaceMonitor, Indicator};
use focus_guard::{FocusError, FocusEvent, FocusGuard, FocusProvider, FocusSnapshot, FocusViolation};
use media_capture::{AudioSource, VideoSource};
use noise_detection::NoiseDetector;
use violation_tracker::{Category, RecordOutcome, Warning};

use crate::clock::Clock;
use crate::config::ProctorConfig;
use crate::controller::{SessionController, SessionSnapshot, SessionState, TerminationReason};
use crate::submission::{SubmissionPayload, Submitter};
use crate::SessionError;

/// Notifications for the host page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    Tick { remaining_seconds: u64 },
    Warning(Warning),
    /// Needs explicit acknowledgement
    NoiseNotice,
    Focus(FocusSnapshot),
    FaceIndicator(Indicator),
    Submitting(TerminationReason),
    SubmissionFailed { error: String },
    Terminated(TerminationReason),
}

enum Command {
    Answer {
        question_id: String,
        choice: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    ToggleReview {
        question_id: String,
        reply: oneshot::Sender<Result<bool, SessionError>>,
    },
    AcknowledgeWarning,
    AcknowledgeNoise,
    ReturnToFullscreen {
        reply: oneshot::Sender<Result<(), FocusError>>,
    },
    ConfirmSubmit,
    RetrySubmission,
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Start-of-session device gate
///
/// A blocked device never reaches the runtime.
pub fn admit_device(
    guard: &DeviceGuard,
    profile: &DeviceProfile,
    proctor: &ProctorConfig,
) -> Result<DeviceClass, SessionError> {
    match guard.evaluate(profile, proctor.device_restriction) {
        device_guard::DeviceGate::Allowed(class) => Ok(class),
        device_guard::DeviceGate::Blocked(class) => Err(SessionError::DeviceRestricted(class)),
    }
}

struct FaceStage {
    monitor: FaceMonitor,
    camera: Box<dyn VideoSource>,
}

type FaceJob = JoinHandle<(FaceStage, Option<FaceAnalysis>)>;

struct NoiseStage {
    detector: NoiseDetector,
    microphone: Box<dyn AudioSource>,
}

/// Session runtime, consumed by [`SessionRuntime::spawn`]
pub struct SessionRuntime<S: Submitter> {
    controller: SessionController,
    clock: Arc<dyn Clock>,
    submitter: Arc<S>,
    provider: Arc<dyn FocusProvider>,
    focus: FocusGuard,
    face: Option<FaceStage>,
    /// Inference in flight; owns the face stage until it completes
    face_job: Option<FaceJob>,
    noise: Option<NoiseStage>,
}

impl<S: Submitter> SessionRuntime<S> {
    pub fn new(
        controller: SessionController,
        clock: Arc<dyn Clock>,
        submitter: Arc<S>,
        provider: Arc<dyn FocusProvider>,
        focus: FocusGuard,
    ) -> Self {
        Self {
            controller,
            clock,
            submitter,
            provider,
            focus,
            face: None,
            face_job: None,
            noise: None,
        }
    }

    pub fn with_face(mut self, monitor: FaceMonitor, camera: Box<dyn VideoSource>) -> Self {
        self.face = Some(FaceStage { monitor, camera });
        self
    }

    pub fn with_noise(mut self, detector: NoiseDetector, microphone: Box<dyn AudioSource>) -> Self {
        self.noise = Some(NoiseStage { detector, microphone });
        self
    }

    /// Start the session task
    pub fn spawn(self) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(command_rx, event_tx, cancel.clone()));

        SessionHandle {
            commands: command_tx,
            events: event_rx,
            cancel,
            task,
        }
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<SessionEvent>,
        cancel: CancellationToken,
    ) -> SessionSnapshot {
        let session_id = self.controller.session_id().to_string();
        info!("Session {} runtime started", session_id);

        let (focus_tx, mut focus_rx) = mpsc::unbounded_channel();
        let subscription = self.provider.on_exit(Box::new(move |event| {
            let _ = focus_tx.send(event);
        }));

        match self.controller.state() {
            SessionState::Active => {
                if let Err(e) = self.focus.enforce(self.provider.as_ref()) {
                    warn!("Session {}: could not enter fullscreen: {}", session_id, e);
                }
                if let Some(face) = &mut self.face {
                    face.monitor.start(face.camera.as_mut());
                }
                if let Some(noise) = &mut self.noise {
                    noise.detector.start(noise.microphone.as_mut());
                }
            }
            SessionState::SubmissionFailed { error, .. } => {
                info!("Session {} resumed awaiting submission retry", session_id);
                let _ = events.send(SessionEvent::SubmissionFailed { error: error.clone() });
            }
            other => debug!("Session {} started in state {:?}", session_id, other),
        }

        let mut clock_ticker = ticker(Duration::from_millis(self.controller.tick_period_ms()));
        let mut face_ticker = ticker(
            self.face
                .as_ref()
                .map_or(Duration::from_millis(100), |f| f.monitor.sample_interval()),
        );
        let mut noise_ticker = ticker(
            self.noise
                .as_ref()
                .map_or(Duration::from_millis(50), |n| n.detector.sample_interval()),
        );
        let mut focus_ticker = ticker(self.focus.poll_interval());

        loop {
            let active = self.controller.state().is_active();
            let face_on = active
                && self
                    .face
                    .as_ref()
                    .map_or(false, |f| f.monitor.health().is_running());
            let noise_on = active
                && self
                    .noise
                    .as_ref()
                    .map_or(false, |n| n.detector.health().is_running());
            let face_busy = self.face_job.is_some();
            let now_ms = self.now().max(0) as u64;
            let reentry_in = self
                .focus
                .reentry_due_ms()
                .map(|due| Duration::from_millis(due.saturating_sub(now_ms)));

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Session {} runtime cancelled", session_id);
                    break;
                }
                _ = clock_ticker.tick() => {
                    let now = self.now();
                    if let Some(payload) = self.controller.tick(now) {
                        self.submit(payload, &events).await;
                    }
                    let _ = events.send(SessionEvent::Tick {
                        remaining_seconds: self.controller.remaining_seconds(now),
                    });
                }
                _ = face_ticker.tick(), if face_on => {
                    self.start_face_sample();
                }
                result = face_result(&mut self.face_job), if face_busy => {
                    self.face_job = None;
                    self.finish_face_sample(result, &events).await;
                }
                _ = noise_ticker.tick(), if noise_on => {
                    self.sample_noise(&events).await;
                }
                _ = tokio::time::sleep(reentry_in.unwrap_or_default()), if reentry_in.is_some() => {
                    let now = self.now().max(0) as u64;
                    self.focus.tick(self.provider.as_ref(), now);
                    let _ = events.send(SessionEvent::Focus(self.focus.snapshot()));
                }
                _ = focus_ticker.tick(), if active => {
                    if let Some(violation) = self.focus.poll(self.provider.has_focus()) {
                        self.on_violation(category_of(violation), &events).await;
                    }
                }
                Some(event) = focus_rx.recv() => {
                    self.on_focus_event(event, &events).await;
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &events).await,
                    None => {
                        info!("Session {} handle dropped, tearing down", session_id);
                        break;
                    }
                },
            }

            if self.controller.state().is_terminated() {
                break;
            }
        }

        self.freeze().await;
        drop(subscription);
        info!("Session {} runtime stopped in state {:?}", session_id, self.controller.state());
        self.controller.snapshot(self.now())
    }

    /// Move the face stage onto the blocking pool for one frame
    fn start_face_sample(&mut self) {
        if let Some(mut stage) = self.face.take() {
            self.face_job = Some(tokio::task::spawn_blocking(move || {
                let analysis = stage.monitor.sample(stage.camera.as_mut());
                (stage, analysis)
            }));
        }
    }

    async fn finish_face_sample(
        &mut self,
        result: Result<(FaceStage, Option<FaceAnalysis>), JoinError>,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        let analysis = match result {
            Ok((stage, analysis)) => {
                self.face = Some(stage);
                analysis
            }
            Err(e) => {
                error!(
                    "Session {}: face sampling task failed, face monitoring off: {}",
                    self.controller.session_id(),
                    e
                );
                None
            }
        };
        // A frame that finished after submission began is discarded
        if !self.controller.state().is_active() {
            return;
        }
        if let Some(analysis) = analysis {
            let _ = events.send(SessionEvent::FaceIndicator(analysis.indicator));
            if analysis.newly_flagged {
                self.on_violation(Category::Face, events).await;
            }
        }
    }

    async fn sample_noise(&mut self, events: &mpsc::UnboundedSender<SessionEvent>) {
        let event = match &mut self.noise {
            Some(noise) => noise.detector.sample(noise.microphone.as_mut()),
            None => None,
        };
        if event.is_some() {
            self.on_violation(Category::Noise, events).await;
        }
    }

    async fn on_focus_event(&mut self, event: FocusEvent, events: &mpsc::UnboundedSender<SessionEvent>) {
        let now = self.now().max(0) as u64;
        let violation = self.focus.handle(event, now);
        let _ = events.send(SessionEvent::Focus(self.focus.snapshot()));
        if let Some(violation) = violation {
            self.on_violation(category_of(violation), events).await;
        }
    }

    async fn on_violation(&mut self, category: Category, events: &mpsc::UnboundedSender<SessionEvent>) {
        let now = self.now();
        let report = self.controller.record_violation(category, now);
        if let RecordOutcome::Counted { warning, .. } = report.outcome {
            if category == Category::Noise {
                let _ = events.send(SessionEvent::NoiseNotice);
            }
            let _ = events.send(SessionEvent::Warning(warning));
        }
        if let Some(payload) = report.submission {
            self.submit(payload, events).await;
        }
    }

    async fn handle_command(&mut self, command: Command, events: &mpsc::UnboundedSender<SessionEvent>) {
        match command {
            Command::Answer {
                question_id,
                choice,
                reply,
            } => {
                let _ = reply.send(self.controller.select_answer(&question_id, &choice));
            }
            Command::ToggleReview { question_id, reply } => {
                let _ = reply.send(self.controller.toggle_review(&question_id));
            }
            Command::AcknowledgeWarning => self.controller.acknowledge_warning(),
            Command::AcknowledgeNoise => self.controller.acknowledge_noise(),
            Command::ReturnToFullscreen { reply } => {
                let now = self.now().max(0) as u64;
                let result = self.focus.return_to_fullscreen(self.provider.as_ref(), now);
                let _ = events.send(SessionEvent::Focus(self.focus.snapshot()));
                let _ = reply.send(result);
            }
            Command::ConfirmSubmit => {
                let now = self.now();
                if let Some(payload) = self.controller.confirm_submit(now) {
                    self.submit(payload, events).await;
                }
            }
            Command::RetrySubmission => {
                if let Some(payload) = self.controller.retry_submission() {
                    self.submit(payload, events).await;
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.controller.snapshot(self.now()));
            }
        }
    }

    /// Hand the payload to the submitter; detectors are frozen first
    async fn submit(&mut self, payload: SubmissionPayload, events: &mpsc::UnboundedSender<SessionEvent>) {
        self.freeze().await;
        let reason = match self.controller.state() {
            SessionState::Submitting(reason) => *reason,
            other => {
                debug!("Submit requested in state {:?}, skipping", other);
                return;
            }
        };
        let _ = events.send(SessionEvent::Submitting(reason));

        match self.submitter.submit(&payload).await {
            Ok(()) => {
                self.controller.submission_succeeded();
                let _ = events.send(SessionEvent::Terminated(reason));
            }
            Err(e) => {
                self.controller.submission_failed(&e);
                let _ = events.send(SessionEvent::SubmissionFailed { error: e.to_string() });
            }
        }
    }

    async fn freeze(&mut self) {
        self.focus.finish();
        if let Some(job) = self.face_job.take() {
            match job.await {
                Ok((stage, _)) => self.face = Some(stage),
                Err(e) => warn!("Face sampling task lost during freeze: {}", e),
            }
        }
        if let Some(face) = &mut self.face {
            face.monitor.stop(face.camera.as_mut());
        }
        if let Some(noise) = &mut self.noise {
            noise.detector.stop(noise.microphone.as_mut());
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn face_result(job: &mut Option<FaceJob>) -> Result<(FaceStage, Option<FaceAnalysis>), JoinError> {
    match job {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn category_of(violation: FocusViolation) -> Category {
    match violation {
        FocusViolation::FullscreenExit => Category::Fullscreen,
        FocusViolation::TabSwitch(_) => Category::TabSwitch,
    }
}

/// Host-side handle to a running session
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
    task: JoinHandle<SessionSnapshot>,
}

impl SessionHandle {
    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    pub async fn answer(&self, question_id: &str, choice: &str) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Answer {
            question_id: question_id.to_string(),
            choice: choice.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn toggle_review(&self, question_id: &str) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ToggleReview {
            question_id: question_id.to_string(),
            reply,
        })?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    pub fn acknowledge_warning(&self) -> Result<(), SessionError> {
        self.send(Command::AcknowledgeWarning)
    }

    pub fn acknowledge_noise(&self) -> Result<(), SessionError> {
        self.send(Command::AcknowledgeNoise)
    }

    /// The "Return to Fullscreen" button
    pub async fn return_to_fullscreen(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ReturnToFullscreen { reply })?;
        Ok(rx.await.map_err(|_| SessionError::Closed)??)
    }

    pub fn confirm_submit(&self) -> Result<(), SessionError> {
        self.send(Command::ConfirmSubmit)
    }

    pub fn retry_submission(&self) -> Result<(), SessionError> {
        self.send(Command::RetrySubmission)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Next host notification; `None` once the session task has exited
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Wait for the session to end on its own
    pub async fn join(self) -> Result<SessionSnapshot, SessionError> {
        let SessionHandle { commands, task, .. } = self;
        let snapshot = task.await.map_err(|e| SessionError::Join(e.to_string()));
        drop(commands);
        snapshot
    }

    /// Tear the session down: stop every ticker and remove focus listeners
    pub async fn shutdown(self) -> Result<SessionSnapshot, SessionError> {
        self.cancel.cancel();
        self.task.await.map_err(|e| SessionError::Join(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::config::SessionConfig;
    use crate::controller::SessionContext;
    use crate::testing::RecordingSubmitter;
    use face_detection::testing::{frontal_face, ScriptedLandmarkModel, StaticCamera};
    use face_detection::{FaceConfig, FaceDetection, FaceError, LandmarkModel};
    use media_capture::VideoFrame;
    use focus_guard::testing::FakeFocusProvider;
    use focus_guard::FocusConfig;
    use noise_detection::testing::ScriptedMicrophone;
    use noise_detection::NoiseConfig;
    use session_store::{MemoryStore, SessionRecord, SessionStore};
    use std::time::Instant;
    use violation_tracker::TerminationPolicy;

    const T0: i64 = 1_700_000_000_000;

    fn proctor(duration_seconds: u64) -> ProctorConfig {
        ProctorConfig {
            full_screen_mode: true,
            face_detection: true,
            noise_detection: true,
            duration_seconds: Some(duration_seconds),
            policy: TerminationPolicy::All,
            ..Default::default()
        }
    }

    struct Harness {
        provider: FakeFocusProvider,
        submitter: Arc<RecordingSubmitter>,
        store: Arc<MemoryStore>,
    }

    fn build(
        proctor: &ProctorConfig,
        model: impl LandmarkModel + 'static,
        microphone: ScriptedMicrophone,
    ) -> (SessionRuntime<RecordingSubmitter>, Harness) {
        build_with_store(proctor, model, microphone, Arc::new(MemoryStore::new()))
    }

    fn build_with_store(
        proctor: &ProctorConfig,
        model: impl LandmarkModel + 'static,
        microphone: ScriptedMicrophone,
        store: Arc<MemoryStore>,
    ) -> (SessionRuntime<RecordingSubmitter>, Harness) {
        let clock = TokioClock::new(T0);
        let context = SessionContext {
            session_id: "rt-1".into(),
            contest_id: "contest-9".into(),
            question_ids: vec!["q1".into(), "q2".into(), "q3".into()],
        };
        let controller = SessionController::resume(
            context,
            proctor,
            SessionConfig::default(),
            store.clone(),
            clock.now_ms(),
        )
        .unwrap();

        let provider = FakeFocusProvider::new();
        let submitter = Arc::new(RecordingSubmitter::new());
        let runtime = SessionRuntime::new(
            controller,
            Arc::new(clock),
            submitter.clone(),
            Arc::new(provider.clone()),
            FocusGuard::new(FocusConfig::default(), proctor.full_screen_mode),
        )
        .with_face(
            FaceMonitor::new(FaceConfig::default(), Box::new(model)),
            Box::new(StaticCamera::new(640, 480)),
        )
        .with_noise(
            NoiseDetector::new(NoiseConfig::default()).unwrap(),
            Box::new(microphone),
        );

        (
            runtime,
            Harness {
                provider,
                submitter,
                store,
            },
        )
    }

    fn aligned_model() -> ScriptedLandmarkModel {
        let mut model = ScriptedLandmarkModel::new();
        model.push(vec![frontal_face(320.0)]);
        model
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_limits_reached() {
        let mut model = ScriptedLandmarkModel::new();
        for anomaly in [vec![], vec![frontal_face(200.0), frontal_face(440.0)], vec![]] {
            for _ in 0..10 {
                model.push(vec![frontal_face(320.0)]);
            }
            model.push(anomaly);
            for _ in 0..5 {
                model.push(vec![frontal_face(320.0)]);
            }
        }
        model.push(vec![frontal_face(320.0)]);

        let mut microphone = ScriptedMicrophone::new();
        microphone.push_level(0.5);
        for _ in 0..30 {
            microphone.push_level(0.0);
        }
        microphone.push_level(0.5);

        let (runtime, harness) = build(&proctor(600), model, microphone);
        let handle = runtime.spawn();

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(1_100)).await;
            harness.provider.emit(FocusEvent::FullscreenExited);
        }
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        harness.provider.emit(FocusEvent::WindowBlurred);
        harness.provider.emit(FocusEvent::WindowFocused);

        let snapshot = handle.join().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Terminated(TerminationReason::LimitsReached));

        let calls = harness.submitter.calls();
        assert_eq!(calls.len(), 1);
        let counters = calls[0].counters;
        assert_eq!(
            (counters.fullscreen_exits, counters.tab_switches, counters.noise_events, counters.face_anomalies),
            (3, 1, 2, 3)
        );
        assert!(harness.store.load("rt-1").unwrap().is_none());
        assert_eq!(harness.provider.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_expiry_submits_unanswered() {
        let (runtime, harness) = build(&proctor(10), aligned_model(), ScriptedMicrophone::new());
        let handle = runtime.spawn();
        handle.answer("q2", "B").await.unwrap();

        let snapshot = handle.join().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Terminated(TerminationReason::ClockExpired));

        let calls = harness.submitter.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].answers["q1"], "notattended");
        assert_eq!(calls[0].answers["q2"], "B");
        assert_eq!(calls[0].answers["q3"], "notattended");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_removes_listeners_without_submitting() {
        let (runtime, harness) = build(&proctor(600), aligned_model(), ScriptedMicrophone::new());
        let handle = runtime.spawn();

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.state.is_active());
        assert_eq!(harness.provider.listener_count(), 1);

        let final_snapshot = handle.shutdown().await.unwrap();
        assert!(final_snapshot.state.is_active());
        assert_eq!(harness.provider.listener_count(), 0);
        assert!(harness.submitter.calls().is_empty());
        assert!(harness.store.load("rt-1").unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_submission_retried_by_user() {
        let (runtime, harness) = build(&proctor(600), aligned_model(), ScriptedMicrophone::new());
        harness.submitter.fail_next(1);
        let mut handle = runtime.spawn();

        handle.confirm_submit().unwrap();
        loop {
            match handle.next_event().await {
                Some(SessionEvent::SubmissionFailed { .. }) => break,
                Some(_) => continue,
                None => panic!("session ended before failure was reported"),
            }
        }
        let snapshot = handle.snapshot().await.unwrap();
        assert!(matches!(snapshot.state, SessionState::SubmissionFailed { .. }));

        handle.retry_submission().unwrap();
        let snapshot = handle.join().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Terminated(TerminationReason::UserConfirmed));
        assert_eq!(harness.submitter.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_camera_does_not_count_violations() {
        let (mut runtime, harness) = build(&proctor(600), ScriptedLandmarkModel::new(), ScriptedMicrophone::new());
        if let Some(face) = runtime.face.as_mut() {
            let mut camera = StaticCamera::new(640, 480);
            camera.deny = true;
            face.camera = Box::new(camera);
        }
        let handle = runtime.spawn();

        tokio::time::sleep(Duration::from_secs(3)).await;
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.counters.face_anomalies, 0);
        assert!(snapshot.state.is_active());
        handle.shutdown().await.unwrap();
        assert!(harness.submitter.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_return_to_fullscreen_clears_modal() {
        let (runtime, harness) = build(&proctor(600), aligned_model(), ScriptedMicrophone::new());
        let mut handle = runtime.spawn();
        handle.snapshot().await.unwrap();

        harness.provider.emit(FocusEvent::FullscreenExited);
        loop {
            if let Some(SessionEvent::Focus(snapshot)) = handle.next_event().await {
                assert!(snapshot.fullscreen_modal);
                break;
            }
        }
        handle.return_to_fullscreen().await.unwrap();
        assert!(harness.provider.is_active());

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.counters.fullscreen_exits, 1);
        handle.shutdown().await.unwrap();
    }

    /// Landmark backend that takes far longer than a sample interval
    struct SlowModel {
        delay: Duration,
    }

    impl LandmarkModel for SlowModel {
        fn load(&mut self, _config: &FaceConfig) -> Result<(), FaceError> {
            Ok(())
        }

        fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<FaceDetection>, FaceError> {
            std::thread::sleep(self.delay);
            Ok(vec![frontal_face(320.0)])
        }
    }

    #[tokio::test]
    async fn test_slow_face_inference_does_not_block_commands() {
        let model = SlowModel {
            delay: Duration::from_millis(1_500),
        };
        let (runtime, _harness) = build(&proctor(600), model, ScriptedMicrophone::new());
        let handle = runtime.spawn();
        // Let the first inference get underway
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        handle.answer("q1", "A").await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        assert!(
            started.elapsed() < Duration::from_millis(500),
            "commands waited {:?} behind inference",
            started.elapsed()
        );
        assert_eq!(snapshot.answered, 1);
        assert!(snapshot.state.is_active());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reentry_retried_after_configured_delay() {
        let (runtime, harness) = build(&proctor(600), aligned_model(), ScriptedMicrophone::new());
        let mut handle = runtime.spawn();
        handle.snapshot().await.unwrap();
        let baseline = harness.provider.enter_requests();

        harness.provider.emit(FocusEvent::FullscreenExited);
        loop {
            if let Some(SessionEvent::Focus(snapshot)) = handle.next_event().await {
                assert!(snapshot.fullscreen_modal);
                break;
            }
        }

        harness.provider.fail_next_enters(1);
        let failed_at = tokio::time::Instant::now();
        assert!(matches!(
            handle.return_to_fullscreen().await,
            Err(SessionError::Focus(_))
        ));
        assert_eq!(harness.provider.enter_requests(), baseline + 1);

        while harness.provider.enter_requests() < baseline + 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let waited = failed_at.elapsed();
        assert!(
            waited >= Duration::from_millis(500) && waited < Duration::from_millis(600),
            "retried after {:?}",
            waited
        );
        assert!(harness.provider.is_active());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_after_interrupted_submission_waits_for_retry() {
        let config = ProctorConfig {
            policy: TerminationPolicy::Any,
            ..proctor(600)
        };
        let store = Arc::new(MemoryStore::new());
        let mut record = SessionRecord::new("rt-1", T0);
        record.counters.tab_switches = 1;
        record.termination = Some(TerminationReason::LimitsReached);
        store.save(&record).unwrap();

        let (runtime, harness) = build_with_store(&config, aligned_model(), ScriptedMicrophone::new(), store);
        let mut handle = runtime.spawn();

        match handle.next_event().await {
            Some(SessionEvent::SubmissionFailed { error }) => {
                assert_eq!(error, crate::controller::INTERRUPTED_SUBMISSION)
            }
            other => panic!("expected a pending retry, got {:?}", other),
        }
        assert_eq!(harness.provider.enter_requests(), 0);
        assert!(matches!(
            handle.answer("q1", "A").await,
            Err(SessionError::Finished)
        ));

        handle.retry_submission().unwrap();
        let snapshot = handle.join().await.unwrap();
        assert_eq!(snapshot.state, SessionState::Terminated(TerminationReason::LimitsReached));
        let calls = harness.submitter.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].counters.tab_switches, 1);
        assert!(harness.store.load("rt-1").unwrap().is_none());
    }

    #[test]
    fn test_restricted_device_rejected() {
        let config = ProctorConfig {
            device_restriction: true,
            ..proctor(600)
        };
        let phone = DeviceProfile {
            max_touch_points: 5,
            viewport_width: 390,
            screen_width: 390,
            user_agent: None,
        };
        assert!(matches!(
            admit_device(&DeviceGuard::default(), &phone, &config),
            Err(SessionError::DeviceRestricted(DeviceClass::Phone))
        ));
        assert_eq!(
            admit_device(&DeviceGuard::default(), &DeviceProfile::desktop(), &config).unwrap(),
            DeviceClass::Desktop
        );
    }
}
