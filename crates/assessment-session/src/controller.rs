//! Session controller state machine

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use session_store::{ResultVisibility, SessionRecord, SessionStore};
pub use session_store::TerminationReason;
use violation_tracker::{Category, RecordOutcome, ViolationCounters, ViolationTracker, Warning};

use crate::answers::AnswerSheet;
use crate::clock::SessionClock;
use crate::config::{ProctorConfig, SessionConfig};
use crate::submission::SubmissionPayload;
use crate::{SessionError, SubmitError};

/// Identity of one test-taking attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Persistence key for everything this attempt stores
    pub session_id: String,
    pub contest_id: String,
    /// Question ids in display order
    pub question_ids: Vec<String>,
}

/// Error shown when a reload lands on a submission that never finished
pub const INTERRUPTED_SUBMISSION: &str = "submission interrupted before the backend confirmed it";

/// Session lifecycle
///
/// Only `Active` accepts detector input. `Terminated` is absorbing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Active,
    Submitting(TerminationReason),
    SubmissionFailed {
        reason: TerminationReason,
        error: String,
    },
    Terminated(TerminationReason),
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, SessionState::Terminated(_))
    }

    /// Reason once submission has started
    pub fn termination(&self) -> Option<TerminationReason> {
        match self {
            SessionState::Active => None,
            SessionState::Submitting(reason)
            | SessionState::SubmissionFailed { reason, .. }
            | SessionState::Terminated(reason) => Some(*reason),
        }
    }
}

/// Result of feeding one violation signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViolationReport {
    pub outcome: RecordOutcome,
    /// Set when this violation started termination
    pub submission: Option<SubmissionPayload>,
}

/// View state for the host page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: SessionState,
    pub remaining_seconds: u64,
    pub counters: ViolationCounters,
    /// Number shown in the shared fullscreen/tab warning modal
    pub focus_warnings: u32,
    pub answered: usize,
    pub review_marked: usize,
    pub pending_warning: Option<Warning>,
    /// "Noise Detected" notice awaiting acknowledgement
    pub noise_notice: bool,
    pub deferred_termination: Option<TerminationReason>,
}

/// Violation aggregator and session controller
pub struct SessionController {
    context: SessionContext,
    config: SessionConfig,
    clock: SessionClock,
    tracker: ViolationTracker,
    answers: AnswerSheet,
    result_visibility: ResultVisibility,
    store: Arc<dyn SessionStore>,
    state: SessionState,
    mounted_at_ms: i64,
    deferred: Option<TerminationReason>,
    pending_warning: Option<Warning>,
    noise_notice: bool,
}

impl SessionController {
    /// Mount a session, resuming persisted state for the same session id
    pub fn resume(
        context: SessionContext,
        proctor: &ProctorConfig,
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        now_ms: i64,
    ) -> Result<Self, SessionError> {
        let duration_seconds = proctor.duration_seconds()?;

        let record = match store.load(&context.session_id)? {
            Some(record) => {
                info!(
                    "Resuming session {} started at {} with counters {:?}",
                    context.session_id, record.start_epoch_ms, record.counters
                );
                record
            }
            None => {
                let mut record = SessionRecord::new(context.session_id.clone(), now_ms);
                record.result_visibility = proctor.result_visibility;
                store.save(&record)?;
                info!("Starting session {} ({}s)", context.session_id, duration_seconds);
                record
            }
        };

        let tracker = ViolationTracker::new(
            proctor.tracker_config(config.debounce_ms),
            proctor.enabled_categories(),
            record.counters,
        )?;

        // A submission that started before the reload goes straight to retry
        let state = match record.termination {
            Some(reason) => {
                warn!(
                    "Session {}: {:?} submission did not complete before reload",
                    context.session_id, reason
                );
                SessionState::SubmissionFailed {
                    reason,
                    error: INTERRUPTED_SUBMISSION.to_string(),
                }
            }
            None => SessionState::Active,
        };
        let deferred = if state.is_active() && tracker.limits_exceeded() {
            warn!(
                "Session {}: restored counters {:?} already reach the limits",
                context.session_id, record.counters
            );
            Some(TerminationReason::LimitsReached)
        } else {
            None
        };

        Ok(Self {
            clock: SessionClock::new(record.start_epoch_ms, duration_seconds),
            answers: AnswerSheet::restore(record.answers, record.review_marked),
            result_visibility: record.result_visibility,
            context,
            config,
            tracker,
            store,
            state,
            mounted_at_ms: now_ms,
            deferred,
            pending_warning: None,
            noise_notice: false,
        })
    }

    /// Feed one raw violation signal
    pub fn record_violation(&mut self, category: Category, now_ms: i64) -> ViolationReport {
        if !self.state.is_active() {
            debug!(
                "Session {}: {} signal ignored in state {:?}",
                self.context.session_id, category, self.state
            );
            return ViolationReport {
                outcome: RecordOutcome::Ignored,
                submission: None,
            };
        }

        let outcome = self.tracker.record(category, now_ms.max(0) as u64);
        let mut submission = None;

        if let RecordOutcome::Counted { warning, .. } = &outcome {
            self.persist();
            info!(
                "Session {}: {} ({:?})",
                self.context.session_id,
                warning.message,
                self.tracker.counters()
            );
            if category == Category::Noise {
                self.noise_notice = true;
            }
            self.pending_warning = Some(warning.clone());

            if self.tracker.limits_exceeded() {
                submission = self.request_termination(TerminationReason::LimitsReached, now_ms);
            }
        }

        ViolationReport {
            outcome,
            submission,
        }
    }

    /// Countdown tick
    ///
    /// Fires clock-zero termination and re-evaluates triggers deferred by
    /// the grace period.
    pub fn tick(&mut self, now_ms: i64) -> Option<SubmissionPayload> {
        if !self.state.is_active() {
            return None;
        }
        if self.clock.is_expired(now_ms) {
            return self.request_termination(TerminationReason::ClockExpired, now_ms);
        }
        if self.tracker.limits_exceeded() {
            return self.request_termination(TerminationReason::LimitsReached, now_ms);
        }
        None
    }

    /// The user confirmed "Submit"
    pub fn confirm_submit(&mut self, now_ms: i64) -> Option<SubmissionPayload> {
        self.request_termination(TerminationReason::UserConfirmed, now_ms)
    }

    /// Leave `Active` at most once, returning the payload to submit
    pub fn request_termination(
        &mut self,
        reason: TerminationReason,
        now_ms: i64,
    ) -> Option<SubmissionPayload> {
        if !self.state.is_active() {
            debug!(
                "Session {}: {:?} ignored, already {:?}",
                self.context.session_id, reason, self.state
            );
            return None;
        }

        if reason.is_automatic() && self.in_grace(now_ms) {
            if self.deferred.is_none() {
                info!(
                    "Session {}: {:?} deferred until grace period ends",
                    self.context.session_id, reason
                );
            }
            self.deferred = Some(reason);
            return None;
        }

        warn!(
            "Session {} terminating: {:?}, counters {:?}",
            self.context.session_id,
            reason,
            self.tracker.counters()
        );
        self.deferred = None;
        self.pending_warning = None;
        self.noise_notice = false;
        self.state = SessionState::Submitting(reason);
        self.persist();
        Some(self.payload())
    }

    /// The backend accepted the submission
    pub fn submission_succeeded(&mut self) {
        let reason = match &self.state {
            SessionState::Submitting(reason) | SessionState::SubmissionFailed { reason, .. } => *reason,
            _ => return,
        };
        info!("Session {} submitted", self.context.session_id);
        self.state = SessionState::Terminated(reason);
        if let Err(e) = self.store.remove(&self.context.session_id) {
            warn!("Session {}: failed to clear stored state: {}", self.context.session_id, e);
        }
    }

    /// The submission call failed; answers and counters stay persisted
    pub fn submission_failed(&mut self, err: &SubmitError) {
        if let SessionState::Submitting(reason) = self.state {
            error!("Session {} submission failed: {}", self.context.session_id, err);
            self.state = SessionState::SubmissionFailed {
                reason,
                error: err.to_string(),
            };
        }
    }

    /// Manual retry after a failed submission
    pub fn retry_submission(&mut self) -> Option<SubmissionPayload> {
        let reason = match self.state {
            SessionState::SubmissionFailed { reason, .. } => reason,
            _ => return None,
        };
        info!("Session {}: retrying submission", self.context.session_id);
        self.state = SessionState::Submitting(reason);
        Some(self.payload())
    }

    pub fn select_answer(&mut self, question_id: &str, choice: &str) -> Result<(), SessionError> {
        self.check_question(question_id)?;
        self.answers.select(question_id, choice);
        self.persist();
        Ok(())
    }

    /// Returns the new review mark
    pub fn toggle_review(&mut self, question_id: &str) -> Result<bool, SessionError> {
        self.check_question(question_id)?;
        let marked = self.answers.toggle_review(question_id);
        self.persist();
        Ok(marked)
    }

    fn check_question(&self, question_id: &str) -> Result<(), SessionError> {
        if !self.state.is_active() || self.deferred.is_some() {
            return Err(SessionError::Finished);
        }
        if !self.context.question_ids.iter().any(|q| q == question_id) {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }
        Ok(())
    }

    pub fn acknowledge_warning(&mut self) {
        self.pending_warning = None;
    }

    pub fn acknowledge_noise(&mut self) {
        self.noise_notice = false;
    }

    fn in_grace(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.mounted_at_ms) < self.config.grace_period_ms as i64
    }

    fn persist(&self) {
        let record = SessionRecord {
            session_id: self.context.session_id.clone(),
            start_epoch_ms: self.clock.start_epoch_ms,
            counters: self.tracker.counters(),
            answers: self.answers.answers().clone(),
            review_marked: self.answers.review_marked().clone(),
            result_visibility: self.result_visibility,
            termination: self.state.termination(),
        };
        if let Err(e) = self.store.save(&record) {
            error!("Session {}: failed to persist state: {}", self.context.session_id, e);
        }
    }

    fn payload(&self) -> SubmissionPayload {
        let counters = self.tracker.counters();
        SubmissionPayload {
            contest_id: self.context.contest_id.clone(),
            answers: self.answers.finalize(&self.context.question_ids),
            is_publish: self.result_visibility.is_publish(),
            fullscreen_warning: counters.fullscreen_exits,
            noise_warning: counters.noise_events,
            face_warning: counters.face_anomalies,
            counters,
        }
    }

    pub fn snapshot(&self, now_ms: i64) -> SessionSnapshot {
        let counters = self.tracker.counters();
        SessionSnapshot {
            session_id: self.context.session_id.clone(),
            state: self.state.clone(),
            remaining_seconds: self.clock.remaining_seconds(now_ms),
            counters,
            focus_warnings: counters.focus_warnings(),
            answered: self.answers.answered(),
            review_marked: self.answers.review_marked().len(),
            pending_warning: self.pending_warning.clone(),
            noise_notice: self.noise_notice,
            deferred_termination: self.deferred,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn counters(&self) -> ViolationCounters {
        self.tracker.counters()
    }

    pub fn remaining_seconds(&self, now_ms: i64) -> u64 {
        self.clock.remaining_seconds(now_ms)
    }

    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }

    pub fn tick_period_ms(&self) -> u64 {
        self.config.clock_tick_ms
    }
}
