//! Assessment Session
//!
//! Fuses the proctoring detectors into one session:
//! - Countdown clock that survives reloads
//! - Answer sheet with review marks
//! - Violation aggregation and the termination state machine
//! - Exactly-once submission with manual retry on failure
//!
//! [`SessionController`] is the synchronous state machine; [`SessionRuntime`]
//! drives it and every detector from a single tokio task.

mod answers;
mod clock;
mod config;
mod controller;
mod runtime;
mod submission;

pub use answers::{AnswerSheet, NOT_ATTENDED};
pub use clock::{Clock, SessionClock, TokioClock};
pub use config::{ProctorConfig, SessionConfig, TestDuration};
pub use controller::{
    SessionContext, SessionController, SessionSnapshot, SessionState, TerminationReason,
    ViolationReport,
};
pub use runtime::{admit_device, SessionEvent, SessionHandle, SessionRuntime};
pub use submission::{SubmissionPayload, Submitter};

use device_guard::DeviceClass;
use focus_guard::FocusError;
use session_store::StorageError;
use thiserror::Error;
use violation_tracker::TrackerError;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid test configuration: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),
    #[error("Fullscreen error: {0}")]
    Focus(#[from] FocusError),
    #[error("This test cannot be taken on a {0:?} device")]
    DeviceRestricted(DeviceClass),
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),
    #[error("Session already finished")]
    Finished,
    #[error("Session task is no longer running")]
    Closed,
    #[error("Session task failed: {0}")]
    Join(String),
}

/// Submission errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Submission rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Recording submitter for tests and the simulator
pub mod testing {
    use super::*;
    use std::future::Future;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Inner {
        calls: Vec<SubmissionPayload>,
        fail_next: u32,
    }

    /// Records every submission attempt, failing the next `n` on request
    #[derive(Default)]
    pub struct RecordingSubmitter {
        inner: Mutex<Inner>,
    }

    impl RecordingSubmitter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next(&self, n: u32) {
            if let Ok(mut inner) = self.inner.lock() {
                inner.fail_next = n;
            }
        }

        pub fn calls(&self) -> Vec<SubmissionPayload> {
            self.inner.lock().map(|i| i.calls.clone()).unwrap_or_default()
        }
    }

    impl Submitter for RecordingSubmitter {
        fn submit(
            &self,
            payload: &SubmissionPayload,
        ) -> impl Future<Output = Result<(), SubmitError>> + Send {
            let result = match self.inner.lock() {
                Ok(mut inner) => {
                    inner.calls.push(payload.clone());
                    if inner.fail_next > 0 {
                        inner.fail_next -= 1;
                        Err(SubmitError::Network("connection reset".into()))
                    } else {
                        Ok(())
                    }
                }
                Err(e) => Err(SubmitError::Network(format!("lock poisoned: {}", e))),
            };
            async move { result }
        }
    }
}
