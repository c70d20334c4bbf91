//! Persisted session record

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use violation_tracker::ViolationCounters;

/// When the student may see the result
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultVisibility {
    #[serde(alias = "Immediate release")]
    Immediate,
    #[default]
    AfterReview,
}

impl ResultVisibility {
    /// Backend `ispublish` flag
    pub fn is_publish(self) -> bool {
        self == ResultVisibility::Immediate
    }
}

/// What ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    ClockExpired,
    LimitsReached,
    UserConfirmed,
}

impl TerminationReason {
    /// Automatic triggers wait out the grace period
    pub fn is_automatic(self) -> bool {
        !matches!(self, TerminationReason::UserConfirmed)
    }
}

/// Everything persisted for one in-progress session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub start_epoch_ms: i64,
    pub counters: ViolationCounters,
    /// Question id -> selected choice
    pub answers: BTreeMap<String, String>,
    pub review_marked: BTreeSet<String>,
    pub result_visibility: ResultVisibility,
    /// Set once submission has started; a reload resumes into the retry path
    pub termination: Option<TerminationReason>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, start_epoch_ms: i64) -> Self {
        Self {
            session_id: session_id.into(),
            start_epoch_ms,
            counters: ViolationCounters::default(),
            answers: BTreeMap::new(),
            review_marked: BTreeSet::new(),
            result_visibility: ResultVisibility::default(),
            termination: None,
        }
    }
}
