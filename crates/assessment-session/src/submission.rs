//! Outbound submission

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use violation_tracker::ViolationCounters;

use crate::SubmitError;

/// Body posted to the backend's submit endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(rename = "contestId")]
    pub contest_id: String,
    pub answers: BTreeMap<String, String>,
    #[serde(rename = "ispublish")]
    pub is_publish: bool,
    #[serde(rename = "FullscreenWarning")]
    pub fullscreen_warning: u32,
    #[serde(rename = "NoiseWarning")]
    pub noise_warning: u32,
    #[serde(rename = "FaceWarning")]
    pub face_warning: u32,
    /// Full tally, not read by the backend
    #[serde(rename = "violations")]
    pub counters: ViolationCounters,
}

impl SubmissionPayload {
    pub fn to_json(&self) -> Result<String, SubmitError> {
        serde_json::to_string(self).map_err(|e| SubmitError::Encode(e.to_string()))
    }
}

/// Performs the network submission
pub trait Submitter: Send + Sync + 'static {
    fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> impl Future<Output = Result<(), SubmitError>> + Send;
}
