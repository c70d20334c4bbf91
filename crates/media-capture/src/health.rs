//! Detector health

use serde::{Deserialize, Serialize};

/// Lifecycle of one detector within a session
///
/// A detector that fails setup or inference moves to `Disabled` and stays
/// there for the rest of the session. It is never retried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorHealth {
    /// Not started yet, or switched off by test configuration
    #[default]
    Idle,
    /// Producing samples
    Running,
    /// Failed and switched off for the remainder of the session
    Disabled { reason: String },
    /// Torn down with the session
    Stopped,
}

impl DetectorHealth {
    pub fn is_running(&self) -> bool {
        matches!(self, DetectorHealth::Running)
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, DetectorHealth::Disabled { .. })
    }
}
