//! Per-test proctoring configuration

use serde::{Deserialize, Deserializer, Serialize};
use session_store::ResultVisibility;
use violation_tracker::{Category, EnabledCategories, Limits, TerminationPolicy, TrackerConfig};

use crate::SessionError;

/// Test duration as authored: `{hours, minutes}`, values may arrive as strings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDuration {
    #[serde(deserialize_with = "lenient_u64")]
    pub hours: u64,
    #[serde(deserialize_with = "lenient_u64")]
    pub minutes: u64,
}

impl TestDuration {
    /// `None` when the total does not fit in a `u64`
    pub fn total_seconds(&self) -> Option<u64> {
        self.hours
            .checked_mul(3600)?
            .checked_add(self.minutes.checked_mul(60)?)
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Inbound configuration from the test-configuration backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProctorConfig {
    pub full_screen_mode: bool,
    pub face_detection: bool,
    pub device_restriction: bool,
    pub noise_detection: bool,
    pub duration: Option<TestDuration>,
    pub duration_seconds: Option<u64>,
    pub limits: Limits,
    pub policy: TerminationPolicy,
    pub result_visibility: ResultVisibility,
}

impl ProctorConfig {
    /// Parse the backend's JSON body
    pub fn from_json(body: &str) -> Result<Self, SessionError> {
        serde_json::from_str(body).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// `durationSeconds` wins over `{hours, minutes}`
    pub fn duration_seconds(&self) -> Result<u64, SessionError> {
        let seconds = match (self.duration_seconds, self.duration) {
            (Some(seconds), _) => seconds,
            (None, Some(duration)) => duration.total_seconds().ok_or_else(|| {
                SessionError::Config(format!(
                    "test duration {}h {}m out of range",
                    duration.hours, duration.minutes
                ))
            })?,
            (None, None) => return Err(SessionError::Config("test duration missing".into())),
        };
        if seconds == 0 {
            return Err(SessionError::Config("test duration must be positive".into()));
        }
        Ok(seconds)
    }

    /// Fullscreen mode covers both fullscreen exits and tab switches
    pub fn enabled_categories(&self) -> EnabledCategories {
        EnabledCategories::none()
            .with(Category::Fullscreen, self.full_screen_mode)
            .with(Category::TabSwitch, self.full_screen_mode)
            .with(Category::Noise, self.noise_detection)
            .with(Category::Face, self.face_detection)
    }

    pub fn tracker_config(&self, debounce_ms: u64) -> TrackerConfig {
        TrackerConfig {
            limits: self.limits,
            policy: self.policy,
            debounce_ms,
        }
    }
}

/// Session controller tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Automatic termination is deferred this long after mount (ms)
    pub grace_period_ms: u64,
    /// Debounce window per violation category (ms)
    pub debounce_ms: u64,
    /// Countdown tick period (ms)
    pub clock_tick_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5_000,
            debounce_ms: 1_000,
            clock_tick_ms: 1_000,
        }
    }
}
