//! Violation Tracker Implementation

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::counters::{ordinal, Category, EnabledCategories, Limits, ViolationCounters};
use crate::TrackerError;

/// How limits combine into a termination decision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationPolicy {
    /// Any single enabled category at its limit terminates
    Any,
    /// Every enabled category must be at its limit
    #[default]
    All,
}

/// Tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub limits: Limits,
    pub policy: TerminationPolicy,
    /// Minimum gap between two accepted increments of one category (ms)
    pub debounce_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            policy: TerminationPolicy::All,
            debounce_ms: 1000,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), TrackerError> {
        for category in Category::ALL {
            if self.limits.get(category) == 0 {
                return Err(TrackerError::InvalidLimit(category));
            }
        }
        Ok(())
    }
}

/// Per-category in-flight flag
///
/// An accepted increment holds the flag for the debounce window. Release
/// is purely time-based, so a stalled side effect can never wedge it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Debouncer {
    processing_until_ms: Option<u64>,
}

impl Debouncer {
    /// Try to take the flag at `now_ms`
    pub fn try_accept(&mut self, now_ms: u64, window_ms: u64) -> bool {
        if let Some(until) = self.processing_until_ms {
            if now_ms < until {
                return false;
            }
        }
        self.processing_until_ms = Some(now_ms.saturating_add(window_ms));
        true
    }

    pub fn is_processing(&self, now_ms: u64) -> bool {
        self.processing_until_ms.map_or(false, |until| now_ms < until)
    }
}

/// User-facing warning for one accepted violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub category: Category,
    /// Counter value after this violation
    pub count: u32,
    pub message: String,
}

impl Warning {
    fn new(category: Category, count: u32) -> Self {
        Self {
            category,
            count,
            message: format!("{} Warning: {}", ordinal(count), category.warning_text()),
        }
    }
}

/// Result of recording one raw violation signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Category not monitored for this test
    Ignored,
    /// Coalesced into the previous increment
    Debounced,
    /// Counter incremented
    Counted {
        warning: Warning,
        /// This category has reached its limit
        at_limit: bool,
    },
}

/// Violation tracker with debouncing and limit policy
pub struct ViolationTracker {
    config: TrackerConfig,
    enabled: EnabledCategories,
    counters: ViolationCounters,
    debouncers: [Debouncer; 4],
}

impl ViolationTracker {
    /// Create a new tracker, resuming from previously persisted counters
    pub fn new(
        config: TrackerConfig,
        enabled: EnabledCategories,
        restored: ViolationCounters,
    ) -> Result<Self, TrackerError> {
        config.validate()?;
        info!(
            "Creating violation tracker: limits {:?}, policy {:?}, restored {:?}",
            config.limits, config.policy, restored
        );
        Ok(Self {
            config,
            enabled,
            counters: restored,
            debouncers: [Debouncer::default(); 4],
        })
    }

    /// Record one raw signal at `now_ms`
    pub fn record(&mut self, category: Category, now_ms: u64) -> RecordOutcome {
        if !self.enabled.contains(category) {
            debug!("Ignoring {} signal: category not monitored", category);
            return RecordOutcome::Ignored;
        }

        let window = self.config.debounce_ms;
        if !self.debouncers[category.index()].try_accept(now_ms, window) {
            debug!("Debounced {} signal at {}ms", category, now_ms);
            return RecordOutcome::Debounced;
        }

        let count = self.counters.increment(category);
        let at_limit = count >= self.config.limits.get(category);
        let warning = Warning::new(category, count);

        if at_limit {
            warn!(
                "{} violations at limit: {}/{}",
                category,
                count,
                self.config.limits.get(category)
            );
        } else {
            info!("{} violation recorded (count: {})", category, count);
        }

        RecordOutcome::Counted { warning, at_limit }
    }

    /// Categories at or over their limit
    pub fn breached(&self) -> Vec<Category> {
        self.enabled
            .iter()
            .filter(|&c| self.counters.get(c) >= self.config.limits.get(c))
            .collect()
    }

    /// Whether the termination policy is satisfied
    pub fn limits_exceeded(&self) -> bool {
        if self.enabled.is_empty() {
            return false;
        }
        match self.config.policy {
            TerminationPolicy::Any => !self.breached().is_empty(),
            TerminationPolicy::All => self
                .enabled
                .iter()
                .all(|c| self.counters.get(c) >= self.config.limits.get(c)),
        }
    }

    pub fn counters(&self) -> ViolationCounters {
        self.counters
    }

    pub fn enabled(&self) -> EnabledCategories {
        self.enabled
    }

    pub fn policy(&self) -> TerminationPolicy {
        self.config.policy
    }

    /// Whether a category's in-flight flag is held at `now_ms`
    pub fn is_processing(&self, category: Category, now_ms: u64) -> bool {
        self.debouncers[category.index()].is_processing(now_ms)
    }
}
