//! Violation Tracking
//!
//! Provides per-category violation counters, debouncing, ordinal warnings,
//! and the termination policy over configured limits.

mod counters;
mod tracker;

pub use counters::{ordinal, Category, EnabledCategories, Limits, ViolationCounters};
pub use tracker::{
    Debouncer, RecordOutcome, TerminationPolicy, TrackerConfig, ViolationTracker, Warning,
};

use thiserror::Error;

/// Tracker errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("Limit for {0} must be at least 1")]
    InvalidLimit(Category),
}
