//! Wall clock and session countdown

use chrono::Utc;

/// Source of epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock anchored to tokio's clock, so paused test time moves it
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base_epoch_ms: i64,
    anchor: tokio::time::Instant,
}

impl TokioClock {
    pub fn new(base_epoch_ms: i64) -> Self {
        Self {
            base_epoch_ms,
            anchor: tokio::time::Instant::now(),
        }
    }

    pub fn starting_now() -> Self {
        Self::new(Utc::now().timestamp_millis())
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.base_epoch_ms + self.anchor.elapsed().as_millis() as i64
    }
}

/// Countdown derived from the persisted start time
///
/// Remaining time is always recomputed from `start_epoch_ms`, so a reload
/// resumes where the previous page left off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    pub start_epoch_ms: i64,
    pub duration_seconds: u64,
}

impl SessionClock {
    pub fn new(start_epoch_ms: i64, duration_seconds: u64) -> Self {
        Self {
            start_epoch_ms,
            duration_seconds,
        }
    }

    pub fn elapsed_ms(&self, now_ms: i64) -> u64 {
        now_ms.saturating_sub(self.start_epoch_ms).max(0) as u64
    }

    pub fn remaining_seconds(&self, now_ms: i64) -> u64 {
        self.duration_seconds
            .saturating_sub(self.elapsed_ms(now_ms) / 1000)
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.remaining_seconds(now_ms) == 0
    }
}
