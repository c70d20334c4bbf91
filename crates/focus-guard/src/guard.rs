//! Focus guard implementation

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::provider::{FocusEvent, FocusProvider};
use crate::FocusError;

/// Focus guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Period of the document-focus poll (milliseconds)
    pub poll_interval_ms: u64,
    /// Minimum gap between visibility transitions for a hide to count (milliseconds)
    pub visibility_grace_ms: u64,
    /// Delay before retrying a failed fullscreen re-entry (milliseconds)
    pub reentry_retry_ms: u64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            visibility_grace_ms: 500,
            reentry_retry_ms: 500,
        }
    }
}

/// Why a tab-switch class violation was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabSwitchCause {
    WindowBlur,
    VisibilityHidden,
    FocusPoll,
    Unload,
}

/// Violations this guard reports to the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusViolation {
    FullscreenExit,
    TabSwitch(TabSwitchCause),
}

/// What the view should show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSnapshot {
    /// Blocking "Return to Fullscreen" modal is up
    pub fullscreen_modal: bool,
    /// Page should blur and ignore input until focus returns
    pub input_blocked: bool,
    /// A failed re-entry is waiting to be retried
    pub reentry_pending: bool,
}

/// Turns raw focus events into violations
///
/// Monitoring is gated: nothing is reported unless fullscreen mode is
/// enabled for the test and the session has not finished.
pub struct FocusGuard {
    config: FocusConfig,
    fullscreen_mode: bool,
    finished: bool,
    has_focus: bool,
    last_visibility_change_ms: Option<u64>,
    modal_shown: bool,
    reentry_due_ms: Option<u64>,
}

impl FocusGuard {
    pub fn new(config: FocusConfig, fullscreen_mode: bool) -> Self {
        Self {
            config,
            fullscreen_mode,
            finished: false,
            has_focus: true,
            last_visibility_change_ms: None,
            modal_shown: false,
            reentry_due_ms: None,
        }
    }

    fn monitoring(&self) -> bool {
        self.fullscreen_mode && !self.finished
    }

    /// Enter fullscreen at session start
    pub fn enforce(&self, provider: &dyn FocusProvider) -> Result<(), FocusError> {
        if !self.monitoring() || provider.is_active() {
            return Ok(());
        }
        info!("Requesting fullscreen for session start");
        provider.request_enter()
    }

    /// Handle one raw event
    pub fn handle(&mut self, event: FocusEvent, now_ms: u64) -> Option<FocusViolation> {
        match event {
            FocusEvent::WindowFocused => {
                self.has_focus = true;
                None
            }
            FocusEvent::VisibilityVisible => {
                if self.monitoring() {
                    self.last_visibility_change_ms = Some(now_ms);
                }
                None
            }
            _ if !self.monitoring() => None,
            FocusEvent::FullscreenExited => {
                if !self.modal_shown {
                    warn!("Fullscreen exited at {}ms", now_ms);
                }
                self.modal_shown = true;
                self.reentry_due_ms = None;
                Some(FocusViolation::FullscreenExit)
            }
            FocusEvent::WindowBlurred => {
                self.has_focus = false;
                Some(FocusViolation::TabSwitch(TabSwitchCause::WindowBlur))
            }
            FocusEvent::VisibilityHidden => {
                let counted = self
                    .last_visibility_change_ms
                    .map_or(true, |last| now_ms.saturating_sub(last) > self.config.visibility_grace_ms);
                self.last_visibility_change_ms = Some(now_ms);
                if counted {
                    Some(FocusViolation::TabSwitch(TabSwitchCause::VisibilityHidden))
                } else {
                    debug!("Visibility flicker within {}ms ignored", self.config.visibility_grace_ms);
                    None
                }
            }
            FocusEvent::UnloadAttempted => Some(FocusViolation::TabSwitch(TabSwitchCause::Unload)),
        }
    }

    /// Periodic focus poll
    pub fn poll(&mut self, document_has_focus: bool) -> Option<FocusViolation> {
        if !self.monitoring() || document_has_focus {
            return None;
        }
        self.has_focus = false;
        Some(FocusViolation::TabSwitch(TabSwitchCause::FocusPoll))
    }

    /// The user pressed "Return to Fullscreen"
    pub fn return_to_fullscreen(
        &mut self,
        provider: &dyn FocusProvider,
        now_ms: u64,
    ) -> Result<(), FocusError> {
        self.modal_shown = false;
        self.reenter(provider, now_ms)
    }

    /// Retry a failed re-entry once its delay has passed
    pub fn tick(&mut self, provider: &dyn FocusProvider, now_ms: u64) {
        match self.reentry_due_ms {
            Some(due) if now_ms >= due => {
                let _ = self.reenter(provider, now_ms);
            }
            _ => {}
        }
    }

    fn reenter(&mut self, provider: &dyn FocusProvider, now_ms: u64) -> Result<(), FocusError> {
        self.reentry_due_ms = None;
        if !self.monitoring() || provider.is_active() {
            return Ok(());
        }
        match provider.request_enter() {
            Ok(()) => {
                info!("Fullscreen restored");
                Ok(())
            }
            Err(e) => {
                warn!("Fullscreen re-entry failed, retrying in {}ms: {}", self.config.reentry_retry_ms, e);
                self.reentry_due_ms = Some(now_ms + self.config.reentry_retry_ms);
                Err(e)
            }
        }
    }

    /// Stop counting once the session is over
    pub fn finish(&mut self) {
        self.finished = true;
        self.modal_shown = false;
        self.reentry_due_ms = None;
    }

    /// When the pending re-entry retry is due
    pub fn reentry_due_ms(&self) -> Option<u64> {
        self.reentry_due_ms
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot {
            fullscreen_modal: self.modal_shown,
            input_blocked: !self.has_focus,
            reentry_pending: self.reentry_due_ms.is_some(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }
}
