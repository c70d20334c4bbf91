//! Focus and Fullscreen Guard
//!
//! Detects three conditions, each counted independently downstream:
//! - Fullscreen exit
//! - Tab or window blur (blur event, hidden visibility, or failed focus poll)
//! - Attempted navigation away or reload
//!
//! Browser state is reached only through [`FocusProvider`], so the guard
//! runs against a fake in tests.

mod guard;
mod provider;

pub use guard::{FocusConfig, FocusGuard, FocusSnapshot, FocusViolation, TabSwitchCause};
pub use provider::{FocusCallback, FocusEvent, FocusProvider, Subscription};

use thiserror::Error;

/// Focus guard errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FocusError {
    #[error("Fullscreen request denied: {0}")]
    RequestDenied(String),
    #[error("Fullscreen not supported by this browser")]
    NotSupported,
}

/// In-memory provider for tests and the simulator
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Inner {
        listeners: Vec<(u64, Arc<FocusCallback>)>,
        next_id: u64,
        fullscreen: bool,
        focused: bool,
        fail_enters: u32,
        enter_requests: u32,
    }

    /// Fake page state; clones share the same state
    #[derive(Clone)]
    pub struct FakeFocusProvider {
        inner: Arc<Mutex<Inner>>,
    }

    impl Default for FakeFocusProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeFocusProvider {
        pub fn new() -> Self {
            Self {
                inner: Arc::new(Mutex::new(Inner {
                    focused: true,
                    ..Default::default()
                })),
            }
        }

        /// Deliver an event to every listener, updating page state first
        pub fn emit(&self, event: FocusEvent) {
            let listeners: Vec<_> = match self.inner.lock() {
                Ok(mut inner) => {
                    match event {
                        FocusEvent::FullscreenExited => inner.fullscreen = false,
                        FocusEvent::WindowBlurred => inner.focused = false,
                        FocusEvent::WindowFocused => inner.focused = true,
                        _ => {}
                    }
                    inner.listeners.iter().map(|(_, cb)| cb.clone()).collect()
                }
                Err(_) => return,
            };
            for cb in listeners {
                (cb.as_ref())(event);
            }
        }

        pub fn set_focused(&self, focused: bool) {
            if let Ok(mut inner) = self.inner.lock() {
                inner.focused = focused;
            }
        }

        /// Make the next `n` fullscreen requests fail
        pub fn fail_next_enters(&self, n: u32) {
            if let Ok(mut inner) = self.inner.lock() {
                inner.fail_enters = n;
            }
        }

        pub fn enter_requests(&self) -> u32 {
            self.inner.lock().map(|i| i.enter_requests).unwrap_or(0)
        }

        pub fn listener_count(&self) -> usize {
            self.inner.lock().map(|i| i.listeners.len()).unwrap_or(0)
        }
    }

    impl FocusProvider for FakeFocusProvider {
        fn on_exit(&self, callback: FocusCallback) -> Subscription {
            let id = match self.inner.lock() {
                Ok(mut inner) => {
                    let id = inner.next_id;
                    inner.next_id += 1;
                    inner.listeners.push((id, Arc::new(callback)));
                    id
                }
                Err(_) => return Subscription::noop(),
            };
            let inner = Arc::clone(&self.inner);
            Subscription::new(move || {
                if let Ok(mut inner) = inner.lock() {
                    inner.listeners.retain(|(lid, _)| *lid != id);
                }
            })
        }

        fn is_active(&self) -> bool {
            self.inner.lock().map(|i| i.fullscreen).unwrap_or(false)
        }

        fn has_focus(&self) -> bool {
            self.inner.lock().map(|i| i.focused).unwrap_or(false)
        }

        fn request_enter(&self) -> Result<(), FocusError> {
            let mut inner = self
                .inner
                .lock()
                .map_err(|e| FocusError::RequestDenied(format!("lock poisoned: {}", e)))?;
            inner.enter_requests += 1;
            if inner.fail_enters > 0 {
                inner.fail_enters -= 1;
                return Err(FocusError::RequestDenied("user gesture required".into()));
            }
            inner.fullscreen = true;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeFocusProvider;
    use super::*;
    use std::sync::{Arc, Mutex};

    fn guard() -> FocusGuard {
        FocusGuard::new(FocusConfig::default(), true)
    }

    #[test]
    fn test_fullscreen_exit_shows_blocking_modal() {
        let provider = FakeFocusProvider::new();
        let mut guard = guard();
        guard.enforce(&provider).unwrap();
        assert!(provider.is_active());

        provider.emit(FocusEvent::FullscreenExited);
        assert_eq!(
            guard.handle(FocusEvent::FullscreenExited, 1_000),
            Some(FocusViolation::FullscreenExit)
        );
        assert!(guard.snapshot().fullscreen_modal);

        guard.return_to_fullscreen(&provider, 2_000).unwrap();
        assert!(!guard.snapshot().fullscreen_modal);
        assert_eq!(provider.enter_requests(), 2);
    }

    #[test]
    fn test_failed_reentry_is_retried() {
        let provider = FakeFocusProvider::new();
        let mut guard = guard();
        guard.handle(FocusEvent::FullscreenExited, 0);
        provider.fail_next_enters(1);

        assert!(guard.return_to_fullscreen(&provider, 100).is_err());
        assert!(guard.snapshot().reentry_pending);
        assert_eq!(guard.reentry_due_ms(), Some(600));

        guard.tick(&provider, 400);
        assert_eq!(provider.enter_requests(), 1);

        guard.tick(&provider, 600);
        assert_eq!(provider.enter_requests(), 2);
        assert!(provider.is_active());
        assert!(!guard.snapshot().reentry_pending);
        assert_eq!(guard.reentry_due_ms(), None);
    }

    #[test]
    fn test_blur_blocks_input_until_focus() {
        let mut guard = guard();
        assert_eq!(
            guard.handle(FocusEvent::WindowBlurred, 0),
            Some(FocusViolation::TabSwitch(TabSwitchCause::WindowBlur))
        );
        assert!(guard.snapshot().input_blocked);
        assert_eq!(guard.handle(FocusEvent::WindowFocused, 10), None);
        assert!(!guard.snapshot().input_blocked);
    }

    #[test]
    fn test_visibility_flicker_within_grace_ignored() {
        let mut guard = guard();
        assert!(guard.handle(FocusEvent::VisibilityHidden, 10_000).is_some());
        guard.handle(FocusEvent::VisibilityVisible, 10_100);
        assert!(guard.handle(FocusEvent::VisibilityHidden, 10_300).is_none());
        guard.handle(FocusEvent::VisibilityVisible, 10_400);
        assert!(guard.handle(FocusEvent::VisibilityHidden, 11_000).is_some());
    }

    #[test]
    fn test_focus_poll_and_unload() {
        let mut guard = guard();
        assert_eq!(guard.poll(true), None);
        assert_eq!(
            guard.poll(false),
            Some(FocusViolation::TabSwitch(TabSwitchCause::FocusPoll))
        );
        assert_eq!(
            guard.handle(FocusEvent::UnloadAttempted, 0),
            Some(FocusViolation::TabSwitch(TabSwitchCause::Unload))
        );
    }

    #[test]
    fn test_nothing_counted_when_fullscreen_mode_off() {
        let provider = FakeFocusProvider::new();
        let mut guard = FocusGuard::new(FocusConfig::default(), false);
        guard.enforce(&provider).unwrap();
        assert_eq!(provider.enter_requests(), 0);
        assert_eq!(guard.handle(FocusEvent::FullscreenExited, 0), None);
        assert_eq!(guard.handle(FocusEvent::WindowBlurred, 0), None);
        assert_eq!(guard.poll(false), None);
    }

    #[test]
    fn test_nothing_counted_after_finish() {
        let mut guard = guard();
        guard.finish();
        assert_eq!(guard.handle(FocusEvent::UnloadAttempted, 0), None);
        assert_eq!(guard.poll(false), None);
    }

    #[test]
    fn test_subscription_drop_removes_listener() {
        let provider = FakeFocusProvider::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = provider.on_exit(Box::new(move |e| sink.lock().unwrap().push(e)));
        assert_eq!(provider.listener_count(), 1);

        provider.emit(FocusEvent::WindowBlurred);
        drop(sub);
        provider.emit(FocusEvent::FullscreenExited);

        assert_eq!(provider.listener_count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![FocusEvent::WindowBlurred]);
    }
}
