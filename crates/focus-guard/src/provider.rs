//! Browser focus/fullscreen provider seam

use serde::{Deserialize, Serialize};
use crate::FocusError;

/// Raw events forwarded by the host page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusEvent {
    /// The document left fullscreen
    FullscreenExited,
    /// Window lost OS-level focus
    WindowBlurred,
    /// Window regained focus
    WindowFocused,
    /// Page visibility became hidden
    VisibilityHidden,
    /// Page visibility became visible
    VisibilityVisible,
    /// Page-unload warning hook fired (reload or navigation away)
    UnloadAttempted,
}

/// Listener callback
pub type FocusCallback = Box<dyn Fn(FocusEvent) + Send + Sync>;

/// Registered listeners. Dropping it removes them.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// A subscription with nothing to remove
    pub fn noop() -> Self {
        Self { remove: None }
    }

    /// Remove the listeners now
    pub fn cancel(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

/// Access to the page's fullscreen, visibility, and focus state
pub trait FocusProvider: Send + Sync {
    /// Register a callback for fullscreen-exit, blur/focus, visibility,
    /// and unload events
    fn on_exit(&self, callback: FocusCallback) -> Subscription;

    /// Whether the document is currently fullscreen
    fn is_active(&self) -> bool;

    /// Whether the document currently has focus
    fn has_focus(&self) -> bool;

    /// Ask the browser to enter fullscreen
    fn request_enter(&self) -> Result<(), FocusError>;
}
