//! Device Type Guard
//!
//! Evaluated once at session start. Phones and tablets are blocked when
//! the test enables device restriction; the only way past the block is
//! leaving the test.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Viewport breakpoints (CSS pixels)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Widths below this are phones
    pub phone_max_width: u32,
    /// Widths below this (and at least `phone_max_width`) are tablets
    pub tablet_max_width: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            phone_max_width: 600,
            tablet_max_width: 900,
        }
    }
}

/// Signals the host reads from the browser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// `navigator.maxTouchPoints`
    pub max_touch_points: u32,
    /// `window.innerWidth`
    pub viewport_width: u32,
    /// `screen.width`
    pub screen_width: u32,
    pub user_agent: Option<String>,
}

impl DeviceProfile {
    pub fn desktop() -> Self {
        Self {
            max_touch_points: 0,
            viewport_width: 1440,
            screen_width: 1440,
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64)".into()),
        }
    }

    fn is_touch(&self) -> bool {
        self.max_touch_points > 0
    }

    fn ua_contains(&self, needles: &[&str]) -> bool {
        self.user_agent
            .as_deref()
            .map_or(false, |ua| needles.iter().any(|n| ua.contains(n)))
    }
}

/// Device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Phone,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn is_restricted(self) -> bool {
        matches!(self, DeviceClass::Phone | DeviceClass::Tablet)
    }
}

/// Outcome of the start-of-session check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceGate {
    Allowed(DeviceClass),
    /// Persistent modal, no bypass
    Blocked(DeviceClass),
}

impl DeviceGate {
    pub fn is_blocked(self) -> bool {
        matches!(self, DeviceGate::Blocked(_))
    }

    pub fn message(self) -> Option<&'static str> {
        match self {
            DeviceGate::Blocked(_) => Some("This test cannot be taken on a mobile or tablet device."),
            DeviceGate::Allowed(_) => None,
        }
    }
}

/// Device classifier
pub struct DeviceGuard {
    config: DeviceConfig,
}

impl DeviceGuard {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// Classify from user agent hints first, then touch plus width
    pub fn classify(&self, profile: &DeviceProfile) -> DeviceClass {
        if profile.ua_contains(&["iPad", "Tablet"]) {
            return DeviceClass::Tablet;
        }
        if profile.ua_contains(&["iPhone", "Mobi"]) {
            return DeviceClass::Phone;
        }
        if profile.ua_contains(&["Android"]) {
            return DeviceClass::Tablet;
        }

        // A desktop with a narrow window is still a desktop
        if !profile.is_touch() {
            return DeviceClass::Desktop;
        }
        let width = match profile.screen_width {
            0 => profile.viewport_width,
            screen => screen,
        };
        if width < self.config.phone_max_width {
            DeviceClass::Phone
        } else if width < self.config.tablet_max_width {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    /// One-shot gate evaluation
    pub fn evaluate(&self, profile: &DeviceProfile, restriction_enabled: bool) -> DeviceGate {
        let class = self.classify(profile);
        if restriction_enabled && class.is_restricted() {
            warn!("Device restriction: {:?} blocked (viewport {}px)", class, profile.viewport_width);
            DeviceGate::Blocked(class)
        } else {
            info!("Device check passed: {:?}", class);
            DeviceGate::Allowed(class)
        }
    }
}

impl Default for DeviceGuard {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn touch(width: u32) -> DeviceProfile {
        DeviceProfile {
            max_touch_points: 5,
            viewport_width: width,
            screen_width: width,
            user_agent: None,
        }
    }

    #[test]
    fn test_desktop_allowed() {
        let guard = DeviceGuard::default();
        assert_eq!(
            guard.evaluate(&DeviceProfile::desktop(), true),
            DeviceGate::Allowed(DeviceClass::Desktop)
        );
    }

    #[test]
    fn test_touch_widths() {
        let guard = DeviceGuard::default();
        assert_eq!(guard.classify(&touch(390)), DeviceClass::Phone);
        assert_eq!(guard.classify(&touch(768)), DeviceClass::Tablet);
        assert_eq!(guard.classify(&touch(1366)), DeviceClass::Desktop);
    }

    #[test]
    fn test_user_agent_wins() {
        let guard = DeviceGuard::default();
        let mut profile = DeviceProfile::desktop();
        profile.user_agent = Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile".into());
        assert_eq!(guard.classify(&profile), DeviceClass::Phone);

        profile.user_agent = Some("Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)".into());
        assert_eq!(guard.classify(&profile), DeviceClass::Tablet);
    }

    #[test]
    fn test_phone_allowed_when_restriction_off() {
        let guard = DeviceGuard::default();
        let gate = guard.evaluate(&touch(390), false);
        assert_eq!(gate, DeviceGate::Allowed(DeviceClass::Phone));
        assert!(gate.message().is_none());
    }

    #[test]
    fn test_phone_blocked_when_restriction_on() {
        let guard = DeviceGuard::default();
        let gate = guard.evaluate(&touch(390), true);
        assert!(gate.is_blocked());
        assert!(gate.message().is_some());
    }

    proptest! {
        #[test]
        fn prop_non_touch_without_ua_is_desktop(width in 200u32..4000) {
            let guard = DeviceGuard::default();
            let profile = DeviceProfile {
                max_touch_points: 0,
                viewport_width: width,
                screen_width: width,
                user_agent: None,
            };
            prop_assert_eq!(guard.classify(&profile), DeviceClass::Desktop);
        }
    }
}
