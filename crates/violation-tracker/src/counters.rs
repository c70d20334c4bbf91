//! Violation categories, counters, and limits

use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector categories counted toward termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Fullscreen,
    TabSwitch,
    Noise,
    Face,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Fullscreen,
        Category::TabSwitch,
        Category::Noise,
        Category::Face,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Category::Fullscreen => 0,
            Category::TabSwitch => 1,
            Category::Noise => 2,
            Category::Face => 3,
        }
    }

    /// Warning body shown after the ordinal
    pub fn warning_text(self) -> &'static str {
        match self {
            Category::Fullscreen => "You exited fullscreen mode!",
            Category::TabSwitch => "Tab switching or leaving the test window is not allowed!",
            Category::Noise => "Noise detected! Please ensure a quiet environment.",
            Category::Face => "Face detection issue detected!",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Fullscreen => "fullscreen",
            Category::TabSwitch => "tab-switch",
            Category::Noise => "noise",
            Category::Face => "face",
        };
        f.write_str(name)
    }
}

/// One counter per category
///
/// Counters only ever go up within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationCounters {
    pub fullscreen_exits: u32,
    pub tab_switches: u32,
    pub noise_events: u32,
    pub face_anomalies: u32,
}

impl ViolationCounters {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Fullscreen => self.fullscreen_exits,
            Category::TabSwitch => self.tab_switches,
            Category::Noise => self.noise_events,
            Category::Face => self.face_anomalies,
        }
    }

    /// Increment and return the new value
    pub(crate) fn increment(&mut self, category: Category) -> u32 {
        let slot = match category {
            Category::Fullscreen => &mut self.fullscreen_exits,
            Category::TabSwitch => &mut self.tab_switches,
            Category::Noise => &mut self.noise_events,
            Category::Face => &mut self.face_anomalies,
        };
        *slot = slot.saturating_add(1);
        *slot
    }

    /// Fullscreen and tab-switch warnings share one modal and one number
    pub fn focus_warnings(&self) -> u32 {
        self.fullscreen_exits + self.tab_switches
    }

    /// True when no counter in `self` is below the matching counter in `earlier`
    pub fn dominates(&self, earlier: &ViolationCounters) -> bool {
        Category::ALL.iter().all(|&c| self.get(c) >= earlier.get(c))
    }
}

/// Per-category termination limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Limits {
    pub fullscreen: u32,
    pub tab_switch: u32,
    pub noise: u32,
    pub face: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            fullscreen: 3,
            tab_switch: 1,
            noise: 2,
            face: 3,
        }
    }
}

impl Limits {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Fullscreen => self.fullscreen,
            Category::TabSwitch => self.tab_switch,
            Category::Noise => self.noise,
            Category::Face => self.face,
        }
    }
}

/// Which categories are monitored for this test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledCategories([bool; 4]);

impl EnabledCategories {
    pub fn all() -> Self {
        Self([true; 4])
    }

    pub fn none() -> Self {
        Self([false; 4])
    }

    pub fn with(mut self, category: Category, enabled: bool) -> Self {
        self.0[category.index()] = enabled;
        self
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0[category.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|c| self.contains(*c))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl Default for EnabledCategories {
    fn default() -> Self {
        Self::all()
    }
}

/// Ordinal label: First, Second, Third, then 4th, 5th, ..., 21st, 22nd
pub fn ordinal(n: u32) -> String {
    match n {
        1 => "First".to_string(),
        2 => "Second".to_string(),
        3 => "Third".to_string(),
        _ => {
            let suffix = match (n % 10, n % 100) {
                (_, 11..=13) => "th",
                (1, _) => "st",
                (2, _) => "nd",
                (3, _) => "rd",
                _ => "th",
            };
            format!("{}{}", n, suffix)
        }
    }
}
