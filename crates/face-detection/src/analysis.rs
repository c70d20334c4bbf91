//! Face classification results and on-screen indicator

use media_capture::DetectionFrame;
use serde::{Deserialize, Serialize};

/// Per-frame face status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceStatus {
    /// Exactly one face, eyes visible, looking at the screen
    Aligned,

    /// Exactly one face, eyes out of frame or head turned away
    Misaligned,

    /// No user present
    NoFace,

    /// Multiple people present
    MultipleFaces,
}

impl FaceStatus {
    /// Whether this status counts as an anomaly
    pub fn is_flagged(self) -> bool {
        !matches!(self, FaceStatus::Aligned)
    }

    pub fn describe(self) -> &'static str {
        match self {
            FaceStatus::Aligned => "face aligned",
            FaceStatus::Misaligned => "face not aligned with screen",
            FaceStatus::NoFace => "no user present",
            FaceStatus::MultipleFaces => "multiple people present",
        }
    }
}

/// Indicator icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorIcon {
    Check,
    Warning,
    UserSlash,
    Users,
}

/// Indicator color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndicatorColor {
    Gray,
    Green,
    Red,
}

/// On-screen indicator, refreshed every sample tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub icon: IndicatorIcon,
    pub color: IndicatorColor,
}

impl Default for Indicator {
    /// Gray check shown before the first sample
    fn default() -> Self {
        Self {
            icon: IndicatorIcon::Check,
            color: IndicatorColor::Gray,
        }
    }
}

impl From<FaceStatus> for Indicator {
    fn from(status: FaceStatus) -> Self {
        let (icon, color) = match status {
            FaceStatus::Aligned => (IndicatorIcon::Check, IndicatorColor::Green),
            FaceStatus::Misaligned => (IndicatorIcon::Warning, IndicatorColor::Red),
            FaceStatus::NoFace => (IndicatorIcon::UserSlash, IndicatorColor::Red),
            FaceStatus::MultipleFaces => (IndicatorIcon::Users, IndicatorColor::Red),
        };
        Self { icon, color }
    }
}

/// Complete result of one sample tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub status: FaceStatus,

    pub indicator: Indicator,

    /// Raw detector output summary
    pub frame: DetectionFrame,

    /// True only on the tick where the status turned flagged. Sustained
    /// anomalies do not re-trigger until an aligned frame is seen.
    pub newly_flagged: bool,
}

impl FaceAnalysis {
    pub fn is_flagged(&self) -> bool {
        self.status.is_flagged()
    }
}
