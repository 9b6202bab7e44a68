//! Discrete idle stages and the milestones that drive them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The classification of the machine's current idle/activity state.
///
/// Stages are declared in order of increasing idleness, so the derived
/// ordering compares how "deep" two sleep-adjacent stages are. `Wake` sits
/// last but is transient and never compared for depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// User input within the wake-detection floor.
    Active,
    /// No input for a while, nothing imminent yet.
    Idle,
    /// The screensaver (or display sleep) is about to engage.
    PreScreensaver,
    /// The screensaver is running.
    Screensaver,
    /// The display is powered off.
    DisplayOff,
    /// Input resumed after an idle episode.
    Wake,
}

impl Stage {
    /// All stages in declaration order.
    pub const ALL: [Stage; 6] = [
        Stage::Active,
        Stage::Idle,
        Stage::PreScreensaver,
        Stage::Screensaver,
        Stage::DisplayOff,
        Stage::Wake,
    ];

    /// Stable key, used as the notification group identifier.
    pub fn key(self) -> &'static str {
        match self {
            Stage::Active => "active",
            Stage::Idle => "idle",
            Stage::PreScreensaver => "pre_screensaver",
            Stage::Screensaver => "screensaver",
            Stage::DisplayOff => "display_off",
            Stage::Wake => "wake",
        }
    }

    /// Human-readable name shown as the notification subtitle.
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Active => "User Active",
            Stage::Idle => "User Idle",
            Stage::PreScreensaver => "Screensaver Soon",
            Stage::Screensaver => "Screensaver Time",
            Stage::DisplayOff => "Display Off",
            Stage::Wake => "Wake Up",
        }
    }

    /// Look a stage up by its key.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|stage| stage.key() == key)
    }

    /// Stages between the first idle reading and the next wake.
    pub fn is_sleep_adjacent(self) -> bool {
        matches!(
            self,
            Stage::Idle | Stage::PreScreensaver | Stage::Screensaver | Stage::DisplayOff
        )
    }

    /// Stages where the user is present.
    pub fn is_non_idle(self) -> bool {
        matches!(self, Stage::Active | Stage::Wake)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A power-management milestone with its own reference timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Screensaver,
    DisplayOff,
}

impl Milestone {
    pub fn label(self) -> &'static str {
        match self {
            Milestone::Screensaver => "screensaver",
            Milestone::DisplayOff => "display off",
        }
    }
}

/// The condition that produced a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Idle time below the wake-detection floor.
    InputActivity,
    /// Idle time measured against the effective thresholds.
    IdleTime,
    /// The screensaver reported itself as running.
    ScreensaverActive,
    /// The display reported itself as powered off.
    DisplayOff,
}
