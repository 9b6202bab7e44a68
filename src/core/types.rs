//! Snapshot, threshold and decision types exchanged with the stage engine.

use crate::core::stage::{Milestone, Stage, Trigger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A point-in-time reading of the machine's idle metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Seconds since the last user input
    pub idle_seconds: f64,
    /// Configured screensaver timeout, absent if disabled or unknown
    #[serde(default, with = "crate::config::duration_serde::option")]
    pub screensaver_threshold: Option<Duration>,
    /// Configured display-sleep timeout, absent if disabled or unknown
    #[serde(default, with = "crate::config::duration_serde::option")]
    pub display_off_threshold: Option<Duration>,
    /// Whether the screensaver is currently running
    #[serde(default)]
    pub screensaver_active: bool,
    /// Whether the display is currently powered off
    #[serde(default)]
    pub display_off: bool,
}

impl Snapshot {
    /// A snapshot with only an idle reading: no thresholds, no flags.
    pub fn idle(idle_seconds: f64) -> Self {
        Self {
            idle_seconds,
            screensaver_threshold: None,
            display_off_threshold: None,
            screensaver_active: false,
            display_off: false,
        }
    }

    pub fn with_thresholds(
        mut self,
        screensaver: Option<Duration>,
        display_off: Option<Duration>,
    ) -> Self {
        self.screensaver_threshold = screensaver;
        self.display_off_threshold = display_off;
        self
    }

    pub fn with_screensaver_active(mut self, active: bool) -> Self {
        self.screensaver_active = active;
        self
    }

    pub fn with_display_off(mut self, off: bool) -> Self {
        self.display_off = off;
        self
    }
}

/// The thresholds the engine actually used for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(with = "crate::config::duration_serde::option")]
    pub screensaver: Option<Duration>,
    #[serde(with = "crate::config::duration_serde::option")]
    pub display_off: Option<Duration>,
    /// Whether both values came from the no-modes fallback interval
    pub fallback: bool,
}

impl Thresholds {
    /// Resolve effective thresholds from a snapshot.
    ///
    /// A zero timeout means the mode is disabled. When the machine reports
    /// neither timeout, `fallback` (if any) stands in for both.
    pub fn resolve(snapshot: &Snapshot, fallback: Option<Duration>) -> Self {
        let screensaver = snapshot.screensaver_threshold.filter(|d| !d.is_zero());
        let display_off = snapshot.display_off_threshold.filter(|d| !d.is_zero());

        if screensaver.is_none() && display_off.is_none() {
            if let Some(interval) = fallback.filter(|d| !d.is_zero()) {
                return Self {
                    screensaver: Some(interval),
                    display_off: Some(interval),
                    fallback: true,
                };
            }
        }

        Self {
            screensaver,
            display_off,
            fallback: false,
        }
    }

    /// The milestone whose threshold drives the pre-alert: the screensaver,
    /// or display sleep on machines without a screensaver timeout.
    pub fn imminent(&self) -> Option<(Milestone, Duration)> {
        self.screensaver
            .map(|d| (Milestone::Screensaver, d))
            .or_else(|| self.display_off.map(|d| (Milestone::DisplayOff, d)))
    }

    pub fn for_milestone(&self, milestone: Milestone) -> Option<Duration> {
        match milestone {
            Milestone::Screensaver => self.screensaver,
            Milestone::DisplayOff => self.display_off,
        }
    }
}

/// The engine's verdict for one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageDecision {
    pub stage: Stage,
    /// Stage of the previous cycle
    pub previous: Stage,
    /// True only when `stage` differs from the previous cycle's stage
    pub is_transition: bool,
    /// Whether this decision should produce a notification
    pub alert_worthy: bool,
    /// Condition that produced `stage`
    pub trigger: Trigger,
    /// Clamped idle time of this cycle
    #[serde(with = "crate::config::duration_serde")]
    pub idle: Duration,
    /// Time since the reference timer relevant to `stage` was armed
    #[serde(with = "crate::config::duration_serde::option")]
    pub since_timer: Option<Duration>,
    /// Time left until the next milestone, when one is known
    #[serde(with = "crate::config::duration_serde::option")]
    pub until_next: Option<Duration>,
    /// For `Wake`: the deepest idle reading of the episode that just ended
    #[serde(with = "crate::config::duration_serde::option")]
    pub idle_before_wake: Option<Duration>,
    pub thresholds: Thresholds,
    pub evaluated_at: DateTime<Utc>,
}

impl StageDecision {
    /// Grouping key for the notification center.
    pub fn group_key(&self) -> &'static str {
        self.stage.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Option<Duration> {
        Some(Duration::from_secs(s))
    }

    #[test]
    fn test_reported_thresholds_used_verbatim() {
        let snapshot = Snapshot::idle(10.0).with_thresholds(secs(300), secs(600));
        let resolved = Thresholds::resolve(&snapshot, secs(120));
        assert_eq!(resolved.screensaver, secs(300));
        assert_eq!(resolved.display_off, secs(600));
        assert!(!resolved.fallback);
    }

    #[test]
    fn test_fallback_applies_only_when_both_absent() {
        let snapshot = Snapshot::idle(10.0);
        let resolved = Thresholds::resolve(&snapshot, secs(600));
        assert_eq!(resolved.screensaver, secs(600));
        assert_eq!(resolved.display_off, secs(600));
        assert!(resolved.fallback);

        let partial = Snapshot::idle(10.0).with_thresholds(None, secs(900));
        let resolved = Thresholds::resolve(&partial, secs(600));
        assert_eq!(resolved.screensaver, None);
        assert_eq!(resolved.display_off, secs(900));
        assert!(!resolved.fallback);
    }

    #[test]
    fn test_zero_timeout_means_disabled() {
        let snapshot = Snapshot::idle(10.0).with_thresholds(secs(0), secs(0));
        let resolved = Thresholds::resolve(&snapshot, None);
        assert_eq!(resolved, Thresholds::default());
    }

    #[test]
    fn test_imminent_prefers_screensaver() {
        let both = Thresholds {
            screensaver: secs(300),
            display_off: secs(600),
            fallback: false,
        };
        assert_eq!(
            both.imminent(),
            Some((Milestone::Screensaver, Duration::from_secs(300)))
        );

        let display_only = Thresholds {
            screensaver: None,
            display_off: secs(600),
            fallback: false,
        };
        assert_eq!(
            display_only.imminent(),
            Some((Milestone::DisplayOff, Duration::from_secs(600)))
        );
    }

    #[test]
    fn test_snapshot_parses_with_defaults() {
        let snapshot: Snapshot =
            serde_json::from_str(r#"{"idle_seconds": 42.5, "screensaver_threshold": 300}"#)
                .unwrap();
        assert_eq!(snapshot.idle_seconds, 42.5);
        assert_eq!(snapshot.screensaver_threshold, secs(300));
        assert_eq!(snapshot.display_off_threshold, None);
        assert!(!snapshot.display_off);
    }
}
