//! Filters stage decisions down to the ones worth a notification.

use crate::config::NotificationConfig;
use crate::core::{Stage, StageDecision};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

/// What the gate decided for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// Render and dispatch it
    Forward,
    /// Not a notifiable event
    Ignored,
    /// Same stage was announced within the display lifetime
    Suppressed,
}

/// Decides which decisions become notifications.
///
/// Must see every decision, not only alert-worthy ones, so it can tell
/// how deep the current idle episode went.
#[derive(Debug, Clone)]
pub struct AlertGate {
    notify_on_idle_wake: bool,
    group_notifications: bool,
    display_lifetime: Duration,
    deepest: Stage,
    recent: HashMap<Stage, DateTime<Utc>>,
}

impl AlertGate {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            notify_on_idle_wake: config.notify_on_idle_wake,
            group_notifications: config.group_notifications,
            display_lifetime: config.display_lifetime,
            deepest: Stage::Active,
            recent: HashMap::new(),
        }
    }

    /// Stages that can ever be announced.
    pub fn is_notifiable(stage: Stage) -> bool {
        matches!(
            stage,
            Stage::PreScreensaver | Stage::Screensaver | Stage::DisplayOff | Stage::Wake
        )
    }

    pub fn admit(&mut self, decision: &StageDecision) -> GateVerdict {
        let deepest = self.deepest;
        self.track_episode(decision.stage);

        if !decision.alert_worthy || !Self::is_notifiable(decision.stage) {
            return GateVerdict::Ignored;
        }

        if decision.stage == Stage::Wake && deepest <= Stage::Idle && !self.notify_on_idle_wake {
            return GateVerdict::Ignored;
        }

        if !self.group_notifications && self.within_lifetime(decision.stage, decision.evaluated_at) {
            return GateVerdict::Suppressed;
        }

        self.recent.insert(decision.stage, decision.evaluated_at);
        GateVerdict::Forward
    }

    fn track_episode(&mut self, stage: Stage) {
        if stage.is_non_idle() {
            self.deepest = Stage::Active;
        } else if stage > self.deepest {
            self.deepest = stage;
        }
    }

    fn within_lifetime(&self, stage: Stage, now: DateTime<Utc>) -> bool {
        self.recent
            .get(&stage)
            .and_then(|sent| (now - *sent).to_std().ok())
            .is_some_and(|age| age < self.display_lifetime)
    }
}
