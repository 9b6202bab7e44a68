//! Stage classification and reference-timer tracking.
//!
//! The engine is fed one [`Snapshot`] per poll cycle and answers with a
//! [`StageDecision`]. It owns all cross-cycle state: the current and previous
//! stage, one reference timer per milestone, and the last snapshot/decision
//! pair used to make repeated readings idempotent.
//!
//! Classification precedence (first match wins):
//!
//! 1. previously sleep-adjacent, idle below the wake floor and lower than
//!    the previous reading → `Wake`
//!    (and a `Wake` is always followed by `Active`)
//! 2. display off, or screensaver running when it counts as off → `DisplayOff`
//! 3. screensaver running → `Screensaver`
//! 4. idle past the imminent threshold minus the pre-alert lead → `PreScreensaver`
//! 5. idle at or above the wake floor → `Idle`
//! 6. otherwise → `Active`
//!
//! A result shallower than the current sleep-adjacent stage is held: the
//! engine only moves back towards `Active` through `Wake`.

use crate::core::duration::clamp_seconds;
use crate::core::stage::{Milestone, Stage, Trigger};
use crate::core::types::{Snapshot, StageDecision, Thresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Engine tuning, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Threshold used for both milestones when the machine reports neither
    pub idle_interval_if_no_modes_are_set: Option<Duration>,
    /// Classify a running screensaver as `DisplayOff`
    pub consider_screensaver_as_off: bool,
    /// How long before the imminent threshold `PreScreensaver` begins
    pub pre_alert_lead: Duration,
    /// Idle readings below this count as user activity
    pub wake_floor: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_interval_if_no_modes_are_set: Some(Duration::from_secs(300)),
            consider_screensaver_as_off: false,
            pre_alert_lead: Duration::from_secs(30),
            wake_floor: Duration::from_secs(2),
        }
    }
}

/// Wall-clock marks of the first entry into each milestone since the last wake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTimers {
    pub screensaver: Option<DateTime<Utc>>,
    pub display_off: Option<DateTime<Utc>>,
}

impl ReferenceTimers {
    pub fn get(&self, milestone: Milestone) -> Option<DateTime<Utc>> {
        match milestone {
            Milestone::Screensaver => self.screensaver,
            Milestone::DisplayOff => self.display_off,
        }
    }

    /// Arm a timer unless it is already armed. Returns true if newly armed.
    pub fn arm(&mut self, milestone: Milestone, now: DateTime<Utc>) -> bool {
        let slot = match milestone {
            Milestone::Screensaver => &mut self.screensaver,
            Milestone::DisplayOff => &mut self.display_off,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(now);
        true
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        self.screensaver.is_none() && self.display_off.is_none()
    }

    /// The earliest armed timer, if any.
    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        match (self.screensaver, self.display_off) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Time elapsed since the given milestone's timer was armed.
    pub fn elapsed(&self, milestone: Milestone, now: DateTime<Utc>) -> Option<Duration> {
        self.get(milestone).map(|armed| elapsed_between(armed, now))
    }
}

fn elapsed_between(start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - start).to_std().unwrap_or(Duration::ZERO)
}

/// The stateful stage classifier.
#[derive(Debug, Clone)]
pub struct StageEngine {
    config: EngineConfig,
    current: Stage,
    previous: Stage,
    trigger: Trigger,
    timers: ReferenceTimers,
    thresholds: Thresholds,
    /// Deepest idle reading since the last reset to `Active`
    episode_idle: Duration,
    /// Clamped idle time of the previous cycle
    last_idle: Option<Duration>,
    last: Option<(Snapshot, StageDecision)>,
}

impl StageEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            current: Stage::Active,
            previous: Stage::Active,
            trigger: Trigger::InputActivity,
            timers: ReferenceTimers::default(),
            thresholds: Thresholds::default(),
            episode_idle: Duration::ZERO,
            last_idle: None,
            last: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn current_stage(&self) -> Stage {
        self.current
    }

    pub fn previous_stage(&self) -> Stage {
        self.previous
    }

    pub fn timers(&self) -> &ReferenceTimers {
        &self.timers
    }

    /// Thresholds resolved on the most recent cycle.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Evaluate a snapshot against the current wall clock.
    pub fn evaluate(&mut self, snapshot: &Snapshot) -> StageDecision {
        self.evaluate_at(snapshot, Utc::now())
    }

    /// Evaluate a snapshot taken at `now`.
    ///
    /// Calls must arrive in non-decreasing `now` order.
    pub fn evaluate_at(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> StageDecision {
        if let Some(repeat) = self.repeat_of_last(snapshot, now) {
            return repeat;
        }

        let idle = clamp_seconds(snapshot.idle_seconds);
        let thresholds = Thresholds::resolve(snapshot, self.config.idle_interval_if_no_modes_are_set);
        let (classified, trigger) = self.classify(idle, &thresholds, snapshot);

        let (stage, trigger) = if self.holds_against(classified) {
            (self.current, self.trigger)
        } else {
            (classified, trigger)
        };

        let mut since_timer = None;
        let mut idle_before_wake = None;

        match stage {
            Stage::Wake => {
                since_timer = self.timers.earliest().map(|armed| elapsed_between(armed, now));
                idle_before_wake = Some(self.episode_idle);
                self.timers.clear();
                self.episode_idle = Duration::ZERO;
            }
            Stage::Active => {
                self.timers.clear();
                self.episode_idle = Duration::ZERO;
            }
            Stage::Idle => {
                self.episode_idle = self.episode_idle.max(idle);
            }
            Stage::PreScreensaver | Stage::Screensaver | Stage::DisplayOff => {
                self.episode_idle = self.episode_idle.max(idle);
                let milestone = self.milestone_for(stage, &thresholds);
                if self.timers.arm(milestone, now) {
                    debug!(%stage, milestone = milestone.label(), "reference timer armed");
                }
                since_timer = self.timers.elapsed(milestone, now);
            }
        }

        let until_next = Self::until_next(stage, idle, &thresholds);
        let is_transition = stage != self.current;

        let decision = StageDecision {
            stage,
            previous: self.current,
            is_transition,
            alert_worthy: is_transition,
            trigger,
            idle,
            since_timer,
            until_next,
            idle_before_wake,
            thresholds,
            evaluated_at: now,
        };

        debug!(
            stage = %decision.stage,
            previous = %decision.previous,
            idle_secs = idle.as_secs_f64(),
            transition = is_transition,
            "stage evaluated"
        );

        self.previous = self.current;
        self.current = stage;
        self.trigger = trigger;
        self.thresholds = thresholds;
        self.last_idle = Some(idle);
        self.last = Some((snapshot.clone(), decision.clone()));

        decision
    }

    /// Forget all state and return to `Active`.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// An identical consecutive snapshot repeats the previous decision
    /// without alerting and without touching engine state.
    fn repeat_of_last(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> Option<StageDecision> {
        let (last_snapshot, last_decision) = self.last.as_ref()?;
        if last_snapshot != snapshot {
            return None;
        }

        let mut repeat = last_decision.clone();
        repeat.previous = last_decision.stage;
        repeat.is_transition = false;
        repeat.alert_worthy = false;
        repeat.evaluated_at = now;
        if repeat.stage != Stage::Wake && repeat.since_timer.is_some() {
            let milestone = self.milestone_for(repeat.stage, &repeat.thresholds);
            repeat.since_timer = self.timers.elapsed(milestone, now);
        }

        self.previous = self.current;
        Some(repeat)
    }

    fn classify(&self, idle: Duration, thresholds: &Thresholds, snapshot: &Snapshot) -> (Stage, Trigger) {
        let below_floor = idle < self.config.wake_floor;
        let idle_reset = self.last_idle.is_some_and(|last| idle < last);

        if self.current.is_sleep_adjacent() && below_floor && idle_reset {
            return (Stage::Wake, Trigger::InputActivity);
        }
        if self.current == Stage::Wake {
            return (Stage::Active, Trigger::InputActivity);
        }

        if snapshot.display_off {
            return (Stage::DisplayOff, Trigger::DisplayOff);
        }
        if snapshot.screensaver_active {
            let stage = if self.config.consider_screensaver_as_off {
                Stage::DisplayOff
            } else {
                Stage::Screensaver
            };
            return (stage, Trigger::ScreensaverActive);
        }

        if let Some((_, threshold)) = thresholds.imminent() {
            if idle >= self.pre_alert_start(threshold) {
                return (Stage::PreScreensaver, Trigger::IdleTime);
            }
        }

        if below_floor {
            (Stage::Active, Trigger::InputActivity)
        } else {
            (Stage::Idle, Trigger::IdleTime)
        }
    }

    /// Whether a classification would move back from the current
    /// sleep-adjacent stage without passing through `Wake`.
    fn holds_against(&self, classified: Stage) -> bool {
        self.current.is_sleep_adjacent() && classified != Stage::Wake && classified < self.current
    }

    /// The pre-alert begins `pre_alert_lead` before the threshold, and never
    /// below the wake floor.
    fn pre_alert_start(&self, threshold: Duration) -> Duration {
        threshold
            .saturating_sub(self.config.pre_alert_lead)
            .max(self.config.wake_floor)
    }

    fn milestone_for(&self, stage: Stage, thresholds: &Thresholds) -> Milestone {
        match stage {
            Stage::DisplayOff => Milestone::DisplayOff,
            Stage::PreScreensaver => thresholds
                .imminent()
                .map(|(milestone, _)| milestone)
                .unwrap_or(Milestone::Screensaver),
            _ => Milestone::Screensaver,
        }
    }

    fn until_next(stage: Stage, idle: Duration, thresholds: &Thresholds) -> Option<Duration> {
        let remaining = |threshold: Duration| threshold.checked_sub(idle).filter(|d| !d.is_zero());
        match stage {
            Stage::Idle | Stage::PreScreensaver => {
                thresholds.imminent().and_then(|(_, threshold)| remaining(threshold))
            }
            Stage::Screensaver => thresholds.display_off.and_then(remaining),
            _ => None,
        }
    }
}

impl Default for StageEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
