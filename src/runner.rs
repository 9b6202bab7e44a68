//! The polling loop that drives the stage engine.
//!
//! Each tick takes one snapshot, classifies it and hands anything worth
//! announcing to the dispatch worker. The engine never sees cancellation;
//! the loop checks the token between cycles.

use crate::config::{Config, NotificationConfig};
use crate::core::{Stage, StageDecision, StageEngine};
use crate::machine::MetricsSource;
use crate::notifier::{render, AlertGate, DispatchWorker, GateVerdict};
use crate::session::{SessionSnapshot, SharedSessionStats};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Source of evaluation timestamps.
#[derive(Debug, Clone)]
pub enum Clock {
    /// The system clock
    Wall,
    /// A fixed step per cycle, for replaying recorded snapshots
    Simulated { next: DateTime<Utc>, step: Duration },
}

impl Clock {
    fn now(&mut self) -> DateTime<Utc> {
        match self {
            Clock::Wall => Utc::now(),
            Clock::Simulated { next, step } => {
                let now = *next;
                let step = chrono::Duration::from_std(*step)
                    .unwrap_or_else(|_| chrono::Duration::seconds(1));
                *next = now + step;
                now
            }
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    SourceExhausted,
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub final_stage: Stage,
    pub stats: SessionSnapshot,
}

type Observer = Box<dyn FnMut(&StageDecision)>;

/// Polls a metrics source until cancelled or exhausted.
pub struct RunLoop<S: MetricsSource> {
    source: S,
    engine: StageEngine,
    gate: AlertGate,
    notifications: NotificationConfig,
    tick: Duration,
    clock: Clock,
    paused: Arc<AtomicBool>,
    stats: SharedSessionStats,
    worker: DispatchWorker,
    observer: Option<Observer>,
}

impl<S: MetricsSource> RunLoop<S> {
    pub fn new(source: S, config: &Config, worker: DispatchWorker, stats: SharedSessionStats) -> Self {
        Self {
            source,
            engine: StageEngine::new(config.engine_config()),
            gate: AlertGate::new(&config.notifications),
            notifications: config.notifications.clone(),
            tick: config.poll_interval,
            clock: Clock::Wall,
            paused: Arc::new(AtomicBool::new(config.paused)),
            stats,
            worker,
            observer: None,
        }
    }

    /// Share a pause flag with whoever controls pausing.
    pub fn with_pause_flag(mut self, paused: Arc<AtomicBool>) -> Self {
        self.paused = paused;
        self
    }

    /// Use `clock` for evaluation timestamps and `tick` between cycles.
    pub fn with_clock(mut self, clock: Clock, tick: Duration) -> Self {
        self.clock = clock;
        self.tick = tick;
        self
    }

    /// Called with every decision, transition or not.
    pub fn with_observer(mut self, observer: impl FnMut(&StageDecision) + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn pause_flag(&self) -> Arc<AtomicBool> {
        self.paused.clone()
    }

    /// Run until `cancel` fires or the source runs dry.
    pub async fn run(mut self, cancel: CancellationToken) -> RunSummary {
        let mut ticker = tokio::time::interval(self.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut was_paused = false;
        info!(poll_ms = self.tick.as_millis() as u64, "Idle detection started");

        let reason = loop {
            if self.source.is_exhausted() {
                break StopReason::SourceExhausted;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = ticker.tick() => {}
            }

            let paused = self.paused.load(Ordering::SeqCst);
            if paused != was_paused {
                was_paused = paused;
                if paused {
                    info!("Detection paused");
                } else {
                    info!("Detection resumed");
                    self.engine.reset();
                    self.gate = AlertGate::new(&self.notifications);
                }
            }
            if paused {
                continue;
            }

            self.cycle();
        };

        info!(?reason, "Idle detection stopped");
        let final_stage = self.engine.current_stage();
        let stats = self.stats.clone();
        self.worker.shutdown();

        RunSummary {
            reason,
            final_stage,
            stats: stats.stats(),
        }
    }

    fn cycle(&mut self) {
        let Some(snapshot) = self.source.snapshot() else {
            self.stats.record_skipped_cycle();
            debug!("No idle reading, cycle skipped");
            return;
        };

        let now = self.clock.now();
        let decision = self.engine.evaluate_at(&snapshot, now);
        self.stats.record_cycle();

        if decision.is_transition {
            self.stats.record_transition();
            if decision.stage == Stage::Wake {
                self.stats.record_wake();
            }
            info!(
                from = %decision.previous,
                to = %decision.stage,
                idle_secs = decision.idle.as_secs(),
                "Stage changed"
            );
        }

        if let Some(observer) = self.observer.as_mut() {
            observer(&decision);
        }

        match self.gate.admit(&decision) {
            GateVerdict::Forward => {
                self.worker.submit(render(&decision, &self.notifications));
            }
            GateVerdict::Suppressed => {
                self.stats.record_alert_suppressed();
                debug!(stage = %decision.stage, "Alert suppressed, previous one still on screen");
            }
            GateVerdict::Ignored => {}
        }
    }
}

/// Keep `flag` in step with the `paused` field of the config file at `path`
/// so `pause`/`resume` reach a running agent.
pub async fn sync_pause_flag(
    path: PathBuf,
    flag: Arc<AtomicBool>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        match Config::load_from(&path) {
            Ok(config) => {
                if flag.swap(config.paused, Ordering::SeqCst) != config.paused {
                    debug!(paused = config.paused, "Pause flag changed on disk");
                }
            }
            Err(e) => debug!(error = %e, "Could not re-read config"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_simulated_clock_steps() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut clock = Clock::Simulated {
            next: start,
            step: Duration::from_secs(5),
        };
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + chrono::Duration::seconds(5));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(10));
    }
}
