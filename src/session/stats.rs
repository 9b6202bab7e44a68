//! Counters for one detector session.
//!
//! Shared between the run loop and the dispatch worker; nothing is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Session counters.
#[derive(Debug)]
pub struct SessionStats {
    /// Snapshots classified by the engine
    cycles_evaluated: AtomicU64,
    /// Cycles with no idle reading
    cycles_skipped: AtomicU64,
    /// Stage changes
    transitions: AtomicU64,
    /// Wake decisions
    wakes: AtomicU64,
    /// Notifications handed to the dispatch worker
    alerts_queued: AtomicU64,
    /// Alerts held back by the display-lifetime window
    alerts_suppressed: AtomicU64,
    /// Alerts lost because the dispatch queue was full
    alerts_dropped: AtomicU64,
    /// Notifications the dispatcher accepted
    delivered: AtomicU64,
    /// Notifications the dispatcher failed to send
    dispatch_failures: AtomicU64,
    session_start: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            cycles_evaluated: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
            transitions: AtomicU64::new(0),
            wakes: AtomicU64::new(0),
            alerts_queued: AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
            alerts_dropped: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_cycle(&self) {
        self.cycles_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_cycle(&self) {
        self.cycles_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wake(&self) {
        self.wakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_queued(&self) {
        self.alerts_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert_dropped(&self) {
        self.alerts_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> SessionSnapshot {
        SessionSnapshot {
            cycles_evaluated: self.cycles_evaluated.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            wakes: self.wakes.load(Ordering::Relaxed),
            alerts_queued: self.alerts_queued.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            alerts_dropped: self.alerts_dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Cycles evaluated: {}\n\
             - Cycles skipped: {}\n\
             - Stage transitions: {}\n\
             - Wake-ups: {}\n\
             - Alerts queued: {}\n\
             - Alerts suppressed: {}\n\
             - Alerts dropped: {}\n\
             - Notifications delivered: {}\n\
             - Dispatch failures: {}\n\
             - Session duration: {} seconds",
            stats.cycles_evaluated,
            stats.cycles_skipped,
            stats.transitions,
            stats.wakes,
            stats.alerts_queued,
            stats.alerts_suppressed,
            stats.alerts_dropped,
            stats.delivered,
            stats.dispatch_failures,
            stats.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub cycles_evaluated: u64,
    pub cycles_skipped: u64,
    pub transitions: u64,
    pub wakes: u64,
    pub alerts_queued: u64,
    pub alerts_suppressed: u64,
    pub alerts_dropped: u64,
    pub delivered: u64,
    pub dispatch_failures: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared session stats.
pub type SharedSessionStats = Arc<SessionStats>;

/// Create a new shared stats handle.
pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}
