//! Replays a recorded sequence of snapshots.
//!
//! Used by `simulate` and by tests to drive the run loop without a Mac.

use crate::core::Snapshot;
use crate::machine::{MachineError, MetricsSource};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

/// A metrics source that yields one scripted snapshot per cycle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    queue: VecDeque<Snapshot>,
    current: Option<Snapshot>,
}

impl ScriptedSource {
    pub fn new(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        Self {
            queue: snapshots.into_iter().collect(),
            current: None,
        }
    }

    /// Parse a JSON array of snapshots.
    pub fn from_json(json: &str) -> Result<Self, MachineError> {
        let snapshots: Vec<Snapshot> =
            serde_json::from_str(json).map_err(|e| MachineError::Script(e.to_string()))?;
        Ok(Self::new(snapshots))
    }

    /// Load a JSON array of snapshots from `path`.
    pub fn from_file(path: &Path) -> Result<Self, MachineError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MachineError::Script(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Snapshots not yet replayed.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl MetricsSource for ScriptedSource {
    fn idle_seconds(&mut self) -> Option<f64> {
        self.current.as_ref().map(|s| s.idle_seconds)
    }

    fn screensaver_timeout(&mut self) -> Option<Duration> {
        self.current.as_ref().and_then(|s| s.screensaver_threshold)
    }

    fn display_off_timeout(&mut self) -> Option<Duration> {
        self.current.as_ref().and_then(|s| s.display_off_threshold)
    }

    fn screensaver_active(&mut self) -> Option<bool> {
        self.current.as_ref().map(|s| s.screensaver_active)
    }

    fn display_off(&mut self) -> Option<bool> {
        self.current.as_ref().map(|s| s.display_off)
    }

    fn snapshot(&mut self) -> Option<Snapshot> {
        self.current = self.queue.pop_front();
        self.current.clone()
    }

    fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }
}
