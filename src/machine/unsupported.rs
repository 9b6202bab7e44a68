//! Stand-in machine for non-macOS hosts.
//!
//! Lets the crate build everywhere; probing always fails so the run loop
//! never starts against a host it cannot read.

use crate::machine::{MachineError, MetricsSource};
use std::time::Duration;

/// A machine that cannot report anything.
pub struct UnsupportedMachine;

impl UnsupportedMachine {
    /// Always fails with [`MachineError::Unsupported`].
    pub fn probe() -> Result<Self, MachineError> {
        Err(MachineError::Unsupported(std::env::consts::OS.to_string()))
    }

    pub fn version(&self) -> (u32, u32) {
        (0, 0)
    }
}

impl MetricsSource for UnsupportedMachine {
    fn idle_seconds(&mut self) -> Option<f64> {
        None
    }

    fn screensaver_timeout(&mut self) -> Option<Duration> {
        None
    }

    fn display_off_timeout(&mut self) -> Option<Duration> {
        None
    }

    fn screensaver_active(&mut self) -> Option<bool> {
        None
    }

    fn display_off(&mut self) -> Option<bool> {
        None
    }
}
