//! macOS metrics source backed by `ioreg`, `defaults`, `pmset` and CoreGraphics.

use crate::machine::{parse, run_command, MachineError, MetricsSource};
use core_graphics::display::CGDisplay;
use std::process::Command;
use std::time::{Duration, Instant};

/// Oldest macOS release the detector runs on.
pub const MINIMUM_VERSION: (u32, u32) = (10, 8);

/// How long timeout settings are reused before being re-read.
const SETTINGS_REFRESH: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
struct CachedSettings {
    screensaver: Option<Duration>,
    display_off: Option<Duration>,
    read_at: Instant,
}

/// Reads idle time and power settings from the running Mac.
pub struct MacMachine {
    version: (u32, u32),
    settings: Option<CachedSettings>,
}

impl MacMachine {
    /// Verify the host and construct the source.
    pub fn probe() -> Result<Self, MachineError> {
        let output = run_command("sw_vers", &["-productVersion"])?;
        let version = parse::product_version(&output).ok_or_else(|| {
            MachineError::Command(format!("unrecognised macOS version {:?}", output.trim()))
        })?;

        if version < MINIMUM_VERSION {
            return Err(MachineError::VersionTooOld {
                detected: version,
                required: MINIMUM_VERSION,
            });
        }

        tracing::debug!(major = version.0, minor = version.1, "Detected macOS");
        Ok(Self {
            version,
            settings: None,
        })
    }

    /// The detected `(major, minor)` macOS release.
    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    fn settings(&mut self) -> CachedSettings {
        match self.settings {
            Some(cached) if cached.read_at.elapsed() < SETTINGS_REFRESH => cached,
            _ => {
                let fresh = CachedSettings {
                    screensaver: read_screensaver_timeout(),
                    display_off: read_display_sleep(),
                    read_at: Instant::now(),
                };
                self.settings = Some(fresh);
                fresh
            }
        }
    }
}

impl MetricsSource for MacMachine {
    fn idle_seconds(&mut self) -> Option<f64> {
        match run_command("ioreg", &["-c", "IOHIDSystem"]) {
            Ok(output) => parse::hid_idle_seconds(&output),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read HID idle time");
                None
            }
        }
    }

    fn screensaver_timeout(&mut self) -> Option<Duration> {
        self.settings().screensaver
    }

    fn display_off_timeout(&mut self) -> Option<Duration> {
        self.settings().display_off
    }

    fn screensaver_active(&mut self) -> Option<bool> {
        // pgrep exits 1 when nothing matches, which is a valid "no"
        Command::new("pgrep")
            .args(["-x", "ScreenSaverEngine"])
            .output()
            .ok()
            .map(|output| output.status.success())
    }

    fn display_off(&mut self) -> Option<bool> {
        Some(CGDisplay::main().is_asleep())
    }
}

fn read_screensaver_timeout() -> Option<Duration> {
    run_command(
        "defaults",
        &["-currentHost", "read", "com.apple.screensaver", "idleTime"],
    )
    .ok()
    .and_then(|output| parse::screensaver_idle_time(&output))
}

fn read_display_sleep() -> Option<Duration> {
    match run_command("pmset", &["-g"]) {
        Ok(output) => parse::display_sleep(&output),
        Err(e) => {
            tracing::debug!(error = %e, "pmset unavailable");
            None
        }
    }
}
