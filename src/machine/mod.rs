//! Machine metrics sources for the idle detector.
//!
//! A [`MetricsSource`] answers one capability query per setting; each answer
//! is optional so a host that cannot report a value degrades silently.
//! Threshold fallback happens in the stage engine, not here.

pub mod parse;
pub mod scripted;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod unsupported;

use crate::core::Snapshot;
use std::process::Command;
use std::time::Duration;

pub use scripted::ScriptedSource;

#[cfg(target_os = "macos")]
pub use macos::MacMachine;

/// Platform-specific machine type alias
#[cfg(target_os = "macos")]
pub type Machine = MacMachine;

#[cfg(not(target_os = "macos"))]
pub use unsupported::UnsupportedMachine;

/// Platform-specific machine type alias
#[cfg(not(target_os = "macos"))]
pub type Machine = UnsupportedMachine;

/// Capability queries against the host's power-management state.
pub trait MetricsSource {
    /// Seconds since the last user input.
    fn idle_seconds(&mut self) -> Option<f64>;

    /// Configured screensaver timeout.
    fn screensaver_timeout(&mut self) -> Option<Duration>;

    /// Configured display-sleep timeout.
    fn display_off_timeout(&mut self) -> Option<Duration>;

    /// Whether the screensaver is running right now.
    fn screensaver_active(&mut self) -> Option<bool>;

    /// Whether the display is powered off right now.
    fn display_off(&mut self) -> Option<bool>;

    /// Take a snapshot for one evaluation cycle.
    ///
    /// Returns `None` when the idle time itself is unknown; unknown flags
    /// read as `false`.
    fn snapshot(&mut self) -> Option<Snapshot> {
        let idle_seconds = self.idle_seconds()?;
        Some(Snapshot {
            idle_seconds,
            screensaver_threshold: self.screensaver_timeout(),
            display_off_threshold: self.display_off_timeout(),
            screensaver_active: self.screensaver_active().unwrap_or(false),
            display_off: self.display_off().unwrap_or(false),
        })
    }

    /// Whether the source has nothing more to report.
    fn is_exhausted(&self) -> bool {
        false
    }
}

/// Errors raised while probing or reading the machine.
#[derive(Debug)]
pub enum MachineError {
    /// The host operating system is not supported
    Unsupported(String),
    /// The host is older than the minimum supported release
    VersionTooOld {
        detected: (u32, u32),
        required: (u32, u32),
    },
    /// A system command could not be run or failed
    Command(String),
    /// A scripted snapshot file could not be read
    Script(String),
}

impl std::fmt::Display for MachineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineError::Unsupported(os) => {
                write!(f, "Detected OS {os:?}: idle-detector only runs on macOS")
            }
            MachineError::VersionTooOld { detected, required } => write!(
                f,
                "macOS {}.{} is not supported (minimum {}.{})",
                detected.0, detected.1, required.0, required.1
            ),
            MachineError::Command(e) => write!(f, "Command error: {e}"),
            MachineError::Script(e) => write!(f, "Snapshot script error: {e}"),
        }
    }
}

impl std::error::Error for MachineError {}

/// `user@host` for status output.
pub fn host_description() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().trim_end_matches(".local").to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    format!("{user}@{host}")
}

/// Run a command and return its stdout, failing on a non-zero exit.
pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<String, MachineError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| MachineError::Command(format!("{program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MachineError::Command(format!(
            "{program} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        idle: Option<f64>,
    }

    impl MetricsSource for FixedSource {
        fn idle_seconds(&mut self) -> Option<f64> {
            self.idle
        }
        fn screensaver_timeout(&mut self) -> Option<Duration> {
            Some(Duration::from_secs(300))
        }
        fn display_off_timeout(&mut self) -> Option<Duration> {
            None
        }
        fn screensaver_active(&mut self) -> Option<bool> {
            None
        }
        fn display_off(&mut self) -> Option<bool> {
            Some(true)
        }
    }

    #[test]
    fn test_snapshot_combines_queries() {
        let mut source = FixedSource { idle: Some(12.0) };
        let snapshot = source.snapshot().unwrap();
        assert_eq!(snapshot.idle_seconds, 12.0);
        assert_eq!(snapshot.screensaver_threshold, Some(Duration::from_secs(300)));
        assert_eq!(snapshot.display_off_threshold, None);
        assert!(!snapshot.screensaver_active);
        assert!(snapshot.display_off);
        assert!(!source.is_exhausted());
    }

    #[test]
    fn test_unknown_idle_time_yields_no_snapshot() {
        let mut source = FixedSource { idle: None };
        assert!(source.snapshot().is_none());
    }

    #[test]
    fn test_host_description_shape() {
        assert!(host_description().contains('@'));
    }

    #[test]
    fn test_error_display() {
        let err = MachineError::VersionTooOld {
            detected: (10, 6),
            required: (10, 8),
        };
        assert_eq!(err.to_string(), "macOS 10.6 is not supported (minimum 10.8)");
    }
}
