//! Parsers for the output of the macOS power-management commands.
//!
//! Kept platform-independent so they can be tested anywhere.

use std::time::Duration;

/// Idle seconds from `ioreg -c IOHIDSystem` (`"HIDIdleTime" = <nanoseconds>`).
pub fn hid_idle_seconds(ioreg_output: &str) -> Option<f64> {
    ioreg_output.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if !key.trim().trim_start_matches('|').trim().ends_with("\"HIDIdleTime\"") {
            return None;
        }
        let nanos: u64 = value.trim().parse().ok()?;
        Some(nanos as f64 / 1_000_000_000.0)
    })
}

/// Screensaver timeout from `defaults -currentHost read com.apple.screensaver idleTime`.
pub fn screensaver_idle_time(defaults_output: &str) -> Option<Duration> {
    defaults_output
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Display-sleep timeout from `pmset -g` (`displaysleep <minutes>`).
pub fn display_sleep(pmset_output: &str) -> Option<Duration> {
    pmset_output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        if fields.next()? != "displaysleep" {
            return None;
        }
        let minutes: u64 = fields.next()?.parse().ok()?;
        minutes.checked_mul(60).map(Duration::from_secs)
    })
}

/// `(major, minor)` from `sw_vers -productVersion`.
pub fn product_version(sw_vers_output: &str) -> Option<(u32, u32)> {
    let mut parts = sw_vers_output.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = match parts.next() {
        Some(minor) => minor.parse().ok()?,
        None => 0,
    };
    Some((major, minor))
}
