//! Human-readable duration formatting for notification text.

use std::time::Duration;

const UNITS: [(u64, &str, &str); 4] = [
    (86_400, "d", "day"),
    (3_600, "h", "hour"),
    (60, "m", "minute"),
    (1, "s", "second"),
];

/// Format a duration as `1h 5m 30s` (compact) or `1 hour 5 minutes 30 seconds`.
///
/// Sub-second precision is dropped and zero-valued units are skipped; a
/// duration under one second renders as `0s` / `0 seconds`.
pub fn human_readable(duration: Duration, compact: bool) -> String {
    let mut remaining = duration.as_secs();
    let mut parts = Vec::new();

    for (unit_secs, short, long) in UNITS {
        let value = remaining / unit_secs;
        remaining %= unit_secs;
        if value > 0 {
            parts.push(format_unit(value, short, long, compact));
        }
    }

    if parts.is_empty() {
        return format_unit(0, "s", "second", compact);
    }
    parts.join(" ")
}

fn format_unit(value: u64, short: &str, long: &str, compact: bool) -> String {
    if compact {
        format!("{value}{short}")
    } else if value == 1 {
        format!("{value} {long}")
    } else {
        format!("{value} {long}s")
    }
}

/// Convert a raw seconds reading into a duration, clamping negative, NaN and
/// out-of-range values.
pub fn clamp_seconds(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_format() {
        assert_eq!(human_readable(Duration::from_secs(330), true), "5m 30s");
        assert_eq!(human_readable(Duration::from_secs(3_600), true), "1h");
        assert_eq!(human_readable(Duration::from_secs(90_061), true), "1d 1h 1m 1s");
    }

    #[test]
    fn test_long_format_pluralizes() {
        assert_eq!(
            human_readable(Duration::from_secs(61), false),
            "1 minute 1 second"
        );
        assert_eq!(
            human_readable(Duration::from_secs(7_320), false),
            "2 hours 2 minutes"
        );
    }

    #[test]
    fn test_zero_duration() {
        assert_eq!(human_readable(Duration::from_millis(400), true), "0s");
        assert_eq!(human_readable(Duration::ZERO, false), "0 seconds");
    }

    #[test]
    fn test_clamp_seconds() {
        assert_eq!(clamp_seconds(-4.0), Duration::ZERO);
        assert_eq!(clamp_seconds(f64::NAN), Duration::ZERO);
        assert_eq!(clamp_seconds(2.5), Duration::from_millis(2_500));
        assert_eq!(clamp_seconds(f64::MAX), Duration::MAX);
    }
}
