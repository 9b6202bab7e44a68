//! Notification text for each stage.

use crate::config::NotificationConfig;
use crate::core::{human_readable, Milestone, Stage, StageDecision};
use crate::notifier::{Notification, NOTIFICATION_TITLE};
use std::path::PathBuf;
use std::time::Duration;

const IDLE_IMAGE: &str = "idle.png";
const WAKEUP_IMAGE: &str = "wakeup.png";

/// Build the full notification for a decision.
pub fn render(decision: &StageDecision, config: &NotificationConfig) -> Notification {
    Notification {
        title: NOTIFICATION_TITLE.to_string(),
        subtitle: decision.stage.display_name().to_string(),
        message: render_message(decision, config.compact_time),
        group: config
            .group_notifications
            .then(|| decision.group_key().to_string()),
        ignore_dnd: config.ignore_dnd,
        content_image: content_image(decision.stage, config),
        stage: Some(decision.stage),
    }
}

/// The message body for a decision.
pub fn render_message(decision: &StageDecision, compact: bool) -> String {
    let idle_line = idle_for(decision.idle, compact);

    match decision.stage {
        Stage::PreScreensaver => {
            let milestone = decision
                .thresholds
                .imminent()
                .map(|(milestone, _)| milestone)
                .unwrap_or(Milestone::Screensaver);
            let upcoming = match milestone {
                Milestone::Screensaver => "Screensaver will activate",
                Milestone::DisplayOff => "Display will fully turn off",
            };
            format!("{idle_line} {}", countdown(upcoming, decision.until_next, compact))
        }
        Stage::Screensaver => format!(
            "Snooze time 💤. {}",
            countdown("Display will fully turn off", decision.until_next, compact)
        ),
        Stage::DisplayOff => "Sleep time 💤.".to_string(),
        Stage::Wake => {
            let total = decision.idle_before_wake.unwrap_or(decision.idle);
            let away = match decision.since_timer.filter(|d| !d.is_zero()) {
                Some(since) => {
                    format!("\nAway since first alert: {}", human_readable(since, compact))
                }
                None => String::new(),
            };
            format!(
                "{}{away}\nTotal Seconds: {}",
                idle_for(total, compact),
                group_thousands(total.as_secs())
            )
        }
        Stage::Active | Stage::Idle => idle_line,
    }
}

fn idle_for(duration: Duration, compact: bool) -> String {
    format!("Machine been idle for {}.", human_readable(duration, compact))
}

fn countdown(upcoming: &str, remaining: Option<Duration>, compact: bool) -> String {
    match remaining {
        Some(remaining) => format!("{upcoming} in {}", human_readable(remaining, compact)),
        None => format!("{upcoming} soon."),
    }
}

fn content_image(stage: Stage, config: &NotificationConfig) -> Option<PathBuf> {
    let name = if stage == Stage::Wake {
        WAKEUP_IMAGE
    } else {
        IDLE_IMAGE
    };
    config
        .assets_dir
        .as_ref()
        .map(|dir| dir.join(name))
        .filter(|path| path.is_file())
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Thresholds, Trigger};
    use chrono::Utc;

    fn decision(stage: Stage, idle: u64) -> StageDecision {
        StageDecision {
            stage,
            previous: Stage::Idle,
            is_transition: true,
            alert_worthy: true,
            trigger: Trigger::IdleTime,
            idle: Duration::from_secs(idle),
            since_timer: None,
            until_next: None,
            idle_before_wake: None,
            thresholds: Thresholds {
                screensaver: Some(Duration::from_secs(300)),
                display_off: Some(Duration::from_secs(600)),
                fallback: false,
            },
            evaluated_at: Utc::now(),
        }
    }

    #[test]
    fn test_pre_screensaver_message() {
        let mut pre = decision(Stage::PreScreensaver, 275);
        pre.until_next = Some(Duration::from_secs(25));
        assert_eq!(
            render_message(&pre, false),
            "Machine been idle for 4 minutes 35 seconds. Screensaver will activate in 25 seconds"
        );
        assert_eq!(
            render_message(&pre, true),
            "Machine been idle for 4m 35s. Screensaver will activate in 25s"
        );
    }

    #[test]
    fn test_pre_display_off_without_screensaver() {
        let mut pre = decision(Stage::PreScreensaver, 580);
        pre.thresholds.screensaver = None;
        assert_eq!(
            render_message(&pre, true),
            "Machine been idle for 9m 40s. Display will fully turn off soon."
        );
    }

    #[test]
    fn test_screensaver_and_display_off_messages() {
        let mut screensaver = decision(Stage::Screensaver, 300);
        screensaver.until_next = Some(Duration::from_secs(300));
        assert_eq!(
            render_message(&screensaver, true),
            "Snooze time 💤. Display will fully turn off in 5m"
        );
        assert_eq!(render_message(&decision(Stage::DisplayOff, 600), true), "Sleep time 💤.");
    }

    #[test]
    fn test_wake_message_totals() {
        let mut wake = decision(Stage::Wake, 0);
        wake.idle_before_wake = Some(Duration::from_secs(3_725));
        assert_eq!(
            render_message(&wake, true),
            "Machine been idle for 1h 2m 5s.\nTotal Seconds: 3,725"
        );
    }

    #[test]
    fn test_wake_message_reports_time_since_first_alert() {
        let mut wake = decision(Stage::Wake, 0);
        wake.idle_before_wake = Some(Duration::from_secs(900));
        wake.since_timer = Some(Duration::from_secs(630));
        assert_eq!(
            render_message(&wake, true),
            "Machine been idle for 15m.\nAway since first alert: 10m 30s\nTotal Seconds: 900"
        );
    }

    #[test]
    fn test_group_only_when_enabled() {
        let pre = decision(Stage::PreScreensaver, 275);
        let ungrouped = render(&pre, &NotificationConfig::default());
        assert_eq!(ungrouped.title, "IDLE-DETECTION");
        assert_eq!(ungrouped.subtitle, "Screensaver Soon");
        assert_eq!(ungrouped.group, None);
        assert!(ungrouped.ignore_dnd);

        let config = NotificationConfig {
            group_notifications: true,
            ignore_dnd: false,
            ..NotificationConfig::default()
        };
        let grouped = render(&pre, &config);
        assert_eq!(grouped.group.as_deref(), Some("pre_screensaver"));
        assert!(!grouped.ignore_dnd);
    }

    #[test]
    fn test_missing_assets_leave_no_image() {
        let config = NotificationConfig {
            assets_dir: Some(PathBuf::from("/nonexistent/idle-detector-assets")),
            ..NotificationConfig::default()
        };
        assert_eq!(render(&decision(Stage::Wake, 0), &config).content_image, None);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
