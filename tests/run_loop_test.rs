//! Integration tests for the polling loop, driven by scripted snapshots.

use chrono::{TimeZone, Utc};
use idle_detector::config::Config;
use idle_detector::core::{Snapshot, Stage};
use idle_detector::machine::{MetricsSource, ScriptedSource};
use idle_detector::notifier::{DispatchWorker, Dispatcher, Notification, NotifyError};
use idle_detector::runner::{sync_pause_flag, Clock, RunLoop, StopReason};
use idle_detector::session::create_shared_stats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl Dispatcher for Recorder {
    fn dispatch(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

/// Reports no idle time for the first `blind` cycles, then a fixed reading.
struct FlakySource {
    blind: usize,
    remaining: usize,
}

impl MetricsSource for FlakySource {
    fn idle_seconds(&mut self) -> Option<f64> {
        self.remaining = self.remaining.saturating_sub(1);
        if self.blind > 0 {
            self.blind -= 1;
            None
        } else {
            Some(50.0)
        }
    }
    fn screensaver_timeout(&mut self) -> Option<Duration> {
        Some(Duration::from_secs(300))
    }
    fn display_off_timeout(&mut self) -> Option<Duration> {
        None
    }
    fn screensaver_active(&mut self) -> Option<bool> {
        Some(false)
    }
    fn display_off(&mut self) -> Option<bool> {
        None
    }
    fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

fn mac(idle: f64) -> Snapshot {
    Snapshot::idle(idle).with_thresholds(
        Some(Duration::from_secs(300)),
        Some(Duration::from_secs(600)),
    )
}

fn simulated() -> Clock {
    Clock::Simulated {
        next: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        step: Duration::from_secs(1),
    }
}

fn build<S: MetricsSource>(source: S, recorder: &Recorder) -> RunLoop<S> {
    let stats = create_shared_stats();
    let worker = DispatchWorker::spawn(recorder.clone(), 16, stats.clone()).unwrap();
    RunLoop::new(source, &Config::default(), worker, stats)
        .with_clock(simulated(), Duration::from_millis(1))
}

#[tokio::test]
async fn test_scripted_session_notifies_pre_alert_and_wake() {
    let recorder = Recorder::default();
    let source = ScriptedSource::new(vec![
        mac(0.0),
        mac(100.0),
        mac(275.0),
        mac(280.0),
        mac(0.0),
        mac(1.0),
    ]);

    let summary = build(source, &recorder).run(CancellationToken::new()).await;

    assert_eq!(summary.reason, StopReason::SourceExhausted);
    assert_eq!(summary.final_stage, Stage::Active);
    assert_eq!(summary.stats.cycles_evaluated, 6);
    assert_eq!(summary.stats.transitions, 4);
    assert_eq!(summary.stats.wakes, 1);
    assert_eq!(summary.stats.alerts_queued, 2);
    assert_eq!(summary.stats.delivered, 2);

    let sent = recorder.sent.lock().unwrap();
    let subtitles: Vec<&str> = sent.iter().map(|n| n.subtitle.as_str()).collect();
    assert_eq!(subtitles, vec!["Screensaver Soon", "Wake Up"]);
    assert_eq!(
        sent[0].message,
        "Machine been idle for 4 minutes 35 seconds. Screensaver will activate in 25 seconds"
    );
    assert!(sent[1].message.ends_with("Total Seconds: 280"));
    assert!(sent.iter().all(|n| n.title == "IDLE-DETECTION" && n.group.is_none()));
}

#[tokio::test]
async fn test_observer_sees_every_decision() {
    let recorder = Recorder::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let observed = seen.clone();
    let source = ScriptedSource::new(vec![mac(10.0), mac(10.0), mac(20.0)]);

    build(source, &recorder)
        .with_observer(move |decision| observed.lock().unwrap().push(decision.is_transition))
        .run(CancellationToken::new())
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![true, false, false]);
    assert!(recorder.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_stops_between_cycles() {
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut count = 0;
    let source = ScriptedSource::new((0..100).map(|i| mac(i as f64 * 3.0)));

    let summary = build(source, &recorder)
        .with_observer(move |_| {
            count += 1;
            if count == 3 {
                trigger.cancel();
            }
        })
        .run(cancel)
        .await;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.cycles_evaluated, 3);
}

#[tokio::test]
async fn test_already_cancelled_runs_nothing() {
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = build(ScriptedSource::new(vec![mac(5.0)]), &recorder)
        .run(cancel)
        .await;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.cycles_evaluated, 0);
}

#[tokio::test]
async fn test_paused_loop_takes_no_snapshots() {
    let recorder = Recorder::default();
    let cancel = CancellationToken::new();
    let paused = Arc::new(AtomicBool::new(true));

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.cancel();
    });

    let summary = build(ScriptedSource::new(vec![mac(5.0), mac(10.0)]), &recorder)
        .with_pause_flag(paused)
        .run(cancel)
        .await;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.stats.cycles_evaluated, 0);
    assert_eq!(summary.stats.cycles_skipped, 0);
}

#[tokio::test]
async fn test_cycles_without_idle_reading_are_skipped() {
    let recorder = Recorder::default();
    let source = FlakySource {
        blind: 2,
        remaining: 5,
    };

    let summary = build(source, &recorder).run(CancellationToken::new()).await;

    assert_eq!(summary.reason, StopReason::SourceExhausted);
    assert_eq!(summary.stats.cycles_skipped, 2);
    assert_eq!(summary.stats.cycles_evaluated, 3);
    assert_eq!(summary.final_stage, Stage::Idle);
}

#[tokio::test]
async fn test_pause_flag_follows_config_file() {
    let dir = std::env::temp_dir().join(format!("idle-detector-pause-test-{}", std::process::id()));
    let path = dir.join("config.json");
    let config = Config {
        paused: true,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let flag = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(sync_pause_flag(
        path.clone(),
        flag.clone(),
        Duration::from_millis(5),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(flag.load(Ordering::SeqCst));

    Config::default().save_to(&path).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!flag.load(Ordering::SeqCst));

    cancel.cancel();
    watcher.await.unwrap();
    let _ = std::fs::remove_dir_all(&dir);
}
