//! Background delivery of notifications.
//!
//! The run loop hands notifications over a bounded channel and never waits
//! on the dispatcher; a full queue drops the notification.

use crate::notifier::{Dispatcher, Notification, NotifyError};
use crate::session::SharedSessionStats;
use crossbeam_channel::{bounded, Sender, TrySendError};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Default number of notifications that may wait for delivery.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Owns a dispatcher on its own thread.
pub struct DispatchWorker {
    sender: Option<Sender<Notification>>,
    handle: Option<JoinHandle<()>>,
    stats: SharedSessionStats,
}

impl DispatchWorker {
    /// Start a worker thread that delivers through `dispatcher`.
    pub fn spawn<D>(
        mut dispatcher: D,
        capacity: usize,
        stats: SharedSessionStats,
    ) -> Result<Self, NotifyError>
    where
        D: Dispatcher + 'static,
    {
        let (sender, receiver) = bounded::<Notification>(capacity.max(1));
        let worker_stats = stats.clone();

        let handle = std::thread::Builder::new()
            .name("idle-detector-dispatch".to_string())
            .spawn(move || {
                debug!(dispatcher = dispatcher.name(), "Dispatch worker started");
                for notification in receiver {
                    match dispatcher.dispatch(&notification) {
                        Ok(()) => worker_stats.record_delivered(),
                        Err(e) => {
                            worker_stats.record_dispatch_failure();
                            warn!(error = %e, subtitle = %notification.subtitle, "Notification failed");
                        }
                    }
                }
                debug!("Dispatch worker stopped");
            })
            .map_err(|e| NotifyError::Spawn(e.to_string()))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            stats,
        })
    }

    /// Queue a notification without blocking. Returns whether it was queued.
    pub fn submit(&self, notification: Notification) -> bool {
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };

        match sender.try_send(notification) {
            Ok(()) => {
                self.stats.record_alert_queued();
                true
            }
            Err(TrySendError::Full(notification)) => {
                self.stats.record_alert_dropped();
                warn!(subtitle = %notification.subtitle, "Dispatch queue full, notification dropped");
                false
            }
            Err(TrySendError::Disconnected(notification)) => {
                self.stats.record_alert_dropped();
                warn!(subtitle = %notification.subtitle, "Dispatch worker gone, notification dropped");
                false
            }
        }
    }

    /// Close the queue, deliver what is left, and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Dispatch worker panicked");
            }
        }
    }
}

impl Drop for DispatchWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::create_shared_stats;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct Recording {
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Dispatcher for Recording {
        fn dispatch(&mut self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Failed("nope".into()));
            }
            self.seen.lock().unwrap().push(notification.message.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct Stalled {
        release: crossbeam_channel::Receiver<()>,
    }

    impl Dispatcher for Stalled {
        fn dispatch(&mut self, _notification: &Notification) -> Result<(), NotifyError> {
            let _ = self.release.recv_timeout(Duration::from_secs(5));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[test]
    fn test_delivers_in_order_and_drains_on_shutdown() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stats = create_shared_stats();
        let worker = DispatchWorker::spawn(
            Recording {
                seen: seen.clone(),
                fail: false,
            },
            8,
            stats.clone(),
        )
        .unwrap();

        for i in 0..3 {
            let mut n = Notification::test(true);
            n.message = format!("m{i}");
            assert!(worker.submit(n));
        }
        worker.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["m0", "m1", "m2"]);
        let snapshot = stats.stats();
        assert_eq!(snapshot.alerts_queued, 3);
        assert_eq!(snapshot.delivered, 3);
    }

    #[test]
    fn test_failures_are_counted() {
        let stats = create_shared_stats();
        let worker = DispatchWorker::spawn(
            Recording {
                seen: Arc::new(Mutex::new(Vec::new())),
                fail: true,
            },
            4,
            stats.clone(),
        )
        .unwrap();
        worker.submit(Notification::test(true));
        worker.shutdown();

        assert_eq!(stats.stats().dispatch_failures, 1);
        assert_eq!(stats.stats().delivered, 0);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let stats = create_shared_stats();
        let worker = DispatchWorker::spawn(Stalled { release: release_rx }, 1, stats.clone()).unwrap();

        let mut accepted = 0;
        for _ in 0..10 {
            if worker.submit(Notification::test(true)) {
                accepted += 1;
            }
        }
        // one in flight plus one queued at most
        assert!(accepted <= 2);
        assert!(stats.stats().alerts_dropped >= 8);

        for _ in 0..accepted {
            let _ = release_tx.send(());
        }
        worker.shutdown();
    }
}
