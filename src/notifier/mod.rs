//! Turning stage decisions into desktop notifications.
//!
//! This module contains:
//! - The alert gate deciding which decisions are announced
//! - The message renderer
//! - A dispatch worker that delivers off the polling thread
//! - `terminal-notifier` and console dispatchers

pub mod console;
pub mod gate;
pub mod message;
pub mod terminal;
pub mod worker;

use crate::core::Stage;
use serde::Serialize;
use std::path::PathBuf;

// Re-export commonly used types
pub use console::ConsoleDispatcher;
pub use gate::{AlertGate, GateVerdict};
pub use message::{render, render_message};
pub use terminal::{DeliveredNotification, TerminalNotifier};
pub use worker::DispatchWorker;

/// Title shown on every notification.
pub const NOTIFICATION_TITLE: &str = "IDLE-DETECTION";

/// Body of `idle-detector test-notification`.
pub const TEST_MESSAGE: &str = "This is a test notification from idle-detector.";

/// A rendered notification ready for a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub subtitle: String,
    pub message: String,
    /// Notification-center group; `None` leaves the notification ungrouped
    pub group: Option<String>,
    pub ignore_dnd: bool,
    pub content_image: Option<PathBuf>,
    /// Stage the notification announces, absent for test notifications
    pub stage: Option<Stage>,
}

impl Notification {
    /// The notification sent by `test-notification`.
    pub fn test(ignore_dnd: bool) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_string(),
            subtitle: "Test".to_string(),
            message: TEST_MESSAGE.to_string(),
            group: None,
            ignore_dnd,
            content_image: None,
            stage: None,
        }
    }
}

/// Delivers notifications to the user.
pub trait Dispatcher: Send {
    fn dispatch(&mut self, notification: &Notification) -> Result<(), NotifyError>;

    /// Short name for log output.
    fn name(&self) -> &'static str;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn dispatch(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).dispatch(notification)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Errors that can occur while sending notifications.
#[derive(Debug)]
pub enum NotifyError {
    /// The notifier binary is not installed
    MissingBinary(String),
    /// The notifier process or worker thread could not be started
    Spawn(String),
    /// The notifier ran but reported failure
    Failed(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::MissingBinary(name) => write!(
                f,
                "Required package {name:?} was not found in the system PATH. \
                 Install it with `brew install {name}`"
            ),
            NotifyError::Spawn(e) => write!(f, "Failed to start notifier: {e}"),
            NotifyError::Failed(e) => write!(f, "Notifier failed: {e}"),
        }
    }
}

impl std::error::Error for NotifyError {}
