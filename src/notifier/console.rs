//! Prints notifications instead of showing them.

use crate::notifier::{Dispatcher, Notification, NotifyError};
use std::io::{Stdout, Write};

/// Writes each notification as a line of text; used for dry runs.
pub struct ConsoleDispatcher<W: Write + Send = Stdout> {
    out: W,
}

impl ConsoleDispatcher<Stdout> {
    pub fn new() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl Default for ConsoleDispatcher<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleDispatcher<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Dispatcher for ConsoleDispatcher<W> {
    fn dispatch(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        let group = notification
            .group
            .as_deref()
            .map(|g| format!(" ({g})"))
            .unwrap_or_default();
        let message = notification.message.replace('\n', " | ");

        writeln!(
            self.out,
            "[{}] {}{}: {}",
            notification.title, notification.subtitle, group, message
        )
        .and_then(|_| self.out.flush())
        .map_err(|e| NotifyError::Failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
