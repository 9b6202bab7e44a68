//! Delivery through the `terminal-notifier` command-line tool.

use crate::notifier::{Dispatcher, Notification, NotifyError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const PACKAGE_NAME: &str = "terminal-notifier";

/// Version assumed when `-version` output cannot be parsed.
const FALLBACK_VERSION: &str = "2.0.0";

/// A notification still shown in the notification center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveredNotification {
    pub group: String,
    pub title: String,
    pub subtitle: String,
    pub message: String,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Sends notifications by running `terminal-notifier`.
#[derive(Debug, Clone)]
pub struct TerminalNotifier {
    binary: PathBuf,
}

impl TerminalNotifier {
    /// Find `terminal-notifier` on `PATH`.
    pub fn locate() -> Result<Self, NotifyError> {
        let path = std::env::var_os("PATH").unwrap_or_default();
        std::env::split_paths(&path)
            .map(|dir| dir.join(PACKAGE_NAME))
            .find(|candidate| is_executable(candidate))
            .map(Self::with_binary)
            .ok_or_else(|| NotifyError::MissingBinary(PACKAGE_NAME.to_string()))
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command-line flags for one notification.
    ///
    /// `-group` is left out entirely when the notification is ungrouped;
    /// any group value, even an empty one, makes the notification center
    /// merge unrelated alerts.
    pub fn build_args(notification: &Notification) -> Vec<String> {
        let mut args = vec![
            "-title".to_string(),
            notification.title.clone(),
            "-subtitle".to_string(),
            notification.subtitle.clone(),
            "-message".to_string(),
            escape_message(&notification.message),
        ];

        if let Some(group) = &notification.group {
            args.push("-group".to_string());
            args.push(group.clone());
        }
        if notification.ignore_dnd {
            args.push("-ignoreDnD".to_string());
        }
        if let Some(image) = &notification.content_image {
            args.push("-contentImage".to_string());
            args.push(image.display().to_string());
        }

        args
    }

    /// Remove delivered notifications of one group, or all of them.
    pub fn remove(&self, group: Option<&str>) -> Result<(), NotifyError> {
        self.execute(&["-remove", group.unwrap_or("ALL")]).map(|_| ())
    }

    /// Notifications currently shown in the notification center.
    pub fn list(&self) -> Result<Vec<DeliveredNotification>, NotifyError> {
        let output = self.execute(&["-list", "ALL"])?;
        Ok(parse_list(&output))
    }

    /// Installed `terminal-notifier` version.
    pub fn version(&self) -> Result<String, NotifyError> {
        let output = self.execute(&["-version"])?;
        Ok(parse_version(&output).unwrap_or_else(|| FALLBACK_VERSION.to_string()))
    }

    fn execute<S: AsRef<std::ffi::OsStr>>(&self, args: &[S]) -> Result<String, NotifyError> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .map_err(|e| NotifyError::Spawn(format!("{}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Failed(format!(
                "{PACKAGE_NAME} exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Dispatcher for TerminalNotifier {
    fn dispatch(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        self.execute(Self::build_args(notification).as_slice()).map(|_| ())
    }

    fn name(&self) -> &'static str {
        PACKAGE_NAME
    }
}

/// terminal-notifier reads a leading `-` or `[` in the message as a flag.
fn escape_message(message: &str) -> String {
    if message.starts_with(['-', '[']) {
        format!("\\{message}")
    } else {
        message.to_string()
    }
}

/// Parse `-list ALL` output: a header line, then tab-separated
/// group, title, subtitle, message and delivery time.
pub fn parse_list(output: &str) -> Vec<DeliveredNotification> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut fields = line.split('\t').map(str::to_string);
            let mut next = || fields.next().unwrap_or_default();
            let group = next();
            let title = next();
            let subtitle = next();
            let message = next();
            let delivered_at = parse_delivered_at(&next());
            DeliveredNotification {
                group,
                title,
                subtitle,
                message,
                delivered_at,
            }
        })
        .collect()
}

fn parse_delivered_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S %z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .map(|token| token.trim_end_matches('.').to_string())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
