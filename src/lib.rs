//! idle-detector - idle-stage notifications for macOS.
//!
//! This library polls the machine's idle time and power-management settings,
//! classifies each reading into a discrete idle stage, and announces the
//! stages worth knowing about as desktop notifications.
//!
//! # Stages
//!
//! - **Active**: input within the wake-detection floor
//! - **Idle**: no input for a while, nothing imminent
//! - **Screensaver Soon**: the screensaver (or display sleep) is about to engage
//! - **Screensaver Time** / **Display Off**: the machine has gone dark
//! - **Wake Up**: input resumed after an idle episode
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        idle-detector                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Machine   │──▶│    Stage    │──▶│ Alert gate  │       │
//! │  │  (macOS)    │   │   engine    │   │ + renderer  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Session    │                     │  Dispatch   │       │
//! │  │   stats     │                     │   worker    │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use idle_detector::core::{Snapshot, Stage, StageEngine};
//! use std::time::Duration;
//!
//! let mut engine = StageEngine::default();
//! let reading = Snapshot::idle(275.0)
//!     .with_thresholds(Some(Duration::from_secs(300)), Some(Duration::from_secs(600)));
//!
//! let decision = engine.evaluate(&reading);
//! assert_eq!(decision.stage, Stage::PreScreensaver);
//! assert!(decision.alert_worthy);
//! ```

pub mod agent;
pub mod config;
pub mod core;
pub mod machine;
pub mod notifier;
pub mod runner;
pub mod session;

// Re-export key types at crate root for convenience
pub use agent::{AgentError, LaunchAgent};
pub use config::{Config, ConfigError, NotificationConfig};
pub use core::{EngineConfig, Snapshot, Stage, StageDecision, StageEngine};
pub use machine::{Machine, MachineError, MetricsSource, ScriptedSource};
pub use notifier::{Dispatcher, Notification, NotifyError};
pub use runner::{Clock, RunLoop, RunSummary, StopReason};
pub use session::{SessionStats, SharedSessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Project homepage.
pub const HOMEPAGE: &str = "https://github.com/yousefabuz17/idleDetector";
