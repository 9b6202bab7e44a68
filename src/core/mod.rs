//! Core functionality for the idle detector.
//!
//! This module contains:
//! - The stage model (stages, milestones, triggers)
//! - Snapshot and decision types
//! - The stateful stage engine
//! - Duration formatting for notification text

pub mod duration;
pub mod engine;
pub mod stage;
pub mod types;

// Re-export commonly used types
pub use duration::human_readable;
pub use engine::{EngineConfig, ReferenceTimers, StageEngine};
pub use stage::{Milestone, Stage, Trigger};
pub use types::{Snapshot, StageDecision, Thresholds};
