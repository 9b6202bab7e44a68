//! Session bookkeeping for a running detector.

pub mod stats;

// Re-export commonly used types
pub use stats::{create_shared_stats, SessionSnapshot, SessionStats, SharedSessionStats};
