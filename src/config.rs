//! Configuration for the idle detector.

use crate::core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the idle detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How often the machine is polled
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Threshold used when the machine has no screensaver or display-sleep timeout
    #[serde(with = "duration_serde::option")]
    pub idle_interval_if_no_modes_are_set: Option<Duration>,

    /// Treat a running screensaver as if the display were off
    pub consider_screensaver_as_off: bool,

    /// How long before the screensaver the pre-alert fires
    #[serde(with = "duration_serde")]
    pub pre_alert_lead: Duration,

    /// Idle readings below this count as user activity
    #[serde(with = "duration_serde")]
    pub wake_floor: Duration,

    /// Notification behaviour
    pub notifications: NotificationConfig,

    /// Whether detection is currently paused
    pub paused: bool,

    /// Path for agent logs and other local data
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("idle-detector");

        Self {
            poll_interval: Duration::from_secs(1),
            idle_interval_if_no_modes_are_set: Some(Duration::from_secs(300)), // 5 minutes
            consider_screensaver_as_off: false,
            pre_alert_lead: Duration::from_secs(30),
            wake_floor: Duration::from_secs(2),
            notifications: NotificationConfig::default(),
            paused: false,
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("idle-detector")
            .join("config.json")
    }

    /// Directory for launch agent stdout/stderr logs.
    pub fn log_dir(&self) -> PathBuf {
        self.data_path.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.log_dir()).map_err(|e| ConfigError::IoError(e.to_string()))
    }

    /// The subset of settings the stage engine consumes.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            idle_interval_if_no_modes_are_set: self.idle_interval_if_no_modes_are_set,
            consider_screensaver_as_off: self.consider_screensaver_as_off,
            pre_alert_lead: self.pre_alert_lead,
            wake_floor: self.wake_floor,
        }
    }

    /// Check settings that would make the agent misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be at least 1 second".into()));
        }
        if self.wake_floor.is_zero() {
            return Err(ConfigError::Invalid("wake_floor must be at least 1 second".into()));
        }
        Ok(())
    }
}

/// Configuration for how notifications are rendered and sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Collapse repeat notifications of a stage in the notification center
    pub group_notifications: bool,
    /// Deliver even when Do Not Disturb is on
    pub ignore_dnd: bool,
    /// Render durations as `5m 30s` instead of `5 minutes 30 seconds`
    pub compact_time: bool,
    /// Also announce waking from a plain idle stretch
    pub notify_on_idle_wake: bool,
    /// How long a delivered notification stays on screen
    #[serde(with = "duration_serde")]
    pub display_lifetime: Duration,
    /// Directory holding `idle.png` and `wakeup.png`
    pub assets_dir: Option<PathBuf>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            group_notifications: false,
            ignore_dnd: true,
            compact_time: false,
            notify_on_idle_wake: false,
            display_lifetime: Duration::from_secs(10),
            assets_dir: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as whole seconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            duration.map(|d| d.as_secs()).serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let secs = Option::<u64>::deserialize(deserializer)?;
            Ok(secs.map(Duration::from_secs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("idle-detector-config-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(
            config.idle_interval_if_no_modes_are_set,
            Some(Duration::from_secs(300))
        );
        assert!(config.notifications.ignore_dnd);
        assert!(!config.notifications.group_notifications);
        assert!(!config.paused);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"pre_alert_lead": 45, "notifications": {"compact_time": true}}"#)
                .unwrap();
        assert_eq!(config.pre_alert_lead, Duration::from_secs(45));
        assert!(config.notifications.compact_time);
        assert!(config.notifications.ignore_dnd);
        assert_eq!(config.wake_floor, Duration::from_secs(2));
    }

    #[test]
    fn test_null_fallback_interval() {
        let config: Config =
            serde_json::from_str(r#"{"idle_interval_if_no_modes_are_set": null}"#).unwrap();
        assert_eq!(config.idle_interval_if_no_modes_are_set, None);
        assert_eq!(config.engine_config().idle_interval_if_no_modes_are_set, None);
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_config_path("config.json");
        let mut config = Config::default();
        config.paused = true;
        config.consider_screensaver_as_off = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let path = temp_config_path("does-not-exist.json");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let config = Config {
            poll_interval: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
