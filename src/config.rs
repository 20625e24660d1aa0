//! Configuration for the occupancy sensor agent.

use crate::sensor::SensorKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Which sensor variant is wired to the pin
    pub sensor: SensorKind,

    /// BCM pin number the sensor is wired to
    pub pin: u8,

    /// How often the sensor line is sampled
    #[serde(with = "duration_serde")]
    pub poll_interval: Duration,

    /// Duration of each counting window
    #[serde(with = "duration_serde")]
    pub window_size: Duration,

    /// How often the backlog is flushed to the remote store
    #[serde(with = "duration_serde")]
    pub flush_interval: Duration,

    /// Base URL of the remote store
    pub store_url: String,

    /// Optional bearer token for the remote store
    pub store_token: Option<String>,

    /// Directory for the append-only event log
    pub log_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("occupancy-sensor-agent");

        Self {
            sensor: SensorKind::Motion,
            pin: 17,
            poll_interval: Duration::from_secs(1),
            window_size: Duration::from_secs(60),
            flush_interval: Duration::from_secs(600),
            store_url: "http://127.0.0.1:8080".to_string(),
            store_token: None,
            log_dir,
        }
    }
}

impl AgentConfig {
    /// Validate the configured intervals against each other.
    ///
    /// Flush boundaries must always coincide with window boundaries, so the
    /// flush interval has to be a whole multiple of the window size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "poll interval must be at least 1 second".to_string(),
            ));
        }
        if self.window_size < self.poll_interval {
            return Err(ConfigError::InvalidInterval(format!(
                "window size ({}s) must be at least the poll interval ({}s)",
                self.window_size.as_secs(),
                self.poll_interval.as_secs()
            )));
        }
        if self.flush_interval.is_zero()
            || self.flush_interval.as_secs() % self.window_size.as_secs() != 0
        {
            return Err(ConfigError::InvalidInterval(format!(
                "flush interval ({}s) must be a positive multiple of the window size ({}s)",
                self.flush_interval.as_secs(),
                self.window_size.as_secs()
            )));
        }
        if self.store_url.is_empty() {
            return Err(ConfigError::InvalidStoreUrl(
                "store URL must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors. All fatal before the loop starts.
#[derive(Debug)]
pub enum ConfigError {
    InvalidSensor(String),
    InvalidInterval(String),
    InvalidStoreUrl(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidSensor(e) => write!(f, "Invalid sensor: {e}"),
            ConfigError::InvalidInterval(e) => write!(f, "Invalid interval: {e}"),
            ConfigError::InvalidStoreUrl(e) => write!(f, "Invalid store URL: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensor, SensorKind::Motion);
        assert_eq!(config.pin, 17);
        assert_eq!(config.window_size, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let config = AgentConfig {
            poll_interval: Duration::from_secs(0),
            ..AgentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_window_smaller_than_poll_rejected() {
        let config = AgentConfig {
            poll_interval: Duration::from_secs(120),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flush_must_be_multiple_of_window() {
        let config = AgentConfig {
            flush_interval: Duration::from_secs(90),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AgentConfig {
            flush_interval: Duration::from_secs(120),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
