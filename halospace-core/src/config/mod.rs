//! Configuration
//!
//! Defaults, overridden by a TOML file and/or `HALOSPACE_*` environment variables.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HALOSPACE_LOG_LEVEL` | `logging.level` |
//! | `HALOSPACE_LOG_JSON` | `logging.json` |
//! | `HALOSPACE_MAX_CHAIN_DEPTH` | `space.max_chain_depth` |
//! | `HALOSPACE_EVENT_CAPACITY` | `space.event_capacity` |
//! | `HALOSPACE_VERIFY_CREDENTIALS` | `space.verify_credentials` |

use crate::core_credentials::DEFAULT_MAX_CHAIN_DEPTH;
use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

mod error;

pub use error::ConfigError;

/// Longest delegation chain a deployment may allow
pub const MAX_CHAIN_DEPTH_LIMIT: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub space: SpaceConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

/// Settings applied to every space state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Deepest accepted delegation chain
    pub max_chain_depth: usize,
    /// Events buffered per subscriber before it starts lagging
    pub event_capacity: usize,
    /// Disable only when replaying logs that were verified on ingestion
    pub verify_credentials: bool,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self { max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH, event_capacity: 100, verify_credentials: true }
    }
}

impl Config {
    /// Defaults with `HALOSPACE_*` overrides from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Load from a TOML file; missing fields keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, keyed by environment variable name
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(level) = lookup("HALOSPACE_LOG_LEVEL") {
            self.logging.level = parse_var("HALOSPACE_LOG_LEVEL", &level)?;
        }
        if let Some(json) = lookup("HALOSPACE_LOG_JSON") {
            self.logging.json = parse_var("HALOSPACE_LOG_JSON", &json)?;
        }
        if let Some(depth) = lookup("HALOSPACE_MAX_CHAIN_DEPTH") {
            self.space.max_chain_depth = parse_var("HALOSPACE_MAX_CHAIN_DEPTH", &depth)?;
        }
        if let Some(capacity) = lookup("HALOSPACE_EVENT_CAPACITY") {
            self.space.event_capacity = parse_var("HALOSPACE_EVENT_CAPACITY", &capacity)?;
        }
        if let Some(verify) = lookup("HALOSPACE_VERIFY_CREDENTIALS") {
            self.space.verify_credentials = parse_var("HALOSPACE_VERIFY_CREDENTIALS", &verify)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CHAIN_DEPTH_LIMIT).contains(&self.space.max_chain_depth) {
            return Err(ConfigError::ValidationFailed(format!(
                "max_chain_depth must be between 1 and {}",
                MAX_CHAIN_DEPTH_LIMIT
            )));
        }

        if self.space.event_capacity == 0 {
            return Err(ConfigError::ValidationFailed("event_capacity must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.space.max_chain_depth, 8);
        assert!(config.space.verify_credentials);
    }

    #[test]
    fn test_overrides() {
        let config = Config::default()
            .with_overrides(vars(&[
                ("HALOSPACE_LOG_LEVEL", "debug"),
                ("HALOSPACE_LOG_JSON", "true"),
                ("HALOSPACE_MAX_CHAIN_DEPTH", "4"),
                ("HALOSPACE_VERIFY_CREDENTIALS", "false"),
            ]))
            .unwrap();

        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.json);
        assert_eq!(config.space.max_chain_depth, 4);
        assert!(!config.space.verify_credentials);
        assert_eq!(config.space.event_capacity, 100);
    }

    #[test]
    fn test_invalid_override() {
        let err = Config::default().with_overrides(vars(&[("HALOSPACE_EVENT_CAPACITY", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "HALOSPACE_EVENT_CAPACITY"));

        let err = Config::default().with_overrides(vars(&[("HALOSPACE_LOG_LEVEL", "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.space.max_chain_depth = 0;
        assert!(config.validate().is_err());

        config.space.max_chain_depth = MAX_CHAIN_DEPTH_LIMIT + 1;
        assert!(config.validate().is_err());

        config = Config::default();
        config.space.event_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halospace.toml");

        let mut config = Config::default();
        config.logging.level = LogLevel::Warn;
        config.space.max_chain_depth = 3;
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[space]\nevent_capacity = 16\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.space.event_capacity, 16);
        assert_eq!(config.space.max_chain_depth, DEFAULT_MAX_CHAIN_DEPTH);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(Config::from_file("/nonexistent/halospace.toml"), Err(ConfigError::FileReadError(_))));
    }
}
