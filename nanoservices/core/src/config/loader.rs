use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;

use crate::config::types::FlowConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid duration `{0}` (expected e.g. 30s, 5m, 2h, 1d)")]
    InvalidDuration(String),
    #[error("invalid time `{0}` (expected HH:MM)")]
    InvalidTime(String),
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
    #[error("invalid source: {0}")]
    InvalidSource(String),
}

/// Load and validate a pipeline config from a YAML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<FlowConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate a pipeline config from a YAML string.
pub fn parse_config(yaml: &str) -> Result<FlowConfig, ConfigError> {
    let config: FlowConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

/// Parse "30s", "5m", "2h" or "1d".
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (value, unit) = s.split_at(split);
    let value: u64 = value.parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => value,
        "m" => value.checked_mul(60).ok_or_else(invalid)?,
        "h" => value.checked_mul(3600).ok_or_else(invalid)?,
        "d" => value.checked_mul(86_400).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };
    Ok(Duration::from_secs(secs))
}

/// Parse a 24h "HH:MM" wall-clock time.
pub fn parse_time(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| ConfigError::InvalidTime(s.to_string()))
}
