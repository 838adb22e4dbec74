use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::config::loader::{parse_duration, parse_time, ConfigError};
use crate::events::trigger::Trigger;
use crate::pipeline::retry::RetryPolicy;

/// Everything one pipeline needs, parsed once at startup and passed around by
/// reference afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlowConfig {
    pub pipeline: String,
    pub owner: Option<String>,
    pub description: Option<String>,
    /// Triggers dated before this day are ignored.
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// e.g. "30s", "5m"
    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: String,
    /// For daily triggers: "HH:MM" in UTC
    pub at: Option<String>,
    /// For interval triggers: e.g. "60s", "5m"
    pub every: Option<String>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self { trigger_type: "daily".to_string(), at: None, every: None }
    }
}

/// Where the raw collection comes from: a local file or an HTTP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SourceConfig {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    /// Bearer token for `url`
    pub token: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DestinationConfig {
    /// Main SQLite file; namespaces are created next to it.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HistoryConfig {
    /// Run history database. In-memory when absent.
    pub path: Option<PathBuf>,
}

fn default_retries() -> u32 {
    1
}

fn default_retry_delay() -> String {
    "5m".to_string()
}

impl FlowConfig {
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy::new(self.retries, parse_duration(&self.retry_delay)?))
    }

    pub fn trigger(&self) -> Result<Trigger, ConfigError> {
        match self.trigger.trigger_type.as_str() {
            "daily" => match &self.trigger.at {
                Some(at) => Ok(Trigger::Daily { at: parse_time(at)? }),
                None => Ok(Trigger::daily_midnight()),
            },
            "interval" => {
                let every = self.trigger.every.as_deref().ok_or_else(|| {
                    ConfigError::InvalidTrigger("interval trigger needs `every`".to_string())
                })?;
                let period = parse_duration(every)?;
                if period.is_zero() {
                    return Err(ConfigError::InvalidDuration(every.to_string()));
                }
                Ok(Trigger::Interval(period))
            }
            "manual" => Ok(Trigger::Manual),
            other => Err(ConfigError::InvalidTrigger(format!("unknown trigger type `{other}`"))),
        }
    }

    /// Check the parts that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trigger()?;
        self.retry_policy()?;
        match (&self.source.path, &self.source.url) {
            (Some(_), None) | (None, Some(_)) => {}
            (None, None) => {
                return Err(ConfigError::InvalidSource("one of `path` or `url` is required".into()))
            }
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidSource("`path` and `url` are mutually exclusive".into()))
            }
        }
        if let Some(timeout) = &self.source.timeout {
            parse_duration(timeout)?;
        }
        Ok(())
    }
}
