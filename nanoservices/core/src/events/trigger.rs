use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};

/// The type of event that triggers a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Run on a fixed interval
    Interval(Duration),
    /// Run once a day at the given UTC wall-clock time
    Daily { at: NaiveTime },
    /// Run once, immediately (CLI `run`, engine start-up)
    Manual,
}

impl Trigger {
    /// Midnight UTC, the default cadence.
    pub fn daily_midnight() -> Self {
        Trigger::Daily { at: NaiveTime::MIN }
    }

    /// Label stored in run history.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Interval(_) => "interval",
            Trigger::Daily { .. } => "daily",
            Trigger::Manual => "manual",
        }
    }
}

/// An event delivered to the scheduler.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// Which pipeline this event is for
    pub pipeline: String,
    /// What kind of trigger caused this event
    pub trigger: Trigger,
    pub fired_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn now(pipeline: impl Into<String>, trigger: Trigger) -> Self {
        Self { pipeline: pipeline.into(), trigger, fired_at: Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_kinds() {
        assert_eq!(Trigger::Interval(Duration::from_secs(1)).kind(), "interval");
        assert_eq!(Trigger::daily_midnight().kind(), "daily");
        assert_eq!(Trigger::Manual.kind(), "manual");
    }

    #[test]
    fn default_daily_is_midnight() {
        let Trigger::Daily { at } = Trigger::daily_midnight() else {
            panic!("expected daily trigger");
        };
        assert_eq!(at, NaiveTime::from_hms_opt(0, 0, 0).unwrap());
    }
}
