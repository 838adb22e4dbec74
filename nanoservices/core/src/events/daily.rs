use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::trigger::{Trigger, TriggerEvent};

/// Time left until the next occurrence of `at` (UTC) strictly after `now`.
pub fn until_next(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let today = now.date_naive().and_time(at).and_utc();
    let next = if today > now {
        today
    } else {
        match now.date_naive().checked_add_days(Days::new(1)) {
            Some(tomorrow) => tomorrow.and_time(at).and_utc(),
            None => return Duration::MAX,
        }
    };
    (next - now).to_std().unwrap_or_default()
}

/// Spawns a tokio task that emits one TriggerEvent per day at `at` UTC.
///
/// The wait is recomputed from the wall clock after every fire, so a day the
/// process slept through is skipped rather than replayed.
pub fn spawn_daily_trigger(
    pipeline: String,
    at: NaiveTime,
    sender: mpsc::Sender<TriggerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = until_next(Utc::now(), at);
            tracing::debug!(pipeline = %pipeline, wait_secs = wait.as_secs(), "next daily run scheduled");
            tokio::time::sleep(wait).await;

            let event = TriggerEvent::now(pipeline.clone(), Trigger::Daily { at });
            if sender.send(event).await.is_err() {
                break;
            }
        }
    })
}
