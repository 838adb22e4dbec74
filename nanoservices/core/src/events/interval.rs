use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use crate::events::trigger::{Trigger, TriggerEvent};

/// Spawns a tokio task that emits TriggerEvents on a fixed interval.
/// Ticks missed while the receiver was busy are dropped, not replayed.
/// Returns a JoinHandle that can be aborted to stop the timer.
pub fn spawn_interval_trigger(
    pipeline: String,
    interval: Duration,
    sender: mpsc::Sender<TriggerEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let event = TriggerEvent::now(pipeline.clone(), Trigger::Interval(interval));
            if sender.send(event).await.is_err() {
                // Receiver dropped, stop producing
                break;
            }
        }
    })
}
