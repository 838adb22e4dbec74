use std::time::Duration;

use tokio::sync::watch;

/// Whole-stage retry policy: a failed stage is restarted from scratch up to
/// `retries` more times, waiting `delay` before each restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn none() -> Self {
        Self { retries: 0, delay: Duration::ZERO }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 1, delay: Duration::from_secs(5 * 60) }
    }
}

/// Sleep for `delay` unless shutdown is signalled first. Returns `true` when
/// the wait was cut short by shutdown.
pub(crate) async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return true;
    }
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return true,
                Ok(()) => continue,
                // Sender gone: nobody can cancel us any more.
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            }
        }
    }
}
