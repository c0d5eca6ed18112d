//! Exponential backoff for transient external-call failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy: attempt bound plus exponential backoff with a capped factor.
///
/// One policy instance is shared by every call site that owns retries; the
/// provider adapters themselves never sleep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
        }
    }

    /// Delay before the given retry (1-based), doubling each time.
    ///
    /// The exponent is capped so a long retry chain cannot produce
    /// multi-minute sleeps.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let capped = attempt.min(5);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1 << capped))
    }

    /// Run `op` until it succeeds, fails non-transiently, or the attempt
    /// bound is exhausted. `is_transient` decides which errors are retried.
    pub async fn run<T, E, F, Fut>(
        &self,
        is_transient: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && attempt + 1 < self.max_attempts => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
