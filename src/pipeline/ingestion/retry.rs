use crate::common::error::Result;
use crate::observability::metrics;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with linearly increasing backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up. `op` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    label,
                    attempt,
                    max_attempts = policy.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "attempt failed, retrying: {}",
                    e
                );
                metrics::sources::request_retry();
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
