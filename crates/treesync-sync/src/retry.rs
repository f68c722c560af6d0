//! Exponential backoff for per-file actions
//!
//! Every failure is retried: the remote store already absorbs its own
//! temporary errors, so anything reaching this layer is worth another
//! attempt until the profile's `max_retries` is spent.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Upper bound on a single backoff sleep
const MAX_DELAY: Duration = Duration::from_secs(60);

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_DELAY)
        .min(MAX_DELAY)
}

/// Runs `f` up to `max_retries + 1` times
///
/// Backoff schedule with a 1s base: 1s, 2s, 4s, ...
pub async fn with_retry<F, Fut, T, E>(
    operation_name: &str,
    max_retries: u32,
    base_delay: Duration,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        operation = operation_name,
                        attempt, "Operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) if attempt < max_retries => {
                let delay = backoff_delay(base_delay, attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
