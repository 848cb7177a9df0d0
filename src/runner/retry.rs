use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// `config.max_attempts` calls have been made. Waits a jittered,
/// exponentially growing delay between calls.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !should_retry(&error) {
            return Err(error);
        }
        if attempt >= config.max_attempts {
            warn!("Giving up after {} attempts: {}", attempt, error);
            return Err(error);
        }

        let delay = backoff_delay(config, attempt);
        warn!("Attempt {} failed: {}. Retrying in {:?}", attempt, error, delay);
        sleep(delay).await;
        attempt += 1;
    }
}

/// `base * 2^(attempt - 1)` plus up to `base` of jitter
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let base = config.backoff_base_ms.max(1);
    let exponential = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = rand::thread_rng().gen_range(0..base);
    Duration::from_millis(exponential.saturating_add(jitter))
}
