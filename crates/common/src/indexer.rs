use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;

pub const MAX_RETRIES: u32 = 20;
pub const RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Upper bound for the exponential batch backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retries `operation` with a constant delay until it succeeds or
/// [`MAX_RETRIES`] attempts have failed.
pub async fn with_retry<F, Fut, T, E>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_policy(MAX_RETRIES, RETRY_DELAY, operation).await
}

pub async fn with_retry_policy<F, Fut, T, E>(
    max_retries: u32,
    delay: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(e);
                }
                tracing::warn!(attempt, error = %e, "Operation failed, retrying in {:?}", delay);
                sleep(delay).await;
            }
        }
    }
}

/// Delay before retrying a failed batch for the `attempt`-th time.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
        .min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);

        let result: Result<u32, String> = with_retry(move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(format!("attempt {n} failed"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);

        let result: Result<(), String> =
            with_retry_policy(4, Duration::from_millis(10), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("rpc down".to_string())
            })
            .await;

        assert_eq!(result.unwrap_err(), "rpc down");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(5));
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(10));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(40));
        assert_eq!(backoff_delay(base, 30), MAX_BACKOFF);
    }
}
