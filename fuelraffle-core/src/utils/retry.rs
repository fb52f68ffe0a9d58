//! Exponential backoff for publishing.

use crate::config::RetryPolicy;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay before retry number `retry_count` (0-based).
pub fn calculate_retry_delay(policy: &RetryPolicy, retry_count: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry_count.min(policy.max_exponent));
    policy.base_delay.saturating_mul(factor)
}

/// Run `attempt` until it succeeds or `policy.max_retries` retries are spent.
///
/// Returns the last error when retries are exhausted.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut retries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if retries < policy.max_retries => {
                let delay = calculate_retry_delay(policy, retries);
                warn!(
                    operation = what,
                    error = %e,
                    retry = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_delay_calculation() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_exponent: 11,
        };
        assert_eq!(calculate_retry_delay(&policy, 0), Duration::from_secs(1));
        assert_eq!(calculate_retry_delay(&policy, 1), Duration::from_secs(2));
        assert_eq!(calculate_retry_delay(&policy, 10), Duration::from_secs(1024));
        assert_eq!(calculate_retry_delay(&policy, 11), Duration::from_secs(2048));
        // Capped.
        assert_eq!(calculate_retry_delay(&policy, 100), Duration::from_secs(2048));
    }

    #[tokio::test]
    async fn test_backoff_gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_exponent: 1,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = with_backoff(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("down".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_returns_first_success() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = with_backoff(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err("flaky".to_string()) } else { Ok(n) } }
        })
        .await;
        assert_eq!(result, Ok(1));
    }
}
