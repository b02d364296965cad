use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::ApiError;

/// Bounded exponential backoff for a single logical request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the computed backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying transient failures with exponential backoff.
    ///
    /// Non-transient errors surface immediately. A server Retry-After hint
    /// can lengthen a wait but never shorten it. When the attempt budget is
    /// spent, the last error is wrapped in `RetryExhausted`.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }
            if attempt >= self.max_attempts {
                return Err(ApiError::RetryExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let mut wait = delay.min(self.max_delay);
            if let ApiError::RateLimited {
                retry_after: Some(hint),
            } = &err
            {
                wait = wait.max(*hint);
            }
            wait += Duration::from_millis(jitter_ms());

            warn!(
                "Transient API failure (attempt {}/{}): {}; retrying in {:?}",
                attempt, self.max_attempts, err, wait
            );
            tokio::time::sleep(wait).await;
            delay = (delay * 2).min(self.max_delay);
        }
    }
}

/// Random jitter in 0-100ms, without pulling in a rand dependency.
fn jitter_ms() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_rate_limited_attempts_exactly_max() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), ApiError> = fast_policy()
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::RateLimited { retry_after: None }) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        match result.unwrap_err() {
            ApiError::RetryExhausted { attempts, source } => {
                assert_eq!(attempts, 5);
                assert!(matches!(*source, ApiError::RateLimited { .. }));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), ApiError> = fast_policy()
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ApiError::Status {
                        status: 401,
                        body: "bad auth".into(),
                    })
                }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.unwrap_err(),
            ApiError::Status { status: 401, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = fast_policy()
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ApiError::Status {
                            status: 503,
                            body: "unavailable".into(),
                        })
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_exceeded_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), ApiError> = fast_policy()
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::QuotaExceeded { limit: 100 }) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(matches!(result.unwrap_err(), ApiError::QuotaExceeded { .. }));
    }
}
