use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::ApiError;

/// Rate limit parameters for the remote API.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum sustained request rate.
    pub requests_per_second: f64,
    /// Rolling daily request ceiling (resets at UTC midnight).
    pub daily_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 3.0,
            daily_limit: 10_000,
        }
    }
}

/// Shared limiter every outgoing request funnels through.
///
/// Permits are serialized on a monotonic schedule: each `acquire` claims the
/// next free slot and advances it by one interval under the lock, so
/// concurrent callers cannot exceed the sustained rate between them.
pub struct RateLimiter {
    interval: Duration,
    daily_limit: u32,
    inner: Mutex<Window>,
}

struct Window {
    next_slot: Option<Instant>,
    day: NaiveDate,
    used: u32,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / config.requests_per_second),
            daily_limit: config.daily_limit,
            inner: Mutex::new(Window {
                next_slot: None,
                day: Utc::now().date_naive(),
                used: 0,
            }),
        }
    }

    /// Wait until issuing one more request stays inside both bounds.
    ///
    /// Returns `QuotaExceeded` once the daily ceiling is reached; that is a
    /// configuration problem, not a transient condition.
    pub async fn acquire(&self) -> Result<(), ApiError> {
        let slot = {
            let mut window = self.inner.lock().await;

            let today = Utc::now().date_naive();
            if window.day != today {
                window.day = today;
                window.used = 0;
            }

            if window.used >= self.daily_limit {
                return Err(ApiError::QuotaExceeded {
                    limit: self.daily_limit,
                });
            }
            window.used += 1;

            let now = Instant::now();
            let slot = match window.next_slot {
                Some(s) if s > now => s,
                _ => now,
            };
            window.next_slot = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
        Ok(())
    }

    /// Requests spent against the daily ceiling so far today.
    pub async fn used_today(&self) -> u32 {
        self.inner.lock().await.used
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sequential_acquires_respect_rate() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 10.0,
            daily_limit: 1_000,
        });

        let start = Instant::now();
        for _ in 0..20 {
            limiter.acquire().await.unwrap();
        }
        let elapsed = start.elapsed();

        // 20 permits at 10/s: the 20th slot is 1.9s after the first.
        assert!(elapsed >= Duration::from_millis(1_900), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquires_are_serialized() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            requests_per_second: 5.0,
            daily_limit: 1_000,
        }));

        let start = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let elapsed = start.elapsed();

        // 10 permits at 5/s from any mix of tasks: at least 1.8s.
        assert!(elapsed >= Duration::from_millis(1_800), "elapsed {elapsed:?}");
        assert_eq!(limiter.used_today().await, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_ceiling_is_fatal() {
        let limiter = RateLimiter::new(RateLimitConfig {
            requests_per_second: 100.0,
            daily_limit: 2,
        });

        limiter.acquire().await.unwrap();
        limiter.acquire().await.unwrap();
        let err = limiter.acquire().await.unwrap_err();
        assert!(matches!(err, ApiError::QuotaExceeded { limit: 2 }));
        // And it keeps failing; the budget does not free up.
        assert!(limiter.acquire().await.is_err());
    }
}
