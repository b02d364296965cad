use std::time::Duration;

/// Errors from the remote call-intelligence API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// HTTP 429 from the server. Transient; `retry_after` carries the
    /// server's Retry-After hint when present.
    #[error("rate limited by server{}", retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Non-success HTTP status other than 429. 5xx is transient, the rest
    /// is a permanent client error.
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    /// The configured daily request ceiling was reached. Not retryable;
    /// further requests would fail too.
    #[error("daily request quota of {limit} exhausted")]
    QuotaExceeded { limit: u32 },

    /// A transient error survived every retry attempt.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },

    /// Caller passed more ids than the endpoint accepts per request.
    #[error("batch of {len} ids exceeds the per-request limit of {limit}")]
    BatchTooLarge { len: usize, limit: usize },

    /// Connection-level failure (reset, timeout, DNS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Transport(_) => true,
            ApiError::QuotaExceeded { .. }
            | ApiError::RetryExhausted { .. }
            | ApiError::BatchTooLarge { .. }
            | ApiError::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::RateLimited { retry_after: None }.is_transient());
        assert!(
            ApiError::Status {
                status: 503,
                body: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ApiError::Status {
                status: 401,
                body: "bad auth".into()
            }
            .is_transient()
        );
        assert!(!ApiError::QuotaExceeded { limit: 100 }.is_transient());
        assert!(!ApiError::BatchTooLarge { len: 150, limit: 100 }.is_transient());
    }

    #[test]
    fn test_display_includes_status_and_body() {
        let err = ApiError::Status {
            status: 400,
            body: "Bad Request".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("Bad Request"));
    }

    #[test]
    fn test_retry_exhausted_wraps_source() {
        let err = ApiError::RetryExhausted {
            attempts: 5,
            source: Box::new(ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempts"));
        assert!(msg.contains("30s"));
    }
}
