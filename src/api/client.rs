use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::models::{CallMetadata, CallTranscript, ExtensiveCall, User};

use super::paging::{next_cursor, records};
use super::{ApiError, RateLimitConfig, RateLimiter, RetryPolicy};

/// Configuration for the call-intelligence API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API access key (from GONG_ACCESS_KEY env var).
    pub access_key: String,
    /// API secret key (from GONG_SECRET_KEY env var).
    pub secret_key: String,
    /// Base URL, e.g. "https://us-67600.api.gong.io".
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum ids accepted by the batch endpoints per request.
    pub batch_limit: usize,
}

impl ApiConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.gong.io";

    /// Create config from environment variables.
    pub fn from_env() -> Result<Self> {
        let access_key = std::env::var("GONG_ACCESS_KEY")
            .context("GONG_ACCESS_KEY environment variable not set")?;
        let secret_key = std::env::var("GONG_SECRET_KEY")
            .context("GONG_SECRET_KEY environment variable not set")?;
        let base_url =
            std::env::var("GONG_BASE_URL").unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());

        Ok(Self::new(access_key, secret_key, base_url))
    }

    /// Create with custom settings.
    pub fn new(access_key: String, secret_key: String, base_url: String) -> Self {
        Self {
            access_key,
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            batch_limit: 100,
        }
    }
}

/// Client for the call-intelligence API.
///
/// Every request goes through the shared rate limiter and the retry policy;
/// pagination follows the opaque cursor the server round-trips.
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    limiter: RateLimiter,
    retry: RetryPolicy,
    users: OnceCell<Vec<User>>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        Self::with_policies(config, RateLimitConfig::default(), RetryPolicy::default())
    }

    pub fn with_policies(
        config: ApiConfig,
        rate_limit: RateLimitConfig,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            limiter: RateLimiter::new(rate_limit),
            retry,
            users: OnceCell::new(),
        })
    }

    /// Maximum ids per batch request; callers chunk to this before invoking
    /// the extensive/transcript operations.
    pub fn batch_limit(&self) -> usize {
        self.config.batch_limit
    }

    /// One rate-limited, retried request returning the raw JSON body.
    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/v2{}", self.config.base_url, endpoint);

        self.retry
            .execute(|| self.send_once(method.clone(), &url, query, body))
            .await
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        self.limiter.acquire().await?;

        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.config.access_key, Some(&self.config.secret_key))
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ApiError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// GET with the cursor round-tripped in the query string, collecting
    /// the records under `data_key` across all pages.
    async fn paginate_get(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        data_key: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = params.to_vec();
            if let Some(cursor) = &cursor {
                query.push(("cursor".to_string(), cursor.clone()));
            }

            let body = self.request(Method::GET, endpoint, &query, None).await?;
            items.extend(records(&body, data_key));

            cursor = next_cursor(&body);
            if cursor.is_none() {
                break;
            }
            debug!("Fetching next page of {endpoint}");
        }

        Ok(items)
    }

    /// POST with the cursor round-tripped in the request body.
    async fn paginate_post(
        &self,
        endpoint: &str,
        base_body: &Value,
        data_key: &str,
    ) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = base_body.clone();
            if let (Some(cursor), Some(obj)) = (&cursor, body.as_object_mut()) {
                obj.insert("cursor".to_string(), Value::String(cursor.clone()));
            }

            let response = self.request(Method::POST, endpoint, &[], Some(&body)).await?;
            items.extend(records(&response, data_key));

            cursor = next_cursor(&response);
            if cursor.is_none() {
                break;
            }
            debug!("Fetching next page of {endpoint}");
        }

        Ok(items)
    }

    /// List externally-facing calls in the window.
    ///
    /// The listing endpoint has no scope parameter, so the external-only
    /// policy is applied to the returned stubs here.
    pub async fn list_calls(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<CallMetadata>, ApiError> {
        let mut params = Vec::new();
        if let Some(from) = from {
            params.push(("fromDateTime".to_string(), format_datetime(from)));
        }
        if let Some(to) = to {
            params.push(("toDateTime".to_string(), format_datetime(to)));
        }

        let raw = self.paginate_get("/calls", &params, "calls").await?;

        let mut calls = Vec::new();
        for value in raw {
            let call: CallMetadata = serde_json::from_value(value)?;
            if call.scope.as_deref() == Some("External") {
                calls.push(call);
            }
        }
        Ok(calls)
    }

    /// Full metadata + participants for up to `batch_limit` calls, keyed by
    /// call id. Callers chunk; batches over the limit are rejected.
    pub async fn get_calls_extensive(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, ExtensiveCall>, ApiError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.check_batch(ids)?;

        let body = json!({
            "filter": {"callIds": ids},
            "contentSelector": {
                "exposedFields": {
                    "parties": true,
                    "content": {"trackers": true},
                    "collaboration": {"publicComments": true}
                }
            }
        });

        let raw = self.paginate_post("/calls/extensive", &body, "calls").await?;

        let mut result = HashMap::new();
        for value in raw {
            let call: ExtensiveCall = serde_json::from_value(value)?;
            result.insert(call.metadata.id.clone(), call);
        }
        Ok(result)
    }

    /// Transcripts for up to `batch_limit` calls, keyed by call id. A call
    /// absent from the result simply has no transcript yet.
    pub async fn get_transcripts(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, CallTranscript>, ApiError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.check_batch(ids)?;

        let body = json!({"filter": {"callIds": ids}});
        let raw = self
            .paginate_post("/calls/transcript", &body, "callTranscripts")
            .await?;

        let mut result = HashMap::new();
        for value in raw {
            let transcript: CallTranscript = serde_json::from_value(value)?;
            result.insert(transcript.call_id.clone(), transcript);
        }
        Ok(result)
    }

    /// Full user directory, fetched once and cached for the process
    /// lifetime.
    pub async fn get_users(&self) -> Result<Vec<User>, ApiError> {
        let users = self
            .users
            .get_or_try_init(|| async {
                let raw = self.paginate_get("/users", &[], "users").await?;
                let mut users = Vec::with_capacity(raw.len());
                for value in raw {
                    users.push(serde_json::from_value::<User>(value)?);
                }
                Ok::<_, ApiError>(users)
            })
            .await?;
        Ok(users.clone())
    }

    fn check_batch(&self, ids: &[String]) -> Result<(), ApiError> {
        if ids.len() > self.config.batch_limit {
            return Err(ApiError::BatchTooLarge {
                len: ids.len(),
                limit: self.config.batch_limit,
            });
        }
        Ok(())
    }
}

/// RFC 3339 with a trailing Z, the timestamp format the API expects.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
