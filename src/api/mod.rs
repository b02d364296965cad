pub mod client;
pub mod error;
pub mod paging;
pub mod rate_limit;
pub mod retry;

pub use client::{ApiClient, ApiConfig};
pub use error::ApiError;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use retry::RetryPolicy;
