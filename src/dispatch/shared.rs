//! Process-wide dispatch resources
//!
//! One HTTP client and one rate limiter serve every adapter in a run, so the
//! per-second budget holds across batches and across providers.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::rate_limit::RateLimiter;

/// HTTP connect timeout (seconds)
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
/// HTTP request timeout (seconds), generous enough for large object transfers
const HTTP_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Global HTTP client shared by every batch
pub static GLOBAL_HTTP_CLIENT: Lazy<Arc<Client>> = Lazy::new(|| {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build configured HTTP client, using defaults");
            Client::new()
        });
    Arc::new(client)
});

/// Global API rate limiter
///
/// Every outbound request passes through this limiter, whichever adapter issued it.
pub static GLOBAL_RATE_LIMITER: Lazy<Arc<RateLimiter>> = Lazy::new(|| Arc::new(RateLimiter::new()));

/// Get the global HTTP client
pub fn global_http_client() -> Arc<Client> {
    GLOBAL_HTTP_CLIENT.clone()
}

/// Get the global rate limiter
pub fn global_rate_limiter() -> Arc<RateLimiter> {
    GLOBAL_RATE_LIMITER.clone()
}
