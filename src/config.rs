//! Run configuration and harness-wide constants

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Number of requests launched together in one wave when nothing else is configured.
pub const DEFAULT_CONCURRENT_REQUESTS: usize = 8;

/// Hard ceiling on requests in flight within one wave.
pub const MAX_CONCURRENT_REQUESTS: usize = 32;

/// Number of times a poll is re-issued when the adapter returns no status mapping at all.
pub const MAX_POLL_RETRIES: u32 = 3;

/// Number of resubmissions after an HTTP 429 before the adapter gives up.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Pause between a 429 response and its resubmission.
pub const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Pause between two polls of the job state machine.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settling time before output objects are listed and sized.
pub const SLEEP_BEFORE_SET_SIZE: Duration = Duration::from_secs(10);

/// File (inside the run directory) listing output objects to delete on cleanup.
pub const CLEANUP_FILE: &str = ".output_objects";

/// Upper bound on follow-up requests when a container listing is truncated.
pub const MAX_LIST_PAGES: usize = 1000;

/// Rounding precision for reported metrics.
pub const ROUND_PRECISION: i32 = 4;

/// Round `value` to [`ROUND_PRECISION`] decimal places.
pub fn round_metric(value: f64) -> f64 {
    let factor = 10f64.powi(ROUND_PRECISION);
    (value * factor).round() / factor
}

/// Convert a byte count into megabytes, rounded for reporting.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    round_metric(bytes as f64 / 1024.0 / 1024.0)
}

/// Settings consumed by the batch dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Emit per-request transcripts at debug level
    pub debug: bool,
    /// Requests launched per wave (1..=32)
    pub concurrent_requests: usize,
    /// Ceiling on outbound requests per second; `None` is unlimited
    pub max_api_requests_sec: Option<u32>,
    /// Directory for files the run leaves behind (cleanup list)
    pub run_dir: PathBuf,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            debug: false,
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
            max_api_requests_sec: None,
            run_dir: PathBuf::from("."),
        }
    }
}

impl DispatchConfig {
    /// Build a dispatch configuration, clamping and normalizing raw values.
    ///
    /// A concurrency of 0 falls back to the default; values above
    /// [`MAX_CONCURRENT_REQUESTS`] are clamped. A requests-per-second ceiling
    /// below 1 means unlimited.
    pub fn new(
        debug: bool,
        concurrent_requests: usize,
        max_api_requests_sec: Option<u32>,
        run_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            debug,
            concurrent_requests: clamp_concurrency(concurrent_requests),
            max_api_requests_sec: max_api_requests_sec.filter(|v| *v >= 1),
            run_dir: run_dir.into(),
        }
    }

    /// Path of the cleanup file inside the run directory
    pub fn cleanup_file(&self) -> PathBuf {
        self.run_dir.join(CLEANUP_FILE)
    }
}

/// Normalize a configured concurrency into 1..=[`MAX_CONCURRENT_REQUESTS`].
pub fn clamp_concurrency(requested: usize) -> usize {
    if requested == 0 {
        return DEFAULT_CONCURRENT_REQUESTS;
    }
    if requested > MAX_CONCURRENT_REQUESTS {
        warn!(
            requested = requested,
            max = MAX_CONCURRENT_REQUESTS,
            "Concurrent requests exceeds maximum, clamping"
        );
        return MAX_CONCURRENT_REQUESTS;
    }
    requested
}
