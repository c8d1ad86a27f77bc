//! Observability metrics for the benchmark harness
//!
//! Dispatch and polling emit counters and histograms through the `metrics`
//! facade. Without an installed recorder every call is a no-op, so the
//! Prometheus exporter is only installed when the CLI is given a scrape address.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: a second call is a no-op.
///
/// # Arguments
/// * `addr` - Socket address to bind the scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "dispatch_requests_total",
        Unit::Count,
        "Total number of HTTP requests dispatched, by status"
    );
    describe_histogram!(
        "dispatch_request_duration_seconds",
        Unit::Seconds,
        "Dispatched request duration in seconds"
    );
    describe_counter!(
        "dispatch_rate_limit_pauses_total",
        Unit::Count,
        "Total number of pauses forced by the requests-per-second ceiling"
    );
    describe_histogram!(
        "dispatch_rate_limit_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for the next rate limit window"
    );
    describe_counter!(
        "dispatch_batch_failures_total",
        Unit::Count,
        "Total number of batches in which no request produced a status"
    );
    describe_counter!(
        "job_poll_retries_total",
        Unit::Count,
        "Total number of job status polls re-issued after an empty response"
    );
    describe_counter!(
        "job_transitions_total",
        Unit::Count,
        "Total number of canonical job state transitions, by target state"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);

    Ok(())
}

/// Whether the Prometheus exporter has been installed
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Timing and status recording for one dispatched request
pub struct RequestMetrics {
    method: String,
    start_time: Instant,
}

impl RequestMetrics {
    /// Start recording a request
    pub fn start(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            start_time: Instant::now(),
        }
    }

    /// Time since the request started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Record completion with an HTTP status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();
        counter!(
            "dispatch_requests_total",
            "method" => self.method.clone(),
            "status" => status_code.to_string(),
        )
        .increment(1);
        histogram!(
            "dispatch_request_duration_seconds",
            "method" => self.method.clone(),
        )
        .record(duration.as_secs_f64());

        if status_code == 429 {
            warn!(
                method = %self.method,
                duration_ms = duration.as_millis() as u64,
                "Rate limit response (429) recorded"
            );
        }
    }

    /// Record a transport error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();
        counter!(
            "dispatch_requests_total",
            "method" => self.method.clone(),
            "status" => "network_error",
        )
        .increment(1);
        histogram!(
            "dispatch_request_duration_seconds",
            "method" => self.method.clone(),
        )
        .record(duration.as_secs_f64());
    }
}

/// Record a pause forced by the requests-per-second ceiling
pub fn record_rate_limit_pause(wait: Duration) {
    counter!("dispatch_rate_limit_pauses_total").increment(1);
    histogram!("dispatch_rate_limit_wait_seconds").record(wait.as_secs_f64());
}

/// Record a batch in which nothing executed
pub fn record_batch_failure() {
    counter!("dispatch_batch_failures_total").increment(1);
}

/// Record a re-issued job status poll
pub fn record_poll_retry() {
    counter!("job_poll_retries_total").increment(1);
}

/// Record a canonical job transition
pub fn record_job_transition(to: &str) {
    counter!("job_transitions_total", "to" => to.to_string()).increment(1);
}
