//! Per-request outcomes and batch summaries

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Transfer metrics recorded for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferMetrics {
    /// Response bytes received
    pub bytes_transferred: u64,
    /// Wall time from send to last body byte
    pub elapsed: Duration,
    /// Transfer rate in bytes per second
    pub rate_bytes_per_sec: f64,
    /// URL that ultimately answered (after redirects)
    pub effective_url: String,
}

impl TransferMetrics {
    /// Build metrics, deriving the rate from bytes and elapsed time
    pub fn new(bytes_transferred: u64, elapsed: Duration, effective_url: impl Into<String>) -> Self {
        let secs = elapsed.as_secs_f64();
        let rate_bytes_per_sec = if secs > 0.0 {
            bytes_transferred as f64 / secs
        } else {
            0.0
        };
        Self {
            bytes_transferred,
            elapsed,
            rate_bytes_per_sec,
            effective_url: effective_url.into(),
        }
    }
}

/// Outcome of a single request within a batch.
///
/// `status == 0` means the request never produced an HTTP response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestOutcome {
    /// HTTP status code, 0 if unexecuted
    pub status: u16,
    /// Response headers keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// Transfer metrics
    pub metrics: TransferMetrics,
    /// Response body, when the batch captured bodies
    pub body: Option<String>,
    /// Transport error message, when the request failed before a response
    pub error: Option<String>,
}

impl RequestOutcome {
    /// Outcome for a request that failed before any response arrived
    pub fn unexecuted(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Whether the request produced a 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a response header by name, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Body text, empty when not captured
    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// Index-aligned results of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    /// One outcome per input request, in input order
    pub outcomes: Vec<RequestOutcome>,
    /// Lowest non-zero status in the batch (0 if none)
    pub lowest_status: u16,
    /// Highest status in the batch (0 signals total failure)
    pub highest_status: u16,
}

impl BatchResult {
    /// Assemble a result from ordered outcomes, computing the status summaries
    pub fn from_outcomes(outcomes: Vec<RequestOutcome>) -> Self {
        let mut lowest_status = 0;
        let mut highest_status = 0;
        for outcome in outcomes.iter().filter(|o| o.status != 0) {
            if lowest_status == 0 || outcome.status < lowest_status {
                lowest_status = outcome.status;
            }
            highest_status = highest_status.max(outcome.status);
        }
        Self {
            outcomes,
            lowest_status,
            highest_status,
        }
    }

    /// True when no request produced a status
    pub fn is_total_failure(&self) -> bool {
        self.highest_status == 0
    }

    /// Number of outcomes
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch had no outcomes
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Status of request `index` (0 if out of range or unexecuted)
    pub fn status(&self, index: usize) -> u16 {
        self.outcomes.get(index).map(|o| o.status).unwrap_or(0)
    }

    /// Outcome of request `index`
    pub fn outcome(&self, index: usize) -> Option<&RequestOutcome> {
        self.outcomes.get(index)
    }

    /// First outcome, for single-request batches
    pub fn first(&self) -> Option<&RequestOutcome> {
        self.outcomes.first()
    }
}
