//! Bounded-concurrency, rate-limited batch HTTP dispatch
//!
//! Every adapter talks to its provider through this module. A batch of
//! [`RequestDescriptor`]s goes in, an index-aligned [`BatchResult`] comes out.
//!
//! # Overview
//!
//! 1. **Planning**: [`executor::plan_dispatch`] splits the batch into waves of
//!    at most `concurrent_requests` launches and inserts one-second pauses so
//!    no more than `max_api_requests_sec` requests start in any one-second window
//! 2. **Throttling**: every launch also passes through the process-wide
//!    [`RateLimiter`], which carries the per-second budget across batches
//! 3. **Execution**: requests within a wave run concurrently; the executor
//!    waits for each wave before starting the next
//! 4. **Results**: status, lowercase headers, transfer metrics and (optionally)
//!    the body are recorded per request, along with batch-wide lowest/highest status
//!
//! # Error Handling
//!
//! A batch fails as a whole only when nothing executed (`highest_status == 0`).
//! Individual 4xx/5xx responses and transport errors are per-request outcomes.

pub mod executor;
pub mod rate_limit;
pub mod request;
pub mod result;
pub mod shared;
pub mod transcript;

pub use executor::{plan_dispatch, BatchExecutor, DispatchStep};
pub use rate_limit::RateLimiter;
pub use request::{RequestBody, RequestDescriptor};
pub use result::{BatchResult, RequestOutcome, TransferMetrics};

/// Dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The batch contained no requests
    #[error("batch contained no requests")]
    EmptyBatch,

    /// None of the requests in the batch produced a status
    #[error("batch execution failed: none of {requests} requests produced a status")]
    NoUsableStatus {
        /// Number of requests in the failed batch
        requests: usize,
    },
}
