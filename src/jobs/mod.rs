//! Canonical job lifecycle and status polling
//!
//! Providers report status in their own vocabularies; adapters translate it
//! into [`JobStatus`] and the [`JobStateMachine`] records the transitions.
//!
//! ```text
//! download → queue → encode → upload → { success | partial | fail }
//! ```
//!
//! History is monotonic. A state already entered, or one ranked below the
//! current state, is ignored when reported again.

pub mod job;
pub mod machine;
pub mod status;

pub use job::{Job, OutputSpec};
pub use machine::{JobStateMachine, JobStatusSource, Observation, PollOutcome};
pub use status::{JobStatus, OutputState, UnknownStatus};

/// Job tracking errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The status source returned nothing after every retry
    #[error("job status unavailable after {attempts} attempts")]
    StatusUnavailable {
        /// Number of times the source was asked
        attempts: u32,
    },

    /// A job with this id is already tracked
    #[error("job {0} is already tracked")]
    DuplicateJob(String),
}
