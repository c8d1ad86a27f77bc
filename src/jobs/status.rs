//! Canonical job status vocabulary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical job lifecycle state
///
/// Declaration order is the order of forward progress; the three terminal
/// states share the last rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Input is being fetched by the provider
    Download,
    /// Waiting for an encoder
    Queue,
    /// Encoding in progress
    Encode,
    /// Outputs are being written to storage
    Upload,
    /// Every output succeeded
    Success,
    /// Every output failed, or the job was abandoned
    Fail,
    /// Some outputs succeeded and some failed
    Partial,
}

impl JobStatus {
    /// All states in wire order
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Download,
        JobStatus::Queue,
        JobStatus::Encode,
        JobStatus::Upload,
        JobStatus::Success,
        JobStatus::Fail,
        JobStatus::Partial,
    ];

    /// Wire-level name
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Download => "download",
            JobStatus::Queue => "queue",
            JobStatus::Encode => "encode",
            JobStatus::Upload => "upload",
            JobStatus::Success => "success",
            JobStatus::Fail => "fail",
            JobStatus::Partial => "partial",
        }
    }

    /// Whether the state ends the job
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Fail | JobStatus::Partial)
    }

    /// Position in the forward progression
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Download => 0,
            JobStatus::Queue => 1,
            JobStatus::Encode => 2,
            JobStatus::Upload => 3,
            JobStatus::Success | JobStatus::Fail | JobStatus::Partial => 4,
        }
    }

    /// Terminal status for a job with the given output tallies
    ///
    /// `partial` needs at least one of each; no successes at all is `fail`.
    pub fn from_output_counts(succeeded: usize, failed: usize) -> JobStatus {
        match (succeeded, failed) {
            (0, _) => JobStatus::Fail,
            (_, 0) => JobStatus::Success,
            _ => JobStatus::Partial,
        }
    }

    /// Job status derived from the state of each of its outputs
    ///
    /// Any encoding output keeps the job in `encode`; otherwise any queued
    /// output keeps it in `queue`; otherwise the terminal tallies decide.
    pub fn from_output_states(outputs: &[OutputState]) -> JobStatus {
        let count = |state: OutputState| outputs.iter().filter(|o| **o == state).count();
        if count(OutputState::Encoding) > 0 {
            JobStatus::Encode
        } else if count(OutputState::Queued) > 0 {
            JobStatus::Queue
        } else {
            JobStatus::from_output_counts(count(OutputState::Complete), count(OutputState::Failed))
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for a status outside the canonical vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Provider-neutral state of a single output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputState {
    Queued,
    Encoding,
    Complete,
    Failed,
}
