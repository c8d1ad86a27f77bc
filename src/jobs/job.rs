//! Job records and status history

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::status::JobStatus;

/// One requested output of an encode job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    /// Object name the output is written to
    pub name: String,
    /// Container format (e.g. `mp4`, `webm`)
    pub format: String,
    /// Audio bitrate in kbps; `None` uses the provider default
    pub audio_bitrate: Option<u32>,
    /// Video bitrate in kbps; `None` uses the provider default
    pub video_bitrate: Option<u32>,
}

/// An encode job tracked from submission to a terminal status
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Provider-assigned id
    pub id: String,
    /// Input object name
    pub input: String,
    /// Input size in bytes
    pub input_size: u64,
    /// Requested outputs
    pub outputs: Vec<OutputSpec>,
    /// Prefix all outputs of this job are written under
    pub output_prefix: String,
    /// Current status
    pub status: JobStatus,
    /// Status history in the order entered; never rewritten
    log: Vec<(JobStatus, DateTime<Utc>)>,
    /// Time spent in each state that has been left
    times: BTreeMap<JobStatus, Duration>,
    /// Submission time
    pub start: DateTime<Utc>,
    /// Time the job reached a terminal status
    pub stop: Option<DateTime<Utc>>,
    /// Provider-reported stats, collected after completion
    pub stats: BTreeMap<String, serde_json::Value>,
    /// Output objects found in storage
    pub output_files: Vec<String>,
    /// Combined size of the output objects in bytes
    pub output_size: Option<u64>,
}

impl Job {
    /// Create a job that entered `initial` at `start`
    pub fn new(
        id: impl Into<String>,
        input: impl Into<String>,
        input_size: u64,
        outputs: Vec<OutputSpec>,
        output_prefix: impl Into<String>,
        initial: JobStatus,
        start: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            input_size,
            outputs,
            output_prefix: output_prefix.into(),
            status: initial,
            log: vec![(initial, start)],
            times: BTreeMap::new(),
            start,
            stop: if initial.is_terminal() { Some(start) } else { None },
            stats: BTreeMap::new(),
            output_files: Vec::new(),
            output_size: None,
        }
    }

    /// Whether the job has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether `status` has ever been entered
    pub fn has_entered(&self, status: JobStatus) -> bool {
        self.log.iter().any(|(s, _)| *s == status)
    }

    /// Time `status` was entered
    pub fn entered_at(&self, status: JobStatus) -> Option<DateTime<Utc>> {
        self.log.iter().find(|(s, _)| *s == status).map(|(_, at)| *at)
    }

    /// Status history in the order entered
    pub fn history(&self) -> &[(JobStatus, DateTime<Utc>)] {
        &self.log
    }

    /// Time spent in `status`, if it has been left
    pub fn time_in(&self, status: JobStatus) -> Option<Duration> {
        self.times.get(&status).copied()
    }

    /// All recorded state durations
    pub fn state_times(&self) -> &BTreeMap<JobStatus, Duration> {
        &self.times
    }

    /// Total time from submission to completion
    pub fn total_time(&self) -> Option<Duration> {
        self.stop
            .map(|stop| (stop - self.start).to_std().unwrap_or_default())
    }

    /// Move to `next` at `at` unless that would revisit or regress.
    ///
    /// Returns false (and changes nothing) when `next` is the current status,
    /// was entered before, ranks below the current status, or the job is
    /// already terminal.
    pub fn advance(&mut self, next: JobStatus, at: DateTime<Utc>) -> bool {
        if self.is_terminal()
            || next == self.status
            || self.has_entered(next)
            || next.rank() < self.status.rank()
        {
            return false;
        }
        self.enter(next, at);
        true
    }

    /// Force the job to `fail` regardless of ordering; no-op if already terminal
    pub fn force_fail(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.enter(JobStatus::Fail, at);
        true
    }

    fn enter(&mut self, next: JobStatus, at: DateTime<Utc>) {
        if let Some(entered) = self.entered_at(self.status) {
            let elapsed = (at - entered).to_std().unwrap_or_default();
            self.times.insert(self.status, elapsed);
        }
        self.log.push((next, at));
        self.status = next;
        if next.is_terminal() {
            self.stop = Some(at);
        }
    }
}
