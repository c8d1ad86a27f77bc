//! Job status polling state machine

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::job::Job;
use super::status::JobStatus;
use super::JobError;
use crate::config::MAX_POLL_RETRIES;
use crate::metrics::{record_job_transition, record_poll_retry};

/// Anything that can report canonical status strings for a set of jobs
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Status per job id, or `None` when no status could be obtained at all
    async fn job_status(&self, job_ids: &[String]) -> Option<HashMap<String, String>>;
}

/// Result of one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every job is terminal
    Complete,
    /// Some jobs are still running
    Pending {
        /// Jobs not yet terminal
        remaining: usize,
    },
}

/// Effect of one reported status on one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The job moved to a new state
    Transitioned { from: JobStatus, to: JobStatus },
    /// Already in or past the reported state
    Unchanged,
    /// The provider broke the contract; the job was forced to `fail`
    ForcedFail,
}

/// Drives every job of one adapter from submission to a terminal status
#[derive(Debug)]
pub struct JobStateMachine {
    jobs: Vec<Job>,
    max_retries: u32,
}

impl Default for JobStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStateMachine {
    pub fn new() -> Self {
        Self::with_max_retries(MAX_POLL_RETRIES)
    }

    /// Machine that re-issues an empty poll at most `max_retries` times
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            jobs: Vec::new(),
            max_retries,
        }
    }

    /// Track a newly submitted job
    pub fn add_job(&mut self, job: Job) -> Result<(), JobError> {
        if self.jobs.iter().any(|j| j.id == job.id) {
            return Err(JobError::DuplicateJob(job.id));
        }
        debug!(job_id = %job.id, status = %job.status, "Tracking job");
        self.jobs.push(job);
        Ok(())
    }

    /// Jobs in submission order
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Mutable access for post-completion bookkeeping (stats, output sizes)
    pub fn jobs_mut(&mut self) -> &mut [Job] {
        &mut self.jobs
    }

    /// Look up a job by id
    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Hand the jobs back
    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }

    /// Ids of jobs not yet terminal
    pub fn pending_ids(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| !j.is_terminal())
            .map(|j| j.id.clone())
            .collect()
    }

    /// Whether every job is terminal
    pub fn is_complete(&self) -> bool {
        self.jobs.iter().all(Job::is_terminal)
    }

    fn outcome(&self) -> PollOutcome {
        let remaining = self.jobs.iter().filter(|j| !j.is_terminal()).count();
        if remaining == 0 {
            PollOutcome::Complete
        } else {
            PollOutcome::Pending { remaining }
        }
    }

    /// Poll `source` once for every pending job.
    ///
    /// An empty response is retried up to the retry ceiling; once retries
    /// are exhausted every pending job is forced to `fail` and
    /// [`JobError::StatusUnavailable`] is returned.
    pub async fn poll<S>(&mut self, source: &S) -> Result<PollOutcome, JobError>
    where
        S: JobStatusSource + ?Sized,
    {
        let pending = self.pending_ids();
        if pending.is_empty() {
            return Ok(PollOutcome::Complete);
        }

        let span = info_span!("poll", jobs = pending.len());
        async {
            info!(jobs = ?pending, "Checking on status of jobs");
            let mut attempt = 0;
            loop {
                if let Some(statuses) = source.job_status(&pending).await {
                    self.apply(&pending, &statuses);
                    return Ok(self.outcome());
                }
                if attempt >= self.max_retries {
                    break;
                }
                attempt += 1;
                record_poll_retry();
                warn!(attempt = attempt, max = self.max_retries, "Failed to get job status, retrying");
            }

            let attempts = attempt + 1;
            error!(attempts = attempts, "Job status unavailable, failing pending jobs");
            let now = Utc::now();
            for job in self.jobs.iter_mut().filter(|j| !j.is_terminal()) {
                job.force_fail(now);
                record_job_transition(JobStatus::Fail.as_str());
            }
            Err(JobError::StatusUnavailable { attempts })
        }
        .instrument(span)
        .await
    }

    /// Apply one status response to the jobs in `pending`
    pub fn apply(&mut self, pending: &[String], statuses: &HashMap<String, String>) {
        for job_id in pending {
            self.observe(job_id, statuses.get(job_id).map(String::as_str));
        }
    }

    /// Apply a single reported status (`None` when the provider omitted the job)
    pub fn observe(&mut self, job_id: &str, reported: Option<&str>) -> Observation {
        let Some(job) = self.jobs.iter_mut().find(|j| j.id == job_id) else {
            warn!(job_id = %job_id, "Status reported for unknown job");
            return Observation::Unchanged;
        };
        let now = Utc::now();

        let next = match reported.map(str::parse::<JobStatus>) {
            Some(Ok(next)) => next,
            Some(Err(e)) => {
                error!(job_id = %job_id, error = %e, "Encoding service provided invalid status, setting job to fail");
                return force_fail(job, now);
            }
            None => {
                error!(job_id = %job_id, "Encoding service failed to return status, setting job to fail");
                return force_fail(job, now);
            }
        };

        let from = job.status;
        if job.advance(next, now) {
            record_job_transition(next.as_str());
            info!(
                job_id = %job_id,
                from = %from,
                to = %next,
                secs = job.time_in(from).map(|d| d.as_secs_f64()).unwrap_or_default(),
                "Job status changed"
            );
            Observation::Transitioned { from, to: next }
        } else {
            debug!(job_id = %job_id, status = %job.status, reported = %next, "Job status has not changed");
            Observation::Unchanged
        }
    }
}

fn force_fail(job: &mut Job, now: chrono::DateTime<Utc>) -> Observation {
    if job.force_fail(now) {
        record_job_transition(JobStatus::Fail.as_str());
        Observation::ForcedFail
    } else {
        Observation::Unchanged
    }
}
