//! Benchmark orchestration
//!
//! A run resolves its input objects, submits one job per input, polls the
//! encoding service until every job is terminal, then sizes the outputs and
//! records them for cleanup.
//!
//! ```text
//! prepare → start → wait → set_output_sizes → report
//! ```

pub mod outputs;
pub mod report;

pub use outputs::{output_specs, Bitrates, InputObject};
pub use report::RunReport;

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::adapter::{container_objects, AdapterError, EncodeParams, EncodingAdapter, StorageAdapter};
use crate::config::{bytes_to_mb, POLL_INTERVAL, SLEEP_BEFORE_SET_SIZE};
use crate::jobs::{Job, JobError, JobStateMachine, JobStatus, PollOutcome};

/// Harness errors
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The input filter matched nothing
    #[error("no input objects match '{0}'")]
    NoInputs(String),

    /// An input's size could not be determined
    #[error("unable to determine size of object {0}")]
    UnknownSize(String),

    /// Credentials were rejected
    #[error("{0} authentication failed")]
    Authentication(&'static str),

    /// Not a single job could be submitted
    #[error("no encoding job could be started")]
    NoJobsStarted,
}

/// What a run encodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Input object filter (`*` wildcards)
    pub input: String,
    /// Output format, or `_default_`
    pub format: String,
    pub bitrates: Bitrates,
}

/// Drives one benchmark run
pub struct Harness {
    encoder: Box<dyn EncodingAdapter>,
    storage: Box<dyn StorageAdapter>,
    settings: RunSettings,
    cleanup_file: PathBuf,
    machine: JobStateMachine,
    inputs: Vec<InputObject>,
    poll_interval: Duration,
    settle_delay: Duration,
}

impl Harness {
    pub fn new(
        encoder: Box<dyn EncodingAdapter>,
        storage: Box<dyn StorageAdapter>,
        settings: RunSettings,
        cleanup_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            encoder,
            storage,
            settings,
            cleanup_file: cleanup_file.into(),
            machine: JobStateMachine::new(),
            inputs: Vec::new(),
            poll_interval: POLL_INTERVAL,
            settle_delay: SLEEP_BEFORE_SET_SIZE,
        }
    }

    /// Override the pause between polls and the settling time before sizing
    pub fn with_timing(mut self, poll_interval: Duration, settle_delay: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.settle_delay = settle_delay;
        self
    }

    /// Jobs tracked so far
    pub fn jobs(&self) -> &[Job] {
        self.machine.jobs()
    }

    /// Resolved inputs
    pub fn inputs(&self) -> &[InputObject] {
        &self.inputs
    }

    /// Authenticate both services, initialize the encoder and resolve inputs.
    pub async fn prepare(&mut self) -> Result<(), HarnessError> {
        if !self.storage.authenticate().await {
            return Err(HarnessError::Authentication("storage"));
        }
        self.encoder.init().await?;
        if !self.encoder.authenticate().await {
            return Err(HarnessError::Authentication("encoding"));
        }

        let names = container_objects(self.storage.as_ref(), Some(self.settings.input.as_str())).await?;
        if names.is_empty() {
            return Err(HarnessError::NoInputs(self.settings.input.clone()));
        }
        let sizes = self.storage.object_sizes(self.storage.container(), &names).await?;

        let mut inputs = Vec::with_capacity(names.len());
        for (name, size) in names.into_iter().zip(sizes) {
            let size = match size {
                Some(size) if size > 0 => size,
                _ => return Err(HarnessError::UnknownSize(name)),
            };
            let input = InputObject::new(name, size, &self.settings.format);
            info!(
                object = %input.name,
                input_format = %input.input_format,
                format = %input.format,
                size_mb = bytes_to_mb(input.size),
                "Added object to encoding job queue"
            );
            inputs.push(input);
        }
        info!(
            service = self.encoder.name(),
            objects = inputs.len(),
            total_mb = bytes_to_mb(inputs.iter().map(|i| i.size).sum()),
            "Inputs resolved"
        );
        self.inputs = inputs;
        Ok(())
    }

    /// Submit one job per input; returns the number of jobs started.
    ///
    /// A failed submission is logged and skipped. Starting nothing at all is
    /// an error.
    pub async fn start(&mut self) -> Result<usize, HarnessError> {
        let initial = if self.encoder.initial_status_download() {
            JobStatus::Download
        } else {
            JobStatus::Queue
        };

        for input in &self.inputs {
            let prefix = outputs::output_prefix();
            let specs = output_specs(&prefix, input, self.settings.bitrates);
            let params = EncodeParams {
                input_format: input.input_format.clone(),
                format: input.format.clone(),
                audio_only: input.audio_only,
            };
            debug!(object = %input.name, outputs = ?specs, "Initiating encoding");

            match self
                .encoder
                .encode(self.storage.as_ref(), &input.name, &specs, &params)
                .await
            {
                Ok(job_id) => {
                    info!(job_id = %job_id, object = %input.name, status = %initial, "Encoding job started");
                    let job = Job::new(job_id, input.name.clone(), input.size, specs, prefix, initial, Utc::now());
                    self.machine.add_job(job)?;
                }
                Err(e) => error!(object = %input.name, error = %e, "Unable to start encoding job"),
            }
        }

        let started = self.machine.jobs().len();
        if started == 0 {
            return Err(HarnessError::NoJobsStarted);
        }
        Ok(started)
    }

    /// Poll until every job is terminal
    pub async fn wait(&mut self) -> Result<(), HarnessError> {
        loop {
            match self.machine.poll(self.encoder.as_ref()).await? {
                PollOutcome::Complete => return Ok(()),
                PollOutcome::Pending { remaining } => {
                    debug!(remaining = remaining, "Jobs still running");
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Collect job stats, size every output and record it in the cleanup file
    pub async fn set_output_sizes(&mut self) -> Result<(), HarnessError> {
        if self.machine.jobs().is_empty() {
            return Ok(());
        }
        info!(secs = self.settle_delay.as_secs(), "Setting output sizes after settling delay");
        sleep(self.settle_delay).await;

        let container = self.storage.container().to_string();
        let mut cleanup = String::new();
        let mut updates = Vec::with_capacity(self.machine.jobs().len());

        for job in self.machine.jobs() {
            let stats = self.encoder.job_stats(&job.id).await.unwrap_or_default();
            let filter = format!("{}/*", job.output_prefix);
            let objects = match container_objects(self.storage.as_ref(), Some(filter.as_str())).await {
                Ok(objects) => objects,
                Err(e) => {
                    warn!(job_id = %job.id, prefix = %job.output_prefix, error = %e, "Unable to list outputs");
                    Vec::new()
                }
            };

            let mut total = Some(0u64);
            if objects.is_empty() {
                warn!(job_id = %job.id, "No output objects exist for job");
            } else {
                for object in &objects {
                    cleanup.push_str(object);
                    cleanup.push('\n');
                }
                match self.storage.object_sizes(&container, &objects).await {
                    Ok(sizes) => {
                        let mut sum = 0u64;
                        for (object, size) in objects.iter().zip(sizes) {
                            match size {
                                Some(size) => sum += size,
                                None => warn!(object = %object, "Unable to get output size"),
                            }
                        }
                        info!(
                            job_id = %job.id,
                            outputs = objects.len(),
                            size_mb = bytes_to_mb(sum),
                            "Set total output size"
                        );
                        total = Some(sum);
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Unable to size outputs");
                        total = None;
                    }
                }
            }
            updates.push((stats, objects, total));
        }

        for (job, (stats, objects, total)) in self.machine.jobs_mut().iter_mut().zip(updates) {
            job.stats = stats;
            job.output_files = objects;
            job.output_size = total;
        }

        tokio::fs::write(&self.cleanup_file, cleanup).await?;
        debug!(path = %self.cleanup_file.display(), "Wrote cleanup file");
        Ok(())
    }

    /// Current results
    pub fn report(&self) -> RunReport {
        let same_region = self.encoder.same_region(self.storage.as_ref());
        RunReport::new(self.machine.jobs().to_vec(), same_region)
    }

    /// Run the whole benchmark
    pub async fn run(&mut self) -> Result<RunReport, HarnessError> {
        let span = info_span!("run", service = self.encoder.name(), storage = self.storage.api());
        async {
            self.prepare().await?;
            let started = self.start().await?;
            info!(jobs = started, "Encoding jobs started, polling for completion");
            self.wait().await?;
            info!("Encoding jobs are complete, getting output sizes");
            self.set_output_sizes().await?;
            Ok::<_, HarnessError>(self.report())
        }
        .instrument(span)
        .await
    }
}

/// Delete every object listed in `cleanup_file`, then clean up the service.
///
/// Returns whether everything was removed. A missing cleanup file counts as
/// a failure.
pub async fn cleanup(
    encoder: &dyn EncodingAdapter,
    storage: &dyn StorageAdapter,
    cleanup_file: &Path,
) -> Result<bool, HarnessError> {
    let mut success = true;

    match tokio::fs::read_to_string(cleanup_file).await {
        Ok(contents) => {
            info!(path = %cleanup_file.display(), "Starting cleanup");
            let mut deleted = 0;
            for object in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
                match storage.delete_object(storage.container(), object).await {
                    Ok(true) => deleted += 1,
                    Ok(false) => {
                        error!(object = %object, "Unable to delete object");
                        success = false;
                    }
                    Err(e) => {
                        error!(object = %object, error = %e, "Unable to delete object");
                        success = false;
                    }
                }
            }
            info!(deleted = deleted, "Object cleanup complete");
        }
        Err(e) => {
            error!(path = %cleanup_file.display(), error = %e, "Unable to read cleanup file");
            success = false;
        }
    }

    match encoder.cleanup_service().await {
        Ok(true) => {}
        Ok(false) => {
            error!("Service cleanup failed");
            success = false;
        }
        Err(e) => {
            error!(error = %e, "Service cleanup failed");
            success = false;
        }
    }
    Ok(success)
}
