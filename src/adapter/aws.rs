//! AWS Elastic Transcoder encoding service
//!
//! Jobs are submitted to pipelines whose input and output buckets are the
//! storage container. Every API call is SigV4 signed; a 429 answer is retried
//! a bounded number of times.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use super::{AdapterError, AdapterResult, EncodeParams, EncodingAdapter, ServiceConfig, StorageAdapter};
use crate::config::{MAX_RATE_LIMIT_RETRIES, RATE_LIMIT_RETRY_DELAY};
use crate::dispatch::{BatchExecutor, RequestDescriptor};
use crate::jobs::{JobStatus, JobStatusSource, OutputSpec, OutputState};
use crate::signing::{pct_encode_path, RequestSigner, Secret, SigningContext, SigningScheme};

pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Regions the service is offered in
pub const AWS_REGIONS: &[&str] = &[
    "us-east-1",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "sa-east-1",
];

const SERVICE_ID: &str = "elastictranscoder";
const JOBS_RESOURCE: &str = "/2012-09-25/jobs";
const PIPELINES_RESOURCE: &str = "/2012-09-25/pipelines";

/// Read-job calls allowed per second
pub const MAX_READ_JOB_REQUESTS_SEC: u32 = 4;

/// Pipeline selector that keeps every matching pipeline
pub const PIPELINE_ALL: &str = "_all_";
/// Pipeline selector that keeps only the first matching pipeline
pub const PIPELINE_FIRST: &str = "_first_";

/// A transcoding pipeline as listed by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub status: String,
    pub input_bucket: String,
    pub output_bucket: String,
}

/// Elastic Transcoder adapter
pub struct ElasticTranscoder {
    key: String,
    secret: Secret,
    region: String,
    container: String,
    selector: String,
    preset_id: Option<String>,
    host: String,
    base_url: String,
    signer: Box<dyn RequestSigner>,
    pipelines: Vec<Pipeline>,
    next_pipeline: AtomicUsize,
    executor: Arc<BatchExecutor>,
}

/// Registry constructor
pub fn build(config: ServiceConfig, executor: Arc<BatchExecutor>) -> AdapterResult<Box<dyn super::EncodingAdapter>> {
    Ok(Box::new(ElasticTranscoder::new(config, executor)?))
}

impl ElasticTranscoder {
    pub fn new(config: ServiceConfig, executor: Arc<BatchExecutor>) -> AdapterResult<Self> {
        let region = config
            .region
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
        if !AWS_REGIONS.contains(&region.as_str()) {
            return Err(AdapterError::Config(format!(
                "unsupported AWS region '{}' (supported: {})",
                region,
                AWS_REGIONS.join(",")
            )));
        }

        let (host, base_url) = match config.base_url {
            Some(base) => {
                let url = reqwest::Url::parse(&base)
                    .map_err(|e| AdapterError::Config(format!("invalid base URL '{}': {}", base, e)))?;
                let host = url
                    .host_str()
                    .ok_or_else(|| AdapterError::Config(format!("base URL '{}' has no host", base)))?;
                let host = match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.to_string(),
                };
                (host, base.trim_end_matches('/').to_string())
            }
            None => {
                let host = format!("{}.{}.amazonaws.com", SERVICE_ID, region);
                let base_url = format!("https://{}", host);
                (host, base_url)
            }
        };

        Ok(Self {
            key: config.key,
            secret: config.secret,
            region,
            container: config.container,
            selector: config
                .param1
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| PIPELINE_ALL.to_string()),
            preset_id: config.param2.filter(|p| !p.is_empty()),
            host,
            base_url,
            signer: SigningScheme::for_service(&format!("aws:{}", SERVICE_ID))?.signer(),
            pipelines: Vec::new(),
            next_pipeline: AtomicUsize::new(0),
            executor,
        })
    }

    /// Pipelines jobs are distributed over
    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    fn signed(&self, method: &str, uri: &str, body: Option<&str>) -> AdapterResult<RequestDescriptor> {
        let timestamp = Utc::now();
        let (date_name, date) = self.signer.date_header(timestamp);
        let mut ctx = SigningContext::new(
            self.key.clone(),
            self.secret.clone(),
            self.region.clone(),
            method,
            uri,
        )
        .header("host", self.host.clone())
        .header(date_name, date.clone())
        .timestamp(timestamp);
        if let Some(body) = body {
            ctx = ctx.payload(body.as_bytes());
        }
        let authorization = self.signer.authorization(&ctx)?;

        let mut request = RequestDescriptor::new(method, format!("{}{}", self.base_url, pct_encode_path(uri)))
            .header(date_name, date)
            .header("authorization", authorization);
        if let Some(body) = body {
            request = request
                .header("content-type", "application/json; charset=UTF-8")
                .body(body.to_string());
        }
        Ok(request)
    }

    /// Invoke one API call, resubmitting after 429 up to the retry limit.
    ///
    /// A 2xx answer yields the parsed JSON body (`Null` when empty).
    async fn invoke_api(&self, method: &str, uri: &str, body: Option<&Value>) -> AdapterResult<Value> {
        let payload = body.map(Value::to_string);
        let mut attempts = 0;
        loop {
            attempts += 1;
            let request = self.signed(method, uri, payload.as_deref())?;
            let result = self.executor.execute(std::slice::from_ref(&request), true).await?;
            let outcome = result.outcomes.into_iter().next().unwrap_or_default();

            if outcome.is_success() {
                debug!(method = %method, uri = %uri, status = outcome.status, "API request completed");
                return Ok(serde_json::from_str(outcome.body_text()).unwrap_or(Value::Null));
            }
            if outcome.status != 429 {
                warn!(method = %method, uri = %uri, status = outcome.status, body = %outcome.body_text(), "API request failed");
                return Err(AdapterError::Status {
                    operation: format!("{} {}", method, uri),
                    status: outcome.status,
                });
            }
            if attempts > MAX_RATE_LIMIT_RETRIES {
                error!(method = %method, uri = %uri, attempts = attempts, "Rate limit retries exhausted");
                return Err(AdapterError::RateLimited { attempts });
            }
            warn!(
                method = %method,
                uri = %uri,
                attempt = attempts,
                "Got API rate throttling response, sleeping before retry"
            );
            sleep(RATE_LIMIT_RETRY_DELAY).await;
        }
    }

    fn job_uri(job_id: &str) -> String {
        format!("{}/{}", JOBS_RESOURCE, job_id)
    }
}

/// Keep the active pipelines reading from and writing to `container`, then
/// apply `selector`.
///
/// `_all_` keeps every match, `_first_` keeps the first, anything else keeps
/// the first pipeline whose id or name equals it.
pub fn select_pipelines(pipelines: &[Pipeline], container: &str, selector: &str) -> Vec<Pipeline> {
    let usable = pipelines.iter().filter(|p| {
        let keep = p.status == "Active" && p.input_bucket == container && p.output_bucket == container;
        if !keep {
            debug!(
                pipeline = %p.id,
                status = %p.status,
                input_bucket = %p.input_bucket,
                output_bucket = %p.output_bucket,
                "Skipping pipeline"
            );
        }
        keep
    });
    match selector {
        PIPELINE_ALL => usable.cloned().collect(),
        PIPELINE_FIRST => usable.take(1).cloned().collect(),
        wanted => usable
            .filter(|p| p.id == wanted || p.name == wanted)
            .take(1)
            .cloned()
            .collect(),
    }
}

/// Provider-neutral state of one job output
pub fn output_state(status: &str) -> OutputState {
    match status {
        "Submitted" => OutputState::Queued,
        "Progressing" | "In Progress" => OutputState::Encoding,
        "Complete" => OutputState::Complete,
        _ => OutputState::Failed,
    }
}

fn job_outputs(response: &Value) -> Option<&Vec<Value>> {
    let job = response.get("Job")?;
    job.get("Status")?;
    job.get("Outputs")?.as_array()
}

/// Canonical status of a read-job response, `None` when the response lacks
/// `Job.Status` or `Job.Outputs`
pub fn status_from_response(response: &Value) -> Option<JobStatus> {
    let states: Vec<OutputState> = job_outputs(response)?
        .iter()
        .map(|o| output_state(o.get("Status").and_then(Value::as_str).unwrap_or_default()))
        .collect();
    Some(JobStatus::from_output_states(&states))
}

/// Stats of a read-job response
pub fn stats_from_response(response: &Value) -> Option<BTreeMap<String, Value>> {
    let outputs = job_outputs(response)?;
    let mut succeeded = 0u64;
    let mut failed = 0u64;
    let mut durations = Vec::new();
    let mut resolutions = Vec::new();

    for output in outputs {
        if output.get("Status").and_then(Value::as_str) != Some("Complete") {
            failed += 1;
            continue;
        }
        succeeded += 1;
        if let Some(duration) = output.get("Duration").and_then(number) {
            durations.push(duration.to_string());
        }
        if let (Some(w), Some(h)) = (
            output.get("Width").and_then(number),
            output.get("Height").and_then(number),
        ) {
            resolutions.push(format!("{}x{}", w as i64, h as i64));
        }
    }

    let mut stats = BTreeMap::new();
    stats.insert("output_success".to_string(), json!(succeeded));
    stats.insert("output_failed".to_string(), json!(failed));
    if !durations.is_empty() {
        stats.insert("output_durations".to_string(), json!(durations.join(",")));
    }
    if !resolutions.is_empty() {
        stats.insert("output_video_resolutions".to_string(), json!(resolutions.join(",")));
    }
    Some(stats)
}

fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Create-job request body
pub fn create_job_body(input: &str, outputs: &[OutputSpec], pipeline_id: &str, preset_id: &str) -> Value {
    let outputs: Vec<Value> = outputs
        .iter()
        .map(|o| json!({ "Key": o.name, "ThumbnailPattern": "", "PresetId": preset_id }))
        .collect();
    json!({
        "Input": { "Key": input },
        "Outputs": outputs,
        "PipelineId": pipeline_id,
    })
}

#[async_trait]
impl JobStatusSource for ElasticTranscoder {
    async fn job_status(&self, job_ids: &[String]) -> Option<HashMap<String, String>> {
        if job_ids.is_empty() {
            warn!("Job status requested without any job ids");
            return None;
        }
        let requests = match job_ids
            .iter()
            .map(|id| self.signed("GET", &Self::job_uri(id), None))
            .collect::<AdapterResult<Vec<_>>>()
        {
            Ok(requests) => requests,
            Err(e) => {
                error!(error = %e, "Unable to sign job status requests");
                return None;
            }
        };

        let limit = match self.executor.config().max_api_requests_sec {
            Some(max) if max <= MAX_READ_JOB_REQUESTS_SEC => max,
            _ => MAX_READ_JOB_REQUESTS_SEC,
        };
        let result = match self.executor.execute_with_limit(&requests, true, Some(limit)).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Unable to invoke job status requests");
                return None;
            }
        };

        let mut statuses = HashMap::with_capacity(job_ids.len());
        for (id, outcome) in job_ids.iter().zip(result.outcomes.iter()) {
            let status = if !outcome.is_success() {
                error!(job_id = %id, status = outcome.status, "Unable to get job status, setting job status to fail");
                JobStatus::Fail
            } else {
                match serde_json::from_str::<Value>(outcome.body_text())
                    .ok()
                    .as_ref()
                    .and_then(status_from_response)
                {
                    Some(status) => status,
                    None => {
                        error!(job_id = %id, "Read job response unusable, setting job status to fail");
                        JobStatus::Fail
                    }
                }
            };
            debug!(job_id = %id, status = %status, "Read job status");
            statuses.insert(id.clone(), status.as_str().to_string());
        }
        Some(statuses)
    }
}

#[async_trait]
impl EncodingAdapter for ElasticTranscoder {
    fn name(&self) -> &'static str {
        "aws"
    }

    async fn init(&mut self) -> AdapterResult<()> {
        let response = self.invoke_api("GET", PIPELINES_RESOURCE, None).await?;
        let listed: Vec<Pipeline> = response
            .get("Pipelines")
            .cloned()
            .map(serde_json::from_value::<Vec<Pipeline>>)
            .transpose()
            .map_err(|e| AdapterError::InvalidResponse(format!("pipelines: {}", e)))?
            .ok_or_else(|| AdapterError::InvalidResponse("response has no Pipelines attribute".to_string()))?;
        debug!(pipelines = listed.len(), "Listed account pipelines");

        let selected = select_pipelines(&listed, &self.container, &self.selector);
        if selected.is_empty() {
            error!(selector = %self.selector, container = %self.container, "No pipeline matches");
            return Err(AdapterError::NoPipeline(format!(
                "no active pipeline for container '{}' matches '{}'",
                self.container, self.selector
            )));
        }
        info!(
            pipelines = selected.len(),
            host = %self.host,
            "Initialization successful"
        );
        self.pipelines = selected;
        Ok(())
    }

    async fn authenticate(&self) -> bool {
        !self.pipelines.is_empty()
    }

    async fn encode(
        &self,
        _storage: &dyn StorageAdapter,
        input: &str,
        outputs: &[OutputSpec],
        _params: &EncodeParams,
    ) -> AdapterResult<String> {
        if self.pipelines.is_empty() {
            return Err(AdapterError::NoPipeline("adapter has not been initialized".to_string()));
        }
        let preset_id = self
            .preset_id
            .as_deref()
            .ok_or_else(|| AdapterError::Config("a preset id (service param2) is required".to_string()))?;

        let index = self.next_pipeline.fetch_add(1, Ordering::Relaxed) % self.pipelines.len();
        let pipeline = &self.pipelines[index];
        let body = create_job_body(input, outputs, &pipeline.id, preset_id);
        debug!(input = %input, pipeline = %pipeline.id, job = %body, "Creating job");

        let response = self.invoke_api("POST", JOBS_RESOURCE, Some(&body)).await?;
        let job_id = response
            .get("Job")
            .and_then(|j| j.get("Id"))
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::InvalidResponse("create job response has no Job.Id".to_string()))?;
        info!(job_id = %job_id, input = %input, pipeline = %pipeline.id, "Encode job started");
        Ok(job_id.to_string())
    }

    async fn job_stats(&self, job_id: &str) -> Option<BTreeMap<String, Value>> {
        match self.invoke_api("GET", &Self::job_uri(job_id), None).await {
            Ok(response) => {
                let stats = stats_from_response(&response);
                if stats.is_none() {
                    warn!(job_id = %job_id, "Read job response did not include Job.Status or Job.Outputs");
                }
                stats
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Unable to read job stats");
                None
            }
        }
    }

    fn same_region(&self, storage: &dyn StorageAdapter) -> bool {
        storage.api() == "s3" && storage.region() == self.region
    }

    fn initial_status_download(&self) -> bool {
        false
    }
}
