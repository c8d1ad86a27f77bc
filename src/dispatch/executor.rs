//! Bounded-concurrency batch executor
//!
//! A batch is turned into a launch plan by [`plan_dispatch`] and then run step
//! by step: launches spawn onto a `JoinSet`, waits drain it, pauses sleep for
//! one second so the per-second ceiling holds.

use futures_util::StreamExt;
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::rate_limit::RateLimiter;
use super::request::{RequestBody, RequestDescriptor};
use super::result::{BatchResult, RequestOutcome, TransferMetrics};
use super::shared::{global_http_client, global_rate_limiter};
use super::transcript::render_transcript;
use super::DispatchError;
use crate::config::DispatchConfig;
use crate::metrics::{record_batch_failure, record_rate_limit_pause, RequestMetrics};

/// Length of the pause inserted when the per-second ceiling is reached
const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(1);

/// One step of a launch plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStep {
    /// Start request `i` without waiting for it
    Launch(usize),
    /// Sleep one second and start a new rate window
    Pause,
    /// Block until every launched request has completed
    Wait,
}

/// Build the launch plan for a batch of `requests`.
///
/// Requests are launched in waves of at most `concurrency`; a `Wait` closes
/// each wave, so the plan holds exactly `ceil(requests / concurrency)` waits.
/// With a ceiling of `max_per_second`, a `Pause` precedes every launch that
/// would exceed it within the current one-second window.
pub fn plan_dispatch(
    requests: usize,
    concurrency: usize,
    max_per_second: Option<u32>,
) -> Vec<DispatchStep> {
    let concurrency = concurrency.max(1);
    let max_per_second = max_per_second.filter(|m| *m > 0).map(|m| m as usize);
    let mut steps = Vec::with_capacity(requests + requests / concurrency + 2);
    let mut outstanding = 0;

    for i in 0..requests {
        if let Some(max) = max_per_second {
            if i > 0 && i % max == 0 {
                steps.push(DispatchStep::Pause);
            }
        }
        steps.push(DispatchStep::Launch(i));
        outstanding += 1;
        if outstanding == concurrency {
            steps.push(DispatchStep::Wait);
            outstanding = 0;
        }
    }
    if outstanding > 0 {
        steps.push(DispatchStep::Wait);
    }
    steps
}

/// Executes batches of HTTP requests with bounded concurrency
pub struct BatchExecutor {
    client: Arc<Client>,
    limiter: Arc<RateLimiter>,
    config: DispatchConfig,
}

impl BatchExecutor {
    /// Create an executor backed by the process-wide client and rate limiter
    pub fn new(config: DispatchConfig) -> Self {
        Self::with_resources(config, global_http_client(), global_rate_limiter())
    }

    /// Create an executor with an explicit client and rate limiter
    pub fn with_resources(
        config: DispatchConfig,
        client: Arc<Client>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            limiter,
            config,
        }
    }

    /// Dispatch configuration in effect
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Execute a batch under the configured requests-per-second ceiling.
    ///
    /// Results are index-aligned with `requests`. Fails only when the batch is
    /// empty or no request produced a status.
    pub async fn execute(
        &self,
        requests: &[RequestDescriptor],
        capture_body: bool,
    ) -> Result<BatchResult, DispatchError> {
        self.execute_with_limit(requests, capture_body, self.config.max_api_requests_sec)
            .await
    }

    /// Execute a batch under an explicit requests-per-second ceiling
    pub async fn execute_with_limit(
        &self,
        requests: &[RequestDescriptor],
        capture_body: bool,
        max_per_second: Option<u32>,
    ) -> Result<BatchResult, DispatchError> {
        if requests.is_empty() {
            return Err(DispatchError::EmptyBatch);
        }

        let span = info_span!("batch", requests = requests.len());
        self.run_plan(requests, capture_body, max_per_second)
            .instrument(span)
            .await
    }

    async fn run_plan(
        &self,
        requests: &[RequestDescriptor],
        capture_body: bool,
        max_per_second: Option<u32>,
    ) -> Result<BatchResult, DispatchError> {
        let concurrency = self.config.concurrent_requests;
        let plan = plan_dispatch(requests.len(), concurrency, max_per_second);
        debug!(
            requests = requests.len(),
            concurrency = concurrency,
            max_per_second = ?max_per_second,
            "Executing batch"
        );

        let mut slots: Vec<Option<RequestOutcome>> = vec![None; requests.len()];
        let mut in_flight = JoinSet::new();

        for step in plan {
            match step {
                DispatchStep::Launch(i) => {
                    self.limiter.throttle(max_per_second).await;
                    let request = requests[i].clone();
                    if self.config.debug {
                        debug!(index = i, method = %request.method, url = %request.url, "Launching request");
                    }
                    let client = self.client.clone();
                    in_flight.spawn(async move { (i, send_request(&client, &request, capture_body).await) });
                }
                DispatchStep::Pause => {
                    info!(
                        requests = requests.len(),
                        max_per_second = ?max_per_second,
                        "Max API requests per second reached, pausing 1 second"
                    );
                    record_rate_limit_pause(RATE_LIMIT_PAUSE);
                    sleep(RATE_LIMIT_PAUSE).await;
                    self.limiter.reset_window();
                }
                DispatchStep::Wait => {
                    while let Some(joined) = in_flight.join_next().await {
                        match joined {
                            Ok((i, outcome)) => slots[i] = Some(outcome),
                            Err(e) => warn!(error = %e, "Request task failed to complete"),
                        }
                    }
                }
            }
        }

        let outcomes = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| RequestOutcome::unexecuted("request task did not complete")))
            .collect::<Vec<_>>();
        let result = BatchResult::from_outcomes(outcomes);

        debug!(
            lowest_status = result.lowest_status,
            highest_status = result.highest_status,
            "Results processed"
        );

        if result.is_total_failure() {
            record_batch_failure();
            error!(requests = requests.len(), "Batch execution failed");
            return Err(DispatchError::NoUsableStatus {
                requests: requests.len(),
            });
        }

        if self.config.debug {
            for (request, outcome) in requests.iter().zip(&result.outcomes) {
                debug!(
                    url = %request.url,
                    status = outcome.status,
                    transcript = %render_transcript(outcome),
                    "Request complete"
                );
            }
        }

        Ok(result)
    }
}

/// Send one request and record its outcome; never fails
async fn send_request(
    client: &Client,
    request: &RequestDescriptor,
    capture_body: bool,
) -> RequestOutcome {
    let timer = RequestMetrics::start(request.method.clone());
    match try_send(client, request, capture_body, &timer).await {
        Ok(outcome) => {
            timer.record_complete(outcome.status);
            outcome
        }
        Err(message) => {
            timer.record_network_error();
            debug!(url = %request.url, error = %message, "Request failed without a response");
            let mut outcome = RequestOutcome::unexecuted(message);
            outcome.metrics = TransferMetrics::new(0, timer.elapsed(), request.url.clone());
            outcome
        }
    }
}

async fn try_send(
    client: &Client,
    request: &RequestDescriptor,
    capture_body: bool,
    timer: &RequestMetrics,
) -> Result<RequestOutcome, String> {
    let method = Method::from_bytes(request.method.as_bytes())
        .map_err(|e| format!("invalid method {}: {}", request.method, e))?;
    let mut builder = client.request(method, &request.url);

    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(range) = &request.range {
        builder = builder.header(reqwest::header::RANGE, format!("bytes={range}"));
    }
    match &request.body {
        Some(RequestBody::Bytes(bytes)) => builder = builder.body(bytes.clone()),
        Some(RequestBody::File(path)) => {
            let data = tokio::fs::read(path)
                .await
                .map_err(|e| format!("failed to read body {}: {}", path.display(), e))?;
            builder = builder.body(data);
        }
        None => {}
    }
    if !request.form.is_empty() {
        let form = request
            .form
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            });
        builder = builder.multipart(form);
    }

    let response = builder.send().await.map_err(|e| e.to_string())?;
    let status = response.status().as_u16();
    let effective_url = response.url().to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_lowercase(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let mut bytes_transferred = 0u64;
    let mut body = capture_body.then(Vec::new);
    let mut error = None;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                bytes_transferred += chunk.len() as u64;
                if let Some(buffer) = body.as_mut() {
                    buffer.extend_from_slice(&chunk);
                }
            }
            Err(e) => {
                error = Some(format!("body transfer interrupted: {e}"));
                break;
            }
        }
    }

    Ok(RequestOutcome {
        status,
        headers,
        metrics: TransferMetrics::new(bytes_transferred, timer.elapsed(), effective_url),
        body: body.map(|b| String::from_utf8_lossy(&b).into_owned()),
        error,
    })
}
