//! Provider adapters
//!
//! An encoding adapter submits jobs and reports their status; a storage
//! adapter resolves inputs, sizes outputs and deletes them afterwards. Both
//! sign their own requests and run them through a shared [`BatchExecutor`].

pub mod aws;
pub mod gcs;
pub mod registry;
pub mod s3;
pub mod storage;

pub use registry::{encoding_adapter, storage_adapter, ENCODING_SERVICES, STORAGE_SERVICES};
pub use storage::HmacObjectStore;

use async_trait::async_trait;
use regex::RegexBuilder;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dispatch::{BatchExecutor, DispatchError};
use crate::jobs::{JobStatusSource, OutputSpec};
use crate::signing::{Secret, SigningError};

/// Adapter errors
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The batch behind an API call could not be executed
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A request could not be signed
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// The provider kept answering 429
    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// The provider answered with an unexpected status
    #[error("{operation} failed with status {status}")]
    Status { operation: String, status: u16 },

    /// The provider answered 2xx with a body we cannot use
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// No pipeline matched the selector
    #[error("no usable pipeline: {0}")]
    NoPipeline(String),

    /// Service name not in the registry
    #[error("unknown {kind} service '{name}' (supported: {supported})")]
    UnknownService {
        kind: &'static str,
        name: String,
        supported: String,
    },

    /// Bad adapter configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Credentials and location of an encoding service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub key: String,
    pub secret: Secret,
    /// Service region; `None` uses the provider default
    pub region: Option<String>,
    /// Storage container the service reads inputs from and writes outputs to
    pub container: String,
    /// Provider-specific selector (AWS: pipeline id, name, `_all_` or `_first_`)
    pub param1: Option<String>,
    /// Provider-specific value (AWS: preset id applied to every output)
    pub param2: Option<String>,
    /// Base URL replacing the provider endpoint (`http://host:port`)
    pub base_url: Option<String>,
}

/// Credentials and location of an object store
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub key: String,
    pub secret: Secret,
    pub container: String,
    /// Storage region; `None` uses the provider default
    pub region: Option<String>,
    /// Base URL replacing the provider endpoint; switches to path-style URLs
    pub base_url: Option<String>,
}

/// Parameters shared by every output of a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeParams {
    /// Input container format (e.g. `mp4`)
    pub input_format: String,
    /// Output container format
    pub format: String,
    /// Whether the outputs carry no video
    pub audio_only: bool,
}

/// An encoding service
#[async_trait]
pub trait EncodingAdapter: JobStatusSource {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Prepare the adapter before first use (discover pipelines, etc.)
    async fn init(&mut self) -> AdapterResult<()>;

    /// Whether the configured credentials are usable
    async fn authenticate(&self) -> bool;

    /// Submit one job converting `input` into `outputs`; returns the job id
    async fn encode(
        &self,
        storage: &dyn StorageAdapter,
        input: &str,
        outputs: &[OutputSpec],
        params: &EncodeParams,
    ) -> AdapterResult<String>;

    /// Stats reported for a completed job
    async fn job_stats(&self, job_id: &str) -> Option<BTreeMap<String, serde_json::Value>>;

    /// Whether `storage` lives in the same region as this service
    fn same_region(&self, storage: &dyn StorageAdapter) -> bool;

    /// Whether jobs start in `download` rather than `queue`
    fn initial_status_download(&self) -> bool {
        true
    }

    /// Remove service-side artifacts created during the run
    async fn cleanup_service(&self) -> AdapterResult<bool> {
        Ok(true)
    }
}

/// An object store holding inputs and outputs
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// API identifier (`s3`, `gcs`)
    fn api(&self) -> &'static str;

    /// Region the container lives in
    fn region(&self) -> &str;

    /// Configured container
    fn container(&self) -> &str;

    /// Whether the configured credentials are usable
    async fn authenticate(&self) -> bool;

    async fn container_exists(&self, container: &str) -> AdapterResult<bool>;

    async fn delete_object(&self, container: &str, object: &str) -> AdapterResult<bool>;

    /// Size in bytes, `None` when the object does not exist
    async fn object_size(&self, container: &str, object: &str) -> AdapterResult<Option<u64>>;

    /// Sizes of several objects, index-aligned with `objects`
    async fn object_sizes(&self, container: &str, objects: &[String]) -> AdapterResult<Vec<Option<u64>>> {
        let mut sizes = Vec::with_capacity(objects.len());
        for object in objects {
            sizes.push(self.object_size(container, object).await?);
        }
        Ok(sizes)
    }

    /// Object names under `prefix`
    async fn list_container(&self, container: &str, prefix: Option<&str>) -> AdapterResult<Vec<String>>;

    async fn object_exists(&self, container: &str, object: &str) -> AdapterResult<bool>;

    /// Public URL of `object` in the configured container
    fn object_url(&self, object: &str) -> String;
}

/// Constructor stored in the registry for encoding services
pub type EncodingCtor = fn(ServiceConfig, Arc<BatchExecutor>) -> AdapterResult<Box<dyn EncodingAdapter>>;

/// Constructor stored in the registry for storage services
pub type StorageCtor = fn(StorageConfig, Arc<BatchExecutor>) -> AdapterResult<Box<dyn StorageAdapter>>;

/// Objects in the configured container matching `filter`.
///
/// `*` in the filter matches any run of characters and matching ignores
/// case. Only the directory part of the filter is sent as the listing
/// prefix. Directory placeholders (names ending in `/`) are dropped.
pub async fn container_objects(
    storage: &dyn StorageAdapter,
    filter: Option<&str>,
) -> AdapterResult<Vec<String>> {
    let filter = filter.filter(|f| !f.is_empty());
    let prefix = filter.and_then(listing_prefix);
    let objects = storage.list_container(storage.container(), prefix.as_deref()).await?;

    let matcher = match filter {
        Some(filter) => Some(
            RegexBuilder::new(&filter_pattern(filter))
                .case_insensitive(true)
                .build()
                .map_err(|e| AdapterError::Config(format!("invalid object filter '{}': {}", filter, e)))?,
        ),
        None => None,
    };

    let matched: Vec<String> = objects
        .into_iter()
        .filter(|name| !name.ends_with('/'))
        .filter(|name| matcher.as_ref().map_or(true, |re| re.is_match(name)))
        .collect();

    if matched.is_empty() {
        warn!(container = storage.container(), filter = ?filter, "No objects matched filter");
    } else {
        debug!(container = storage.container(), filter = ?filter, objects = matched.len(), "Resolved objects");
    }
    Ok(matched)
}

fn listing_prefix(filter: &str) -> Option<String> {
    let (dir, _) = filter.rsplit_once('/')?;
    let prefix = dir.trim_start_matches('/');
    if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    }
}

fn filter_pattern(filter: &str) -> String {
    let body = filter
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{}$", body)
}
