//! Command line and environment parsing

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use super::{CleanupArgs, CliError, RunArgs};
use crate::adapter::{encoding_adapter, storage_adapter, EncodingAdapter, ServiceConfig, StorageAdapter, StorageConfig};
use crate::config::{DispatchConfig, DEFAULT_CONCURRENT_REQUESTS};
use crate::dispatch::BatchExecutor;
use crate::signing::Secret;

/// Encoding service benchmark harness
#[derive(Parser, Debug)]
#[command(name = "encoding-bench")]
#[command(about = "Benchmark cloud transcoding services against cloud object storage", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format for results (human or json)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Debug logging, including a transcript of every request
    #[arg(long, global = true, env = "BM_PARAM_DEBUG")]
    pub debug: bool,

    /// Requests launched together in one wave (default: 8, max: 32)
    #[arg(long, global = true, env = "BM_PARAM_CONCURRENT_REQUESTS", default_value_t = DEFAULT_CONCURRENT_REQUESTS)]
    pub concurrent_requests: usize,

    /// Ceiling on API requests per second; below 1 is unlimited
    #[arg(long, global = true, env = "BM_PARAM_MAX_API_REQUESTS_SEC", allow_negative_numbers = true)]
    pub max_api_requests_sec: Option<i64>,

    /// Directory holding the cleanup file
    #[arg(long, global = true, env = "BM_RUN_DIR", default_value = ".")]
    pub run_dir: PathBuf,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true, env = "BM_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl Cli {
    /// Dispatch settings derived from the global flags
    pub fn dispatch_config(&self) -> DispatchConfig {
        let max_api_requests_sec = self
            .max_api_requests_sec
            .and_then(|v| u32::try_from(v).ok());
        DispatchConfig::new(
            self.debug,
            self.concurrent_requests,
            max_api_requests_sec,
            self.run_dir.clone(),
        )
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode matching inputs and print the results
    Run(RunArgs),

    /// Delete the outputs recorded by a previous run
    Cleanup(CleanupArgs),
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// `[results]` block of key=value lines
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

/// Encoding service and storage credentials shared by every command
#[derive(Parser, Debug, Clone)]
pub struct ServiceArgs {
    /// Encoding service (aws)
    #[arg(long, env = "BM_PARAM_SERVICE")]
    pub service: String,

    /// Encoding service access key
    #[arg(long, env = "BM_PARAM_SERVICE_KEY", hide_env_values = true)]
    pub service_key: String,

    /// Encoding service secret
    #[arg(long, env = "BM_PARAM_SERVICE_SECRET", hide_env_values = true)]
    pub service_secret: String,

    /// Encoding service region
    #[arg(long, env = "BM_PARAM_SERVICE_REGION")]
    pub service_region: Option<String>,

    /// Service specific parameter (aws: pipeline id or name, _all_, _first_)
    #[arg(long, env = "BM_PARAM_SERVICE_PARAM1")]
    pub service_param1: Option<String>,

    /// Service specific parameter (aws: preset id)
    #[arg(long, env = "BM_PARAM_SERVICE_PARAM2")]
    pub service_param2: Option<String>,

    /// Base URL replacing the encoding service endpoint
    #[arg(long, env = "BM_PARAM_SERVICE_BASE_URL", hide = true)]
    pub service_base_url: Option<String>,

    /// Storage service (s3, gcs)
    #[arg(long, env = "BM_PARAM_STORAGE_SERVICE")]
    pub storage_service: String,

    /// Storage access key
    #[arg(long, env = "BM_PARAM_STORAGE_KEY", hide_env_values = true)]
    pub storage_key: String,

    /// Storage secret
    #[arg(long, env = "BM_PARAM_STORAGE_SECRET", hide_env_values = true)]
    pub storage_secret: String,

    /// Storage region
    #[arg(long, env = "BM_PARAM_STORAGE_REGION")]
    pub storage_region: Option<String>,

    /// Container holding inputs and outputs
    #[arg(long, env = "BM_PARAM_STORAGE_CONTAINER")]
    pub storage_container: String,

    /// Base URL replacing the storage endpoint (path-style requests)
    #[arg(long, env = "BM_PARAM_STORAGE_BASE_URL", hide = true)]
    pub storage_base_url: Option<String>,
}

impl ServiceArgs {
    /// Encoding service settings
    pub fn service_config(&self) -> Result<ServiceConfig, CliError> {
        if self.service_key.trim().is_empty() || self.service_secret.is_empty() {
            return Err(CliError::ConfigurationError(
                "encoding service key and secret are required".to_string(),
            ));
        }
        Ok(ServiceConfig {
            key: self.service_key.trim().to_string(),
            secret: Secret::new(self.service_secret.clone()),
            region: non_empty(&self.service_region),
            container: self.storage_container.clone(),
            param1: non_empty(&self.service_param1),
            param2: non_empty(&self.service_param2),
            base_url: non_empty(&self.service_base_url),
        })
    }

    /// Storage settings
    pub fn storage_config(&self) -> Result<StorageConfig, CliError> {
        if self.storage_key.trim().is_empty() || self.storage_secret.is_empty() {
            return Err(CliError::ConfigurationError(
                "storage key and secret are required".to_string(),
            ));
        }
        Ok(StorageConfig {
            key: self.storage_key.trim().to_string(),
            secret: Secret::new(self.storage_secret.clone()),
            container: self.storage_container.clone(),
            region: non_empty(&self.storage_region),
            base_url: non_empty(&self.storage_base_url),
        })
    }

    /// Construct both adapters over a shared executor
    pub fn connect(
        &self,
        executor: Arc<BatchExecutor>,
    ) -> Result<(Box<dyn EncodingAdapter>, Box<dyn StorageAdapter>), CliError> {
        let storage = storage_adapter(&self.storage_service, self.storage_config()?, executor.clone())?;
        let encoder = encoding_adapter(&self.service, self.service_config()?, executor)?;
        Ok((encoder, storage))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
