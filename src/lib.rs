//! # Encoding Bench Library
//!
//! Core of a benchmarking harness for cloud transcoding services. A run
//! submits encoding jobs for objects held in cloud storage, polls the
//! service until every job is terminal, and reports timing and size metrics.
//!
//! ## Quick Start
//!
//! ```no_run
//! use encoding_bench::adapter::{encoding_adapter, storage_adapter, ServiceConfig, StorageConfig};
//! use encoding_bench::config::DispatchConfig;
//! use encoding_bench::dispatch::BatchExecutor;
//! use encoding_bench::harness::{Bitrates, Harness, RunSettings};
//! use encoding_bench::signing::Secret;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = Arc::new(BatchExecutor::new(DispatchConfig::default()));
//! let storage = storage_adapter(
//!     "s3",
//!     StorageConfig {
//!         key: "AKID".to_string(),
//!         secret: Secret::new("secret"),
//!         container: "media".to_string(),
//!         region: None,
//!         base_url: None,
//!     },
//!     executor.clone(),
//! )?;
//! let encoder = encoding_adapter(
//!     "aws",
//!     ServiceConfig {
//!         key: "AKID".to_string(),
//!         secret: Secret::new("secret"),
//!         region: None,
//!         container: "media".to_string(),
//!         param1: Some("_first_".to_string()),
//!         param2: Some("1351620000001-000010".to_string()),
//!         base_url: None,
//!     },
//!     executor,
//! )?;
//!
//! let settings = RunSettings {
//!     input: "videos/*.mp4".to_string(),
//!     format: "_default_".to_string(),
//!     bitrates: Bitrates::default(),
//! };
//! let mut harness = Harness::new(encoder, storage, settings, ".output_objects");
//! let report = harness.run().await?;
//! print!("{}", report.to_results_block());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`dispatch`] - Bounded-concurrency, rate-limited HTTP batch execution
//! - [`signing`] - AWS Signature V4 and legacy HMAC-SHA1 request signing
//! - [`jobs`] - Job lifecycle state machine and status polling
//! - [`adapter`] - Encoding service and object storage adapters
//! - [`harness`] - Run orchestration and result reporting
//! - [`cli`] - Command line interface
//! - [`metrics`] - Prometheus metrics

#![warn(clippy::all)]

/// Encoding service and storage adapters
pub mod adapter;

/// CLI command implementations
pub mod cli;

/// Run configuration and constants
pub mod config;

/// HTTP batch execution
pub mod dispatch;

/// Benchmark orchestration
pub mod harness;

/// Job lifecycle tracking
pub mod jobs;

/// Observability metrics
pub mod metrics;

/// Request signing
pub mod signing;

pub use dispatch::{BatchExecutor, RateLimiter};
pub use jobs::{Job, JobStateMachine, JobStatus};
pub use signing::{RequestSigner, Secret};
