//! CLI error types and conversions

use crate::adapter::AdapterError;
use crate::harness::HarnessError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Adapter construction or call failed
    #[error("adapter error: {0}")]
    AdapterError(#[from] AdapterError),

    /// Benchmark run failed
    #[error("harness error: {0}")]
    HarnessError(#[from] HarnessError),

    /// Some output objects or service artifacts were not removed
    #[error("cleanup incomplete")]
    CleanupFailed,

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
