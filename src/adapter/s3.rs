//! Amazon S3 storage

use std::sync::Arc;

use super::storage::HmacObjectStore;
use super::{AdapterResult, StorageAdapter, StorageConfig};
use crate::dispatch::BatchExecutor;

/// Region used when none is configured
pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Endpoint for the default region
pub const DEFAULT_S3_ENDPOINT: &str = "s3.amazonaws.com";

/// Endpoint host for `region`
pub fn endpoint_for(region: &str) -> String {
    if region.is_empty() || region == DEFAULT_S3_REGION {
        DEFAULT_S3_ENDPOINT.to_string()
    } else {
        format!("s3.{}.amazonaws.com", region)
    }
}

/// Registry constructor
pub fn build(config: StorageConfig, executor: Arc<BatchExecutor>) -> AdapterResult<Box<dyn StorageAdapter>> {
    let host = endpoint_for(config.region.as_deref().unwrap_or(DEFAULT_S3_REGION));
    let store = HmacObjectStore::new(
        "s3",
        config,
        DEFAULT_S3_REGION,
        host,
        true,
        executor,
    )?;
    Ok(Box::new(store))
}
