//! Google Cloud Storage (interoperable XML API)

use std::sync::Arc;

use super::storage::HmacObjectStore;
use super::{AdapterResult, StorageAdapter, StorageConfig};
use crate::dispatch::BatchExecutor;

/// Location used when none is configured
pub const DEFAULT_GCS_REGION: &str = "US";

pub const DEFAULT_GCS_ENDPOINT: &str = "storage.googleapis.com";

/// Registry constructor
pub fn build(config: StorageConfig, executor: Arc<BatchExecutor>) -> AdapterResult<Box<dyn StorageAdapter>> {
    let store = HmacObjectStore::new(
        "gcs",
        config,
        DEFAULT_GCS_REGION,
        DEFAULT_GCS_ENDPOINT.to_string(),
        false,
        executor,
    )?;
    Ok(Box::new(store))
}
