//! Static registry of supported services
//!
//! Services are looked up by the name given on the command line. Names are
//! matched case-insensitively.

use std::sync::Arc;

use super::{aws, gcs, s3};
use super::{AdapterError, AdapterResult, EncodingAdapter, EncodingCtor, ServiceConfig, StorageAdapter, StorageConfig, StorageCtor};
use crate::dispatch::BatchExecutor;

/// Encoding services by name
pub const ENCODING_SERVICES: &[(&str, EncodingCtor)] = &[("aws", aws::build)];

/// Storage services by name
pub const STORAGE_SERVICES: &[(&str, StorageCtor)] = &[("s3", s3::build), ("gcs", gcs::build)];

fn lookup<T: Copy>(services: &[(&'static str, T)], name: &str) -> Option<T> {
    services
        .iter()
        .find(|(service, _)| service.eq_ignore_ascii_case(name.trim()))
        .map(|(_, ctor)| *ctor)
}

fn supported<T>(services: &[(&'static str, T)]) -> String {
    services
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Construct the encoding adapter registered under `name`
pub fn encoding_adapter(
    name: &str,
    config: ServiceConfig,
    executor: Arc<BatchExecutor>,
) -> AdapterResult<Box<dyn EncodingAdapter>> {
    let ctor = lookup(ENCODING_SERVICES, name).ok_or_else(|| AdapterError::UnknownService {
        kind: "encoding",
        name: name.to_string(),
        supported: supported(ENCODING_SERVICES),
    })?;
    ctor(config, executor)
}

/// Construct the storage adapter registered under `name`
pub fn storage_adapter(
    name: &str,
    config: StorageConfig,
    executor: Arc<BatchExecutor>,
) -> AdapterResult<Box<dyn StorageAdapter>> {
    let ctor = lookup(STORAGE_SERVICES, name).ok_or_else(|| AdapterError::UnknownService {
        kind: "storage",
        name: name.to_string(),
        supported: supported(STORAGE_SERVICES),
    })?;
    ctor(config, executor)
}
