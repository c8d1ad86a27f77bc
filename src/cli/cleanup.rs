//! `cleanup` command implementation

use clap::{ArgAction, Parser};
use std::sync::Arc;
use tracing::info;

use super::{Cli, CliError, ServiceArgs};
use crate::dispatch::BatchExecutor;
use crate::harness;

/// Arguments for removing the outputs of a previous run
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub services: ServiceArgs,

    /// Whether to clean up at all (`--cleanup false` keeps the outputs)
    #[arg(long, env = "BM_PARAM_CLEANUP", default_value_t = true, action = ArgAction::Set)]
    pub cleanup: bool,
}

impl CleanupArgs {
    /// Delete recorded outputs and service artifacts
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        if !self.cleanup {
            info!("Cleanup disabled, keeping output objects");
            return Ok(());
        }

        let dispatch = cli.dispatch_config();
        let cleanup_file = dispatch.cleanup_file();
        let executor = Arc::new(BatchExecutor::new(dispatch));
        let (encoder, storage) = self.services.connect(executor)?;

        if harness::cleanup(encoder.as_ref(), storage.as_ref(), &cleanup_file).await? {
            info!(path = %cleanup_file.display(), "Cleanup successful");
            Ok(())
        } else {
            Err(CliError::CleanupFailed)
        }
    }
}
