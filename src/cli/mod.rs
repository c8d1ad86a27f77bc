//! CLI command implementations

pub mod args;
pub mod cleanup;
pub mod error;
pub mod run;

pub use args::{Cli, Commands, OutputFormat, ServiceArgs};
pub use cleanup::CleanupArgs;
pub use error::CliError;
pub use run::RunArgs;
