//! `run` command implementation

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Cli, CliError, OutputFormat, ServiceArgs};
use crate::dispatch::BatchExecutor;
use crate::harness::outputs::{DEFAULT_FORMAT, SUPPORTED_FORMATS};
use crate::harness::{Bitrates, Harness, RunSettings};

/// Parse and validate the requested output format
fn parse_format(s: &str) -> Result<String, String> {
    let format = s.trim().to_lowercase();
    if SUPPORTED_FORMATS.contains(&format.as_str()) {
        Ok(format)
    } else {
        Err(format!(
            "'{s}' is not a supported format. Valid options: {}",
            SUPPORTED_FORMATS.join(", ")
        ))
    }
}

/// Arguments for a benchmark run
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub services: ServiceArgs,

    /// Input objects, `*` matches any run of characters (e.g. videos/*.mp4)
    #[arg(long, env = "BM_PARAM_INPUT")]
    pub input: String,

    /// Output format; _default_ picks aac for audio inputs and mp4 otherwise
    #[arg(long, env = "BM_PARAM_FORMAT", default_value = DEFAULT_FORMAT, value_parser = parse_format)]
    pub format: String,

    /// Audio bitrate in kbps
    #[arg(long, env = "BM_PARAM_AUDIO_BITRATE")]
    pub audio_bitrate: Option<u32>,

    /// Video bitrate in kbps
    #[arg(long, env = "BM_PARAM_VIDEO_BITRATE")]
    pub video_bitrate: Option<u32>,
}

impl RunArgs {
    /// What the harness encodes
    pub fn settings(&self) -> Result<RunSettings, CliError> {
        let input = self.input.trim();
        if input.is_empty() {
            return Err(CliError::InvalidArgument("input filter must not be empty".to_string()));
        }
        Ok(RunSettings {
            input: input.to_string(),
            format: self.format.clone(),
            bitrates: Bitrates {
                audio: self.audio_bitrate.filter(|b| *b > 0),
                video: self.video_bitrate.filter(|b| *b > 0),
            },
        })
    }

    /// Run the benchmark and print its results
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let dispatch = cli.dispatch_config();
        let cleanup_file = dispatch.cleanup_file();
        let settings = self.settings()?;
        let executor = Arc::new(BatchExecutor::new(dispatch));
        let (encoder, storage) = self.services.connect(executor)?;

        info!(
            service = encoder.name(),
            storage = storage.api(),
            container = storage.container(),
            input = %settings.input,
            "Starting benchmark run"
        );

        let mut harness = Harness::new(encoder, storage, settings, cleanup_file);
        let report = harness.run().await?;

        if report.all_succeeded() {
            info!(jobs = report.jobs.len(), "All encoding jobs succeeded");
        } else {
            warn!(
                success = report.success,
                partial = report.partial,
                fail = report.fail,
                "Not every encoding job succeeded"
            );
        }

        match cli.output_format {
            OutputFormat::Json => {
                let json = report.to_json().map_err(|e| {
                    CliError::InvalidArgument(format!("Failed to serialize results: {e}"))
                })?;
                println!("{json}");
            }
            OutputFormat::Human => print!("{}", report.to_results_block()),
        }
        Ok(())
    }
}
