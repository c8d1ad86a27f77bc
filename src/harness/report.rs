//! Run results
//!
//! A [`RunReport`] renders as the `[results]` block of `key=value` lines the
//! benchmark collector reads, or as JSON.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::config::{bytes_to_mb, round_metric};
use crate::jobs::{Job, JobStatus};

/// Provider stats that are carried into the report
pub const VALID_JOB_STATS: &[&str] = &[
    "audio_aac_profile",
    "audio_bit_rate",
    "audio_channels",
    "audio_codec",
    "audio_sample_rate",
    "duration",
    "error",
    "job_start",
    "job_stop",
    "job_time",
    "output_audio_aac_profile",
    "output_audio_bit_rate",
    "output_audio_channels",
    "output_audio_codecs",
    "output_audio_sample_rates",
    "output_durations",
    "output_failed",
    "output_formats",
    "output_success",
    "output_total_bit_rates",
    "output_video_bit_rates",
    "output_video_codecs",
    "output_video_frame_rates",
    "output_video_resolutions",
    "total_bit_rate",
    "video_bit_rate",
    "video_codec",
    "video_frame_rate",
    "video_resolution",
];

/// Header printed before the result lines
pub const RESULTS_HEADER: &str = "[results]";

/// Outcome of one benchmark run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Whether storage and encoding share a region
    pub same_region: bool,
    pub jobs: Vec<Job>,
    pub success: usize,
    pub partial: usize,
    pub fail: usize,
}

impl RunReport {
    pub fn new(jobs: Vec<Job>, same_region: bool) -> Self {
        let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count();
        let (success, partial, fail) = (
            count(JobStatus::Success),
            count(JobStatus::Partial),
            count(JobStatus::Fail),
        );
        Self {
            same_region,
            jobs,
            success,
            partial,
            fail,
        }
    }

    /// Whether every job succeeded
    pub fn all_succeeded(&self) -> bool {
        !self.jobs.is_empty() && self.success == self.jobs.len()
    }

    /// `key=value` result lines; keys get the 1-based job index as suffix
    /// when more than one job ran
    pub fn render(&self) -> String {
        let mut out = String::new();
        let multiple = self.jobs.len() > 1;
        for (i, job) in self.jobs.iter().enumerate() {
            let suffix = if multiple { (i + 1).to_string() } else { String::new() };
            self.render_job(&mut out, job, &suffix);
        }
        out
    }

    fn render_job(&self, out: &mut String, job: &Job, suffix: &str) {
        let mut line = |key: &str, value: String| {
            let _ = writeln!(out, "{}{}={}", key, suffix, value);
        };

        line("input", job.input.clone());
        if let Some((_, ext)) = job.input.rsplit_once('.') {
            line("input_format", ext.to_lowercase());
        }
        line("input_size", job.input_size.to_string());
        line("input_size_mb", bytes_to_mb(job.input_size).to_string());
        line("job_id", job.id.clone());
        line("job_status", job.status.to_string());

        for (stat, value) in job.stats.iter().filter(|(k, _)| VALID_JOB_STATS.contains(&k.as_str())) {
            let key = if stat == "error" || stat.starts_with("job_") || stat.starts_with("output_") {
                stat.clone()
            } else {
                format!("input_{}", stat)
            };
            let value = if stat == "duration" {
                value.as_f64().map(|d| round_metric(d).to_string()).unwrap_or_else(|| value_text(value))
            } else {
                value_text(value)
            };
            line(&key, value);
        }

        if !job.output_files.is_empty() {
            line("output_files", job.output_files.len().to_string());
        }
        if let Some(output_size) = job.output_size.filter(|_| !job.output_files.is_empty()) {
            let output_mb = bytes_to_mb(output_size);
            line("output_size", output_size.to_string());
            line("output_size_mb", output_mb.to_string());
            if job.input_size > 0 {
                line(
                    "size_ratio",
                    round_metric(output_size as f64 / job.input_size as f64 * 100.0).to_string(),
                );
            }
            let output_minutes = output_minutes(&job.stats);
            if output_minutes > 0.0 {
                line("output_mb_minute", round_metric(output_mb / output_minutes).to_string());
                line("output_minutes", round_metric(output_minutes).to_string());
            }
        }

        line("same_region", u8::from(self.same_region).to_string());
        line("start", job.start.timestamp().to_string());
        if let Some(stop) = job.stop {
            line("stop", stop.timestamp().to_string());
        }
        if let Some(total) = job.total_time() {
            line("time", round_metric(total.as_secs_f64()).to_string());
        }
        let mut times: Vec<(&str, f64)> = job
            .state_times()
            .iter()
            .map(|(status, elapsed)| (status.as_str(), elapsed.as_secs_f64()))
            .collect();
        times.sort_by(|a, b| a.0.cmp(b.0));
        for (state, secs) in times {
            line(&format!("time_{}", state), round_metric(secs).to_string());
        }
    }

    /// Full text block including the `[results]` header
    pub fn to_results_block(&self) -> String {
        format!("\n\n{}\n{}", RESULTS_HEADER, self.render())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Minutes of output media, from the `output_durations` stat (seconds, CSV)
fn output_minutes(stats: &BTreeMap<String, Value>) -> f64 {
    let Some(durations) = stats.get("output_durations") else {
        return 0.0;
    };
    value_text(durations)
        .split(',')
        .filter_map(|d| d.trim().parse::<f64>().ok())
        .map(|secs| secs / 60.0)
        .sum()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => u8::from(*b).to_string(),
        other => other.to_string(),
    }
}
