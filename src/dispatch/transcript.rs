//! Line-oriented response transcripts
//!
//! A transcript is the plain-text record of one response: a status line,
//! `Header: value` lines and `key=value` metric lines (`speed`, `time`,
//! `transfer`, `url`). Debug logging renders outcomes in this form, and
//! [`parse_transcript`] reads it back. Each line is tested against the
//! status pattern first, then the header pattern, then the metric pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use super::result::{RequestOutcome, TransferMetrics};

static STATUS_LINE: Lazy<Regex> = Lazy::new(|| compile(r"HTTP\S+\s+([0-9]+)(?:\s|$)"));
static HEADER_LINE: Lazy<Regex> = Lazy::new(|| compile(r#"^([^:]+):\s+"?([^"]+)"?$"#));
static METRIC_LINE: Lazy<Regex> = Lazy::new(|| compile(r"^([^=]+)=(.*)$"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("FATAL: invalid transcript pattern {pattern}: {e}"))
}

/// Header values never written to a transcript
const REDACTED_HEADERS: &[&str] = &["authorization", "x-amz-security-token"];

/// Contents recovered from a transcript
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTranscript {
    /// Last status code seen (redirects produce several status lines)
    pub status: Option<u16>,
    /// Headers keyed by lowercase name
    pub headers: BTreeMap<String, String>,
    /// Metric values keyed by lowercase name
    pub metrics: BTreeMap<String, String>,
}

impl ParsedTranscript {
    /// Convert into a request outcome, interpreting the standard metric keys
    pub fn into_outcome(self) -> RequestOutcome {
        let bytes_transferred = self
            .metrics
            .get("transfer")
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v as u64)
            .unwrap_or(0);
        let elapsed = self
            .metrics
            .get("time")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or_default();
        let rate_bytes_per_sec = self
            .metrics
            .get("speed")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        let effective_url = self.metrics.get("url").cloned().unwrap_or_default();

        RequestOutcome {
            status: self.status.unwrap_or(0),
            headers: self.headers,
            metrics: TransferMetrics {
                bytes_transferred,
                elapsed,
                rate_bytes_per_sec,
                effective_url,
            },
            body: None,
            error: None,
        }
    }
}

/// Parse a transcript line by line
pub fn parse_transcript(text: &str) -> ParsedTranscript {
    let mut parsed = ParsedTranscript::default();
    for line in text.lines() {
        if let Some(caps) = STATUS_LINE.captures(line) {
            parsed.status = caps[1].parse().ok().or(parsed.status);
            continue;
        }
        let line = line.trim();
        if let Some(caps) = HEADER_LINE.captures(line) {
            parsed
                .headers
                .insert(caps[1].trim().to_lowercase(), caps[2].to_string());
        } else if let Some(caps) = METRIC_LINE.captures(line) {
            parsed
                .metrics
                .insert(caps[1].trim().to_lowercase(), caps[2].to_string());
        }
    }
    parsed
}

/// Render an outcome as a transcript, with credentials redacted
pub fn render_transcript(outcome: &RequestOutcome) -> String {
    let mut out = String::new();
    if outcome.status != 0 {
        let _ = writeln!(out, "HTTP/1.1 {} ", outcome.status);
    }
    for (name, value) in &outcome.headers {
        let value = if REDACTED_HEADERS.contains(&name.as_str()) {
            "***"
        } else {
            value.as_str()
        };
        let _ = writeln!(out, "{}: {}", name, value);
    }
    let metrics = &outcome.metrics;
    let _ = writeln!(out, "speed={:.3}", metrics.rate_bytes_per_sec);
    let _ = writeln!(out, "time={:.6}", metrics.elapsed.as_secs_f64());
    let _ = writeln!(out, "transfer={}", metrics.bytes_transferred);
    let _ = writeln!(out, "url={}", metrics.effective_url);
    out
}
