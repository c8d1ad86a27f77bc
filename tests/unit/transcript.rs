//! Transcript grammar: rendering and parsing back

use encoding_bench::dispatch::transcript::{parse_transcript, render_transcript};
use encoding_bench::dispatch::{RequestOutcome, TransferMetrics};
use std::collections::BTreeMap;
use std::time::Duration;

#[test]
fn test_rendered_transcript_parses_back() {
    let mut headers = BTreeMap::new();
    headers.insert("content-length".to_string(), "2048".to_string());
    headers.insert("etag".to_string(), "abc".to_string());
    let outcome = RequestOutcome {
        status: 206,
        headers,
        metrics: TransferMetrics::new(2048, Duration::from_millis(500), "https://media.s3.amazonaws.com/a.mp4"),
        body: None,
        error: None,
    };

    let parsed = parse_transcript(&render_transcript(&outcome)).into_outcome();
    assert_eq!(parsed.status, 206);
    assert_eq!(parsed.header("Content-Length"), Some("2048"));
    assert_eq!(parsed.metrics.bytes_transferred, 2048);
    assert_eq!(parsed.metrics.elapsed, Duration::from_millis(500));
    assert_eq!(parsed.metrics.effective_url, "https://media.s3.amazonaws.com/a.mp4");
}

#[test]
fn test_authorization_is_redacted() {
    let mut headers = BTreeMap::new();
    headers.insert("authorization".to_string(), "AWS AKID:signature".to_string());
    let outcome = RequestOutcome {
        status: 200,
        headers,
        ..RequestOutcome::default()
    };

    let text = render_transcript(&outcome);
    assert!(!text.contains("signature"));
    assert!(text.contains("authorization: ***"));
}

#[test]
fn test_redirect_keeps_last_status() {
    let text = "HTTP/1.1 301 Moved Permanently\nLocation: https://b/\nHTTP/1.1 404 Not Found\n";
    assert_eq!(parse_transcript(text).status, Some(404));
}

#[test]
fn test_unexecuted_request_has_no_status_line() {
    let outcome = RequestOutcome::unexecuted("connection refused");
    let text = render_transcript(&outcome);
    assert!(!text.contains("HTTP/"));
    assert_eq!(parse_transcript(&text).into_outcome().status, 0);
}
