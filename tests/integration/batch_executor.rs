//! Batch execution against a local HTTP server

use encoding_bench::config::DispatchConfig;
use encoding_bench::dispatch::{DispatchError, RequestDescriptor};
use httpmock::prelude::*;
use httpmock::Method::{HEAD, PUT};
use tempfile::NamedTempFile;

use crate::common::{executor, isolated_executor};

#[tokio::test]
async fn test_results_are_index_aligned() {
    let server = MockServer::start_async().await;
    let ok = server
        .mock_async(|when, then| {
            when.method(GET).path("/ok");
            then.status(200).header("x-object", "a").body("hello");
        })
        .await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        })
        .await;

    let requests = vec![
        RequestDescriptor::get(server.url("/missing")),
        RequestDescriptor::get(server.url("/ok")),
        RequestDescriptor::get(server.url("/missing")),
    ];
    let result = executor().execute(&requests, true).await.unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.status(0), 404);
    assert_eq!(result.status(1), 200);
    assert_eq!(result.status(2), 404);
    assert_eq!(result.lowest_status, 200);
    assert_eq!(result.highest_status, 404);

    let body = result.outcome(1).unwrap();
    assert_eq!(body.body_text(), "hello");
    assert_eq!(body.header("X-Object"), Some("a"));
    assert_eq!(body.metrics.bytes_transferred, 5);

    ok.assert_hits_async(1).await;
    missing.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_bodies_are_not_captured_unless_requested() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/data");
            then.status(200).body("0123456789");
        })
        .await;

    let result = executor()
        .execute(&[RequestDescriptor::get(server.url("/data"))], false)
        .await
        .unwrap();
    let outcome = result.first().unwrap();
    assert_eq!(outcome.body, None);
    assert_eq!(outcome.metrics.bytes_transferred, 10);
}

#[tokio::test]
async fn test_headers_range_and_file_body_are_sent() {
    let server = MockServer::start_async().await;
    let upload = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/media/clip.mp4")
                .header("x-amz-acl", "public-read")
                .header("range", "bytes=0-99")
                .body("file contents");
            then.status(200);
        })
        .await;

    let file = NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "file contents").unwrap();

    let request = RequestDescriptor::new("put", server.url("/media/clip.mp4"))
        .header("X-Amz-Acl", "public-read")
        .range("0-99")
        .body_file(file.path());
    let result = executor().execute(&[request], false).await.unwrap();

    assert_eq!(result.status(0), 200);
    upload.assert_async().await;
}

#[tokio::test]
async fn test_batch_with_no_status_fails() {
    // Nothing listens on port 9 of the loopback interface
    let requests = vec![
        RequestDescriptor::get("http://127.0.0.1:9/a"),
        RequestDescriptor::get("http://127.0.0.1:9/b"),
    ];
    let result = executor().execute(&requests, false).await;
    assert!(matches!(result, Err(DispatchError::NoUsableStatus { requests: 2 })));
}

#[tokio::test]
async fn test_partial_transport_failure_is_per_request() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/up");
            then.status(200);
        })
        .await;

    let requests = vec![
        RequestDescriptor::head("http://127.0.0.1:9/down"),
        RequestDescriptor::head(server.url("/up")),
    ];
    let result = executor().execute(&requests, false).await.unwrap();
    assert_eq!(result.status(0), 0);
    assert!(result.outcome(0).unwrap().error.is_some());
    assert_eq!(result.status(1), 200);
    assert_eq!(result.lowest_status, 200);
}

#[tokio::test]
async fn test_more_requests_than_concurrency() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/item");
            then.status(204);
        })
        .await;

    let config = DispatchConfig::new(false, 2, None, ".");
    let requests: Vec<_> = (0..7).map(|_| RequestDescriptor::get(server.url("/item"))).collect();
    let result = isolated_executor(config).execute(&requests, false).await.unwrap();

    assert_eq!(result.len(), 7);
    assert!(result.outcomes.iter().all(|o| o.status == 204));
    mock.assert_hits_async(7).await;
}

#[tokio::test]
async fn test_results_follow_input_order_not_completion_order() {
    let server = MockServer::start_async().await;
    for (path, delay_ms) in [("/slow", 300), ("/fast-1", 0), ("/fast-2", 0)] {
        server
            .mock_async(|when, then| {
                when.method(GET).path(path);
                then.status(200)
                    .body(path)
                    .delay(std::time::Duration::from_millis(delay_ms));
            })
            .await;
    }

    let requests = vec![
        RequestDescriptor::get(server.url("/slow")),
        RequestDescriptor::get(server.url("/fast-1")),
        RequestDescriptor::get(server.url("/fast-2")),
    ];
    let executor = isolated_executor(DispatchConfig::new(false, 3, None, "."));
    let result = executor.execute(&requests, true).await.unwrap();

    let slow = result.outcome(0).unwrap();
    assert_eq!(slow.status, 200);
    assert_eq!(slow.body_text(), "/slow");
    assert_eq!(slow.metrics.effective_url, server.url("/slow"));
    assert!(slow.metrics.elapsed >= std::time::Duration::from_millis(300));

    for (index, path) in [(1, "/fast-1"), (2, "/fast-2")] {
        let fast = result.outcome(index).unwrap();
        assert_eq!(fast.body_text(), path);
        assert_eq!(fast.metrics.effective_url, server.url(path));
        // Finished while the first request was still waiting on its response
        assert!(fast.metrics.elapsed < slow.metrics.elapsed);
    }
}
