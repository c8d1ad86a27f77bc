//! S3 and GCS adapters against a path-style local endpoint

use encoding_bench::adapter::{container_objects, storage_adapter, AdapterError, StorageAdapter};
use httpmock::prelude::*;
use httpmock::Method::{DELETE, HEAD};

use crate::common::{executor, storage_config};

fn listing(keys: &[&str], truncated: bool, next_marker: Option<&str>) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ListBucketResult><Name>media</Name>");
    xml.push_str(&format!("<IsTruncated>{}</IsTruncated>", truncated));
    if let Some(marker) = next_marker {
        xml.push_str(&format!("<NextMarker>{}</NextMarker>", marker));
    }
    for key in keys {
        xml.push_str(&format!("<Contents><Key>{}</Key><Size>1</Size></Contents>", key));
    }
    xml.push_str("</ListBucketResult>");
    xml
}

fn s3(server: &MockServer) -> Box<dyn StorageAdapter> {
    storage_adapter("s3", storage_config(&server.base_url()), executor()).unwrap()
}

#[tokio::test]
async fn test_authenticate_signs_service_request() {
    let server = MockServer::start_async().await;
    let service = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/")
                .header_exists("date")
                .header_exists("authorization");
            then.status(200).body("<ListAllMyBucketsResult/>");
        })
        .await;

    assert!(s3(&server).authenticate().await);
    service.assert_async().await;
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(403);
        })
        .await;

    assert!(!s3(&server).authenticate().await);
}

#[tokio::test]
async fn test_object_sizes_and_existence() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/media/videos/a.mp4");
            then.status(200).header("content-length", "4096");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/media/videos/gone.mp4");
            then.status(404);
        })
        .await;

    let store = s3(&server);
    let sizes = store
        .object_sizes("media", &["videos/a.mp4".to_string(), "videos/gone.mp4".to_string()])
        .await
        .unwrap();
    assert_eq!(sizes, vec![Some(4096), None]);
    assert!(store.object_exists("media", "videos/a.mp4").await.unwrap());
    assert!(!store.object_exists("media", "videos/gone.mp4").await.unwrap());
    assert_eq!(store.object_size("media", "videos/a.mp4").await.unwrap(), Some(4096));
}

#[tokio::test]
async fn test_delete_expects_no_content() {
    let server = MockServer::start_async().await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/media/ch1/out.mp4");
            then.status(204);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/media/ch1/locked.mp4");
            then.status(403);
        })
        .await;

    let store = s3(&server);
    assert!(store.delete_object("media", "ch1/out.mp4").await.unwrap());
    assert!(!store.delete_object("media", "ch1/locked.mp4").await.unwrap());
    delete.assert_async().await;
}

#[tokio::test]
async fn test_s3_listing_follows_markers() {
    let server = MockServer::start_async().await;
    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/media")
                .query_param("prefix", "videos")
                .query_param_missing("marker");
            then.status(200)
                .body(listing(&["videos/", "videos/a.mp4", "videos/b.mp4"], true, Some("videos/b.mp4")));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/media")
                .query_param("prefix", "videos")
                .query_param("marker", "videos/b.mp4");
            then.status(200).body(listing(&["videos/c.MP4", "videos/notes.txt"], false, None));
        })
        .await;

    let store = s3(&server);
    let objects = container_objects(store.as_ref(), Some("videos/*.mp4")).await.unwrap();

    assert_eq!(objects, vec!["videos/a.mp4", "videos/b.mp4", "videos/c.MP4"]);
    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_gcs_listing_is_single_page() {
    let server = MockServer::start_async().await;
    let page = server
        .mock_async(|when, then| {
            when.method(GET).path("/media");
            then.status(200).body(listing(&["a.mp4", "b.mp4"], true, Some("b.mp4")));
        })
        .await;

    let store = storage_adapter("gcs", storage_config(&server.base_url()), executor()).unwrap();
    let objects = store.list_container("media", None).await.unwrap();

    assert_eq!(objects, vec!["a.mp4", "b.mp4"]);
    page.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_listing_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/media");
            then.status(403);
        })
        .await;

    let err = s3(&server).list_container("media", None).await.unwrap_err();
    assert!(matches!(err, AdapterError::Status { status: 403, .. }));
}
