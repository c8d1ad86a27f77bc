//! Binary-level tests of the command line surface

use assert_cmd::Command;
use httpmock::prelude::*;
use httpmock::Method::DELETE;
use tempfile::TempDir;

fn bench() -> Command {
    let mut cmd = Command::cargo_bin("encoding-bench").unwrap();
    cmd.env_clear();
    cmd
}

fn credentials(storage: &str, base_url: &str) -> Vec<String> {
    [
        "--service",
        "aws",
        "--service-key",
        "AKID",
        "--service-secret",
        "secret",
        "--service-base-url",
        base_url,
        "--storage-service",
        storage,
        "--storage-key",
        "AKID",
        "--storage-secret",
        "secret",
        "--storage-container",
        "media",
        "--storage-base-url",
        base_url,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[test]
fn test_help_lists_commands() {
    let output = bench().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("cleanup"));
}

#[test]
fn test_missing_input_is_a_usage_error() {
    bench()
        .arg("run")
        .args(credentials("s3", "http://127.0.0.1:9"))
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_unknown_storage_service_exits_1() {
    let output = bench()
        .arg("run")
        .args(credentials("azure", "http://127.0.0.1:9"))
        .args(["--input", "*.mp4"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown storage service 'azure'"), "stderr: {stderr}");
}

#[test]
fn test_unsupported_format_is_rejected() {
    bench()
        .arg("run")
        .args(credentials("s3", "http://127.0.0.1:9"))
        .args(["--input", "*.mp4", "--format", "avi"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_disabled_cleanup_is_skipped() {
    let dir = TempDir::new().unwrap();
    bench()
        .arg("cleanup")
        .args(credentials("s3", "http://127.0.0.1:9"))
        .args(["--cleanup", "false"])
        .env("BM_RUN_DIR", dir.path())
        .assert()
        .success();
}

#[test]
fn test_cleanup_without_file_exits_1() {
    let dir = TempDir::new().unwrap();
    bench()
        .arg("cleanup")
        .args(credentials("gcs", "http://127.0.0.1:9"))
        .args(["--run-dir", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn test_cleanup_from_environment() {
    let server = MockServer::start();
    let deleted = server.mock(|when, then| {
        when.method(DELETE)
            .path("/media/ch7/clip_a-def_v-def_1.mp4")
            .header_exists("authorization");
        then.status(204);
    });

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".output_objects"), "ch7/clip_a-def_v-def_1.mp4\n").unwrap();

    bench()
        .arg("cleanup")
        .env("BM_PARAM_SERVICE", "aws")
        .env("BM_PARAM_SERVICE_KEY", "AKID")
        .env("BM_PARAM_SERVICE_SECRET", "secret")
        .env("BM_PARAM_SERVICE_BASE_URL", server.base_url())
        .env("BM_PARAM_STORAGE_SERVICE", "s3")
        .env("BM_PARAM_STORAGE_KEY", "AKID")
        .env("BM_PARAM_STORAGE_SECRET", "secret")
        .env("BM_PARAM_STORAGE_CONTAINER", "media")
        .env("BM_PARAM_STORAGE_BASE_URL", server.base_url())
        .env("BM_PARAM_CONCURRENT_REQUESTS", "4")
        .env("BM_RUN_DIR", dir.path())
        .assert()
        .success();

    deleted.assert();
}
