//! Validate and download pools
//!
//! Tests cover:
//! - Only missing or mismatched files reach the download queue
//! - Verification failures retried until success
//! - Terminal failures recorded once with the full attempt count
//! - Large bodies streamed to disk; corrupt streams leave nothing behind
//! - Progress callback once per finished item
//! - Fire-and-forget handles and cancellation

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;
use mirrorsync_update::fetch::sha1_hex;
use mirrorsync_update::{FileRecord, Manifest, SyncError, TransferEngine, ValidationEngine};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

fn engine(root: &Path, max_attempts: u32) -> TransferEngine {
    TransferEngine::new(
        test_fetcher(),
        ValidationEngine::new(root),
        fast_settings(max_attempts),
    )
}

fn manifest_from(value: serde_json::Value) -> Manifest {
    let body = serde_json::to_vec(&value).unwrap();
    Manifest::from_slice(&body, "http://test/manifest.json", Default::default()).unwrap()
}

fn record(server: &MockServer, relative: &str, content: &[u8]) -> FileRecord {
    let (path, name) = match relative.rsplit_once('/') {
        Some((path, name)) => (path.to_string(), name.to_string()),
        None => (String::new(), relative.to_string()),
    };
    FileRecord {
        url: format!("{}{}", server.uri(), file_route(VERSION_1_0, relative)),
        path,
        name,
        hash: sha1_hex(content),
        size: None,
        attempts: 0,
    }
}

#[tokio::test]
async fn test_validation_enqueues_only_stale_files() {
    let dest = TempDir::new().unwrap();
    write_local(dest.path(), "current.txt", CONTENT_A);
    write_local(dest.path(), "sub/wrong.txt", STALE_CONTENT);

    let manifest = manifest_from(
        ManifestBuilder::new(VERSION_1_0, "http://mirror.test/mod")
            .file("current.txt", CONTENT_A)
            .file("sub/wrong.txt", CONTENT_B)
            .file("sub/deeper/missing.txt", CONTENT_C)
            .build(),
    );

    let engine = engine(dest.path(), 3);
    assert_eq!(engine.build_queue(&manifest), 3);
    engine.validate_all().await.unwrap();

    let report = engine.report();
    assert_eq!(report.snapshot().validated, 3);
    assert_eq!(report.total(), 2);

    let mut queued: Vec<String> = engine
        .take_downloads()
        .await
        .iter()
        .map(FileRecord::relative_path)
        .collect();
    queued.sort();
    assert_eq!(queued, vec!["sub/deeper/missing.txt", "sub/wrong.txt"]);
}

#[tokio::test]
async fn test_verification_failures_then_success() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    mount_corrupt_then_good(&server, VERSION_1_0, "sub/b.txt", 2, CORRUPT_CONTENT, CONTENT_B).await;

    let engine = engine(dest.path(), 3);
    engine.enqueue_download(record(&server, "sub/b.txt", CONTENT_B));
    engine.download_all().await.unwrap();

    let report = engine.report();
    assert_eq!(report.completed(), 1);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.remaining(), 0);
    assert_eq!(report.attempts_for("sub/b.txt"), Some(3));
    assert_eq!(
        request_count(&server, &file_route(VERSION_1_0, "sub/b.txt")).await,
        3
    );
    assert_eq!(read_local(dest.path(), "sub/b.txt"), CONTENT_B);
}

#[tokio::test]
async fn test_large_gzip_body_installed() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    let content = large_content(6 * 1024 * 1024);
    mount_gz_file(&server, VERSION_1_0, "data/big.bin", &content).await;

    let engine = engine(dest.path(), 1);
    engine.enqueue_download(record(&server, "data/big.bin", &content));
    engine.download_all().await.unwrap();

    assert_eq!(engine.report().attempts_for("data/big.bin"), Some(1));
    assert_eq!(read_local(dest.path(), "data/big.bin"), content);
    assert_eq!(dir_entries(&dest.path().join("data")), vec!["big.bin"]);
}

#[tokio::test]
async fn test_corrupt_stream_leaves_nothing_behind() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    let content = large_content(2 * 1024 * 1024);

    let mut body = gzip(&content);
    let middle = body.len() / 2;
    for byte in &mut body[middle..middle + 64] {
        *byte ^= 0xa5;
    }
    mount_raw_file(&server, VERSION_1_0, "data/big.bin", &body).await;

    let engine = engine(dest.path(), 2);
    engine.enqueue_download(record(&server, "data/big.bin", &content));
    engine.download_all().await.unwrap();

    let report = engine.report();
    assert_eq!(report.completed(), 0);
    assert_eq!(report.failed(), 1);
    assert!(!dest.path().join("data/big.bin").exists());
    assert!(dir_entries(&dest.path().join("data")).is_empty());
}

#[tokio::test]
async fn test_exhausted_attempts_recorded_once() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    let route = file_route(VERSION_1_0, "a.txt");
    mount_status(&server, &route, 500).await;

    let engine = engine(dest.path(), 3);
    engine.enqueue_download(record(&server, "a.txt", CONTENT_A));
    engine.download_all().await.unwrap();

    let report = engine.report();
    assert_eq!(report.completed(), 0);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.remaining(), 1);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempts, 3);
    assert_eq!(failures[0].record.relative_path(), "a.txt");
    assert!(failures[0].last_error.contains("500"));
    assert_eq!(request_count(&server, &route).await, 3);
    assert!(!dest.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_hash_mismatch_never_written() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    mount_gz_file(&server, VERSION_1_0, "a.txt", CORRUPT_CONTENT).await;

    let engine = engine(dest.path(), 2);
    engine.enqueue_download(record(&server, "a.txt", CONTENT_A));
    engine.download_all().await.unwrap();

    assert_eq!(engine.report().failed(), 1);
    assert!(engine.report().failures()[0].last_error.contains("Hash mismatch"));
    assert!(!dest.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_callback_runs_once_per_item() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    write_local(dest.path(), "a.txt", CONTENT_A);
    mount_gz_file(&server, VERSION_1_0, "b.txt", CONTENT_B).await;
    mount_status(&server, &file_route(VERSION_1_0, "c.txt"), 404).await;

    let manifest = manifest_from(
        ManifestBuilder::new(VERSION_1_0, &server.uri())
            .file("a.txt", CONTENT_A)
            .file("b.txt", CONTENT_B)
            .file("c.txt", CONTENT_C)
            .build(),
    );

    let engine = engine(dest.path(), 2);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    engine.set_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    engine.build_queue(&manifest);
    engine.validate_all().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    engine.download_all().await.unwrap();
    // b.txt completes, c.txt fails terminally after two attempts
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    let snapshot = engine.report().snapshot();
    assert_eq!(snapshot.total, 2);
    assert_eq!(snapshot.completed, 1);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.version.as_deref(), Some(VERSION_1_0));
}

#[tokio::test]
async fn test_fire_and_forget_handle_joins() {
    let server = MockServer::start().await;
    let dest = TempDir::new().unwrap();
    mount_gz_file(&server, VERSION_1_0, "a.txt", CONTENT_A).await;
    mount_gz_file(&server, VERSION_1_0, "b.txt", CONTENT_B).await;

    let engine = engine(dest.path(), 3);
    let downloads = engine.start_downloads();
    assert_eq!(downloads.worker_count(), 2);

    engine.enqueue_download(record(&server, "a.txt", CONTENT_A));
    engine.enqueue_download(record(&server, "b.txt", CONTENT_B));

    downloads.join().await.unwrap();
    assert_eq!(engine.report().completed(), 2);
    assert_eq!(engine.pending_downloads(), 0);
}

#[tokio::test]
async fn test_cancellation_stops_pool() {
    let dest = TempDir::new().unwrap();
    let token = CancellationToken::new();
    let engine = engine(dest.path(), 3).with_cancellation(token.clone());

    engine.enqueue_download(FileRecord {
        path: String::new(),
        name: "never.txt".into(),
        hash: WRONG_SHA1.into(),
        url: "http://127.0.0.1:9/never.txt.gz".into(),
        size: None,
        attempts: 0,
    });

    token.cancel();
    let err = engine.download_all().await.unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(engine.report().completed(), 0);
}

#[tokio::test]
async fn test_shutdown_returns_without_draining() {
    let dest = TempDir::new().unwrap();
    let engine = engine(dest.path(), 3);
    let handle = engine.start_validation();
    handle.shutdown().await;
    assert_eq!(engine.pending_validations(), 0);
}
