//! Integration tests for the direct transfer strategy.
//!
//! These tests drive the full engine against a mock export endpoint.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use drivefetch_core::download::{HttpFetcherOptions, constants::BROWSER_USER_AGENT};
use drivefetch_core::{
    ErrorKind, FileId, HttpFetcher, TransferEngine, TransferProgress, VideoStorage,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILE_ID: &str = "1AbCdEfGhIjKlMnOpQrStUvWxYz0";

fn engine_for(base_url: &str, storage: &Path, timeout: Duration) -> TransferEngine {
    let fetcher = HttpFetcher::with_options(HttpFetcherOptions {
        base_url: base_url.to_string(),
        timeout,
        ..HttpFetcherOptions::default()
    })
    .expect("valid fetcher options");
    TransferEngine::new(Box::new(fetcher), Arc::new(VideoStorage::new(storage)))
}

fn file_id() -> FileId {
    FileId::new(FILE_ID).expect("valid identifier")
}

/// Entries left in the storage directory, sorted.
fn stored_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read storage dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

async fn mount_export(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(query_param("export", "download"))
        .and(query_param("id", FILE_ID))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_direct_download_stores_canonical_name() {
    let server = MockServer::start().await;
    let body = vec![7u8; 12_345];
    mount_export(&server, ResponseTemplate::new(200).set_body_bytes(body.clone())).await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let result = engine
        .download_file(&file_id(), None)
        .await
        .expect("download should succeed");

    let expected_name = format!("gdrive_{FILE_ID}.mp4");
    assert_eq!(result.stored_name, expected_name);
    assert_eq!(result.original_name, expected_name);
    assert_eq!(result.content_type, "video/mp4");
    assert_eq!(result.byte_size, 12_345);
    assert_eq!(result.storage_path, storage.path().join(&expected_name));
    assert_eq!(std::fs::read(&result.storage_path).expect("read stored"), body);
    assert_eq!(stored_entries(storage.path()), vec![expected_name]);
}

#[tokio::test]
async fn test_direct_download_uniquifies_on_collision() {
    let server = MockServer::start().await;
    mount_export(&server, ResponseTemplate::new(200).set_body_bytes(b"second copy".to_vec())).await;
    let storage = TempDir::new().expect("temp dir");
    let existing = storage.path().join(format!("gdrive_{FILE_ID}.mp4"));
    std::fs::write(&existing, b"first copy").expect("seed existing file");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let result = engine.download_file(&file_id(), None).await.expect("download");

    assert_eq!(result.stored_name, format!("gdrive_{FILE_ID}_1.mp4"));
    assert_eq!(result.original_name, format!("gdrive_{FILE_ID}.mp4"));
    assert_eq!(std::fs::read(&existing).expect("read existing"), b"first copy");
    assert_eq!(
        std::fs::read(&result.storage_path).expect("read new"),
        b"second copy"
    );
}

#[tokio::test]
async fn test_direct_download_sends_browser_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/uc"))
        .and(header("user-agent", BROWSER_USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    engine.download_file(&file_id(), None).await.expect("download");
}

#[tokio::test]
async fn test_direct_download_403_is_access_denied() {
    let server = MockServer::start().await;
    mount_export(&server, ResponseTemplate::new(403)).await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let error = engine.download_file(&file_id(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::AccessDenied);
    assert!(stored_entries(storage.path()).is_empty());
}

#[tokio::test]
async fn test_direct_download_404_is_file_not_found() {
    let server = MockServer::start().await;
    mount_export(&server, ResponseTemplate::new(404)).await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let error = engine.download_file(&file_id(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::FileNotFound);
    assert!(stored_entries(storage.path()).is_empty());
}

#[tokio::test]
async fn test_direct_download_500_is_transfer_failed() {
    let server = MockServer::start().await;
    mount_export(&server, ResponseTemplate::new(500)).await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let error = engine.download_file(&file_id(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::TransferFailed);
    assert!(error.to_string().contains("500"), "message: {error}");
    assert!(stored_entries(storage.path()).is_empty());
}

#[tokio::test]
async fn test_direct_download_empty_body_leaves_nothing_behind() {
    let server = MockServer::start().await;
    mount_export(&server, ResponseTemplate::new(200).set_body_bytes(Vec::new())).await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let error = engine.download_file(&file_id(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::EmptyOrMissingArtifact);
    assert!(
        stored_entries(storage.path()).is_empty(),
        "temporary artifact should be removed"
    );
}

#[tokio::test]
async fn test_direct_download_progress_is_monotonic_and_completes() {
    let server = MockServer::start().await;
    mount_export(
        &server,
        ResponseTemplate::new(200).set_body_bytes(vec![1u8; 256 * 1024]),
    )
    .await;
    let storage = TempDir::new().expect("temp dir");
    let seen: Mutex<Vec<TransferProgress>> = Mutex::new(Vec::new());
    let sink = |event: &TransferProgress| seen.lock().unwrap().push(event.clone());

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    engine
        .download_file(&file_id(), Some(&sink))
        .await
        .expect("download");

    let events = seen.into_inner().unwrap();
    assert!(!events.is_empty());
    let percents: Vec<u8> = events.iter().map(|e| e.percent_complete).collect();
    assert!(
        percents.windows(2).all(|pair| pair[0] < pair[1]),
        "progress must strictly increase: {percents:?}"
    );
    assert_eq!(percents.last(), Some(&100));
    assert!(events.iter().all(|e| e.identifier == FILE_ID));
    assert!(events.iter().all(|e| e.display_name == "Google Drive File"));
}

#[tokio::test]
async fn test_direct_download_connection_refused_is_network_unavailable() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(
        &format!("http://127.0.0.1:{port}"),
        storage.path(),
        Duration::from_secs(10),
    );
    let error = engine.download_file(&file_id(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NetworkUnavailable);
    assert!(stored_entries(storage.path()).is_empty());
}

#[tokio::test]
async fn test_direct_download_slow_response_times_out() {
    let server = MockServer::start().await;
    mount_export(
        &server,
        ResponseTemplate::new(200)
            .set_body_bytes(b"late".to_vec())
            .set_delay(Duration::from_secs(5)),
    )
    .await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_millis(300));
    let error = engine.download_file(&file_id(), None).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::TransferTimedOut);
    assert!(stored_entries(storage.path()).is_empty());
}

#[tokio::test]
async fn test_download_reference_accepts_share_link() {
    let server = MockServer::start().await;
    mount_export(&server, ResponseTemplate::new(200).set_body_bytes(b"video".to_vec())).await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let link = format!("https://drive.google.com/file/d/{FILE_ID}/view?usp=sharing");
    let result = engine
        .download_reference(&link, None)
        .await
        .expect("download");

    assert_eq!(result.byte_size, 5);
}

#[tokio::test]
async fn test_download_reference_rejects_garbage_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let storage = TempDir::new().expect("temp dir");

    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let error = engine
        .download_reference("https://example.com/not-a-share-link", None)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::InvalidReferenceFormat);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_id_transfers_get_distinct_names() {
    let server = MockServer::start().await;
    let body = vec![3u8; 64 * 1024];
    mount_export(&server, ResponseTemplate::new(200).set_body_bytes(body.clone())).await;
    let storage = TempDir::new().expect("temp dir");
    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let id = file_id();

    let results = futures_util::future::join_all((0..4).map(|_| engine.download_file(&id, None))).await;

    let mut names: Vec<String> = results
        .into_iter()
        .map(|result| result.expect("concurrent download").stored_name)
        .collect();
    names.sort();
    let mut expected = vec![
        format!("gdrive_{FILE_ID}.mp4"),
        format!("gdrive_{FILE_ID}_1.mp4"),
        format!("gdrive_{FILE_ID}_2.mp4"),
        format!("gdrive_{FILE_ID}_3.mp4"),
    ];
    expected.sort();
    assert_eq!(names, expected);
    assert_eq!(stored_entries(storage.path()), expected);
    for name in &names {
        assert_eq!(
            std::fs::read(storage.path().join(name)).expect("read stored"),
            body
        );
    }
}

#[tokio::test]
async fn test_concurrent_distinct_ids_all_complete() {
    let server = MockServer::start().await;
    let other_ids = [
        "2AbCdEfGhIjKlMnOpQrStUvWxYz0",
        "3AbCdEfGhIjKlMnOpQrStUvWxYz0",
    ];
    for other in other_ids {
        Mock::given(method("GET"))
            .and(path("/uc"))
            .and(query_param("id", other))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![5u8; 2048]))
            .mount(&server)
            .await;
    }
    let storage = TempDir::new().expect("temp dir");
    let engine = engine_for(&server.uri(), storage.path(), Duration::from_secs(10));
    let ids: Vec<FileId> = other_ids
        .iter()
        .map(|raw| FileId::new(*raw).expect("valid id"))
        .collect();

    let results =
        futures_util::future::join_all(ids.iter().map(|id| engine.download_file(id, None))).await;

    for result in results {
        let result = result.expect("concurrent download");
        assert_eq!(result.byte_size, 2048);
    }
    assert_eq!(stored_entries(storage.path()).len(), 2);
}
