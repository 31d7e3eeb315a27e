//! Integration tests for the Bookshelf Server API

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use bookshelf_core::cache::{AssetCacheManager, CacheManifest, CacheStore};
use bookshelf_core::error::FetchError;
use bookshelf_core::fetch::{AssetRequest, AssetResponse, Fetcher, StorageFetcher};
use bookshelf_core::storage::{LocalStorage, MemoryStorage, StorageProvider};
use bookshelf_server::routes::create_router;
use bookshelf_server::state::AppState;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Static origin that can be switched offline
struct Origin {
    files: Arc<MemoryStorage>,
    inner: StorageFetcher,
    offline: AtomicBool,
}

#[async_trait]
impl Fetcher for Origin {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Network("connection refused".to_string()));
        }
        self.inner.fetch(request).await
    }
}

struct TestApp {
    server: TestServer,
    state: AppState,
    origin: Arc<Origin>,
    _temp_dir: TempDir,
}

/// Create a test server in front of a small in-memory origin
async fn create_test_app(skip_waiting: bool) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage_path = temp_dir.path().to_path_buf();

    let files = Arc::new(MemoryStorage::new());
    files
        .write("index.html", b"<html>bookshelf</html>".to_vec())
        .await
        .unwrap();
    files
        .write("src/css/styles.css", b"body{}".to_vec())
        .await
        .unwrap();
    files
        .write("src/js/extra.js", b"console.log(1)".to_vec())
        .await
        .unwrap();

    let origin = Arc::new(Origin {
        files: files.clone(),
        inner: StorageFetcher::new(files),
        offline: AtomicBool::new(false),
    });
    let mut manifest = CacheManifest::new(
        "test-v1",
        vec!["/index.html".to_string(), "/src/css/styles.css".to_string()],
    );
    manifest.skip_waiting_on_install = skip_waiting;

    let store = CacheStore::new(Arc::new(LocalStorage::new(&storage_path)));
    let cache = Arc::new(AssetCacheManager::new(manifest, store, origin.clone()));
    let state = AppState::with_cache(cache);

    let server = TestServer::new(create_router(state.clone())).expect("Failed to create test server");
    TestApp {
        server,
        state,
        origin,
        _temp_dir: temp_dir,
    }
}

fn html_accept() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("accept"),
        HeaderValue::from_static("text/html,application/xhtml+xml"),
    )
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(true).await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_status_before_install() {
    let app = create_test_app(true).await;

    let body: Value = app.server.get("/sw/status").await.json();

    assert_eq!(body["state"], "parsed");
    assert_eq!(body["generation"], "test-v1");
    assert_eq!(body["controlling"], false);
    assert_eq!(body["generations"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_requests_pass_through_before_activation() {
    let app = create_test_app(true).await;

    let response = app.server.get("/src/css/styles.css").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "body{}");

    app.origin.offline.store(true, Ordering::SeqCst);
    app.server
        .get("/src/css/styles.css")
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_installed_assets_served_offline() {
    let app = create_test_app(true).await;
    app.state.cache.install().await.unwrap();

    let body: Value = app.server.get("/sw/status").await.json();
    assert_eq!(body["state"], "activated");
    assert_eq!(body["controlling"], true);

    app.origin.offline.store(true, Ordering::SeqCst);

    let response = app.server.get("/src/css/styles.css").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "body{}");
    assert_eq!(
        response.header("content-type"),
        "text/css; charset=utf-8"
    );
}

#[tokio::test]
async fn test_runtime_fetch_is_recached() {
    let app = create_test_app(true).await;
    app.state.cache.install().await.unwrap();

    app.server.get("/src/js/extra.js").await.assert_status_ok();

    app.origin.files.delete("src/js/extra.js").await.unwrap();
    let response = app.server.get("/src/js/extra.js").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "console.log(1)");
}

#[tokio::test]
async fn test_not_found_is_not_cached() {
    let app = create_test_app(true).await;
    app.state.cache.install().await.unwrap();

    app.server
        .get("/missing.js")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.origin
        .files
        .write("missing.js", b"late".to_vec())
        .await
        .unwrap();
    let response = app.server.get("/missing.js").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "late");
}

#[tokio::test]
async fn test_offline_navigation_gets_root_document() {
    let app = create_test_app(true).await;
    app.state.cache.install().await.unwrap();
    app.origin.offline.store(true, Ordering::SeqCst);

    let (name, value) = html_accept();
    let response = app.server.get("/library/shelf").add_header(name, value).await;
    response.assert_status_ok();
    assert_eq!(response.text(), "<html>bookshelf</html>");

    // Sub-resources get no fallback
    app.server
        .get("/src/js/other.js")
        .add_header(
            HeaderName::from_static("sec-fetch-dest"),
            HeaderValue::from_static("script"),
        )
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_skip_waiting_message_activates() {
    let app = create_test_app(false).await;
    app.state.cache.install().await.unwrap();

    let body: Value = app.server.get("/sw/status").await.json();
    assert_eq!(body["state"], "installed");
    assert_eq!(body["controlling"], false);

    let response = app.server.post("/sw/message").text("skipWaiting").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["state"], "activated");
    assert_eq!(body["controlling"], true);
}

#[tokio::test]
async fn test_unknown_message_rejected() {
    let app = create_test_app(true).await;

    app.server
        .post("/sw/message")
        .text("claimEverything")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_get_is_intercepted() {
    let app = create_test_app(true).await;

    app.server
        .post("/index.html")
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}
