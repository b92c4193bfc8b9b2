//! REST API integration tests, driven through the router without a socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use goldfeed::{
    FeedConfig, FetchError, FileStore, FreshnessController, PageFetcher, SeriesKind, SeriesStore,
};
use goldfeed_server::rest::{router, Shared};

// ─────────────────────── helpers ───────────────────────

const PAGE: &str = r#"<html><body><script>
    const labels_in = ["2025-08-13-09:30","2025-08-14-09:30"];
    const data1 = ["17,203","-"];
</script></body></html>"#;

#[derive(Default)]
struct Upstream {
    down: AtomicBool,
    empty: AtomicBool,
    hits: AtomicUsize,
}

#[derive(Clone, Default)]
struct StubFetcher(Arc<Upstream>);

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.0.hits.fetch_add(1, Ordering::SeqCst);
        if self.0.down.load(Ordering::SeqCst) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 502,
            });
        }
        if self.0.empty.load(Ordering::SeqCst) {
            return Ok("<html><body></body></html>".to_string());
        }
        Ok(PAGE.to_string())
    }
}

fn setup(dir: &TempDir) -> (Shared<StubFetcher, FileStore>, Arc<Upstream>) {
    let upstream = Arc::new(Upstream::default());
    let config = FeedConfig::with_data_dir(dir.path());
    let store = FileStore::open(dir.path()).unwrap();
    let ctl = FreshnessController::new(StubFetcher(Arc::clone(&upstream)), store, &config);
    (Arc::new(ctl), upstream)
}

async fn call(ctl: &Shared<StubFetcher, FileStore>, method: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = router(Arc::clone(ctl)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn health_reports_ok() {
    let dir = TempDir::new().unwrap();
    let (ctl, _) = setup(&dir);
    let (status, body) = call(&ctl, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn api_info_lists_endpoints() {
    let dir = TempDir::new().unwrap();
    let (ctl, upstream) = setup(&dir);
    let (status, body) = call(&ctl, "GET", "/api").await;
    assert_eq!(status, StatusCode::OK);
    let endpoints = body["endpoints"].as_object().unwrap();
    for route in [
        "GET /api/gold-prices",
        "GET /api/gold-prices/latest",
        "GET /api/gold-prices/yearly",
        "POST /api/update",
        "GET /api/status",
    ] {
        assert!(endpoints.contains_key(route), "missing {route}");
    }
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn daily_document_refreshes_once() {
    let dir = TempDir::new().unwrap();
    let (ctl, upstream) = setup(&dir);

    let (status, body) = call(&ctl, "GET", "/api/gold-prices").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["kind"], "daily");
    assert_eq!(body["metadata"]["entry_count"], 2);
    assert_eq!(body["observations"][0]["date"], "2025-08-14");
    assert_eq!(body["observations"][0]["price"], 17203.0);
    assert_eq!(body["observations"][0]["original_price_token"], "-");

    call(&ctl, "GET", "/api/gold-prices").await;
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn latest_returns_newest_entry() {
    let dir = TempDir::new().unwrap();
    let (ctl, _) = setup(&dir);
    let (status, body) = call(&ctl, "GET", "/api/gold-prices/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2025-08-14");
    assert_eq!(body["price"], 17203.0);
}

#[tokio::test]
async fn yearly_document_is_separate() {
    let dir = TempDir::new().unwrap();
    let (ctl, _) = setup(&dir);
    let (status, body) = call(&ctl, "GET", "/api/gold-prices/yearly").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["kind"], "yearly");
    assert!(dir.path().join("gold_prices_yearly.json").is_file());
    assert!(!dir.path().join("gold_prices.json").exists());
}

#[tokio::test]
async fn upstream_failure_without_cache_is_bad_gateway() {
    let dir = TempDir::new().unwrap();
    let (ctl, upstream) = setup(&dir);
    upstream.down.store(true, Ordering::SeqCst);

    let (status, body) = call(&ctl, "GET", "/api/gold-prices").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "E_UPSTREAM");
    assert!(body["error"]["message"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn page_without_prices_is_not_found() {
    let dir = TempDir::new().unwrap();
    let (ctl, upstream) = setup(&dir);
    upstream.empty.store(true, Ordering::SeqCst);

    let (status, body) = call(&ctl, "GET", "/api/gold-prices/latest").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "E_NO_DATA");
}

#[tokio::test]
async fn update_refreshes_both_kinds() {
    let dir = TempDir::new().unwrap();
    let (ctl, upstream) = setup(&dir);

    let (status, body) = call(&ctl, "POST", "/api/update").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["daily_updated"], true);
    assert_eq!(body["yearly_updated"], true);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
    assert!(ctl.store().has_series(SeriesKind::Yearly));
}

#[tokio::test]
async fn update_reports_total_failure() {
    let dir = TempDir::new().unwrap();
    let (ctl, upstream) = setup(&dir);
    upstream.down.store(true, Ordering::SeqCst);

    let (status, body) = call(&ctl, "POST", "/api/update").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["daily_updated"], false);
    assert_eq!(body["yearly_updated"], false);
}

#[tokio::test]
async fn status_lists_both_kinds() {
    let dir = TempDir::new().unwrap();
    let (ctl, _) = setup(&dir);
    call(&ctl, "GET", "/api/gold-prices").await;

    let (status, body) = call(&ctl, "GET", "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["staleness_hours"], 24);
    let kinds = body["kinds"].as_array().unwrap();
    assert_eq!(kinds.len(), 2);
    assert_eq!(kinds[0]["kind"], "daily");
    assert_eq!(kinds[0]["state"], "fresh");
    assert_eq!(kinds[0]["available"], true);
    assert_eq!(kinds[1]["state"], "stale");
    assert_eq!(kinds[1]["available"], false);
}
