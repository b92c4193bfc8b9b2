//! JSON REST API over the freshness controller.
//!
//! Read endpoints go through `ensure_fresh`, so a request against a stale
//! cache refreshes it first. Errors use the shape
//! `{"error": {"code": .., "message": ..}}`.

use crate::scheduler::refresh_all;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use goldfeed::{FeedError, FeedStatus, FreshnessController, PageFetcher, SeriesKind, SeriesStore};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Controller shared between handlers and the scheduler.
pub type Shared<F, S> = Arc<FreshnessController<F, S>>;

/// Build the axum Router with all REST endpoints.
pub fn router<F, S>(controller: Shared<F, S>) -> Router
where
    F: PageFetcher + 'static,
    S: SeriesStore + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_info))
        .route("/api/gold-prices", get(daily::<F, S>))
        .route("/api/gold-prices/latest", get(latest::<F, S>))
        .route("/api/gold-prices/yearly", get(yearly::<F, S>))
        .route("/api/update", post(update::<F, S>))
        .route("/api/status", get(status::<F, S>))
        .layer(cors)
        .with_state(controller)
}

/// Serve the API on `addr` until `shutdown` resolves.
pub async fn serve<F, S>(
    addr: SocketAddr,
    controller: Shared<F, S>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()>
where
    F: PageFetcher + 'static,
    S: SeriesStore + 'static,
{
    let app = router(controller);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("REST API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

// ── Errors ──────────────────────────────────────────────────────

/// An error rendered as a JSON body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        let (status, code) = match &err {
            FeedError::Fetch(_) => (StatusCode::BAD_GATEWAY, "E_UPSTREAM"),
            FeedError::ExtractionEmpty(_) | FeedError::NormalizationEmpty(_) => {
                (StatusCode::NOT_FOUND, "E_NO_DATA")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "E_INTERNAL"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Service description listing the available endpoints.
async fn api_info() -> Json<Value> {
    Json(json!({
        "message": "Goldfeed gold price API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /api/gold-prices": "daily gold price series, newest first",
            "GET /api/gold-prices/latest": "newest daily price only",
            "GET /api/gold-prices/yearly": "one year of gold prices",
            "POST /api/update": "force a refresh of both series",
            "GET /api/status": "cache state of both series",
            "GET /health": "liveness check",
        },
    }))
}

async fn daily<F: PageFetcher + 'static, S: SeriesStore + 'static>(
    State(ctl): State<Shared<F, S>>,
) -> Result<Json<Value>, ApiError> {
    series_document(&ctl, SeriesKind::Daily).await
}

async fn yearly<F: PageFetcher + 'static, S: SeriesStore + 'static>(
    State(ctl): State<Shared<F, S>>,
) -> Result<Json<Value>, ApiError> {
    series_document(&ctl, SeriesKind::Yearly).await
}

async fn series_document<F: PageFetcher + 'static, S: SeriesStore + 'static>(
    ctl: &FreshnessController<F, S>,
    kind: SeriesKind,
) -> Result<Json<Value>, ApiError> {
    let series = ctl.ensure_fresh(kind).await?;
    let doc = serde_json::to_value(&series).map_err(FeedError::from)?;
    Ok(Json(doc))
}

async fn latest<F: PageFetcher + 'static, S: SeriesStore + 'static>(
    State(ctl): State<Shared<F, S>>,
) -> Result<Json<Value>, ApiError> {
    let series = ctl.ensure_fresh(SeriesKind::Daily).await?;
    let newest = series.latest().ok_or_else(|| {
        ApiError::new(StatusCode::NOT_FOUND, "E_NO_DATA", "daily series has no entries")
    })?;
    Ok(Json(json!({
        "date": newest.date,
        "price": newest.price,
    })))
}

async fn update<F: PageFetcher + 'static, S: SeriesStore + 'static>(
    State(ctl): State<Shared<F, S>>,
) -> Response {
    let results = refresh_all(&ctl).await;
    let updated = |kind: SeriesKind| results.iter().any(|&(k, ok)| k == kind && ok);
    let daily_updated = updated(SeriesKind::Daily);
    let yearly_updated = updated(SeriesKind::Yearly);

    let (status, message) = match (daily_updated, yearly_updated) {
        (true, true) => (StatusCode::OK, "both series updated"),
        (true, false) => (StatusCode::OK, "daily series updated, yearly refresh failed"),
        (false, true) => (StatusCode::OK, "yearly series updated, daily refresh failed"),
        (false, false) => (StatusCode::INTERNAL_SERVER_ERROR, "both refreshes failed"),
    };

    (
        status,
        Json(json!({
            "message": message,
            "daily_updated": daily_updated,
            "yearly_updated": yearly_updated,
        })),
    )
        .into_response()
}

async fn status<F: PageFetcher + 'static, S: SeriesStore + 'static>(
    State(ctl): State<Shared<F, S>>,
) -> Json<FeedStatus> {
    Json(ctl.status())
}
