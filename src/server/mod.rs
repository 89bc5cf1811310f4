//! JSON HTTP surface.
//!
//! Handlers never block on the provider for longer than the request timeout:
//! each refresh runs on its own task and keeps going after the handler gives
//! up, so a slow cycle still lands in the cache for the next caller.

mod error;

pub use error::{ApiError, ErrorBody};

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::core::{HistorySnapshot, PriceSnapshot, PulseError};
use crate::news::{NewsBoard, ScoredArticle};
use crate::predict::PredictionRunner;
use crate::refresh::PriceService;

/// How many articles `/actu` returns.
pub const TOP_ARTICLES: usize = 3;
/// Default bound on how long a handler waits for a refresh.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub prices: PriceService,
    pub news: NewsBoard,
    pub predictions: PredictionRunner,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(prices: PriceService, news: NewsBoard, predictions: PredictionRunner) -> Self {
        Self {
            prices,
            news,
            predictions,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stock-data", get(stock_data))
        .route("/api/historical-stock-data", get(historical_stock_data))
        .route("/api/prediction-data", get(prediction_data))
        .route("/actu", get(actu))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs `fut` on its own task and waits at most `timeout` for it.
///
/// On timeout the task is left running.
async fn detached<T, F>(timeout: Duration, fut: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, PulseError>> + Send + 'static,
{
    let handle = tokio::spawn(fut);
    match tokio::time::timeout(timeout, handle).await {
        Ok(joined) => Ok(joined??),
        Err(_) => Err(ApiError::Timeout),
    }
}

/// Always 200: on any failure the last known snapshot (however stale) is
/// served, or every instrument at the sentinel price.
async fn stock_data(State(state): State<AppState>) -> Json<PriceSnapshot> {
    let service = state.prices.clone();
    match detached(state.request_timeout, async move { service.prices().await }).await {
        Ok(snapshot) => Json(snapshot),
        Err(e) => {
            let fallback = state.prices.last_known_prices().await;
            tracing::warn!(error = ?e, stale = fallback.is_some(), "serving fallback prices");
            Json(fallback.unwrap_or_else(|| state.prices.sentinel_prices()))
        }
    }
}

async fn historical_stock_data(
    State(state): State<AppState>,
) -> Result<Json<HistorySnapshot>, ApiError> {
    let service = state.prices.clone();
    let history = detached(state.request_timeout, async move { service.history().await }).await?;
    Ok(Json(history))
}

async fn prediction_data(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<f64>>> {
    let names = state.prices.instruments().names();
    Json(state.predictions.read_all(names).await)
}

async fn actu(State(state): State<AppState>) -> Json<Vec<ScoredArticle>> {
    Json(state.news.top(TOP_ARTICLES).await)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
