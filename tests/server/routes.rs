use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use serde_json::{Value, json};
use stockpulse::core::Chart;
use stockpulse::{AppState, NewsBoard, PredictionRunner, PriceService, ScoredArticle, router};
use tower::ServiceExt;

use crate::common::{ScriptedSource, Step, fetcher, instruments};

fn service(source: &Arc<ScriptedSource>) -> PriceService {
    PriceService::builder(fetcher(source, instruments(&[("a", "A.PA"), ("b", "B.PA")]))).build()
}

fn state(prices: PriceService, work_dir: &std::path::Path) -> AppState {
    AppState::new(
        prices,
        NewsBoard::new(),
        PredictionRunner::new("predictor", work_dir),
    )
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let resp = router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn stock_data_reports_prices_and_sentinels() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        ScriptedSource::new()
            .always("A.PA", Step::Price(10.5))
            .always("B.PA", Step::Status(500)),
    );
    let (status, body) = get(state(service(&source), dir.path()), "/api/stock-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 10.5, "b": 0.0}));
}

#[tokio::test(start_paused = true)]
async fn slow_provider_falls_back_to_sentinel_and_keeps_refreshing() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        ScriptedSource::new()
            .with_delay(Duration::from_secs(10))
            .always("A.PA", Step::Price(10.5))
            .always("B.PA", Step::Price(2.0)),
    );
    let prices = service(&source);
    let st = state(prices.clone(), dir.path()).with_request_timeout(Duration::from_millis(50));

    let (status, body) = get(st, "/api/stock-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": 0.0, "b": 0.0}));

    // The abandoned cycle still completes and fills the cache.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(
        prices.last_known_prices().await,
        Some(BTreeMap::from([("a".to_string(), 10.5), ("b".to_string(), 2.0)]))
    );
}

#[tokio::test(start_paused = true)]
async fn slow_provider_serves_stale_snapshot_when_one_exists() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        ScriptedSource::new()
            .with_delay(Duration::from_secs(10))
            .always("A.PA", Step::Price(10.5)),
    );
    let prices = service(&source);
    prices
        .price_cache()
        .write(
            prices.price_key(),
            BTreeMap::from([("a".to_string(), 9.0), ("b".to_string(), 1.0)]),
            Utc::now() - TimeDelta::hours(1),
        )
        .await;

    let st = state(prices, dir.path()).with_request_timeout(Duration::from_millis(50));
    let (_, body) = get(st, "/api/stock-data").await;
    assert_eq!(body, json!({"a": 9.0, "b": 1.0}));
}

#[tokio::test]
async fn historical_data_is_keyed_by_instrument() {
    let dir = tempfile::tempdir().unwrap();
    let chart = Chart {
        regular_market_price: Some(61.0),
        timezone: Some("Europe/Paris".into()),
        timestamps: vec![1_704_067_200],
        closes: vec![Some(60.0)],
    };
    let source = Arc::new(ScriptedSource::new().always("A.PA", Step::Chart(chart)));
    let (status, body) =
        get(state(service(&source), dir.path()), "/api/historical-stock-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "a": {"dates": ["2024-01-01"], "values": [60.0]},
            "b": {"dates": [], "values": []}
        })
    );
}

#[tokio::test(start_paused = true)]
async fn historical_data_timeout_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::new().with_delay(Duration::from_secs(10)));
    let st = state(service(&source), dir.path()).with_request_timeout(Duration::from_millis(50));

    let (status, body) = get(st, "/api/historical-stock-data").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn actu_returns_top_three() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::new());
    let st = state(service(&source), dir.path());
    let articles = [("calme", 0.0), ("chute", -2.0), ("hausse", 2.0), ("record", 3.0)];
    st.news
        .replace(
            articles
                .iter()
                .map(|(t, s)| ScoredArticle {
                    title: t.to_string(),
                    description: Some(format!("{t}...")),
                    url: format!("https://news.test/{t}"),
                    score: *s,
                })
                .collect(),
        )
        .await;

    let (status, body) = get(st, "/actu").await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["record", "hausse", "calme"]);
    assert_eq!(body[0]["url"], "https://news.test/record");
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn prediction_data_lists_every_instrument() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("prediction_a_corr.txt"), "61.5\n62\n").unwrap();
    let source = Arc::new(ScriptedSource::new());

    let (status, body) = get(state(service(&source), dir.path()), "/api/prediction-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"a": [61.5, 62.0], "b": []}));
}

#[tokio::test]
async fn health() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(ScriptedSource::new());
    let (status, body) = get(state(service(&source), dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
