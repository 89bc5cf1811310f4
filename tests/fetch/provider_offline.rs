use std::sync::Arc;
use std::time::Duration;

use httpmock::Method::GET;
use httpmock::MockServer;
use stockpulse::core::{ChartRequest, Interval, Range};
use stockpulse::{Fetcher, ProviderClient, PulseError};
use url::Url;

use crate::common::{chart_body, fast_retry, instruments};

fn client_for(server: &MockServer) -> ProviderClient {
    ProviderClient::builder()
        .base_chart(Url::parse(&server.url("/v8/finance/chart/")).unwrap())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn chart_request_shape_and_decoding() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v8/finance/chart/BN.PA")
            .query_param("range", "6mo")
            .query_param("interval", "1wk")
            .query_param("includePrePost", "false");
        then.status(200)
            .header("content-type", "application/json")
            .body(chart_body(61.42, &[1_704_067_200], &[Some(60.1)]));
    });

    let chart = client_for(&server)
        .chart(
            "BN.PA",
            ChartRequest {
                range: Range::M6,
                interval: Interval::W1,
            },
        )
        .await
        .unwrap();

    mock.assert_calls(1);
    assert_eq!(chart.regular_market_price, Some(61.42));
    assert_eq!(chart.timezone.as_deref(), Some("Europe/Paris"));
    assert_eq!(chart.closes, vec![Some(60.1)]);
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/BN.PA");
        then.status(429).body("Too Many Requests");
    });

    let err = client_for(&server)
        .chart("BN.PA", ChartRequest::LATEST)
        .await
        .unwrap_err();
    assert!(matches!(err, PulseError::RateLimited { .. }), "got {err:?}");
}

#[tokio::test]
async fn throttle_body_with_other_status_is_rate_limited() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/BN.PA");
        then.status(503).body("Edge: Too Many Requests");
    });

    let err = client_for(&server)
        .chart("BN.PA", ChartRequest::LATEST)
        .await
        .unwrap_err();
    assert!(err.is_rate_limit());
}

#[tokio::test]
async fn server_error_is_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/BN.PA");
        then.status(500).body("boom");
    });

    match client_for(&server).chart("BN.PA", ChartRequest::LATEST).await {
        Err(PulseError::Status { status, .. }) => assert_eq!(status, 500),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetcher_retries_throttled_provider_then_degrades() {
    let server = MockServer::start();
    let throttled = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/BN.PA");
        then.status(429);
    });
    let ok = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/OR.PA");
        then.status(200).body(chart_body(380.0, &[], &[]));
    });

    let f = Fetcher::new(
        Arc::new(client_for(&server)),
        instruments(&[("danone", "BN.PA"), ("loreal", "OR.PA")]),
    )
    .retry_policy(fast_retry())
    .pacing(Duration::ZERO);

    assert_eq!(f.fetch_price("danone").await.unwrap(), None);
    throttled.assert_calls(5);

    assert_eq!(f.fetch_price("loreal").await.unwrap(), Some(380.0));
    ok.assert_calls(1);
}

#[tokio::test]
async fn malformed_body_degrades_without_retry() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v8/finance/chart/BN.PA");
        then.status(200).body("<html>maintenance</html>");
    });

    let f = Fetcher::new(Arc::new(client_for(&server)), instruments(&[("danone", "BN.PA")]))
        .retry_policy(fast_retry())
        .pacing(Duration::ZERO);

    assert_eq!(f.fetch_price("danone").await.unwrap(), None);
    mock.assert_calls(1);
}
