//! Provider client surface + builder.
//! Retry policy lives in `retry`, default endpoints and UA in `constants`.

pub(crate) mod constants;
pub mod retry;

pub use constants::{DEFAULT_BASE_CHART, DEFAULT_NEWS_FEED};
pub use retry::{Backoff, RetryConfig, retry_with_backoff};

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use url::Url;

use crate::core::services::{ChartRequest, ChartService};
use crate::core::wire::{Chart, decode_chart};
use crate::core::{PulseError, net};
use constants::USER_AGENT;

/// HTTP client for the market-data provider's chart endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    base_chart: Url,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::builder().build().expect("default client")
    }
}

impl ProviderClient {
    /// Create a new builder.
    pub fn builder() -> ProviderClientBuilder {
        ProviderClientBuilder::default()
    }

    pub fn base_chart(&self) -> &Url {
        &self.base_chart
    }

    /// Fetches and decodes one chart. A single HTTP round trip, no retries.
    ///
    /// # Errors
    ///
    /// [`PulseError::RateLimited`] when throttled, [`PulseError::Status`] on other
    /// non-success statuses, [`PulseError::Data`] when the body is not a usable chart.
    #[tracing::instrument(skip(self), err, level = "debug")]
    pub async fn chart(&self, symbol: &str, req: ChartRequest) -> Result<Chart, PulseError> {
        let mut url = self.base_chart.join(symbol)?;
        url.query_pairs_mut()
            .append_pair("range", req.range.as_str())
            .append_pair("interval", req.interval.as_str())
            .append_pair("includePrePost", "false");

        let resp = self
            .http
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;
        let body = net::get_text(resp).await?;
        decode_chart(&body)
    }
}

impl ChartService for ProviderClient {
    fn fetch_chart<'a>(
        &'a self,
        symbol: &'a str,
        req: ChartRequest,
    ) -> BoxFuture<'a, Result<Chart, PulseError>> {
        Box::pin(self.chart(symbol, req))
    }
}

/* ----------------------- Builder ----------------------- */

#[derive(Default)]
pub struct ProviderClientBuilder {
    user_agent: Option<String>,
    base_chart: Option<Url>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ProviderClientBuilder {
    /// Override the User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Override the chart API base (e.g., `https://query1.finance.yahoo.com/v8/finance/chart/`).
    pub fn base_chart(mut self, url: Url) -> Self {
        self.base_chart = Some(url);
        self
    }

    /// Set a global request timeout (overall). Default: none.
    pub fn timeout(mut self, dur: Duration) -> Self {
        self.timeout = Some(dur);
        self
    }

    /// Set a connect timeout. Default: none.
    pub fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = Some(dur);
        self
    }

    pub fn build(self) -> Result<ProviderClient, PulseError> {
        let base_chart = match self.base_chart {
            Some(u) => u,
            None => Url::parse(DEFAULT_BASE_CHART)?,
        };

        let mut httpb =
            reqwest::Client::builder().user_agent(self.user_agent.as_deref().unwrap_or(USER_AGENT));

        if let Some(t) = self.timeout {
            httpb = httpb.timeout(t);
        }
        if let Some(ct) = self.connect_timeout {
            httpb = httpb.connect_timeout(ct);
        }

        let http = httpb.build()?;

        Ok(ProviderClient { http, base_chart })
    }
}
