//! Instrument-level fetches against the provider, with retry and pacing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::core::client::retry_with_backoff;
use crate::core::{
    Chart, ChartRequest, ChartService, FixedIntervalGate, HistoricalSeries, Instrument,
    InstrumentSet, Interval, PulseError, Range, RetryConfig,
};

/// Default spacing between two provider requests.
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

/// Fetches prices and history for a fixed set of named instruments.
///
/// Every call either yields data or `None` ("unavailable"). Throttling is retried
/// according to the [`RetryConfig`]; any other provider failure gives up at once.
/// Only local faults (e.g. a symbol that cannot form a request URL) surface as `Err`.
pub struct Fetcher {
    source: Arc<dyn ChartService>,
    instruments: InstrumentSet,
    retry: RetryConfig,
    gate: FixedIntervalGate,
}

impl Fetcher {
    /// Creates a fetcher with the default retry policy and one request per second.
    pub fn new(source: Arc<dyn ChartService>, instruments: InstrumentSet) -> Self {
        Self {
            source,
            instruments,
            retry: RetryConfig::default(),
            gate: FixedIntervalGate::new(DEFAULT_PACING),
        }
    }

    /// Overrides the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, cfg: RetryConfig) -> Self {
        self.retry = cfg;
        self
    }

    /// Overrides the minimum spacing between provider requests.
    #[must_use]
    pub fn pacing(mut self, interval: Duration) -> Self {
        self.gate = FixedIntervalGate::new(interval);
        self
    }

    pub fn instruments(&self) -> &InstrumentSet {
        &self.instruments
    }

    /// Latest price of the instrument called `name`.
    ///
    /// # Errors
    ///
    /// Only for local faults; provider trouble yields `Ok(None)`.
    pub async fn fetch_price(&self, name: &str) -> Result<Option<f64>, PulseError> {
        let Some(inst) = self.lookup(name) else {
            return Ok(None);
        };
        let chart = self.fetch_chart(inst, ChartRequest::LATEST).await?;
        Ok(chart
            .and_then(|c| c.regular_market_price)
            .filter(|p| p.is_finite() && *p != 0.0))
    }

    /// Closing-price history of the instrument called `name`.
    ///
    /// # Errors
    ///
    /// Only for local faults; provider trouble yields `Ok(None)`.
    pub async fn fetch_history(
        &self,
        name: &str,
        range: Range,
        interval: Interval,
    ) -> Result<Option<HistoricalSeries>, PulseError> {
        let Some(inst) = self.lookup(name) else {
            return Ok(None);
        };
        let chart = self.fetch_chart(inst, ChartRequest { range, interval }).await?;
        Ok(chart.map(|c| series_from_chart(&c)))
    }

    fn lookup(&self, name: &str) -> Option<&Instrument> {
        let inst = self.instruments.get(name);
        if inst.is_none() {
            tracing::debug!(instrument = name, "unknown instrument, not contacting provider");
        }
        inst
    }

    #[tracing::instrument(skip(self, inst), fields(instrument = %inst.name, symbol = %inst.symbol))]
    async fn fetch_chart(
        &self,
        inst: &Instrument,
        req: ChartRequest,
    ) -> Result<Option<Chart>, PulseError> {
        let result = retry_with_backoff(&self.retry, PulseError::is_rate_limit, move |_| async move {
            self.gate.ready().await;
            self.source.fetch_chart(&inst.symbol, req).await
        })
        .await;

        match result {
            Ok(chart) => Ok(Some(chart)),
            Err(e) if e.is_provider_failure() => {
                tracing::warn!(error = %e, "provider fetch failed, reporting unavailable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Converts bars to ISO dates in the exchange timezone (UTC when unknown) and
/// closes, reporting a missing close as `0`.
pub(crate) fn series_from_chart(chart: &Chart) -> HistoricalSeries {
    let tz: Tz = chart
        .timezone
        .as_deref()
        .and_then(|name| name.parse().ok())
        .unwrap_or(Tz::UTC);

    let mut out = HistoricalSeries::default();
    for (i, &ts) in chart.timestamps.iter().enumerate() {
        let Some(utc) = DateTime::<Utc>::from_timestamp(ts, 0) else {
            continue;
        };
        out.dates
            .push(utc.with_timezone(&tz).format("%Y-%m-%d").to_string());
        out.values
            .push(chart.closes.get(i).copied().flatten().unwrap_or(0.0));
    }
    out
}
