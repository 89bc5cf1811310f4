#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use stockpulse::core::{Backoff, Chart, ChartRequest, ChartService, Instrument, InstrumentSet};
use stockpulse::{Fetcher, PulseError, RetryConfig};

/// What a scripted source answers for one call.
#[derive(Debug, Clone)]
pub enum Step {
    Price(f64),
    Chart(Chart),
    RateLimited,
    Status(u16),
}

impl Step {
    fn into_result(self, symbol: &str) -> Result<Chart, PulseError> {
        match self {
            Step::Price(p) => Ok(price_chart(p)),
            Step::Chart(c) => Ok(c),
            Step::RateLimited => Err(PulseError::RateLimited {
                url: format!("scripted://{symbol}"),
            }),
            Step::Status(status) => Err(PulseError::Status {
                status,
                url: format!("scripted://{symbol}"),
            }),
        }
    }
}

/// A [`ChartService`] that replays per-symbol scripts and counts calls.
///
/// Each symbol first drains its queued steps, then keeps answering its steady
/// step. A symbol with neither answers 404.
#[derive(Default)]
pub struct ScriptedSource {
    queued: Mutex<HashMap<String, VecDeque<Step>>>,
    steady: Mutex<HashMap<String, Step>>,
    calls: AtomicUsize,
    per_symbol: Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call waits `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queue(self, symbol: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.queued
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_default()
            .extend(steps);
        self
    }

    pub fn always(self, symbol: &str, step: Step) -> Self {
        self.steady.lock().unwrap().insert(symbol.to_string(), step);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.per_symbol
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }
}

impl ChartService for ScriptedSource {
    fn fetch_chart<'a>(
        &'a self,
        symbol: &'a str,
        _req: ChartRequest,
    ) -> BoxFuture<'a, Result<Chart, PulseError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self
                .per_symbol
                .lock()
                .unwrap()
                .entry(symbol.to_string())
                .or_default() += 1;
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let step = {
                let next = self
                    .queued
                    .lock()
                    .unwrap()
                    .get_mut(symbol)
                    .and_then(VecDeque::pop_front);
                next.or_else(|| self.steady.lock().unwrap().get(symbol).cloned())
            };
            step.unwrap_or(Step::Status(404)).into_result(symbol)
        })
    }
}

pub fn price_chart(price: f64) -> Chart {
    Chart {
        regular_market_price: Some(price),
        ..Chart::default()
    }
}

pub fn instruments(pairs: &[(&str, &str)]) -> InstrumentSet {
    InstrumentSet::new(pairs.iter().map(|(n, s)| Instrument::new(*n, *s)).collect()).unwrap()
}

/// Five attempts with a 1 ms fixed backoff.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        enabled: true,
        max_attempts: 5,
        backoff: Backoff::Fixed(Duration::from_millis(1)),
    }
}

/// An unpaced fetcher with [`fast_retry`] over `source`.
pub fn fetcher(source: &Arc<ScriptedSource>, set: InstrumentSet) -> Fetcher {
    Fetcher::new(source.clone(), set)
        .retry_policy(fast_retry())
        .pacing(Duration::ZERO)
}

pub fn chart_body(price: f64, timestamps: &[i64], closes: &[Option<f64>]) -> String {
    serde_json::json!({
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "TEST",
                    "regularMarketPrice": price,
                    "exchangeTimezoneName": "Europe/Paris"
                },
                "timestamp": timestamps,
                "indicators": { "quote": [{ "close": closes }] }
            }],
            "error": null
        }
    })
    .to_string()
}
