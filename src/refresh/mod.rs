//! Read-through refresh of price and history snapshots.
//!
//! Each read consults the cache tiers in order and only falls through to the
//! [`Fetcher`] on a full miss. Fetch-on-miss is single-flight per dataset: a
//! caller that arrives while a cycle is running waits for it and is then served
//! from the cache it filled.

mod journal;

pub use journal::FetchJournal;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::cache::{CacheMode, CacheStore};
use crate::core::{
    HistorySnapshot, InstrumentSet, Interval, PriceSnapshot, PulseError, Range, UNAVAILABLE_PRICE,
};
use crate::fetch::Fetcher;

/// Cache key (and disk file stem) for the live price snapshot.
pub const DEFAULT_PRICE_KEY: &str = "cache_stock_data";
/// Cache key (and disk file stem) for the history snapshot.
pub const DEFAULT_HISTORY_KEY: &str = "cache_history_data";
/// Live prices are considered current for this long.
pub const DEFAULT_PRICE_TTL: Duration = Duration::from_secs(30);
/// Weekly history barely moves intraday.
pub const DEFAULT_HISTORY_TTL: Duration = Duration::from_secs(60 * 60);

/// Serves price and history snapshots through the two-tier cache.
///
/// Cheap to clone; clones share caches, fetcher and in-flight state.
#[derive(Clone)]
pub struct PriceService {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Fetcher,
    prices: CacheStore<PriceSnapshot>,
    history: CacheStore<HistorySnapshot>,
    price_key: String,
    history_key: String,
    history_range: Range,
    history_interval: Interval,
    journal: Option<FetchJournal>,
    price_flight: Mutex<()>,
    history_flight: Mutex<()>,
}

impl PriceService {
    pub fn builder(fetcher: Fetcher) -> PriceServiceBuilder {
        PriceServiceBuilder {
            fetcher,
            prices: None,
            history: None,
            price_key: DEFAULT_PRICE_KEY.to_string(),
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            history_range: Range::M6,
            history_interval: Interval::W1,
            journal: None,
        }
    }

    pub fn instruments(&self) -> &InstrumentSet {
        self.inner.fetcher.instruments()
    }

    pub fn price_cache(&self) -> &CacheStore<PriceSnapshot> {
        &self.inner.prices
    }

    pub fn history_cache(&self) -> &CacheStore<HistorySnapshot> {
        &self.inner.history
    }

    pub fn price_key(&self) -> &str {
        &self.inner.price_key
    }

    pub fn history_key(&self) -> &str {
        &self.inner.history_key
    }

    /// Loads whatever the disk tier holds into memory. Called once at startup.
    pub async fn hydrate(&self) {
        let prices = self.inner.prices.hydrate(&self.inner.price_key).await;
        let history = self.inner.history.hydrate(&self.inner.history_key).await;
        tracing::info!(prices, history, "hydrated caches from disk");
    }

    /// Current prices, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Only for local faults; unavailable instruments are reported as `0`.
    pub async fn prices(&self) -> Result<PriceSnapshot, PulseError> {
        self.prices_with(CacheMode::Use).await
    }

    /// Current prices with an explicit cache mode.
    ///
    /// # Errors
    ///
    /// Only for local faults; unavailable instruments are reported as `0`.
    pub async fn prices_with(&self, mode: CacheMode) -> Result<PriceSnapshot, PulseError> {
        let inner = &self.inner;
        if mode == CacheMode::Use {
            if let Some(hit) = inner.prices.read(&inner.price_key).await {
                tracing::info!(tier = ?hit.tier, age_ms = hit.age.as_millis() as u64, "prices served from cache");
                return Ok(hit.payload);
            }
        }

        let _flight = inner.price_flight.lock().await;
        if mode == CacheMode::Use {
            if let Some(hit) = inner.prices.read(&inner.price_key).await {
                tracing::debug!("prices filled by a concurrent refresh");
                return Ok(hit.payload);
            }
        }

        tracing::info!(instruments = self.instruments().len(), "refreshing prices from provider");
        let snapshot = self.fetch_price_snapshot().await?;
        if mode != CacheMode::Bypass {
            inner
                .prices
                .write(&inner.price_key, snapshot.clone(), Utc::now())
                .await;
        }
        if let Some(journal) = &inner.journal {
            journal.append(&snapshot).await;
        }
        Ok(snapshot)
    }

    /// The most recent price snapshot held in memory, however old.
    pub async fn last_known_prices(&self) -> Option<PriceSnapshot> {
        self.inner
            .prices
            .peek(&self.inner.price_key)
            .await
            .map(|e| e.data)
    }

    /// A snapshot reporting every instrument as unavailable.
    pub fn sentinel_prices(&self) -> PriceSnapshot {
        self.instruments()
            .names()
            .map(|n| (n.to_string(), UNAVAILABLE_PRICE))
            .collect()
    }

    /// Closing-price history for every instrument, served from cache when fresh.
    ///
    /// # Errors
    ///
    /// Only for local faults; unavailable instruments get an empty series.
    pub async fn history(&self) -> Result<HistorySnapshot, PulseError> {
        self.history_with(CacheMode::Use).await
    }

    /// Closing-price history with an explicit cache mode.
    ///
    /// # Errors
    ///
    /// Only for local faults; unavailable instruments get an empty series.
    pub async fn history_with(&self, mode: CacheMode) -> Result<HistorySnapshot, PulseError> {
        let inner = &self.inner;
        if mode == CacheMode::Use {
            if let Some(hit) = inner.history.read(&inner.history_key).await {
                tracing::info!(tier = ?hit.tier, "history served from cache");
                return Ok(hit.payload);
            }
        }

        let _flight = inner.history_flight.lock().await;
        if mode == CacheMode::Use {
            if let Some(hit) = inner.history.read(&inner.history_key).await {
                return Ok(hit.payload);
            }
        }

        tracing::info!(
            range = inner.history_range.as_str(),
            interval = inner.history_interval.as_str(),
            "refreshing history from provider"
        );
        let snapshot = self.fetch_history_snapshot().await?;
        if mode != CacheMode::Bypass {
            inner
                .history
                .write(&inner.history_key, snapshot.clone(), Utc::now())
                .await;
        }
        Ok(snapshot)
    }

    async fn fetch_price_snapshot(&self) -> Result<PriceSnapshot, PulseError> {
        let fetcher = &self.inner.fetcher;
        let mut out = PriceSnapshot::new();
        for name in fetcher.instruments().names() {
            let price = fetcher.fetch_price(name).await?.unwrap_or(UNAVAILABLE_PRICE);
            out.insert(name.to_string(), price);
        }
        Ok(out)
    }

    async fn fetch_history_snapshot(&self) -> Result<HistorySnapshot, PulseError> {
        let inner = &self.inner;
        let mut out = HistorySnapshot::new();
        for name in inner.fetcher.instruments().names() {
            let series = inner
                .fetcher
                .fetch_history(name, inner.history_range, inner.history_interval)
                .await?
                .unwrap_or_default();
            out.insert(name.to_string(), series);
        }
        Ok(out)
    }
}

/* ----------------------- Builder ----------------------- */

pub struct PriceServiceBuilder {
    fetcher: Fetcher,
    prices: Option<CacheStore<PriceSnapshot>>,
    history: Option<CacheStore<HistorySnapshot>>,
    price_key: String,
    history_key: String,
    history_range: Range,
    history_interval: Interval,
    journal: Option<FetchJournal>,
}

impl PriceServiceBuilder {
    /// Store for price snapshots. Default: memory-only with a 30 s TTL.
    #[must_use]
    pub fn price_cache(mut self, store: CacheStore<PriceSnapshot>) -> Self {
        self.prices = Some(store);
        self
    }

    /// Store for history snapshots. Default: memory-only with a one hour TTL.
    #[must_use]
    pub fn history_cache(mut self, store: CacheStore<HistorySnapshot>) -> Self {
        self.history = Some(store);
        self
    }

    #[must_use]
    pub fn price_key(mut self, key: impl Into<String>) -> Self {
        self.price_key = key.into();
        self
    }

    #[must_use]
    pub fn history_key(mut self, key: impl Into<String>) -> Self {
        self.history_key = key.into();
        self
    }

    /// Lookback and bar size for history. Default: six months of weekly bars.
    #[must_use]
    pub fn history_window(mut self, range: Range, interval: Interval) -> Self {
        self.history_range = range;
        self.history_interval = interval;
        self
    }

    /// Append every price fetch cycle to `journal`.
    #[must_use]
    pub fn journal(mut self, journal: FetchJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> PriceService {
        PriceService {
            inner: Arc::new(Inner {
                fetcher: self.fetcher,
                prices: self
                    .prices
                    .unwrap_or_else(|| CacheStore::new(DEFAULT_PRICE_TTL)),
                history: self
                    .history
                    .unwrap_or_else(|| CacheStore::new(DEFAULT_HISTORY_TTL)),
                price_key: self.price_key,
                history_key: self.history_key,
                history_range: self.history_range,
                history_interval: self.history_interval,
                journal: self.journal,
                price_flight: Mutex::new(()),
                history_flight: Mutex::new(()),
            }),
        }
    }
}
