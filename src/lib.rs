//! stockpulse: a small market dashboard backend.
//!
//! Live prices and weekly history for a fixed set of instruments are pulled from
//! the Yahoo chart endpoint through a two-tier (memory, then disk) TTL cache.
//! Provider throttling is retried with exponential backoff and requests are paced
//! by a fixed-interval gate. Alongside, an RSS front page is scored with keyword
//! lists once a day, and an external executable can be driven to produce price
//! predictions.
//!
//! The usual entry point is [`refresh::PriceService`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use stockpulse::{Fetcher, InstrumentSet, PriceService, ProviderClient};
//!
//! # async fn run() -> Result<(), stockpulse::PulseError> {
//! let client = ProviderClient::builder().build()?;
//! let fetcher = Fetcher::new(Arc::new(client), InstrumentSet::default());
//! let service = PriceService::builder(fetcher).build();
//! let prices = service.prices().await?;
//! println!("{prices:?}");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod fetch;
pub mod news;
pub mod predict;
pub mod refresh;
pub mod schedule;
pub mod server;

pub use cache::{CacheMode, CacheStore};
pub use config::AppConfig;
pub use crate::core::{
    Backoff, ChartRequest, ChartService, HistoricalSeries, HistorySnapshot, Instrument,
    InstrumentSet, Interval, PriceSnapshot, ProviderClient, PulseError, Range, RetryConfig,
    UNAVAILABLE_PRICE,
};
pub use fetch::Fetcher;
pub use news::{Coefficients, KeywordScorer, NewsBoard, NewsScanner, ScoredArticle};
pub use predict::PredictionRunner;
pub use refresh::{FetchJournal, PriceService};
pub use schedule::{DailySchedule, Scheduler};
pub use server::{AppState, router};
