//! Environment-driven settings.
//!
//! Every setting has a default. Malformed numbers, paths and URLs fall back to
//! it; a malformed bind address, timezone or instrument list is a startup error.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

use crate::core::client::{DEFAULT_BASE_CHART, DEFAULT_NEWS_FEED};
use crate::core::{Backoff, InstrumentSet, PulseError, RetryConfig};
use crate::predict::DEFAULT_PREDICTOR;
use crate::refresh::{DEFAULT_HISTORY_TTL, DEFAULT_PRICE_KEY, DEFAULT_PRICE_TTL};

const PREFIX: &str = "STOCKPULSE_";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen address
    pub bind: SocketAddr,
    /// Directory holding the disk cache tier and the journal
    pub cache_dir: PathBuf,
    /// Directory for prediction inputs and outputs
    pub work_dir: PathBuf,
    pub price_cache_key: String,
    pub price_ttl: Duration,
    pub history_ttl: Duration,
    /// NDJSON journal of price fetch cycles, relative to `cache_dir` unless absolute
    pub journal: PathBuf,
    pub instruments: InstrumentSet,
    pub chart_url: Url,
    pub retry: RetryConfig,
    /// Minimum spacing between provider requests
    pub pacing: Duration,
    /// How long an HTTP handler waits for a refresh
    pub request_timeout: Duration,
    pub news: NewsConfig,
    /// Predictor executable, relative to `work_dir` unless absolute
    pub predictor: PathBuf,
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub feed: Url,
    /// Local hour of the daily rescan
    pub hour: u32,
    pub timezone: Tz,
    /// Keyword weights file, relative to `work_dir` unless absolute
    pub coefficients: PathBuf,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the process environment.
    ///
    /// # Errors
    ///
    /// [`PulseError::Config`] for an invalid bind address, timezone or instrument list.
    pub fn from_env() -> Result<Self, PulseError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, keyed by the full variable name.
    ///
    /// # Errors
    ///
    /// [`PulseError::Config`] for an invalid bind address, timezone or instrument list.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PulseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let bind = match env.get("BIND") {
            Some(raw) => raw
                .parse()
                .map_err(|_| PulseError::Config(format!("invalid bind address '{raw}'")))?,
            None => SocketAddr::from(([127, 0, 0, 1], 5000)),
        };
        let instruments = match env.get("INSTRUMENTS") {
            Some(raw) => InstrumentSet::parse(&raw)?,
            None => InstrumentSet::default(),
        };
        let timezone = match env.get("NEWS_TZ") {
            Some(raw) => raw
                .parse::<Tz>()
                .map_err(|_| PulseError::Config(format!("unknown timezone '{raw}'")))?,
            None => chrono_tz::Europe::Paris,
        };

        let default_retry = RetryConfig::default();
        let factor = env.parse("RETRY_FACTOR", 2.0f64);
        let factor = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            tracing::warn!(factor, "retry factor must be finite and at least 1, using 2");
            2.0
        };
        let retry = RetryConfig {
            enabled: true,
            max_attempts: env.parse("RETRY_ATTEMPTS", default_retry.max_attempts),
            backoff: Backoff::Exponential {
                base: Duration::from_secs(env.parse("RETRY_BASE_SECS", 30)),
                factor,
                max: None,
            },
        };

        let hour = env.parse("NEWS_HOUR", 6u32);
        let hour = if hour < 24 {
            hour
        } else {
            tracing::warn!(hour, "news hour out of range, using 6");
            6
        };

        Ok(Self {
            bind,
            cache_dir: env.path("CACHE_DIR", "."),
            work_dir: env.path("WORK_DIR", "."),
            price_cache_key: env.get("PRICE_CACHE_KEY").unwrap_or_else(|| DEFAULT_PRICE_KEY.to_string()),
            price_ttl: Duration::from_secs(env.parse("PRICE_TTL_SECS", DEFAULT_PRICE_TTL.as_secs())),
            history_ttl: Duration::from_secs(
                env.parse("HISTORY_TTL_SECS", DEFAULT_HISTORY_TTL.as_secs()),
            ),
            journal: env.path("JOURNAL", "stock_data_log.jsonl"),
            instruments,
            chart_url: env.url("CHART_URL", DEFAULT_BASE_CHART)?,
            retry,
            pacing: Duration::from_millis(env.parse("PACING_MS", 1000)),
            request_timeout: Duration::from_secs(env.parse("REQUEST_TIMEOUT_SECS", 20)),
            news: NewsConfig {
                feed: env.url("NEWS_FEED", DEFAULT_NEWS_FEED)?,
                hour,
                timezone,
                coefficients: env.path("COEFFICIENTS", "coefficients.json"),
            },
            predictor: env.path("PREDICTOR", DEFAULT_PREDICTOR),
        })
    }

    pub fn journal_path(&self) -> PathBuf {
        self.cache_dir.join(&self.journal)
    }

    pub fn coefficients_path(&self) -> PathBuf {
        self.work_dir.join(&self.news.coefficients)
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(&format!("{PREFIX}{key}"))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(key = %format!("{PREFIX}{key}"), value = %raw, "invalid value, using default");
                default
            }),
            None => default,
        }
    }

    fn path(&self, key: &str, default: &str) -> PathBuf {
        PathBuf::from(self.get(key).unwrap_or_else(|| default.to_string()))
    }

    /// Falls back to `default` when the variable does not parse as a URL.
    fn url(&self, key: &str, default: &str) -> Result<Url, PulseError> {
        if let Some(raw) = self.get(key) {
            match Url::parse(&raw) {
                Ok(u) => return Ok(u),
                Err(e) => tracing::warn!(key = %format!("{PREFIX}{key}"), error = %e, "invalid url, using default"),
            }
        }
        Ok(Url::parse(default)?)
    }
}
