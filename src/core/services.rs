use futures::future::BoxFuture;

use crate::core::{Chart, Interval, PulseError, Range};

/// Parameters for a single chart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRequest {
    /// A relative time range for the request (e.g., `6mo`).
    pub range: Range,
    /// The time interval for each bar.
    pub interval: Interval,
}

impl ChartRequest {
    /// The smallest request that still carries the current regular-market price.
    pub const LATEST: ChartRequest = ChartRequest {
        range: Range::D1,
        interval: Interval::D1,
    };
}

/// A trait for services that can fetch chart data for a provider symbol.
///
/// This decouples the fetcher's retry and pacing policy from the transport.
/// It is implemented by [`ProviderClient`](crate::core::ProviderClient); tests
/// substitute scripted sources.
pub trait ChartService: Send + Sync {
    /// Fetches one chart for `symbol`.
    ///
    /// Implementations report throttling as [`PulseError::RateLimited`] so the
    /// caller can tell it apart from other failures.
    fn fetch_chart<'a>(
        &'a self,
        symbol: &'a str,
        req: ChartRequest,
    ) -> BoxFuture<'a, Result<Chart, PulseError>>;
}
