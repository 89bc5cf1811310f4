use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Specifies the backoff strategy for retrying failed requests.
#[derive(Clone, Debug, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed(Duration),
    /// Uses an exponential delay between retries.
    /// The delay before retry `n` (1-based) is `base * factor^(n-1)`.
    Exponential {
        /// The delay after the first failed attempt.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// Optional ceiling on a single delay. `None` lets the delay grow unbounded.
        max: Option<Duration>,
    },
}

impl Backoff {
    /// Delay to wait after the `failed_attempt`-th attempt (1-based) before trying again.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base, factor, max } => {
                let exp = i32::try_from(failed_attempt.saturating_sub(1)).unwrap_or(i32::MAX);
                let secs = base.as_secs_f64() * factor.powi(exp);
                let d = if secs.is_finite() && secs >= 0.0 {
                    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
                } else {
                    Duration::MAX
                };
                match max {
                    Some(m) => d.min(*m),
                    None => d,
                }
            }
        }
    }
}

/// Configuration for the automatic retry mechanism.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables the retry mechanism. When disabled, exactly one attempt is made.
    pub enabled: bool,
    /// The total number of attempts, including the first one.
    pub max_attempts: u32,
    /// The backoff strategy to use between attempts.
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    /// Five attempts, 30 s doubling, uncapped: the provider's throttle windows are long.
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            backoff: Backoff::Exponential {
                base: Duration::from_secs(30),
                factor: 2.0,
                max: None,
            },
        }
    }
}

impl RetryConfig {
    /// Attempts actually allowed by this configuration (never zero).
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }
}

/// Runs `op` until it succeeds, fails with an error `should_retry` rejects,
/// or the attempt budget is spent.
///
/// `op` receives the 1-based attempt number. The backoff delay is only slept
/// between attempts, never after the last one.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    cfg: &RetryConfig,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let attempts = cfg.attempts();
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < attempts && should_retry(&e) => {
                let delay = cfg.backoff.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %e,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
