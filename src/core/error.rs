use thiserror::Error;

/// The primary error type for all fallible operations in this crate.
#[derive(Debug, Error)]
pub enum PulseError {
    /// An error occurred during an HTTP request.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A provided URL could not be parsed.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A JSON document (cache file, coefficients, provider body) could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV file could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A local file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The provider signalled that we are sending too many requests.
    #[error("rate limited by provider at {url}")]
    RateLimited {
        /// The URL that was throttled.
        url: String,
    },

    /// The server returned an unexpected or unsuccessful HTTP status code.
    #[error("Unexpected response status: {status} at {url}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The URL that returned the error.
        url: String,
    },

    /// The data received was in an unexpected format or was missing a required field.
    #[error("Data format unexpected or missing field: {0}")]
    Data(String),

    /// A configuration value was missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PulseError {
    /// Whether this error is the provider asking us to slow down.
    ///
    /// This is the only class of error the fetcher retries.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            PulseError::RateLimited { .. } => true,
            PulseError::Status { status, .. } => *status == 429,
            PulseError::Http(e) => e.status().is_some_and(|s| s.as_u16() == 429),
            _ => false,
        }
    }

    /// Whether this error is an expected provider-side failure.
    ///
    /// Expected failures degrade to "unavailable"; anything else is a local fault
    /// and is propagated to the caller.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            PulseError::Http(_)
                | PulseError::RateLimited { .. }
                | PulseError::Status { .. }
                | PulseError::Data(_)
        )
    }
}
