use crate::core::PulseError;

/// Marker the provider puts in throttled responses, sometimes with a non-429 status.
const RATE_LIMIT_BODY: &str = "Too Many Requests";

/// Read the response body as text, classifying throttling and non-success statuses.
///
/// A 429 status, or a body carrying the provider's throttle message, becomes
/// [`PulseError::RateLimited`]; any other non-2xx status becomes [`PulseError::Status`].
pub(crate) async fn get_text(resp: reqwest::Response) -> Result<String, PulseError> {
    let status = resp.status();
    let url = resp.url().to_string();

    if status.as_u16() == 429 {
        return Err(PulseError::RateLimited { url });
    }

    let text = resp.text().await?;

    if !status.is_success() {
        if text.contains(RATE_LIMIT_BODY) {
            return Err(PulseError::RateLimited { url });
        }
        return Err(PulseError::Status {
            status: status.as_u16(),
            url,
        });
    }

    Ok(text)
}
