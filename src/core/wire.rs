//! Wire model for the chart v8 endpoint (only the fields we read).

use serde::Deserialize;

use crate::core::PulseError;

#[derive(Deserialize)]
pub(crate) struct ChartEnvelope {
    pub(crate) chart: Option<ChartNode>,
}

#[derive(Deserialize)]
pub(crate) struct ChartNode {
    pub(crate) result: Option<Vec<ChartResult>>,
    pub(crate) error: Option<ChartError>,
}

#[derive(Deserialize)]
pub(crate) struct ChartError {
    pub(crate) code: String,
    pub(crate) description: String,
}

#[derive(Deserialize)]
pub(crate) struct ChartResult {
    #[serde(default)]
    pub(crate) meta: Option<MetaNode>,
    #[serde(default)]
    pub(crate) timestamp: Option<Vec<i64>>,
    #[serde(default)]
    pub(crate) indicators: Option<Indicators>,
}

#[derive(Deserialize)]
pub(crate) struct MetaNode {
    #[serde(default)]
    pub(crate) symbol: Option<String>,
    #[serde(default, rename = "regularMarketPrice")]
    pub(crate) regular_market_price: Option<f64>,
    #[serde(default, rename = "exchangeTimezoneName")]
    pub(crate) exchange_timezone_name: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct Indicators {
    #[serde(default)]
    pub(crate) quote: Vec<QuoteBlock>,
}

#[derive(Deserialize)]
pub(crate) struct QuoteBlock {
    #[serde(default)]
    pub(crate) close: Vec<Option<f64>>,
}

/// Decoded chart payload, independent of the envelope shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chart {
    /// Latest regular-session price reported in the chart metadata.
    pub regular_market_price: Option<f64>,
    /// IANA name of the exchange timezone, when reported.
    pub timezone: Option<String>,
    /// Bar timestamps (Unix seconds).
    pub timestamps: Vec<i64>,
    /// Close per bar; `None` where the provider returned null.
    pub closes: Vec<Option<f64>>,
}

pub(crate) fn decode_chart(body: &str) -> Result<Chart, PulseError> {
    let parsed: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| PulseError::Data(format!("json parse error: {e}")))?;

    let chart = parsed
        .chart
        .ok_or_else(|| PulseError::Data("missing chart".into()))?;

    if let Some(err) = chart.error {
        return Err(PulseError::Data(format!(
            "provider error: {} - {}",
            err.code, err.description
        )));
    }

    let r0 = chart
        .result
        .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
        .ok_or_else(|| PulseError::Data("empty result".into()))?;

    let meta = r0.meta;
    let closes = r0
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .map(|q| q.close)
        .unwrap_or_default();

    Ok(Chart {
        regular_market_price: meta.as_ref().and_then(|m| m.regular_market_price),
        timezone: meta.and_then(|m| m.exchange_timezone_name),
        timestamps: r0.timestamp.unwrap_or_default(),
        closes,
    })
}
