use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::PulseError;

/* ----- INSTRUMENTS ----- */

/// A logical instrument name bound to the symbol the provider knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Name used in API responses and file names (e.g. `danone`).
    pub name: String,
    /// Provider symbol (e.g. `BN.PA`).
    pub symbol: String,
}

impl Instrument {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// The fixed set of instruments the service tracks.
///
/// Built once at startup and never mutated afterwards. Lookups are by logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentSet {
    items: Vec<Instrument>,
}

impl InstrumentSet {
    /// Creates a set, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Config`] if the set is empty or a name appears twice.
    pub fn new(items: Vec<Instrument>) -> Result<Self, PulseError> {
        if items.is_empty() {
            return Err(PulseError::Config("instrument set is empty".into()));
        }
        for (i, inst) in items.iter().enumerate() {
            if items[..i].iter().any(|other| other.name == inst.name) {
                return Err(PulseError::Config(format!(
                    "duplicate instrument name '{}'",
                    inst.name
                )));
            }
        }
        Ok(Self { items })
    }

    /// Parses `name=SYMBOL,name=SYMBOL` (whitespace around entries is ignored).
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Config`] on a malformed entry or a duplicate name.
    pub fn parse(list: &str) -> Result<Self, PulseError> {
        let mut items = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, symbol) = entry
                .split_once('=')
                .map(|(n, s)| (n.trim(), s.trim()))
                .filter(|(n, s)| !n.is_empty() && !s.is_empty())
                .ok_or_else(|| {
                    PulseError::Config(format!("invalid instrument entry '{entry}'"))
                })?;
            items.push(Instrument::new(name, symbol));
        }
        Self::new(items)
    }

    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.items.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Instrument> {
        self.items.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for InstrumentSet {
    /// The three Euronext Paris listings the dashboard was built around.
    fn default() -> Self {
        Self {
            items: vec![
                Instrument::new("danone", "BN.PA"),
                Instrument::new("loreal", "OR.PA"),
                Instrument::new("airfrance", "AF.PA"),
            ],
        }
    }
}

/* ----- PRICES ----- */

/// Placeholder price reported for an instrument whose quote could not be fetched.
pub const UNAVAILABLE_PRICE: f64 = 0.0;

/// Instrument name → latest price. Always replaced as a whole.
pub type PriceSnapshot = BTreeMap<String, f64>;

/* ----- HISTORY ----- */

/// Closing prices for one instrument, as two parallel sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    /// ISO dates (`YYYY-MM-DD`).
    pub dates: Vec<String>,
    /// Closing values; missing closes are reported as `0`.
    pub values: Vec<f64>,
}

impl HistoricalSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Instrument name → history. Unavailable instruments map to an empty series.
pub type HistorySnapshot = BTreeMap<String, HistoricalSeries>;

/* ----- HISTORY PARAMS ----- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    D1,
    D5,
    M1,
    M3,
    M6,
    Y1,
    Y2,
    Y5,
    Ytd,
    Max,
}

impl Range {
    pub const fn as_str(self) -> &'static str {
        match self {
            Range::D1 => "1d",
            Range::D5 => "5d",
            Range::M1 => "1mo",
            Range::M3 => "3mo",
            Range::M6 => "6mo",
            Range::Y1 => "1y",
            Range::Y2 => "2y",
            Range::Y5 => "5y",
            Range::Ytd => "ytd",
            Range::Max => "max",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    I1m,
    I5m,
    I15m,
    I30m,
    I1h,
    D1,
    D5,
    W1,
    M1,
    M3,
}

impl Interval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Interval::I1m => "1m",
            Interval::I5m => "5m",
            Interval::I15m => "15m",
            Interval::I30m => "30m",
            Interval::I1h => "1h",
            Interval::D1 => "1d",
            Interval::D5 => "5d",
            Interval::W1 => "1wk",
            Interval::M1 => "1mo",
            Interval::M3 => "3mo",
        }
    }
}
