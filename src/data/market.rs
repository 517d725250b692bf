use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Width of the window a [`Bar`] summarises, in seconds.
///
/// A plain seconds newtype rather than a [`chrono::Duration`] so that
/// `(symbol, timespan)` pairs can key hash maps.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timespan(i64);

impl Timespan {
    /// One day, the common width for end-of-day bar files.
    pub const DAY: Timespan = Timespan(86_400);

    pub fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }
}

impl Default for Timespan {
    fn default() -> Self {
        Self::DAY
    }
}

/// An OHLCV summary for one symbol over one time window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded volume; `None` when the source carries no volume column.
    pub volume: Option<u64>,
    /// Open interest; `None` when the source carries no interest column.
    pub open_interest: Option<u64>,
    pub timespan: Timespan,
    /// `true` on the final bar a historical reader produces for its symbol.
    pub is_last: bool,
}

impl Bar {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume: None,
            open_interest: None,
            timespan: Timespan::DAY,
            is_last: false,
        }
    }

    /// Returns true if the OHLC values are mutually consistent:
    /// `low <= open <= high` and `low <= close <= high`.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }

    /// The partial rendition of this bar published at the open: only the
    /// open price is observable, everything else is withheld.
    pub fn open_partial(&self) -> Bar {
        Bar {
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: None,
            open_interest: None,
            ..self.clone()
        }
    }
}

/// A synthetic price event used to drive the order matcher intra-bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: u64,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            price,
            volume: 0,
        }
    }
}
