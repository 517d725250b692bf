//! Shared fixtures for unit and integration tests.

use crate::data::error::DataError;
use crate::data::handler::BarFeed;
use crate::data::market::Bar;
use crate::instrument::{Catalog, Instrument};
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;

/// A catalog with the futures the tests trade.
pub fn es_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog
        .insert_instrument(Instrument::future_named("ES", 0.25, 50.0, "E-mini S&P 500"))
        .unwrap();
    catalog
        .insert_instrument(Instrument::future_named("YM", 1.0, 5.0, "Mini Dow"))
        .unwrap();
    catalog
}

/// A daily bar on the given January 2014 day, stamped at 17:00 UTC.
pub fn bar(symbol: &str, day: u32, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(
        symbol,
        Utc.with_ymd_and_hms(2014, 1, day, 17, 0, 0).unwrap(),
        open,
        high,
        low,
        close,
    )
}

/// [`BarFeed`] over a pre-merged bar sequence, for driving the broker
/// without files.
pub struct SequenceBarFeed {
    catalog: Catalog,
    bars: VecDeque<Bar>,
}

impl SequenceBarFeed {
    pub fn new(catalog: Catalog, bars: Vec<Bar>) -> Self {
        Self {
            catalog,
            bars: bars.into(),
        }
    }

    /// Pops the next bar directly, bypassing the `Result` wrapper.
    pub fn pop_bar(&mut self) -> Option<Bar> {
        self.bars.pop_front()
    }
}

impl BarFeed for SequenceBarFeed {
    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn subscribe(&mut self, _symbol: &str) {}

    fn unsubscribe(&mut self, symbol: &str) {
        self.bars.retain(|bar| bar.symbol != symbol);
    }

    fn reset(&mut self) {
        self.bars.clear();
    }

    fn next_bar(&mut self) -> Result<Option<Bar>, DataError> {
        Ok(self.bars.pop_front())
    }
}
