//! Per-symbol transaction ledgers and the statistics derived from them.

use crate::data::series::TimeSeries;
use crate::instrument::Instrument;
use crate::statistic::summary::{TradeSummaries, summarize_trades};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

pub mod ledger;
pub mod trade;

pub use ledger::{PositionPnl, Transaction, TransactionLedger};
pub use trade::TradeStats;

/// A set of per-symbol transaction ledgers with position, PnL and
/// trade-statistics queries.
#[derive(Clone, Debug, Default)]
pub struct Portfolio {
    name: String,
    ledgers: HashMap<String, TransactionLedger>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ledgers: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers an instrument with an empty ledger. Registering the same
    /// symbol twice is integrator misuse.
    pub fn add_instrument(&mut self, instrument: &Instrument) {
        assert!(
            !self.ledgers.contains_key(instrument.symbol()),
            "instrument {} already registered",
            instrument.symbol()
        );
        self.ledgers
            .insert(instrument.symbol().to_owned(), TransactionLedger::new());
    }

    /// Appends a transaction to the instrument's ledger, creating the
    /// ledger on first use.
    pub fn append_transaction(
        &mut self,
        instrument: &Instrument,
        timestamp: DateTime<Utc>,
        quantity: i64,
        price: f64,
        fees: f64,
    ) {
        debug!(
            symbol = instrument.symbol(),
            %timestamp,
            quantity,
            price,
            "appending transaction"
        );
        self.ledgers
            .entry(instrument.symbol().to_owned())
            .or_default()
            .append(instrument, timestamp, quantity, price, fees);
    }

    pub fn ledger(&self, symbol: &str) -> Option<&TransactionLedger> {
        self.ledgers.get(symbol)
    }

    /// Realized/unrealized PnL of the instrument's open position at `price`.
    /// The caller must ensure a position exists.
    pub fn position_pnl(&self, instrument: &Instrument, price: f64) -> PositionPnl {
        self.ledgers
            .get(instrument.symbol())
            .expect("position PnL requires a ledger for the instrument")
            .position_pnl(instrument, price)
    }

    /// Derives a PnL series from price marks; `None` without a ledger.
    pub fn pnl(&self, instrument: &Instrument, prices: &TimeSeries) -> Option<TimeSeries> {
        self.ledgers
            .get(instrument.symbol())
            .map(|ledger| ledger.pnl(instrument, prices))
    }

    /// Per-trade statistics for the instrument; empty without a ledger.
    pub fn trade_stats(&self, instrument: &Instrument) -> Vec<TradeStats> {
        self.ledgers
            .get(instrument.symbol())
            .map(|ledger| ledger.trade_stats(instrument))
            .unwrap_or_default()
    }

    /// Per-trade statistics plus all/long/short summaries aggregated
    /// against the supplied daily PnL series.
    pub fn trade_stats_with_summary(
        &self,
        instrument: &Instrument,
        daily_pnl: &TimeSeries,
    ) -> (Vec<TradeStats>, TradeSummaries) {
        let stats = self.trade_stats(instrument);
        let summaries = summarize_trades(&stats, daily_pnl);
        (stats, summaries)
    }

    fn last_transaction(&self, symbol: &str) -> &Transaction {
        self.ledgers
            .get(symbol)
            .and_then(|ledger| ledger.last())
            .expect("no transactions for symbol")
    }

    pub fn quantity(&self, symbol: &str) -> i64 {
        self.last_transaction(symbol).quantity
    }

    pub fn price(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).price
    }

    pub fn value(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).value
    }

    pub fn average_cost(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).average_cost
    }

    pub fn position_quantity(&self, symbol: &str) -> i64 {
        self.last_transaction(symbol).position_quantity
    }

    pub fn position_average_cost(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).position_average_cost
    }

    pub fn gross_pnl(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).gross_pnl
    }

    pub fn net_pnl(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).net_pnl
    }

    pub fn fees(&self, symbol: &str) -> f64 {
        self.last_transaction(symbol).fees
    }
}
