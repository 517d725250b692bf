use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistics for one closed trade: a maximal flat-to-flat run of
/// transactions in one symbol's ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeStats {
    pub symbol: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Quantity of the opening transaction.
    pub initial_position: i64,
    /// Signed position at its largest absolute size during the trade.
    pub max_position: i64,
    pub num_transactions: u64,
    /// Cost basis observed at the moment the maximum position was reached.
    pub max_notional_cost: f64,
    pub pnl: f64,
    /// PnL relative to the maximum notional committed.
    pub pct_pnl: f64,
    /// PnL expressed in instrument ticks.
    pub tick_pnl: f64,
    pub fees: f64,
}

impl fmt::Display for TradeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} : {} : {} : {} : {} : {} : {} : {}",
            self.start.format("%Y%m%d"),
            self.end.format("%Y%m%d"),
            self.initial_position,
            self.max_position,
            self.num_transactions,
            self.max_notional_cost,
            self.pnl,
            self.pct_pnl,
            self.fees,
        )
    }
}
