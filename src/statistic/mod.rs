//! One-pass statistics over closed trades and daily PnL series.

pub mod algorithm;
pub mod summary;

pub use algorithm::{Welford, WelfordVariance};
pub use summary::{TradeSummaries, TradeSummary, TradeSummaryBuilder, summarize_trades};

/// Renders a statistics object as a table on stdout.
pub trait TablePrinter {
    fn print(&self);
}
