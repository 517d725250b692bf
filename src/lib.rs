//! # Backcast
//! Backcast is a deterministic historical backtesting engine for
//! discretionary and rule-based trading strategies over time-ordered OHLC
//! bar data. It replays bars from multiple instruments in global
//! chronological order, simulates order execution against four synthetic
//! intra-bar ticks (open, high, low, close), and maintains a portfolio
//! with realized/unrealized PnL accounting and per-trade statistics.
//!
//! ## Overview
//! The engine is built from a handful of components that interact through
//! plain traits and values:
//!
//! * **Instrument**: an immutable [`instrument::Catalog`] maps each symbol
//!   to its kind, tick size, big-point value and display name, plus
//!   per-provider [`instrument::InstrumentVariation`]s for re-expressing
//!   foreign prices.
//! * **Data**: the [`data::BarFeed`] trait produces bars in timestamp
//!   order. [`data::HistoricalBarFeed`] reads per-symbol CSV files and
//!   performs a K-way merge; exhaustion ends the replay.
//! * **Order**: [`order::Order`] pairs order data with a matching state
//!   machine across the twelve order shapes, including two-phase
//!   stop-limit arming and bar-count expiration.
//! * **Portfolio**: [`portfolio::Portfolio`] keeps a per-symbol
//!   append-only [`portfolio::TransactionLedger`], deriving positions,
//!   weighted-average cost, gross/net PnL, daily PnL series and per-trade
//!   statistics.
//! * **Broker**: [`broker::ReplayBroker`] owns the feed and the portfolio,
//!   executes the fixed intra-bar schedule for every bar, and notifies
//!   observers.
//! * **Strategy**: implementations of [`strategy::Strategy`] receive
//!   bar-open / bar-close / bar-closed / order-notification callbacks and
//!   place orders through the provided [`broker::StrategyCtx`].
//! * **Statistic**: [`statistic::summarize_trades`] aggregates closed
//!   trades and a daily PnL series into all/long/short
//!   [`statistic::TradeSummary`]s (profit factor, Sharpe, drawdown) using
//!   one-pass Welford accumulators.
//!
//! The engine is single-threaded and cooperative:
//! [`broker::ReplayBroker::run`] drives the whole computation on the
//! calling thread and every observer callback runs inline, which is what
//! makes replays deterministic.
//!
//! ## Example
//! ```no_run
//! use backcast::broker::{ReplayBroker, StrategyCtx};
//! use backcast::data::{Bar, BarHistory, HistoricalBarFeed};
//! use backcast::instrument::Catalog;
//! use backcast::strategy::Strategy;
//!
//! struct BuyTheFirstClose {
//!     done: bool,
//! }
//!
//! impl Strategy for BuyTheFirstClose {
//!     fn on_bar_close(&mut self, ctx: &mut StrategyCtx<'_>, _: &BarHistory, bar: &Bar) {
//!         if !self.done {
//!             ctx.enter_long(&bar.symbol, 1);
//!             self.done = true;
//!         }
//!     }
//! }
//!
//! let catalog = Catalog::from_json_file("catalog.json").unwrap();
//! let mut broker = ReplayBroker::new(HistoricalBarFeed::new(catalog));
//! broker.subscribe("ES");
//!
//! let mut strategy = BuyTheFirstClose { done: false };
//! broker.run(&mut strategy).unwrap();
//! println!("{:?}", broker.portfolio().trade_stats(broker.instrument("ES").unwrap()));
//! ```

pub mod broker;
pub mod data;
pub mod error;
pub mod instrument;
pub mod maths;
pub mod order;
pub mod portfolio;
pub mod statistic;
pub mod strategy;

#[doc(hidden)]
pub mod test_util;

pub use broker::{InstrumentPosition, ReplayBroker, StrategyCtx};
pub use data::{Bar, BarFeed, BarHistory, HistoricalBarFeed, Tick, Timespan};
pub use error::BackcastError;
pub use instrument::{Catalog, Instrument, InstrumentVariation};
pub use order::{Execution, Order, OrderKind, OrderNotification, POSITION_QUANTITY};
pub use portfolio::{Portfolio, TradeStats, Transaction, TransactionLedger};
pub use statistic::{TradeSummaries, TradeSummary};
pub use strategy::Strategy;
