//! Market data: bars, ticks, series containers and the bar feed.

pub mod error;
pub mod handler;
pub mod market;
pub mod series;

pub use error::DataError;
pub use handler::{BarFeed, HistoricalBarFeed};
pub use market::{Bar, Tick, Timespan};
pub use series::{BarHistory, ReverseVec, TimeSeries};
