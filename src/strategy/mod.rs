//! The strategy observer surface.

use crate::broker::StrategyCtx;
use crate::data::market::Bar;
use crate::data::series::BarHistory;
use crate::order::OrderNotification;

/// Observer of the replay broker's event stream.
///
/// All callbacks run inline on the replay thread, in observer registration
/// order. The [`StrategyCtx`] carries the order-placement surface and
/// read-only state queries; orders submitted from a callback become
/// eligible at the next admission point of the intra-bar schedule.
///
/// `history` holds the closed bars for the event's `(symbol, timespan)`.
/// It is appended at bar-close, so `on_bar_open` sees the history up to
/// but excluding the bar that is forming.
pub trait Strategy {
    /// The bar has opened; only `bar.open` is observable.
    fn on_bar_open(&mut self, _ctx: &mut StrategyCtx<'_>, _history: &BarHistory, _bar: &Bar) {}

    /// The full bar is visible but still tradeable at the close.
    fn on_bar_close(&mut self, _ctx: &mut StrategyCtx<'_>, _history: &BarHistory, _bar: &Bar) {}

    /// No more activity will occur on this bar.
    fn on_bar_closed(&mut self, _ctx: &mut StrategyCtx<'_>, _history: &BarHistory, _bar: &Bar) {}

    /// An order fill was recorded during the last matching pass.
    fn on_order_notification(
        &mut self,
        _ctx: &mut StrategyCtx<'_>,
        _notification: &OrderNotification,
    ) {
    }
}
