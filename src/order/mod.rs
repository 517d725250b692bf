use crate::data::market::{Bar, Tick};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel exit quantity meaning "whatever closes the position".
pub const POSITION_QUANTITY: i64 = -1;

/// The twelve order shapes: {enter, exit} x {long, short} x
/// {market, limit, stop, stop-limit}.
///
/// Stop-limits carry their arming bit inline: once the stop trigger has
/// been touched without the limit being satisfiable, the order arms and
/// behaves as a plain limit order until filled or cancelled.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    EnterLong,
    EnterShort,
    ExitLong,
    ExitShort,
    EnterLongLimit { limit: f64 },
    EnterShortLimit { limit: f64 },
    ExitLongLimit { limit: f64 },
    ExitShortLimit { limit: f64 },
    EnterLongStop { stop: f64 },
    EnterShortStop { stop: f64 },
    ExitLongStop { stop: f64 },
    ExitShortStop { stop: f64 },
    EnterLongStopLimit { stop: f64, limit: f64, armed: bool },
    EnterShortStopLimit { stop: f64, limit: f64, armed: bool },
    ExitLongStopLimit { stop: f64, limit: f64, armed: bool },
    ExitShortStopLimit { stop: f64, limit: f64, armed: bool },
}

impl OrderKind {
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            OrderKind::EnterLong
                | OrderKind::EnterShort
                | OrderKind::EnterLongLimit { .. }
                | OrderKind::EnterShortLimit { .. }
                | OrderKind::EnterLongStop { .. }
                | OrderKind::EnterShortStop { .. }
                | OrderKind::EnterLongStopLimit { .. }
                | OrderKind::EnterShortStopLimit { .. }
        )
    }

    pub fn is_exit(&self) -> bool {
        !self.is_entry()
    }

    /// Buys open longs and close shorts; everything else sells.
    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            OrderKind::EnterLong
                | OrderKind::EnterLongLimit { .. }
                | OrderKind::EnterLongStop { .. }
                | OrderKind::EnterLongStopLimit { .. }
                | OrderKind::ExitShort
                | OrderKind::ExitShortLimit { .. }
                | OrderKind::ExitShortStop { .. }
                | OrderKind::ExitShortStopLimit { .. }
        )
    }

    pub fn is_sell(&self) -> bool {
        !self.is_buy()
    }
}

/// Order lifecycle state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Active,
    Filled,
    Cancelled,
}

/// The outcome of matching one order against one tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fill {
    pub price: f64,
    /// Absolute number of units filled.
    pub filled_quantity: i64,
    /// Signed quantity booked into the ledger: positive for buys,
    /// negative for sells.
    pub transaction_quantity: i64,
    pub new_position: i64,
}

/// An order submitted by a strategy, matched by the broker against the
/// synthetic intra-bar ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub symbol: String,
    pub kind: OrderKind,
    state: OrderState,
    pub quantity: i64,
    pub fill_price: Option<f64>,
    /// Remaining bars this order stays active for; negative means no expiry.
    bars_valid_for: i64,
    last_bar_seen: DateTime<Utc>,
    /// Free-form tag identifying the signal that placed the order.
    pub signal: Option<String>,
}

impl Order {
    fn new(symbol: impl Into<String>, quantity: i64, kind: OrderKind) -> Self {
        if kind.is_entry() {
            assert!(quantity > 0, "entry orders require quantity > 0");
        } else {
            assert!(
                quantity > 0 || quantity == POSITION_QUANTITY,
                "exit orders require quantity > 0 or POSITION_QUANTITY"
            );
        }
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            kind,
            state: OrderState::Active,
            quantity,
            fill_price: None,
            bars_valid_for: -1,
            last_bar_seen: DateTime::<Utc>::MIN_UTC,
            signal: None,
        }
    }

    pub fn enter_long(symbol: impl Into<String>, quantity: i64) -> Self {
        Self::new(symbol, quantity, OrderKind::EnterLong)
    }

    pub fn enter_long_limit(symbol: impl Into<String>, quantity: i64, limit: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::EnterLongLimit { limit })
    }

    pub fn enter_long_stop(symbol: impl Into<String>, quantity: i64, stop: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::EnterLongStop { stop })
    }

    pub fn enter_long_stop_limit(
        symbol: impl Into<String>,
        quantity: i64,
        stop: f64,
        limit: f64,
    ) -> Self {
        Self::new(
            symbol,
            quantity,
            OrderKind::EnterLongStopLimit {
                stop,
                limit,
                armed: false,
            },
        )
    }

    pub fn enter_short(symbol: impl Into<String>, quantity: i64) -> Self {
        Self::new(symbol, quantity, OrderKind::EnterShort)
    }

    pub fn enter_short_limit(symbol: impl Into<String>, quantity: i64, limit: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::EnterShortLimit { limit })
    }

    pub fn enter_short_stop(symbol: impl Into<String>, quantity: i64, stop: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::EnterShortStop { stop })
    }

    pub fn enter_short_stop_limit(
        symbol: impl Into<String>,
        quantity: i64,
        stop: f64,
        limit: f64,
    ) -> Self {
        Self::new(
            symbol,
            quantity,
            OrderKind::EnterShortStopLimit {
                stop,
                limit,
                armed: false,
            },
        )
    }

    pub fn exit_long(symbol: impl Into<String>, quantity: i64) -> Self {
        Self::new(symbol, quantity, OrderKind::ExitLong)
    }

    pub fn exit_long_limit(symbol: impl Into<String>, quantity: i64, limit: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::ExitLongLimit { limit })
    }

    pub fn exit_long_stop(symbol: impl Into<String>, quantity: i64, stop: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::ExitLongStop { stop })
    }

    pub fn exit_long_stop_limit(
        symbol: impl Into<String>,
        quantity: i64,
        stop: f64,
        limit: f64,
    ) -> Self {
        Self::new(
            symbol,
            quantity,
            OrderKind::ExitLongStopLimit {
                stop,
                limit,
                armed: false,
            },
        )
    }

    pub fn exit_short(symbol: impl Into<String>, quantity: i64) -> Self {
        Self::new(symbol, quantity, OrderKind::ExitShort)
    }

    pub fn exit_short_limit(symbol: impl Into<String>, quantity: i64, limit: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::ExitShortLimit { limit })
    }

    pub fn exit_short_stop(symbol: impl Into<String>, quantity: i64, stop: f64) -> Self {
        Self::new(symbol, quantity, OrderKind::ExitShortStop { stop })
    }

    pub fn exit_short_stop_limit(
        symbol: impl Into<String>,
        quantity: i64,
        stop: f64,
        limit: f64,
    ) -> Self {
        Self::new(
            symbol,
            quantity,
            OrderKind::ExitShortStopLimit {
                stop,
                limit,
                armed: false,
            },
        )
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == OrderState::Active
    }

    pub fn is_filled(&self) -> bool {
        self.state == OrderState::Filled
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == OrderState::Cancelled
    }

    pub fn is_armed(&self) -> bool {
        matches!(
            self.kind,
            OrderKind::EnterLongStopLimit { armed: true, .. }
                | OrderKind::EnterShortStopLimit { armed: true, .. }
                | OrderKind::ExitLongStopLimit { armed: true, .. }
                | OrderKind::ExitShortStopLimit { armed: true, .. }
        )
    }

    pub(crate) fn fill(&mut self) {
        self.state = OrderState::Filled;
    }

    pub(crate) fn cancel(&mut self) {
        self.state = OrderState::Cancelled;
    }

    /// Makes the order valid for `num_bars` bars, inclusive of the bar it
    /// is submitted on. `last_bar_seen` starts at the minimum timestamp so
    /// the first end-of-bar performs the first decrement.
    pub fn set_expiration(&mut self, num_bars: u32) {
        assert!(num_bars > 0, "orders must be valid for at least one bar");
        self.bars_valid_for = num_bars as i64;
        self.last_bar_seen = DateTime::<Utc>::MIN_UTC;
    }

    /// End-of-bar bookkeeping for expiring orders: decrement once per
    /// distinct bar, cancel when the counter reaches zero.
    pub(crate) fn update_state(&mut self, bar: &Bar) {
        if !self.is_active() || self.bars_valid_for < 0 {
            return;
        }
        debug_assert!(self.bars_valid_for > 0 || self.is_cancelled());
        if bar.timestamp != self.last_bar_seen {
            self.bars_valid_for -= 1;
            if self.bars_valid_for == 0 {
                self.cancel();
            } else {
                self.last_bar_seen = bar.timestamp;
            }
        }
    }

    /// Absolute quantity an exit fills: `min(quantity, |position|)`, or the
    /// whole position for the [`POSITION_QUANTITY`] sentinel.
    fn fill_quantity(&self, position: i64) -> i64 {
        debug_assert!(self.quantity > 0 || self.quantity == POSITION_QUANTITY);
        if self.quantity > 0 {
            self.quantity.min(position.abs())
        } else {
            position.abs()
        }
    }

    /// Matches this order against one synthetic tick.
    ///
    /// `execute_on_limit_or_stop` selects the fill price for triggered
    /// limit/stop orders: the trigger price during the intra-bar high/low
    /// passes, the printed tick price at the open and close.
    pub fn try_fill(
        &mut self,
        tick: &Tick,
        position: i64,
        execute_on_limit_or_stop: bool,
    ) -> Option<Fill> {
        if !self.is_active() {
            return None;
        }

        let quantity = self.quantity;
        let fill_quantity = self.fill_quantity(position);
        let buys = self.kind.is_buy();

        // (fill price, filled quantity, new position) per the matching
        // table; the transaction sign follows the order side.
        let outcome: Option<(f64, i64, i64)> = match &mut self.kind {
            // market orders
            OrderKind::EnterLong if position == 0 => Some((tick.price, quantity, quantity)),
            OrderKind::EnterShort if position == 0 => Some((tick.price, quantity, -quantity)),
            OrderKind::ExitLong if position > 0 => Some((tick.price, fill_quantity, 0)),
            OrderKind::ExitShort if position < 0 => Some((tick.price, fill_quantity, 0)),

            // limit orders
            OrderKind::EnterLongLimit { limit } if position == 0 && tick.price <= *limit => {
                let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                Some((price, quantity, quantity))
            }
            OrderKind::ExitShortLimit { limit } if position < 0 && tick.price <= *limit => {
                let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                Some((price, fill_quantity, 0))
            }
            OrderKind::EnterShortLimit { limit } if position == 0 && *limit <= tick.price => {
                let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                Some((price, quantity, -quantity))
            }
            OrderKind::ExitLongLimit { limit } if position > 0 && *limit <= tick.price => {
                let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                Some((price, fill_quantity, 0))
            }

            // stop orders
            OrderKind::EnterLongStop { stop } if position == 0 && *stop <= tick.price => {
                let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                Some((price, quantity, quantity))
            }
            OrderKind::ExitShortStop { stop } if position < 0 && *stop <= tick.price => {
                let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                Some((price, fill_quantity, 0))
            }
            OrderKind::ExitLongStop { stop } if position > 0 && *stop >= tick.price => {
                let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                Some((price, fill_quantity, 0))
            }
            OrderKind::EnterShortStop { stop } if position == 0 && *stop >= tick.price => {
                let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                Some((price, quantity, -quantity))
            }

            // stop-limit orders: armed behaves as a plain limit, otherwise
            // the stop triggers and the limit filters the same pass
            OrderKind::EnterLongStopLimit { stop, limit, armed } if position == 0 => {
                if *armed {
                    if tick.price <= *limit {
                        let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                        Some((price, quantity, quantity))
                    } else {
                        None
                    }
                } else if *stop <= tick.price {
                    if tick.price <= *limit || (execute_on_limit_or_stop && *stop <= *limit) {
                        let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                        Some((price, quantity, quantity))
                    } else {
                        *armed = true;
                        None
                    }
                } else {
                    None
                }
            }
            OrderKind::EnterShortStopLimit { stop, limit, armed } if position == 0 => {
                if *armed {
                    if *limit <= tick.price {
                        let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                        Some((price, quantity, -quantity))
                    } else {
                        None
                    }
                } else if *stop >= tick.price {
                    if *limit <= tick.price || (execute_on_limit_or_stop && *stop >= *limit) {
                        let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                        Some((price, quantity, -quantity))
                    } else {
                        *armed = true;
                        None
                    }
                } else {
                    None
                }
            }
            OrderKind::ExitLongStopLimit { stop, limit, armed } if position > 0 => {
                if *armed {
                    if *limit <= tick.price {
                        let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                        Some((price, fill_quantity, 0))
                    } else {
                        None
                    }
                } else if *stop >= tick.price {
                    if *limit <= tick.price || (execute_on_limit_or_stop && *limit <= *stop) {
                        let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                        Some((price, fill_quantity, 0))
                    } else {
                        *armed = true;
                        None
                    }
                } else {
                    None
                }
            }
            OrderKind::ExitShortStopLimit { stop, limit, armed } if position < 0 => {
                if *armed {
                    if tick.price <= *limit {
                        let price = if execute_on_limit_or_stop { *limit } else { tick.price };
                        Some((price, fill_quantity, 0))
                    } else {
                        None
                    }
                } else if *stop <= tick.price {
                    if tick.price <= *limit || (execute_on_limit_or_stop && *stop <= *limit) {
                        let price = if execute_on_limit_or_stop { *stop } else { tick.price };
                        Some((price, fill_quantity, 0))
                    } else {
                        *armed = true;
                        None
                    }
                } else {
                    None
                }
            }

            _ => None,
        };

        outcome.map(|(price, filled_quantity, new_position)| Fill {
            price,
            filled_quantity,
            transaction_quantity: if buys { filled_quantity } else { -filled_quantity },
            new_position,
        })
    }
}

/// The realized counterpart of an order fill; quantity is always absolute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub quantity: u64,
}

impl Execution {
    pub fn new(timestamp: DateTime<Utc>, price: f64, quantity: u64) -> Self {
        Self {
            timestamp,
            price,
            quantity,
        }
    }
}

/// Snapshot of an order and the execution that changed it, delivered to
/// strategy observers after each matching pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderNotification {
    pub order: Order,
    pub execution: Execution,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tick(price: f64) -> Tick {
        Tick::new("ES", Utc.with_ymd_and_hms(2014, 1, 2, 11, 0, 1).unwrap(), price)
    }

    fn bar_at(day: u32) -> Bar {
        Bar::new(
            "ES",
            Utc.with_ymd_and_hms(2014, 1, day, 17, 0, 0).unwrap(),
            100.0,
            101.0,
            99.0,
            100.5,
        )
    }

    #[test]
    fn enter_long_market_fills_flat_only() {
        let mut order = Order::enter_long("ES", 2);

        assert_eq!(order.try_fill(&tick(100.0), 1, false), None);

        let fill = order.try_fill(&tick(100.0), 0, false).unwrap();
        assert_eq!(fill.price, 100.0);
        assert_eq!(fill.filled_quantity, 2);
        assert_eq!(fill.transaction_quantity, 2);
        assert_eq!(fill.new_position, 2);
    }

    #[test]
    fn enter_short_market_fills_flat_only() {
        let mut order = Order::enter_short("ES", 3);

        assert_eq!(order.try_fill(&tick(100.0), -1, false), None);

        let fill = order.try_fill(&tick(100.0), 0, false).unwrap();
        assert_eq!(fill.transaction_quantity, -3);
        assert_eq!(fill.new_position, -3);
    }

    #[test]
    fn exit_long_market_closes_the_whole_position() {
        let mut order = Order::exit_long("ES", POSITION_QUANTITY);

        assert_eq!(order.try_fill(&tick(100.0), 0, false), None);
        assert_eq!(order.try_fill(&tick(100.0), -2, false), None);

        let fill = order.try_fill(&tick(100.0), 3, false).unwrap();
        assert_eq!(fill.filled_quantity, 3);
        assert_eq!(fill.transaction_quantity, -3);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn exit_short_market_requires_a_short_position() {
        let mut order = Order::exit_short("ES", POSITION_QUANTITY);

        assert_eq!(order.try_fill(&tick(100.0), 0, false), None);
        assert_eq!(order.try_fill(&tick(100.0), 2, false), None);

        let fill = order.try_fill(&tick(100.0), -2, false).unwrap();
        assert_eq!(fill.filled_quantity, 2);
        assert_eq!(fill.transaction_quantity, 2);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn exit_caps_the_fill_at_the_position_size() {
        let mut order = Order::exit_long("ES", 5);

        let fill = order.try_fill(&tick(100.0), 2, false).unwrap();
        assert_eq!(fill.filled_quantity, 2);
        assert_eq!(fill.transaction_quantity, -2);
    }

    #[test]
    fn enter_long_limit_fills_at_or_below_the_limit() {
        let mut order = Order::enter_long_limit("ES", 1, 99.0);

        assert_eq!(order.try_fill(&tick(99.5), 0, false), None);

        // At the open/close the printed price fills
        let fill = order.try_fill(&tick(98.5), 0, false).unwrap();
        assert_eq!(fill.price, 98.5);
        assert_eq!(fill.transaction_quantity, 1);

        // Intra-bar the limit price fills
        let mut order = Order::enter_long_limit("ES", 1, 99.0);
        let fill = order.try_fill(&tick(98.5), 0, true).unwrap();
        assert_eq!(fill.price, 99.0);
    }

    #[test]
    fn enter_short_limit_fills_at_or_above_the_limit() {
        let mut order = Order::enter_short_limit("ES", 1, 101.0);

        assert_eq!(order.try_fill(&tick(100.5), 0, true), None);

        let fill = order.try_fill(&tick(101.5), 0, true).unwrap();
        assert_eq!(fill.price, 101.0);
        assert_eq!(fill.transaction_quantity, -1);
        assert_eq!(fill.new_position, -1);
    }

    #[test]
    fn exit_long_limit_sells_into_strength() {
        let mut order = Order::exit_long_limit("ES", POSITION_QUANTITY, 101.0);

        assert_eq!(order.try_fill(&tick(100.0), 2, true), None);
        assert_eq!(order.try_fill(&tick(101.5), 0, true), None);

        let fill = order.try_fill(&tick(101.5), 2, true).unwrap();
        assert_eq!(fill.price, 101.0);
        assert_eq!(fill.transaction_quantity, -2);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn exit_short_limit_covers_into_weakness() {
        let mut order = Order::exit_short_limit("ES", POSITION_QUANTITY, 99.0);

        assert_eq!(order.try_fill(&tick(99.5), -2, true), None);

        let fill = order.try_fill(&tick(98.5), -2, true).unwrap();
        assert_eq!(fill.price, 99.0);
        assert_eq!(fill.transaction_quantity, 2);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn enter_long_stop_buys_above_the_trigger() {
        let mut order = Order::enter_long_stop("ES", 2, 101.0);

        assert_eq!(order.try_fill(&tick(100.5), 0, true), None);

        let fill = order.try_fill(&tick(101.5), 0, true).unwrap();
        assert_eq!(fill.price, 101.0);
        // Opening a long books a positive transaction
        assert_eq!(fill.transaction_quantity, 2);
        assert_eq!(fill.new_position, 2);
    }

    #[test]
    fn enter_short_stop_sells_below_the_trigger() {
        let mut order = Order::enter_short_stop("ES", 2, 99.0);

        assert_eq!(order.try_fill(&tick(99.5), 0, true), None);

        let fill = order.try_fill(&tick(98.5), 0, true).unwrap();
        assert_eq!(fill.price, 99.0);
        assert_eq!(fill.transaction_quantity, -2);
        assert_eq!(fill.new_position, -2);
    }

    #[test]
    fn exit_long_stop_is_a_protective_sell() {
        let mut order = Order::exit_long_stop("ES", POSITION_QUANTITY, 99.0);

        assert_eq!(order.try_fill(&tick(99.5), 2, true), None);

        let fill = order.try_fill(&tick(98.5), 2, true).unwrap();
        assert_eq!(fill.price, 99.0);
        assert_eq!(fill.transaction_quantity, -2);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn exit_short_stop_is_a_protective_buy() {
        let mut order = Order::exit_short_stop("ES", POSITION_QUANTITY, 101.0);

        assert_eq!(order.try_fill(&tick(100.5), -2, true), None);

        let fill = order.try_fill(&tick(101.5), -2, true).unwrap();
        assert_eq!(fill.price, 101.0);
        assert_eq!(fill.transaction_quantity, 2);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn stop_limit_arms_when_the_limit_is_unreachable() {
        // Stop above the limit: a gap through the stop cannot satisfy the
        // limit in the same pass
        let mut order = Order::enter_long_stop_limit("ES", 1, 100.0, 99.0);

        assert_eq!(order.try_fill(&tick(101.0), 0, true), None);
        assert!(order.is_armed());
        assert!(order.is_active());

        // Armed: plain limit at 99
        let fill = order.try_fill(&tick(98.0), 0, true).unwrap();
        assert_eq!(fill.price, 99.0);
        assert_eq!(fill.transaction_quantity, 1);
        assert_eq!(fill.new_position, 1);
    }

    #[test]
    fn stop_limit_fills_in_one_pass_when_stop_at_or_below_limit() {
        let mut order = Order::enter_long_stop_limit("ES", 1, 100.0, 100.5);

        let fill = order.try_fill(&tick(101.0), 0, true).unwrap();
        assert_eq!(fill.price, 100.0);
        assert!(!order.is_armed());
    }

    #[test]
    fn stop_limit_fills_on_the_tick_when_the_limit_allows_it() {
        let mut order = Order::enter_long_stop_limit("ES", 1, 100.0, 102.0);

        // Tick within the limit at the open: fills at the printed price
        let fill = order.try_fill(&tick(101.0), 0, false).unwrap();
        assert_eq!(fill.price, 101.0);
    }

    #[test]
    fn short_stop_limit_arms_and_fills_symmetrically() {
        let mut order = Order::enter_short_stop_limit("ES", 1, 100.0, 101.0);

        assert_eq!(order.try_fill(&tick(99.0), 0, true), None);
        assert!(order.is_armed());

        let fill = order.try_fill(&tick(102.0), 0, true).unwrap();
        assert_eq!(fill.price, 101.0);
        assert_eq!(fill.transaction_quantity, -1);
        assert_eq!(fill.new_position, -1);
    }

    #[test]
    fn exit_stop_limits_respect_position_preconditions() {
        let mut long_exit = Order::exit_long_stop_limit("ES", POSITION_QUANTITY, 99.0, 98.0);
        assert_eq!(long_exit.try_fill(&tick(97.0), 0, true), None);
        assert!(!long_exit.is_armed());

        let mut short_exit = Order::exit_short_stop_limit("ES", POSITION_QUANTITY, 101.0, 102.0);
        assert_eq!(short_exit.try_fill(&tick(103.0), 0, true), None);
        assert!(!short_exit.is_armed());
    }

    #[test]
    fn exit_long_stop_limit_arms_then_fills_as_a_limit() {
        // Stop 99 with limit 100: a crash through the stop cannot satisfy
        // the limit in the same pass
        let mut order = Order::exit_long_stop_limit("ES", POSITION_QUANTITY, 99.0, 100.0);

        assert_eq!(order.try_fill(&tick(98.0), 2, true), None);
        assert!(order.is_armed());

        let fill = order.try_fill(&tick(100.5), 2, true).unwrap();
        assert_eq!(fill.price, 100.0);
        assert_eq!(fill.transaction_quantity, -2);
        assert_eq!(fill.new_position, 0);
    }

    #[test]
    fn filled_and_cancelled_orders_never_match() {
        let mut order = Order::enter_long("ES", 1);
        order.fill();
        assert_eq!(order.try_fill(&tick(100.0), 0, false), None);

        let mut order = Order::enter_long("ES", 1);
        order.cancel();
        assert_eq!(order.try_fill(&tick(100.0), 0, false), None);
    }

    #[test]
    fn expiration_counts_distinct_bars_inclusive_of_submission() {
        let mut order = Order::enter_long_stop_limit("ES", 1, 100.0, 99.0);
        order.set_expiration(3);

        // Submission bar
        order.update_state(&bar_at(2));
        assert!(order.is_active());
        // Second bar
        order.update_state(&bar_at(3));
        assert!(order.is_active());
        // Third bar: counter reaches zero
        order.update_state(&bar_at(6));
        assert!(order.is_cancelled());
    }

    #[test]
    fn expiration_ignores_repeated_bars() {
        let mut order = Order::enter_long_stop_limit("ES", 1, 100.0, 99.0);
        order.set_expiration(2);

        order.update_state(&bar_at(2));
        order.update_state(&bar_at(2));
        order.update_state(&bar_at(2));
        assert!(order.is_active());

        order.update_state(&bar_at(3));
        assert!(order.is_cancelled());
    }

    #[test]
    fn orders_without_expiration_never_expire() {
        let mut order = Order::enter_long("ES", 1);
        for day in 2..20 {
            order.update_state(&bar_at(day));
        }
        assert!(order.is_active());
    }

    #[test]
    #[should_panic(expected = "quantity > 0")]
    fn entry_with_non_positive_quantity_panics() {
        Order::enter_long("ES", 0);
    }

    #[test]
    #[should_panic(expected = "POSITION_QUANTITY")]
    fn exit_with_invalid_sentinel_panics() {
        Order::exit_long("ES", -2);
    }

    #[test]
    fn kind_classifies_side_and_intent() {
        assert!(Order::enter_long("ES", 1).kind.is_entry());
        assert!(Order::enter_long("ES", 1).kind.is_buy());
        assert!(Order::exit_long("ES", 1).kind.is_exit());
        assert!(Order::exit_long("ES", 1).kind.is_sell());
        assert!(Order::exit_short("ES", 1).kind.is_buy());
        assert!(Order::enter_short_stop("ES", 1, 99.0).kind.is_sell());
        assert!(Order::exit_short_stop_limit("ES", 1, 101.0, 102.0).kind.is_buy());
    }
}
