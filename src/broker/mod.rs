//! The replay broker: drives the bar feed, matches orders against the four
//! synthetic intra-bar ticks, and keeps the portfolio and observers in sync.

use crate::data::error::DataError;
use crate::data::handler::BarFeed;
use crate::data::market::{Bar, Tick, Timespan};
use crate::data::series::BarHistory;
use crate::instrument::{Catalog, Instrument, InstrumentVariation};
use crate::maths::sign;
use crate::order::{Execution, Order, OrderNotification, POSITION_QUANTITY};
use crate::portfolio::{Portfolio, PositionPnl};
use crate::strategy::Strategy;
use chrono::{DateTime, NaiveTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

/// Signed net holding for one instrument and when it last changed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InstrumentPosition {
    pub position: i64,
    pub since: DateTime<Utc>,
}

impl Default for InstrumentPosition {
    fn default() -> Self {
        Self {
            position: 0,
            since: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Per-instrument runtime state owned exclusively by the broker.
struct InstrumentCb {
    instrument: Instrument,
    position: InstrumentPosition,
    /// Orders eligible for matching.
    orders: Vec<Order>,
    /// Submitted orders awaiting the next admission point.
    new_orders: Vec<Order>,
    executions: Vec<Execution>,
    /// Fills awaiting delivery to observers.
    notifications: Vec<OrderNotification>,
}

impl InstrumentCb {
    fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            position: InstrumentPosition::default(),
            orders: Vec::new(),
            new_orders: Vec::new(),
            executions: Vec::new(),
            notifications: Vec::new(),
        }
    }
}

/// The command surface handed to strategy callbacks.
///
/// Submissions queue in the broker and become eligible for matching at the
/// next admission point of the intra-bar schedule. Everything else is a
/// read-only view of broker state.
pub struct StrategyCtx<'a> {
    pending: &'a mut Vec<Order>,
    control: &'a HashMap<String, InstrumentCb>,
    portfolio: &'a Portfolio,
    catalog: &'a Catalog,
}

impl StrategyCtx<'_> {
    pub fn submit_order(&mut self, order: Order) {
        self.pending.push(order);
    }

    pub fn enter_long(&mut self, symbol: &str, quantity: i64) {
        self.submit_order(Order::enter_long(symbol, quantity));
    }

    pub fn enter_long_limit(&mut self, symbol: &str, limit_price: f64, quantity: i64) {
        self.submit_order(Order::enter_long_limit(symbol, quantity, limit_price));
    }

    pub fn enter_long_stop(&mut self, symbol: &str, stop_price: f64, quantity: i64) {
        self.submit_order(Order::enter_long_stop(symbol, quantity, stop_price));
    }

    pub fn enter_long_stop_limit(
        &mut self,
        symbol: &str,
        stop_price: f64,
        limit_price: f64,
        quantity: i64,
    ) {
        self.submit_order(Order::enter_long_stop_limit(
            symbol,
            quantity,
            stop_price,
            limit_price,
        ));
    }

    /// Stop-limit entry valid for `bars_valid_for` bars, inclusive of the
    /// submission bar.
    pub fn enter_long_stop_limit_for(
        &mut self,
        symbol: &str,
        stop_price: f64,
        limit_price: f64,
        quantity: i64,
        bars_valid_for: u32,
    ) {
        let mut order = Order::enter_long_stop_limit(symbol, quantity, stop_price, limit_price);
        order.set_expiration(bars_valid_for);
        self.submit_order(order);
    }

    pub fn enter_short(&mut self, symbol: &str, quantity: i64) {
        self.submit_order(Order::enter_short(symbol, quantity));
    }

    pub fn enter_short_limit(&mut self, symbol: &str, limit_price: f64, quantity: i64) {
        self.submit_order(Order::enter_short_limit(symbol, quantity, limit_price));
    }

    pub fn enter_short_stop(&mut self, symbol: &str, stop_price: f64, quantity: i64) {
        self.submit_order(Order::enter_short_stop(symbol, quantity, stop_price));
    }

    pub fn enter_short_stop_limit(
        &mut self,
        symbol: &str,
        stop_price: f64,
        limit_price: f64,
        quantity: i64,
    ) {
        self.submit_order(Order::enter_short_stop_limit(
            symbol,
            quantity,
            stop_price,
            limit_price,
        ));
    }

    pub fn enter_short_stop_limit_for(
        &mut self,
        symbol: &str,
        stop_price: f64,
        limit_price: f64,
        quantity: i64,
        bars_valid_for: u32,
    ) {
        let mut order = Order::enter_short_stop_limit(symbol, quantity, stop_price, limit_price);
        order.set_expiration(bars_valid_for);
        self.submit_order(order);
    }

    pub fn exit_long(&mut self, symbol: &str, quantity: i64) {
        self.submit_order(Order::exit_long(symbol, quantity));
    }

    pub fn exit_long_limit(&mut self, symbol: &str, limit_price: f64, quantity: i64) {
        self.submit_order(Order::exit_long_limit(symbol, quantity, limit_price));
    }

    pub fn exit_long_stop(&mut self, symbol: &str, stop_price: f64, quantity: i64) {
        self.submit_order(Order::exit_long_stop(symbol, quantity, stop_price));
    }

    pub fn exit_long_stop_limit(
        &mut self,
        symbol: &str,
        stop_price: f64,
        limit_price: f64,
        quantity: i64,
    ) {
        self.submit_order(Order::exit_long_stop_limit(
            symbol,
            quantity,
            stop_price,
            limit_price,
        ));
    }

    pub fn exit_short(&mut self, symbol: &str, quantity: i64) {
        self.submit_order(Order::exit_short(symbol, quantity));
    }

    pub fn exit_short_limit(&mut self, symbol: &str, limit_price: f64, quantity: i64) {
        self.submit_order(Order::exit_short_limit(symbol, quantity, limit_price));
    }

    pub fn exit_short_stop(&mut self, symbol: &str, stop_price: f64, quantity: i64) {
        self.submit_order(Order::exit_short_stop(symbol, quantity, stop_price));
    }

    pub fn exit_short_stop_limit(
        &mut self,
        symbol: &str,
        stop_price: f64,
        limit_price: f64,
        quantity: i64,
    ) {
        self.submit_order(Order::exit_short_stop_limit(
            symbol,
            quantity,
            stop_price,
            limit_price,
        ));
    }

    /// Exits the whole position, whatever its size.
    pub fn exit_long_position(&mut self, symbol: &str) {
        self.exit_long(symbol, POSITION_QUANTITY);
    }

    pub fn exit_short_position(&mut self, symbol: &str) {
        self.exit_short(symbol, POSITION_QUANTITY);
    }

    /// The instrument's current position; flat when no orders ever touched
    /// the symbol.
    pub fn position(&self, symbol: &str) -> InstrumentPosition {
        self.control
            .get(symbol)
            .map(|cb| cb.position)
            .unwrap_or_default()
    }

    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.catalog.instrument(symbol)
    }

    pub fn variation(&self, provider: &str, symbol: &str) -> Option<&InstrumentVariation> {
        self.catalog.variation(provider, symbol)
    }

    /// Realized/unrealized PnL of the open position marked at `price`.
    /// The caller must ensure a position exists.
    pub fn position_pnl(&self, symbol: &str, price: f64) -> PositionPnl {
        let instrument = self
            .catalog
            .instrument(symbol)
            .unwrap_or_else(|| panic!("unknown instrument {symbol}"));
        self.portfolio.position_pnl(instrument, price)
    }

    pub fn portfolio(&self) -> &Portfolio {
        self.portfolio
    }
}

/// Replays historical bars through a deterministic intra-bar schedule.
///
/// For every bar the broker admits pending orders, matches the active list
/// against synthetic open/high/low/close ticks, posts fill notifications,
/// publishes the bar-open / bar-close / bar-closed events, and finally
/// expires and prunes orders. See [`ReplayBroker::process_bar`].
pub struct ReplayBroker<Feed: BarFeed> {
    feed: Feed,
    portfolio: Portfolio,
    control: HashMap<String, InstrumentCb>,
    histories: HashMap<(String, Timespan), BarHistory>,
    pending: Vec<Order>,
}

impl<Feed: BarFeed> ReplayBroker<Feed> {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            portfolio: Portfolio::new("default"),
            control: HashMap::new(),
            histories: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut Feed {
        &mut self.feed
    }

    pub fn subscribe(&mut self, symbol: &str) {
        self.feed.subscribe(symbol);
    }

    pub fn unsubscribe(&mut self, symbol: &str) {
        self.feed.unsubscribe(symbol);
    }

    /// Queues an order for the next admission point.
    pub fn submit_order(&mut self, order: Order) {
        let cb = Self::lookup_cb(&mut self.control, self.feed.catalog(), &order.symbol);
        cb.new_orders.push(order);
    }

    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.feed.catalog().instrument(symbol)
    }

    pub fn variation(&self, provider: &str, symbol: &str) -> Option<&InstrumentVariation> {
        self.feed.catalog().variation(provider, symbol)
    }

    pub fn position(&self, symbol: &str) -> Option<InstrumentPosition> {
        self.control.get(symbol).map(|cb| cb.position)
    }

    /// Realized/unrealized PnL of the open position marked at `price`.
    /// The caller must ensure a position exists.
    pub fn position_pnl(&self, symbol: &str, price: f64) -> PositionPnl {
        let instrument = self
            .instrument(symbol)
            .unwrap_or_else(|| panic!("unknown instrument {symbol}"));
        self.portfolio.position_pnl(instrument, price)
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn executions(&self, symbol: &str) -> &[Execution] {
        self.control
            .get(symbol)
            .map(|cb| cb.executions.as_slice())
            .unwrap_or(&[])
    }

    /// The instrument's surviving (active) orders.
    pub fn orders(&self, symbol: &str) -> &[Order] {
        self.control
            .get(symbol)
            .map(|cb| cb.orders.as_slice())
            .unwrap_or(&[])
    }

    /// Drops all per-instrument runtime data and resets the feed. The
    /// catalog configuration survives.
    pub fn reset(&mut self) {
        self.control.clear();
        self.histories.clear();
        self.pending.clear();
        self.feed.reset();
    }

    /// Replays the feed to exhaustion against a single strategy.
    pub fn run(&mut self, strategy: &mut dyn Strategy) -> Result<(), DataError> {
        self.run_multi(&mut [strategy])
    }

    /// Replays the feed to exhaustion. Observers are invoked in slice
    /// order for every event.
    pub fn run_multi(&mut self, strategies: &mut [&mut dyn Strategy]) -> Result<(), DataError> {
        info!(portfolio = self.portfolio.name(), "starting replay");
        let mut bars = 0u64;
        while let Some(bar) = self.feed.next_bar()? {
            self.process_bar(&bar, strategies);
            bars += 1;
        }
        info!(bars, "replay complete");
        Ok(())
    }

    /// The intra-bar schedule. Ordering preserves two contracts: a
    /// strategy acting on the close trades at the close (steps 10-12), and
    /// stop/limit orders fill at their trigger price only during the
    /// intra-bar high/low passes where that price is not directly printed.
    fn process_bar(&mut self, bar: &Bar, strategies: &mut [&mut dyn Strategy]) {
        // 1. Everything submitted so far becomes eligible
        self.admit_new_orders(&bar.symbol);

        // 2. Match at the open; limit/stop orders fill on the printed tick
        let tick = Self::synthetic_tick(bar, 9, bar.open);
        self.process_orders(&bar.symbol, &tick, false);

        // 3. Deliver fills from the open
        self.post_notifications(strategies, &bar.symbol);

        // 4. Publish the bar open; only the open price is observable
        self.notify_bar_open(strategies, bar);

        // 5. Pick up orders submitted during steps 3 and 4
        self.admit_new_orders(&bar.symbol);

        // 6. Match at the high; triggered orders fill at their price
        let tick = Self::synthetic_tick(bar, 11, bar.high);
        self.process_orders(&bar.symbol, &tick, true);

        // 7. Deliver fills. No admission here: orders submitted during the
        // high pass are not eligible at the low
        self.post_notifications(strategies, &bar.symbol);

        // 8. Match at the low
        let tick = Self::synthetic_tick(bar, 13, bar.low);
        self.process_orders(&bar.symbol, &tick, true);

        // 9. Deliver fills from the low
        self.post_notifications(strategies, &bar.symbol);

        // 10. Publish the full bar; close-driven strategies decide here
        self.notify_bar_close(strategies, bar);

        // 11. Orders placed at the close become eligible at the close
        self.admit_new_orders(&bar.symbol);

        // 12. Match at the close on the printed tick
        let tick = Self::synthetic_tick(bar, 16, bar.close);
        self.process_orders(&bar.symbol, &tick, false);

        // 13. Deliver fills from the close
        self.post_notifications(strategies, &bar.symbol);

        // 14. No more activity this bar
        self.notify_bar_closed(strategies, bar);

        // 15. Admit once more; eligibility starts next bar
        self.admit_new_orders(&bar.symbol);

        // 16. Expire and prune now that no notification references remain
        self.cleanup_orders(bar);
    }

    fn synthetic_tick(bar: &Bar, hour: u32, price: f64) -> Tick {
        let timestamp = bar
            .timestamp
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(hour, 0, 1).unwrap())
            .and_utc();
        Tick::new(bar.symbol.clone(), timestamp, price)
    }

    /// Control block lookup, creating one on first touch. Ordering an
    /// instrument the catalog does not know is integrator misuse.
    fn lookup_cb<'a>(
        control: &'a mut HashMap<String, InstrumentCb>,
        catalog: &Catalog,
        symbol: &str,
    ) -> &'a mut InstrumentCb {
        control.entry(symbol.to_owned()).or_insert_with(|| {
            let instrument = catalog
                .instrument(symbol)
                .unwrap_or_else(|| panic!("unknown instrument {symbol}"))
                .clone();
            InstrumentCb::new(instrument)
        })
    }

    /// Moves queued submissions into the control blocks' new-order queues.
    fn drain_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let orders: Vec<Order> = self.pending.drain(..).collect();
        for order in orders {
            let cb = Self::lookup_cb(&mut self.control, self.feed.catalog(), &order.symbol);
            cb.new_orders.push(order);
        }
    }

    /// New orders become eligible for matching.
    fn admit_new_orders(&mut self, symbol: &str) {
        if let Some(cb) = self.control.get_mut(symbol) {
            cb.orders.append(&mut cb.new_orders);
        }
    }

    /// Scans the active orders against one tick, booking fills into the
    /// portfolio and recording executions and notifications.
    fn process_orders(&mut self, symbol: &str, tick: &Tick, execute_on_limit_or_stop: bool) {
        let Some(cb) = self.control.get_mut(symbol) else {
            return;
        };

        for i in 0..cb.orders.len() {
            let previous_position = cb.position.position;
            let Some(fill) =
                cb.orders[i].try_fill(tick, previous_position, execute_on_limit_or_stop)
            else {
                continue;
            };

            cb.position = InstrumentPosition {
                position: fill.new_position,
                since: tick.timestamp,
            };

            // A fill that crossed or landed on zero invalidates every
            // other protective exit on this instrument
            if previous_position != 0 && sign(previous_position) != sign(fill.new_position) {
                for (j, other) in cb.orders.iter_mut().enumerate() {
                    if j != i && other.kind.is_exit() && other.is_active() {
                        debug!(symbol, order = %other.id, "cancelling stale exit");
                        other.cancel();
                    }
                }
            }

            cb.orders[i].fill();
            cb.orders[i].fill_price = Some(fill.price);

            self.portfolio.append_transaction(
                &cb.instrument,
                tick.timestamp,
                fill.transaction_quantity,
                fill.price,
                0.0,
            );

            cb.executions.push(Execution::new(
                tick.timestamp,
                fill.price,
                fill.filled_quantity as u64,
            ));
            cb.notifications.push(OrderNotification {
                order: cb.orders[i].clone(),
                execution: cb.executions.last().unwrap().clone(),
            });
        }
    }

    /// Delivers accumulated fill notifications to every observer, then
    /// stages any orders they submitted.
    fn post_notifications(&mut self, strategies: &mut [&mut dyn Strategy], symbol: &str) {
        let notifications = match self.control.get_mut(symbol) {
            Some(cb) if !cb.notifications.is_empty() => std::mem::take(&mut cb.notifications),
            _ => return,
        };

        for notification in &notifications {
            for strategy in strategies.iter_mut() {
                let mut ctx = StrategyCtx {
                    pending: &mut self.pending,
                    control: &self.control,
                    portfolio: &self.portfolio,
                    catalog: self.feed.catalog(),
                };
                strategy.on_order_notification(&mut ctx, notification);
            }
        }

        self.drain_pending();
    }

    fn notify_bar_open(&mut self, strategies: &mut [&mut dyn Strategy], bar: &Bar) {
        let partial = bar.open_partial();
        let history = self
            .histories
            .entry((bar.symbol.clone(), bar.timespan))
            .or_default();
        let history = &*history;

        for strategy in strategies.iter_mut() {
            let mut ctx = StrategyCtx {
                pending: &mut self.pending,
                control: &self.control,
                portfolio: &self.portfolio,
                catalog: self.feed.catalog(),
            };
            strategy.on_bar_open(&mut ctx, history, &partial);
        }

        self.drain_pending();
    }

    fn notify_bar_close(&mut self, strategies: &mut [&mut dyn Strategy], bar: &Bar) {
        let history = self
            .histories
            .entry((bar.symbol.clone(), bar.timespan))
            .or_default();
        history.append(bar);
        let history = &*history;

        for strategy in strategies.iter_mut() {
            let mut ctx = StrategyCtx {
                pending: &mut self.pending,
                control: &self.control,
                portfolio: &self.portfolio,
                catalog: self.feed.catalog(),
            };
            strategy.on_bar_close(&mut ctx, history, bar);
        }

        self.drain_pending();
    }

    fn notify_bar_closed(&mut self, strategies: &mut [&mut dyn Strategy], bar: &Bar) {
        let history = self
            .histories
            .entry((bar.symbol.clone(), bar.timespan))
            .or_default();
        let history = &*history;

        for strategy in strategies.iter_mut() {
            let mut ctx = StrategyCtx {
                pending: &mut self.pending,
                control: &self.control,
                portfolio: &self.portfolio,
                catalog: self.feed.catalog(),
            };
            strategy.on_bar_closed(&mut ctx, history, bar);
        }

        self.drain_pending();
    }

    /// End-of-bar expiry and pruning of the order list. Notifications
    /// snapshot orders by value, so pruning here is safe.
    fn cleanup_orders(&mut self, bar: &Bar) {
        if let Some(cb) = self.control.get_mut(&bar.symbol) {
            for order in cb.orders.iter_mut() {
                order.update_state(bar);
            }
            let before = cb.orders.len();
            cb.orders.retain(|order| order.is_active());
            if before != cb.orders.len() {
                debug!(
                    symbol = %bar.symbol,
                    pruned = before - cb.orders.len(),
                    "pruned inactive orders"
                );
            }
        }
    }
}
