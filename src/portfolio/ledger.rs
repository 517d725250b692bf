use crate::data::series::TimeSeries;
use crate::instrument::Instrument;
use crate::maths::sign;
use crate::portfolio::trade::TradeStats;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One committed ledger entry with its derived accounting fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    /// Signed traded quantity: positive buys, negative sells.
    pub quantity: i64,
    pub price: f64,
    /// `quantity * price * bpv`, gross of fees.
    pub value: f64,
    pub average_cost: f64,
    /// Running signed position after this transaction.
    pub position_quantity: i64,
    /// Weighted-average cost of the running position; zero when flat.
    pub position_average_cost: f64,
    /// PnL realised by this transaction on the units it closed.
    pub gross_pnl: f64,
    pub net_pnl: f64,
    /// Signed fees; costs are negative.
    pub fees: f64,
}

impl Transaction {
    /// The all-zeroes origin entry placed one microsecond before the first
    /// real transaction to anchor "previous" lookups.
    fn origin(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            quantity: 0,
            price: 0.0,
            value: 0.0,
            average_cost: 0.0,
            position_quantity: 0,
            position_average_cost: 0.0,
            gross_pnl: 0.0,
            net_pnl: 0.0,
            fees: 0.0,
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} : {} : {} : {} : {} : {} : {} : {}",
            self.timestamp.format("%Y%m%d"),
            self.price,
            self.value,
            self.average_cost,
            self.position_quantity,
            self.position_average_cost,
            self.gross_pnl,
            self.net_pnl,
            self.fees,
        )
    }
}

/// Realized and unrealized PnL for an open position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PositionPnl {
    pub realized: f64,
    pub unrealized: f64,
}

/// Append-only chronological transaction history for one symbol.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionLedger {
    transactions: Vec<Transaction>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a transaction and derives its accounting fields.
    ///
    /// A transaction that would carry the position through zero is split in
    /// two: a closing transaction for the old trade at the same timestamp,
    /// then the remainder one microsecond later opening the new trade, with
    /// fees pro-rated per unit across the two.
    pub fn append(
        &mut self,
        instrument: &Instrument,
        timestamp: DateTime<Utc>,
        quantity: i64,
        price: f64,
        fees: f64,
    ) {
        if self.transactions.is_empty() {
            self.transactions
                .push(Transaction::origin(timestamp - Duration::microseconds(1)));
        }

        assert!(
            timestamp > self.transactions.last().unwrap().timestamp,
            "transactions must be appended in chronological order"
        );

        let mut timestamp = timestamp;
        let mut quantity = quantity;
        let mut fees = fees;
        let mut ppq = self.transactions.last().unwrap().position_quantity;

        if ppq != 0 && ppq != -quantity && sign(ppq + quantity) != sign(ppq) {
            // Reversal through zero: close the old trade first
            let per_unit_fee = fees / quantity.abs() as f64;
            self.append(
                instrument,
                timestamp,
                -ppq,
                price,
                per_unit_fee * ppq.abs() as f64,
            );

            timestamp += Duration::microseconds(1);
            quantity += ppq;
            fees = per_unit_fee * quantity.abs() as f64;
            ppq = 0;
        }

        let bpv = instrument.bpv();
        let value = quantity as f64 * price * bpv;
        let average_cost = value / (quantity as f64 * bpv);
        let position_quantity = ppq + quantity;
        let ppac = self.transactions.last().unwrap().position_average_cost;

        let position_average_cost = if position_quantity == 0 {
            0.0
        } else if ppq.abs() > position_quantity.abs() {
            // Partial close keeps the previous cost basis
            ppac
        } else {
            (ppq as f64 * ppac * bpv + value) / (position_quantity as f64 * bpv)
        };

        // Adding to (or opening) a position realises nothing; reducing it
        // realises PnL on the closed units
        let gross_pnl = if ppq.abs() < position_quantity.abs() || ppq == 0 {
            0.0
        } else {
            quantity as f64 * bpv * (ppac - average_cost)
        };

        self.transactions.push(Transaction {
            timestamp,
            quantity,
            price,
            value,
            average_cost,
            position_quantity,
            position_average_cost,
            gross_pnl,
            net_pnl: gross_pnl + fees,
            fees,
        });
    }

    /// All committed transactions, origin entry included, in order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn last(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    /// Realized and unrealized PnL of the open position marked at `price`.
    ///
    /// Realized PnL sums `gross_pnl` over the trailing run of non-flat
    /// transactions. Must not be called while flat.
    pub fn position_pnl(&self, instrument: &Instrument, price: f64) -> PositionPnl {
        let last = self
            .transactions
            .last()
            .expect("position PnL requires transactions");
        assert!(
            last.position_quantity != 0,
            "position PnL requires an open position"
        );

        let unrealized = instrument.bpv()
            * last.position_quantity as f64
            * (price - last.position_average_cost);

        let mut realized = 0.0;
        for transaction in self.transactions.iter().rev() {
            if transaction.position_quantity == 0 {
                break;
            }
            realized += transaction.gross_pnl;
        }

        PositionPnl {
            realized,
            unrealized,
        }
    }

    /// Derives a PnL series from a series of price marks.
    ///
    /// For each mark, PnL is the change in position value net of any
    /// transaction value booked at that instant. Transactions falling
    /// between marks insert their own entry valued at the previous mark.
    pub fn pnl(&self, instrument: &Instrument, prices: &TimeSeries) -> TimeSeries {
        let mut pnl = TimeSeries::new();

        // No real transactions: flat zero series
        if self.transactions.len() <= 1 {
            for (timestamp, _) in prices.iter() {
                pnl.push(timestamp, 0.0);
            }
            return pnl;
        }

        let bpv = instrument.bpv();
        let transactions = &self.transactions;
        let mut current = 1usize;
        let mut ii = 0usize;

        // Zero PnL from the beginning of time to the first transaction
        while ii < prices.len() && prices.timestamp(ii) < transactions[current].timestamp {
            pnl.push(prices.timestamp(ii), 0.0);
            ii += 1;
        }
        if ii == prices.len() {
            return pnl;
        }

        let mut previous_position_value = 0.0;
        while ii < prices.len() && current < transactions.len() {
            let transaction = &transactions[current];
            if prices.timestamp(ii) == transaction.timestamp {
                // In both the mark list and the transaction list
                let position_value =
                    transaction.position_quantity as f64 * bpv * prices.value(ii);
                pnl.push(
                    prices.timestamp(ii),
                    position_value - previous_position_value - transaction.value,
                );
                ii += 1;
                current += 1;
                previous_position_value = position_value;
            } else if prices.timestamp(ii) < transaction.timestamp {
                // Only a mark: hold the previous position
                let position_value =
                    transactions[current - 1].position_quantity as f64 * bpv * prices.value(ii);
                pnl.push(
                    prices.timestamp(ii),
                    position_value - previous_position_value,
                );
                ii += 1;
                previous_position_value = position_value;
            } else if ii > 0 {
                // Only a transaction: value it at the previous mark
                let position_value =
                    transaction.position_quantity as f64 * bpv * prices.value(ii - 1);
                pnl.push(
                    transaction.timestamp,
                    position_value - previous_position_value - transaction.value,
                );
                current += 1;
                previous_position_value = position_value;
            } else {
                // A transaction before any mark: no price to value it with
                pnl.push(transaction.timestamp, 0.0);
                current += 1;
            }
        }

        while ii < prices.len() {
            let position_value =
                transactions[current - 1].position_quantity as f64 * bpv * prices.value(ii);
            pnl.push(
                prices.timestamp(ii),
                position_value - previous_position_value,
            );
            ii += 1;
            previous_position_value = position_value;
        }

        pnl
    }

    /// Scans the ledger into per-trade statistics. A trade is a maximal run
    /// of transactions from flat back to flat.
    pub fn trade_stats(&self, instrument: &Instrument) -> Vec<TradeStats> {
        let mut stats = Vec::new();
        let transactions = &self.transactions;
        let bpv = instrument.bpv();

        // Position at the first transaction that moves off flat
        let mut begin = 0usize;
        loop {
            if begin == transactions.len() {
                return stats;
            }
            if transactions[begin].position_quantity != 0 {
                break;
            }
            begin += 1;
        }

        let advance = |from: usize| -> usize {
            let mut end = from + 1;
            while end < transactions.len() && transactions[end].position_quantity != 0 {
                end += 1;
            }
            if end < transactions.len() {
                end += 1;
            }
            end
        };
        let mut end = advance(begin);

        // [begin, end) holds the transactions of the current trade
        loop {
            let last = &transactions[end - 1];
            let mut trade = TradeStats {
                symbol: instrument.symbol().to_owned(),
                start: transactions[begin].timestamp,
                end: last.timestamp,
                initial_position: transactions[begin].quantity,
                max_position: 0,
                num_transactions: 0,
                max_notional_cost: 0.0,
                pnl: 0.0,
                pct_pnl: 0.0,
                tick_pnl: 0.0,
                fees: 0.0,
            };

            let mut position_cost_basis = 0.0;
            for transaction in &transactions[begin..end] {
                if transaction.value != 0.0 {
                    trade.num_transactions += 1;
                }
                position_cost_basis += transaction.value;
                trade.fees += transaction.fees;

                if transaction.position_quantity.abs() > trade.max_position.abs() {
                    trade.max_position = transaction.position_quantity;
                    trade.max_notional_cost = position_cost_basis;
                }
            }

            // Zero when the trade fully closed, so pnl collapses to the
            // negated cost basis
            let position_value = last.position_quantity as f64 * bpv * last.price;
            trade.pnl = position_value - position_cost_basis;
            trade.pct_pnl = trade.pnl / trade.max_notional_cost.abs();
            trade.tick_pnl = trade.pnl / (instrument.tick() * bpv);

            stats.push(trade);

            if end == transactions.len() {
                break;
            }
            begin = end;
            end = advance(begin);
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn es() -> Instrument {
        Instrument::future("ES", 0.25, 50.0)
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 17, 0, 0).unwrap()
    }

    fn assert_near(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {expected}, got {actual}"
        );
    }

    // Transactions verified against R's blotter package
    #[test]
    fn long_round_trip_accounting() {
        let es = es();
        let mut ledger = TransactionLedger::new();

        ledger.append(&es, at(2014, 1, 2), 1, 1819.50, 0.0);

        let last = ledger.last().unwrap();
        assert_eq!(last.quantity, 1);
        assert_eq!(last.price, 1819.50);
        assert_eq!(last.value, 90_975.00);
        assert_eq!(last.average_cost, 1819.50);
        assert_eq!(last.position_quantity, 1);
        assert_eq!(last.position_average_cost, 1819.50);
        assert_eq!(last.gross_pnl, 0.0);
        assert_eq!(last.net_pnl, 0.0);

        let pnl = ledger.position_pnl(&es, 1825.5);
        assert_eq!(pnl.realized, 0.0);
        assert_eq!(pnl.unrealized, 300.0);

        ledger.append(&es, at(2014, 1, 9), 2, 1826.0, 0.0);

        let last = ledger.last().unwrap();
        assert_eq!(last.quantity, 2);
        assert_eq!(last.value, 182_600.0);
        assert_eq!(last.position_quantity, 3);
        assert_near(last.position_average_cost, 1823.8333, 1e-4);
        assert_eq!(last.gross_pnl, 0.0);

        let pnl = ledger.position_pnl(&es, 1826.0);
        assert_eq!(pnl.realized, 0.0);
        assert_near(pnl.unrealized, 325.0, 1e-10);

        let pnl = ledger.position_pnl(&es, 1829.25);
        assert_eq!(pnl.realized, 0.0);
        assert_near(pnl.unrealized, 812.5, 1e-9);

        ledger.append(&es, at(2014, 1, 16), -3, 1829.25, 0.0);

        let last = ledger.last().unwrap();
        assert_eq!(last.quantity, -3);
        assert_eq!(last.value, -274_387.5);
        assert_eq!(last.average_cost, 1829.25);
        assert_eq!(last.position_quantity, 0);
        assert_eq!(last.position_average_cost, 0.0);
        assert_near(last.gross_pnl, 812.5, 1e-10);
        assert_near(last.net_pnl, 812.5, 1e-10);
    }

    #[test]
    fn reversal_splits_into_close_and_open() {
        let es = es();
        let mut ledger = TransactionLedger::new();

        ledger.append(&es, at(2014, 1, 24), -2, 1775.00, 0.0);

        let last = ledger.last().unwrap();
        assert_eq!(last.position_quantity, -2);
        assert_eq!(last.position_average_cost, 1775.0);

        // Reverses -2 into +1: the ledger must record the close and the
        // open as two transactions one microsecond apart
        ledger.append(&es, at(2014, 1, 31), 3, 1769.50, 0.0);

        let transactions = ledger.transactions();
        let close = &transactions[transactions.len() - 2];
        assert_eq!(close.timestamp, at(2014, 1, 31));
        assert_eq!(close.quantity, 2);
        assert_eq!(close.position_quantity, 0);
        assert_near(close.gross_pnl, 550.0, 1e-10);

        let open = ledger.last().unwrap();
        assert_eq!(open.timestamp, at(2014, 1, 31) + Duration::microseconds(1));
        assert_eq!(open.quantity, 1);
        assert_eq!(open.price, 1769.50);
        assert_eq!(open.value, 88_475.0);
        assert_eq!(open.position_quantity, 1);
        assert_eq!(open.position_average_cost, 1769.50);
        assert_eq!(open.gross_pnl, 0.0);

        // And back through zero the other way
        ledger.append(&es, at(2014, 2, 7), -2, 1786.50, 0.0);

        let last = ledger.last().unwrap();
        assert_eq!(last.quantity, -1);
        assert_eq!(last.value, -89_325.0);
        assert_eq!(last.position_quantity, -1);
        assert_eq!(last.position_average_cost, 1786.50);
        assert_eq!(last.gross_pnl, 0.0);

        ledger.append(&es, at(2014, 2, 14), 1, 1828.00, 0.0);

        let last = ledger.last().unwrap();
        assert_eq!(last.position_quantity, 0);
        assert_eq!(last.position_average_cost, 0.0);
        assert_near(last.gross_pnl, -2075.0, 1e-10);
    }

    #[test]
    fn split_pro_rates_fees_per_unit() {
        let es = es();
        let mut ledger = TransactionLedger::new();

        ledger.append(&es, at(2014, 1, 2), -2, 1775.00, 0.0);
        ledger.append(&es, at(2014, 1, 9), 3, 1769.50, -3.0);

        let transactions = ledger.transactions();
        let close = &transactions[transactions.len() - 2];
        let open = transactions.last().unwrap();

        assert_eq!(close.fees, -2.0);
        assert_eq!(open.fees, -1.0);
        assert_eq!(close.net_pnl, close.gross_pnl + close.fees);
    }

    #[test]
    fn position_consistency_holds_across_the_ledger() {
        let es = es();
        let mut ledger = TransactionLedger::new();
        ledger.append(&es, at(2014, 1, 2), 1, 1819.50, 0.0);
        ledger.append(&es, at(2014, 1, 9), 2, 1826.0, 0.0);
        ledger.append(&es, at(2014, 1, 16), -3, 1829.25, 0.0);
        ledger.append(&es, at(2014, 1, 24), -2, 1775.00, 0.0);
        ledger.append(&es, at(2014, 1, 31), 3, 1769.50, 0.0);

        let mut running = 0;
        for (i, transaction) in ledger.transactions().iter().enumerate() {
            running += transaction.quantity;
            assert_eq!(
                transaction.position_quantity, running,
                "split-adjusted position mismatch at transaction {i}"
            );
        }

        let mut previous = DateTime::<Utc>::MIN_UTC;
        for transaction in ledger.transactions() {
            assert!(transaction.timestamp > previous);
            previous = transaction.timestamp;
        }
    }

    #[test]
    #[should_panic(expected = "chronological")]
    fn out_of_order_append_panics() {
        let es = es();
        let mut ledger = TransactionLedger::new();
        ledger.append(&es, at(2014, 1, 9), 1, 1819.50, 0.0);
        ledger.append(&es, at(2014, 1, 2), 1, 1820.00, 0.0);
    }

    #[test]
    #[should_panic(expected = "open position")]
    fn position_pnl_without_a_position_panics() {
        let es = es();
        let mut ledger = TransactionLedger::new();
        ledger.append(&es, at(2014, 1, 2), 1, 1819.50, 0.0);
        ledger.append(&es, at(2014, 1, 9), -1, 1826.0, 0.0);
        ledger.position_pnl(&es, 1826.0);
    }

    #[test]
    fn daily_pnl_tracks_marks_and_transactions() {
        let es = es();
        let mut ledger = TransactionLedger::new();
        ledger.append(&es, at(2014, 1, 2), 1, 100.0, 0.0);
        ledger.append(&es, at(2014, 1, 4), -1, 110.0, 0.0);

        let marks = TimeSeries::from_pairs([
            (at(2014, 1, 1), 95.0),
            (at(2014, 1, 2), 100.0),
            (at(2014, 1, 3), 105.0),
            (at(2014, 1, 4), 110.0),
            (at(2014, 1, 5), 112.0),
        ]);

        let pnl = ledger.pnl(&es, &marks);

        assert_eq!(pnl.len(), 5);
        assert_eq!(pnl.value(0), 0.0);
        assert_eq!(pnl.value(1), 0.0);
        assert_eq!(pnl.value(2), 250.0);
        assert_eq!(pnl.value(3), 250.0);
        assert_eq!(pnl.value(4), 0.0);
    }

    #[test]
    fn daily_pnl_inserts_entries_for_between_mark_transactions() {
        let es = es();
        let mut ledger = TransactionLedger::new();
        ledger.append(&es, at(2014, 1, 3), 1, 100.0, 0.0);

        let marks = TimeSeries::from_pairs([(at(2014, 1, 2), 99.0), (at(2014, 1, 4), 104.0)]);

        let pnl = ledger.pnl(&es, &marks);

        assert_eq!(pnl.len(), 3);
        assert_eq!(pnl.timestamp(0), at(2014, 1, 2));
        assert_eq!(pnl.value(0), 0.0);
        // Transaction valued at the previous mark price
        assert_eq!(pnl.timestamp(1), at(2014, 1, 3));
        assert_eq!(pnl.value(1), -50.0);
        assert_eq!(pnl.timestamp(2), at(2014, 1, 4));
        assert_eq!(pnl.value(2), 250.0);
    }

    #[test]
    fn daily_pnl_with_no_transactions_is_flat_zero() {
        let es = es();
        let ledger = TransactionLedger::new();
        let marks = TimeSeries::from_pairs([(at(2014, 1, 2), 99.0), (at(2014, 1, 3), 104.0)]);

        let pnl = ledger.pnl(&es, &marks);

        assert_eq!(pnl.len(), 2);
        assert_eq!(pnl.value(0), 0.0);
        assert_eq!(pnl.value(1), 0.0);
    }

    // Trade stats verified against R's blotter package
    #[test]
    fn trade_stats_for_the_reference_transaction_sequence() {
        let es = es();
        let mut ledger = TransactionLedger::new();

        ledger.append(&es, at(2014, 1, 2), 1, 1819.50, -2.02);

        let last = ledger.last().unwrap();
        assert_eq!(last.position_quantity, 1);
        assert_eq!(last.gross_pnl, 0.0);
        assert_eq!(last.net_pnl, -2.02);
        assert_eq!(last.fees, -2.02);

        ledger.append(&es, at(2014, 1, 7), -2, 1816.50, -2.03);

        let last = ledger.last().unwrap();
        assert_eq!(last.quantity, -1);
        assert_eq!(last.value, -90_825.00);
        assert_eq!(last.position_quantity, -1);
        assert_eq!(last.position_average_cost, 1816.50);
        assert_eq!(last.gross_pnl, 0.0);
        assert_eq!(last.net_pnl, -1.015);
        assert_eq!(last.fees, -1.015);

        ledger.append(&es, at(2014, 1, 23), 2, 1810.00, -2.04);
        ledger.append(&es, at(2014, 2, 10), -2, 1780.50, -2.05);
        ledger.append(&es, at(2014, 2, 27), 3, 1839.75, -2.06);
        ledger.append(&es, at(2014, 3, 3), -4, 1828.75, -2.07);
        ledger.append(&es, at(2014, 3, 14), 3, 1825.75, -2.08);
        ledger.append(&es, at(2014, 3, 20), -2, 1858.75, -2.09);
        ledger.append(&es, at(2014, 3, 24), 2, 1842.25, -2.08);
        ledger.append(&es, at(2014, 4, 8), -2, 1837.75, -2.07);
        ledger.append(&es, at(2014, 4, 25), 2, 1852.75, -2.06);
        ledger.append(&es, at(2014, 5, 14), -2, 1878.00, -2.05);
        ledger.append(&es, at(2014, 5, 28), 2, 1901.75, -2.04);
        ledger.append(&es, at(2014, 6, 16), -2, 1929.25, -2.03);
        ledger.append(&es, at(2014, 7, 1), 2, 1965.75, -2.02);
        ledger.append(&es, at(2014, 7, 16), -2, 1974.75, -2.01);
        ledger.append(&es, at(2014, 7, 24), 2, 1980.75, -2.02);
        ledger.append(&es, at(2014, 7, 25), -2, 1971.50, -2.03);
        ledger.append(&es, at(2014, 8, 1), 1, 1918.50, -2.04);

        let stats = ledger.trade_stats(&es);
        assert_eq!(stats.len(), 18);

        let plus_1us = |t: DateTime<Utc>| t + Duration::microseconds(1);

        // (start, end, initial, max, n, max_notional_cost, pnl, pct_pnl)
        let expected = [
            (at(2014, 1, 2), at(2014, 1, 7), 1, 1, 2, 90_975.0, -150.0, -0.001648805),
            (plus_1us(at(2014, 1, 7)), at(2014, 1, 23), -1, -1, 2, -90_825.0, 325.0, 0.003578310),
            (plus_1us(at(2014, 1, 23)), at(2014, 2, 10), 1, 1, 2, 90_500.0, -1475.0, -0.016298343),
            (plus_1us(at(2014, 2, 10)), at(2014, 2, 27), -1, -1, 2, -89_025.0, -2962.5, -0.033277169),
            (plus_1us(at(2014, 2, 27)), at(2014, 3, 3), 2, 2, 2, 183_975.0, -1100.0, -0.005979073),
            (plus_1us(at(2014, 3, 3)), at(2014, 3, 14), -2, -2, 2, -182_875.0, 300.0, 0.001640465),
            (plus_1us(at(2014, 3, 14)), at(2014, 3, 20), 1, 1, 2, 91_287.5, 1650.0, 0.018074764),
            (plus_1us(at(2014, 3, 20)), at(2014, 3, 24), -1, -1, 2, -92_937.5, 825.0, 0.008876933),
            (plus_1us(at(2014, 3, 24)), at(2014, 4, 8), 1, 1, 2, 92_112.5, -225.0, -0.002442665),
            (plus_1us(at(2014, 4, 8)), at(2014, 4, 25), -1, -1, 2, -91_887.5, -750.0, -0.008162155),
            (plus_1us(at(2014, 4, 25)), at(2014, 5, 14), 1, 1, 2, 92_637.5, 1262.5, 0.013628390),
            (plus_1us(at(2014, 5, 14)), at(2014, 5, 28), -1, -1, 2, -93_900.0, -1187.5, -0.012646432),
            (plus_1us(at(2014, 5, 28)), at(2014, 6, 16), 1, 1, 2, 95_087.5, 1375.0, 0.014460365),
            (plus_1us(at(2014, 6, 16)), at(2014, 7, 1), -1, -1, 2, -96_462.5, -1825.0, -0.018919269),
            (plus_1us(at(2014, 7, 1)), at(2014, 7, 16), 1, 1, 2, 98_287.5, 450.0, 0.004578405),
            (plus_1us(at(2014, 7, 16)), at(2014, 7, 24), -1, -1, 2, -98_737.5, -300.0, -0.003038359),
            (plus_1us(at(2014, 7, 24)), at(2014, 7, 25), 1, 1, 2, 99_037.5, -462.5, -0.004669948),
            (plus_1us(at(2014, 7, 25)), at(2014, 8, 1), -1, -1, 2, -98_575.0, 2650.0, 0.026883084),
        ];

        for (i, (start, end, initial, max, n, cost, pnl, pct)) in expected.iter().enumerate() {
            let trade = &stats[i];
            assert_eq!(trade.symbol, "ES");
            assert_eq!(trade.start, *start, "trade {i} start");
            assert_eq!(trade.end, *end, "trade {i} end");
            assert_eq!(trade.initial_position, *initial, "trade {i} initial");
            assert_eq!(trade.max_position, *max, "trade {i} max position");
            assert_eq!(trade.num_transactions, *n, "trade {i} transactions");
            assert_eq!(trade.max_notional_cost, *cost, "trade {i} notional");
            assert_near(trade.pnl, *pnl, 1e-9);
            assert_near(trade.pct_pnl, *pct, 1e-8);
        }
    }

    #[test]
    fn open_trade_is_marked_at_the_last_transaction_price() {
        let es = es();
        let mut ledger = TransactionLedger::new();
        ledger.append(&es, at(2014, 1, 2), 1, 1800.0, 0.0);
        ledger.append(&es, at(2014, 1, 9), 1, 1810.0, 0.0);

        let stats = ledger.trade_stats(&es);
        assert_eq!(stats.len(), 1);

        let trade = &stats[0];
        assert_eq!(trade.initial_position, 1);
        assert_eq!(trade.max_position, 2);
        assert_eq!(trade.num_transactions, 2);
        // Open position valued at the last transaction price
        assert_eq!(trade.pnl, 2.0 * 50.0 * 1810.0 - (90_000.0 + 90_500.0));
    }

    #[test]
    fn trade_stats_with_no_transactions_is_empty() {
        let ledger = TransactionLedger::new();
        assert!(ledger.trade_stats(&es()).is_empty());
    }
}
