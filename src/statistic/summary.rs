use crate::data::series::TimeSeries;
use crate::portfolio::trade::TradeStats;
use crate::statistic::TablePrinter;
use crate::statistic::algorithm::{Welford, WelfordVariance};
use prettytable::{Row, Table, row};
use serde::{Deserialize, Serialize};

/// Number of trading days used to annualise the Sharpe ratio.
const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate statistics over a set of closed trades and a daily PnL series.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub num_trades: u64,
    pub gross_profits: f64,
    pub gross_losses: f64,
    /// `|gross_profits / gross_losses|`, or `|gross_profits|` when there
    /// are no losses.
    pub profit_factor: f64,
    pub avg_daily_pnl: f64,
    pub daily_pnl_stddev: f64,
    /// `mean(daily pnl) / stddev(daily pnl) * sqrt(252)` over non-zero days.
    pub sharpe: f64,
    pub avg_trade_pnl: f64,
    pub trade_pnl_stddev: f64,
    pub pct_positive: f64,
    pub pct_negative: f64,
    pub max_win: f64,
    pub max_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// `avg_win / -avg_loss`, or `avg_win` when there are no losses.
    pub avg_win_loss: f64,
    pub equity_min: f64,
    pub equity_max: f64,
    /// Most negative excursion of equity below its running maximum.
    pub max_drawdown: f64,
}

/// Work area accumulating a [`TradeSummary`] one trade at a time.
///
/// Trades must arrive in chronological order: the builder walks the daily
/// PnL series alongside them, accumulating equity across each trade's
/// window and skipping the flat stretches in between.
#[derive(Clone, Debug)]
pub struct TradeSummaryBuilder {
    num_trades: u64,
    gross_profits: f64,
    gross_losses: f64,
    positive: u64,
    negative: u64,
    max_win: f64,
    max_loss: f64,
    avg_win: Welford,
    avg_loss: Welford,
    trade_pnl: WelfordVariance,
    daily_pnl: WelfordVariance,
    pnl: TimeSeries,
    pnl_id: usize,
    equity: f64,
    equity_min: f64,
    equity_max: f64,
    max_drawdown: f64,
}

impl TradeSummaryBuilder {
    pub fn new(daily_pnl: TimeSeries) -> Self {
        Self {
            num_trades: 0,
            gross_profits: 0.0,
            gross_losses: 0.0,
            positive: 0,
            negative: 0,
            max_win: f64::MIN,
            max_loss: f64::MAX,
            avg_win: Welford::new(),
            avg_loss: Welford::new(),
            trade_pnl: WelfordVariance::new(),
            daily_pnl: WelfordVariance::new(),
            pnl: daily_pnl,
            pnl_id: 0,
            equity: 0.0,
            equity_min: f64::MAX,
            equity_max: f64::MIN,
            max_drawdown: f64::MAX,
        }
    }

    pub fn update(&mut self, trade: &TradeStats) {
        self.num_trades += 1;

        if trade.pnl < 0.0 {
            self.negative += 1;
            self.avg_loss.add(trade.pnl);
            self.gross_losses += trade.pnl;
        } else if trade.pnl > 0.0 {
            self.positive += 1;
            self.avg_win.add(trade.pnl);
            self.gross_profits += trade.pnl;
        }

        self.trade_pnl.add(trade.pnl);
        self.max_win = self.max_win.max(trade.pnl);
        self.max_loss = self.max_loss.min(trade.pnl);

        // Days before the trade begins contribute nothing
        while self.pnl_id < self.pnl.len() && self.pnl.timestamp(self.pnl_id) < trade.start {
            self.pnl_id += 1;
        }

        // Walk the trade's window accumulating equity
        while self.pnl_id < self.pnl.len() && self.pnl.timestamp(self.pnl_id) <= trade.end {
            let pnl = self.pnl.value(self.pnl_id);
            self.equity += pnl;
            self.equity_max = self.equity_max.max(self.equity);
            self.equity_min = self.equity_min.min(self.equity);
            self.max_drawdown = self.max_drawdown.min(self.equity - self.equity_max);

            if pnl != 0.0 {
                self.daily_pnl.add(pnl);
            }

            self.pnl_id += 1;
        }
    }

    pub fn summarize(self) -> TradeSummary {
        let mut summary = TradeSummary {
            num_trades: self.num_trades,
            ..TradeSummary::default()
        };
        if self.num_trades == 0 {
            return summary;
        }

        summary.gross_profits = self.gross_profits;
        summary.gross_losses = self.gross_losses;
        summary.profit_factor = if self.gross_losses != 0.0 {
            (self.gross_profits / self.gross_losses).abs()
        } else {
            self.gross_profits.abs()
        };

        summary.avg_trade_pnl = self.trade_pnl.mean();
        summary.trade_pnl_stddev = self.trade_pnl.std_dev();
        summary.pct_positive = self.positive as f64 / self.num_trades as f64 * 100.0;
        summary.pct_negative = self.negative as f64 / self.num_trades as f64 * 100.0;

        summary.max_win = self.max_win;
        summary.max_loss = self.max_loss;
        summary.avg_win = self.avg_win.mean();
        summary.avg_loss = self.avg_loss.mean();
        summary.avg_win_loss = if summary.avg_loss != 0.0 {
            summary.avg_win / -summary.avg_loss
        } else {
            summary.avg_win
        };

        // Untouched when the daily series never overlapped a trade window
        if self.equity_min != f64::MAX {
            summary.equity_min = self.equity_min;
            summary.equity_max = self.equity_max;
            summary.max_drawdown = self.max_drawdown;
        }

        summary.avg_daily_pnl = self.daily_pnl.mean();
        summary.daily_pnl_stddev = self.daily_pnl.std_dev();
        summary.sharpe = if summary.daily_pnl_stddev == 0.0 {
            0.0
        } else {
            summary.avg_daily_pnl / summary.daily_pnl_stddev * TRADING_DAYS_PER_YEAR.sqrt()
        };

        summary
    }
}

/// The three standard aggregations of a trade list.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeSummaries {
    pub all: TradeSummary,
    pub longs: TradeSummary,
    pub shorts: TradeSummary,
}

/// Summarises a chronological trade list three ways: every trade, trades
/// opened long, and trades opened short.
pub fn summarize_trades(trades: &[TradeStats], daily_pnl: &TimeSeries) -> TradeSummaries {
    let mut all = TradeSummaryBuilder::new(daily_pnl.clone());
    let mut longs = TradeSummaryBuilder::new(daily_pnl.clone());
    let mut shorts = TradeSummaryBuilder::new(daily_pnl.clone());

    for trade in trades {
        if trade.initial_position > 0 {
            all.update(trade);
            longs.update(trade);
        } else if trade.initial_position < 0 {
            all.update(trade);
            shorts.update(trade);
        }
    }

    TradeSummaries {
        all: all.summarize(),
        longs: longs.summarize(),
        shorts: shorts.summarize(),
    }
}

impl TablePrinter for TradeSummaries {
    fn print(&self) {
        let mut table = Table::new();
        let titles = vec![
            "",
            "Trades",
            "Profit Factor",
            "Sharpe",
            "Avg Trade PnL",
            "% Positive",
            "Max Win",
            "Max Loss",
            "Max Drawdown",
        ];

        for (label, summary) in [
            ("All", &self.all),
            ("Long", &self.longs),
            ("Short", &self.shorts),
        ] {
            table.add_row(row![
                label,
                summary.num_trades,
                format!("{:.3}", summary.profit_factor),
                format!("{:.3}", summary.sharpe),
                format!("{:.2}", summary.avg_trade_pnl),
                format!("{:.1}", summary.pct_positive),
                format!("{:.2}", summary.max_win),
                format!("{:.2}", summary.max_loss),
                format!("{:.2}", summary.max_drawdown),
            ]);
        }

        table.set_titles(Row::from(titles));
        table.printstd();
    }
}
