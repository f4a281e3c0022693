//! Performance metrics — pure functions over the equity curve and trade list.

use serde::{Deserialize, Serialize};

use sentilab_core::domain::Kline;

use crate::paper::TradeRecord;

/// Aggregate performance metrics for a single backtest run.
///
/// Percentages are expressed in percent (12.5 means 12.5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub final_equity: f64,
    pub total_return_pct: f64,
    /// Largest peak-to-trough decline, as a non-positive percentage.
    pub max_drawdown_pct: f64,
    pub trade_count: usize,
    /// Fraction of trades with positive net P&L, in percent.
    pub win_rate_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    /// Share of bars ending with an open position, in percent.
    pub exposure_pct: f64,
    /// First open to last close of the instrument.
    pub buy_and_hold_pct: f64,
}

impl PerformanceMetrics {
    /// `exposure` holds one flag per bar: was a position held at the close.
    pub fn compute(
        equity_curve: &[f64],
        trades: &[TradeRecord],
        start_balance: f64,
        klines: &[Kline],
        exposure: &[bool],
    ) -> Self {
        let final_equity = equity_curve.last().copied().unwrap_or(start_balance);
        Self {
            final_equity,
            total_return_pct: total_return_pct(start_balance, final_equity),
            max_drawdown_pct: max_drawdown_pct(equity_curve),
            trade_count: trades.len(),
            win_rate_pct: win_rate_pct(trades),
            best_trade_pct: trades
                .iter()
                .map(|t| t.return_pct)
                .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.max(r))))
                .unwrap_or(0.0),
            worst_trade_pct: trades
                .iter()
                .map(|t| t.return_pct)
                .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))))
                .unwrap_or(0.0),
            exposure_pct: exposure_pct(exposure),
            buy_and_hold_pct: buy_and_hold_pct(klines),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

pub fn total_return_pct(start: f64, end: f64) -> f64 {
    if start <= 0.0 {
        return 0.0;
    }
    (end - start) / start * 100.0
}

/// Returns 0.0 for constant or monotonically increasing equity.
pub fn max_drawdown_pct(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd * 100.0
}

pub fn win_rate_pct(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

pub fn exposure_pct(exposure: &[bool]) -> f64 {
    if exposure.is_empty() {
        return 0.0;
    }
    exposure.iter().filter(|&&held| held).count() as f64 / exposure.len() as f64 * 100.0
}

pub fn buy_and_hold_pct(klines: &[Kline]) -> f64 {
    match (klines.first(), klines.last()) {
        (Some(first), Some(last)) => total_return_pct(first.open, last.close),
        _ => 0.0,
    }
}
