//! Trade statistics over the closed-trade history.

use serde::Serialize;
use std::collections::BTreeMap;

use super::position::ClosedTrade;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeStats {
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub total_gain: f64,
    /// total_gain / initial_capital
    pub total_return: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_days: f64,
    /// Mean per-trade price return, independent of position size.
    pub avg_return_pct: f64,
}

impl TradeStats {
    pub fn compute(trades: &[ClosedTrade], initial_capital: f64) -> Self {
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_days = 0i64;
        let mut total_return_pct = 0.0_f64;

        for trade in trades {
            let pnl = trade.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_holding_days += trade.holding_days();
            total_return_pct += trade.return_pct();
        }

        let total_trades = trades.len();
        let total_gain = total_wins - total_losses;

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        TradeStats {
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate: ratio(trades_won as f64, total_trades),
            total_gain,
            total_return: if initial_capital > 0.0 {
                total_gain / initial_capital
            } else {
                0.0
            },
            profit_factor,
            avg_win: ratio(total_wins, trades_won),
            avg_loss: ratio(total_losses, trades_lost),
            largest_win,
            largest_loss,
            avg_holding_days: ratio(total_holding_days as f64, total_trades),
            avg_return_pct: ratio(total_return_pct, total_trades),
        }
    }
}

fn ratio(numerator: f64, count: usize) -> f64 {
    if count > 0 {
        numerator / count as f64
    } else {
        0.0
    }
}

/// Per-instrument trade count and realized gain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeResult {
    pub code: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub total_gain: f64,
}

impl CodeResult {
    /// One entry per traded instrument, sorted by code.
    pub fn compute_per_code(trades: &[ClosedTrade]) -> Vec<CodeResult> {
        let mut by_code: BTreeMap<&str, CodeResult> = BTreeMap::new();
        for trade in trades {
            let entry = by_code.entry(trade.code.as_str()).or_insert_with(|| CodeResult {
                code: trade.code.clone(),
                total_trades: 0,
                winning_trades: 0,
                total_gain: 0.0,
            });
            entry.total_trades += 1;
            if trade.pnl > 0.0 {
                entry.winning_trades += 1;
            }
            entry.total_gain += trade.pnl;
        }
        by_code.into_values().collect()
    }
}
