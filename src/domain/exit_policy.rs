//! Exit policy: take-profit, stop-loss and maximum holding period.
//!
//! Conditions are checked in priority order. When several trigger on the
//! same day the first one names the reason; the action is SELL regardless.

use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitParams {
    /// Fractional rise above entry that takes profit (0.04 = 4%).
    pub sell_perc: f64,
    /// Calendar days after entry at which the position is closed.
    pub hold_till: u32,
    /// Fractional fall below entry that stops out.
    pub stop_perc: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitAction {
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    MaxHoldingPeriod,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::TakeProfit => "take profit",
            ExitReason::StopLoss => "stop loss",
            ExitReason::MaxHoldingPeriod => "max holding period",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitDecision {
    pub action: ExitAction,
    /// Reference price for the current day, if one could be obtained.
    pub price: Option<f64>,
    pub reason: Option<ExitReason>,
}

impl ExitDecision {
    pub fn hold(price: Option<f64>) -> Self {
        ExitDecision {
            action: ExitAction::Hold,
            price,
            reason: None,
        }
    }

    pub fn sell(price: f64, reason: ExitReason) -> Self {
        ExitDecision {
            action: ExitAction::Sell,
            price: Some(price),
            reason: Some(reason),
        }
    }
}

/// Everything an exit function needs to judge one open position.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitRequest<'a> {
    pub code: &'a str,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub current_date: NaiveDate,
    pub params: ExitParams,
}

/// Reference exit rule. Without a current price there is nothing to sell
/// at, so the position is held.
pub fn evaluate_exit(
    entry_price: f64,
    entry_date: NaiveDate,
    current_date: NaiveDate,
    current_price: Option<f64>,
    params: &ExitParams,
) -> ExitDecision {
    let Some(price) = current_price else {
        return ExitDecision::hold(None);
    };

    let take_profit_price = entry_price * (1.0 + params.sell_perc);
    let stop_price = entry_price * (1.0 - params.stop_perc);
    let days_held = (current_date - entry_date).num_days();

    if price >= take_profit_price {
        ExitDecision::sell(price, ExitReason::TakeProfit)
    } else if price <= stop_price {
        ExitDecision::sell(price, ExitReason::StopLoss)
    } else if days_held >= i64::from(params.hold_till) {
        ExitDecision::sell(price, ExitReason::MaxHoldingPeriod)
    } else {
        ExitDecision::hold(Some(price))
    }
}
