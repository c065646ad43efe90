//! Run configuration.
//!
//! A `RunConfig` is fixed when the driver is constructed and never mutated
//! afterwards. `validate` is the construction-time gate: an invalid date
//! range, non-positive capital or an empty universe never reaches the
//! simulation loop.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

use super::error::SignalTraderError;
use super::exit_policy::ExitParams;

pub const DEFAULT_THRESHOLD: f64 = 0.99;
pub const DEFAULT_SELL_PERC: f64 = 0.04;
pub const DEFAULT_HOLD_TILL: u32 = 5;
pub const DEFAULT_STOP_PERC: f64 = 0.005;
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// What happens to a position still open when the clock runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfRunPolicy {
    /// Report the position as-is; it contributes nothing to realized gain.
    #[default]
    LeaveOpen,
    /// Close at the last simulated day's price.
    ForceClose,
}

impl std::str::FromStr for EndOfRunPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "leave_open" | "leave-open" => Ok(EndOfRunPolicy::LeaveOpen),
            "force_close" | "force-close" => Ok(EndOfRunPolicy::ForceClose),
            other => Err(format!(
                "unknown end_of_run policy '{other}' (expected leave_open or force_close)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub universe: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub threshold: f64,
    pub sell_perc: f64,
    pub hold_till: u32,
    pub stop_perc: f64,
    pub lookback_days: u32,
    pub buy_fraction: f64,
    pub end_of_run: EndOfRunPolicy,
    pub parallel_scan: bool,
}

impl RunConfig {
    pub fn new(
        universe: Vec<String>,
        initial_capital: f64,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        RunConfig {
            universe,
            start_date,
            end_date,
            initial_capital,
            threshold: DEFAULT_THRESHOLD,
            sell_perc: DEFAULT_SELL_PERC,
            hold_till: DEFAULT_HOLD_TILL,
            stop_perc: DEFAULT_STOP_PERC,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            buy_fraction: 1.0,
            end_of_run: EndOfRunPolicy::LeaveOpen,
            parallel_scan: false,
        }
    }

    pub fn exit_params(&self) -> ExitParams {
        ExitParams {
            sell_perc: self.sell_perc,
            hold_till: self.hold_till,
            stop_perc: self.stop_perc,
        }
    }

    /// Identifier for the run's artifacts: `{model}_{threshold}_{hold_till}`.
    pub fn run_id(&self, model_name: &str) -> String {
        format!("{}_{}_{}", model_name, self.threshold, self.hold_till)
    }

    /// Number of calendar days the clock will tick through.
    pub fn total_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn validate(&self) -> Result<(), SignalTraderError> {
        if self.start_date > self.end_date {
            return Err(invalid("start_date", "start_date must not be after end_date"));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(invalid("initial_capital", "initial_capital must be positive"));
        }
        if self.universe.is_empty() {
            return Err(invalid("codes", "universe must contain at least one instrument"));
        }
        let mut seen = HashSet::new();
        for code in &self.universe {
            if code.trim().is_empty() {
                return Err(invalid("codes", "empty instrument identifier"));
            }
            if !seen.insert(code.as_str()) {
                return Err(invalid("codes", &format!("duplicate instrument {code}")));
            }
        }
        if !self.threshold.is_finite() {
            return Err(invalid("threshold", "threshold must be a finite number"));
        }
        if !self.sell_perc.is_finite() || self.sell_perc < 0.0 {
            return Err(invalid("take_profit", "take_profit must be non-negative"));
        }
        if !self.stop_perc.is_finite() || self.stop_perc < 0.0 {
            return Err(invalid("stop_loss", "stop_loss must be non-negative"));
        }
        if self.lookback_days == 0 {
            return Err(invalid("lookback_days", "lookback_days must be at least 1"));
        }
        let lookback = Duration::days(i64::from(self.lookback_days));
        if self.start_date.checked_sub_signed(lookback).is_none() {
            return Err(invalid(
                "lookback_days",
                &format!(
                    "lookback_days reaches before the earliest representable date from {}",
                    self.start_date
                ),
            ));
        }
        if !(self.buy_fraction > 0.0 && self.buy_fraction <= 1.0) {
            return Err(invalid("buy_fraction", "buy_fraction must be in (0, 1]"));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> SignalTraderError {
    let section = match key {
        "threshold" | "take_profit" | "stop_loss" => "strategy",
        _ => "backtest",
    };
    SignalTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
