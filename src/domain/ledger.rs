//! Cash, open positions and trade history.
//!
//! Positions are sized with a fixed fraction of available cash, rounded
//! down to whole units. Realized gain is booked only on close.

use chrono::NaiveDate;
use log::{debug, info};
use std::collections::BTreeMap;

use super::error::SignalTraderError;
use super::position::{ClosedTrade, Position};
use crate::ports::ledger_port::{Ledger, LedgerSummary, OpenOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedLedger {
    pub cash: f64,
    pub initial_capital: f64,
    pub total_gain: f64,
    /// Fraction of available cash committed per buy.
    pub buy_fraction: f64,
    positions: BTreeMap<String, Position>,
    closed_trades: Vec<ClosedTrade>,
}

impl SimulatedLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self::with_buy_fraction(initial_capital, 1.0)
    }

    pub fn with_buy_fraction(initial_capital: f64, buy_fraction: f64) -> Self {
        SimulatedLedger {
            cash: initial_capital,
            initial_capital,
            total_gain: 0.0,
            buy_fraction,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
        }
    }

    pub fn has_position(&self, code: &str) -> bool {
        self.positions.contains_key(code)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Whole units affordable at `price` with the configured fraction.
    pub fn quantity_for(&self, price: f64) -> i64 {
        if price <= 0.0 || !price.is_finite() {
            return 0;
        }
        (self.cash * self.buy_fraction / price).floor() as i64
    }
}

impl Ledger for SimulatedLedger {
    fn open_position(
        &mut self,
        code: &str,
        price: f64,
        date: NaiveDate,
    ) -> Result<OpenOutcome, SignalTraderError> {
        if self.has_position(code) {
            return Err(SignalTraderError::invariant(format!(
                "open requested for {code} which is already held"
            )));
        }

        let quantity = self.quantity_for(price);
        if quantity <= 0 {
            debug!("cannot afford {code} at {price:.4} with cash {:.2}", self.cash);
            return Ok(OpenOutcome::InsufficientCapital);
        }

        let allocation = quantity as f64 * price;
        self.cash -= allocation;

        let position = Position {
            code: code.to_string(),
            quantity,
            entry_price: price,
            entry_date: date,
            allocation,
        };
        info!("{date}: bought {quantity} {code} @ {price:.4}");
        self.positions.insert(code.to_string(), position.clone());
        Ok(OpenOutcome::Opened(position))
    }

    fn close_position(
        &mut self,
        code: &str,
        price: f64,
        entry_date: NaiveDate,
        exit_date: NaiveDate,
    ) -> Result<ClosedTrade, SignalTraderError> {
        let position = match self.positions.get(code) {
            Some(p) => p,
            None => {
                return Err(SignalTraderError::invariant(format!(
                    "close requested for {code} which is not held"
                )))
            }
        };
        if position.entry_date != entry_date {
            return Err(SignalTraderError::invariant(format!(
                "close requested for {code} entered {entry_date}, but the open position was entered {}",
                position.entry_date
            )));
        }

        let position = self
            .positions
            .remove(code)
            .ok_or_else(|| SignalTraderError::invariant(format!("{code} vanished during close")))?;

        let pnl = position.unrealized_pnl(price);
        self.cash += position.market_value(price);
        self.total_gain += pnl;

        let trade = ClosedTrade {
            code: position.code,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price: price,
            entry_date: position.entry_date,
            exit_date,
            pnl,
        };
        info!(
            "{exit_date}: sold {} {} @ {price:.4} (gain {pnl:.2})",
            trade.quantity, trade.code
        );
        self.closed_trades.push(trade.clone());
        Ok(trade)
    }

    fn open_positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            initial_capital: self.initial_capital,
            cash: self.cash,
            total_gain: self.total_gain,
        }
    }

    fn history(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }
}
