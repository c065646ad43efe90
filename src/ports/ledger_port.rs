//! Capital and position ledger port.
//!
//! `open_position` and `close_position` are the only mutators. Both report
//! contract breaches (opening a held instrument, closing one that is not
//! held) as `InvariantViolation`.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::error::SignalTraderError;
use crate::domain::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened(Position),
    /// Cash cannot cover a single unit at this price; nothing was opened.
    InsufficientCapital,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub initial_capital: f64,
    pub cash: f64,
    /// Realized gain over closed trades only.
    pub total_gain: f64,
}

pub trait Ledger {
    fn open_position(
        &mut self,
        code: &str,
        price: f64,
        date: NaiveDate,
    ) -> Result<OpenOutcome, SignalTraderError>;

    fn close_position(
        &mut self,
        code: &str,
        price: f64,
        entry_date: NaiveDate,
        exit_date: NaiveDate,
    ) -> Result<ClosedTrade, SignalTraderError>;

    fn open_positions(&self) -> &BTreeMap<String, Position>;

    fn summary(&self) -> LedgerSummary;

    fn history(&self) -> &[ClosedTrade];
}
