//! Results persistence port.

use crate::domain::backtest::BacktestResult;
use crate::domain::config::RunConfig;
use crate::domain::error::SignalTraderError;

/// Everything persisted for one run.
pub struct RunReport<'a> {
    pub result: &'a BacktestResult,
    pub config: &'a RunConfig,
    pub model_name: &'a str,
}

pub trait ResultsWriter {
    /// Persist the run; returns a description of where it went.
    fn write(&self, report: &RunReport<'_>) -> Result<String, SignalTraderError>;
}
