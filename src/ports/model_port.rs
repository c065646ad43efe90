//! Predictive model port.
//!
//! The simulator consumes a model through two capabilities: a forward
//! looking score for a lookback window, and an exit decision for an open
//! position. A failed `predict` is expected for windows without tradable
//! data and must come back as an `Err`, never a panic.

use chrono::NaiveDate;

use crate::domain::error::SignalTraderError;
use crate::domain::exit_policy::{ExitDecision, ExitRequest};

/// Signal value meaning "do not buy". Anything below it is buy-eligible.
pub const NO_BUY_SIGNAL: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub score: f64,
    pub signal: i32,
    pub close_price: f64,
}

impl Prediction {
    pub fn is_buy_eligible(&self) -> bool {
        self.signal < NO_BUY_SIGNAL
    }
}

pub trait PredictiveModel: Sync {
    fn name(&self) -> &str;

    fn predict(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        threshold: f64,
    ) -> Result<Prediction, SignalTraderError>;

    fn decide_exit(&self, request: &ExitRequest<'_>) -> Result<ExitDecision, SignalTraderError>;
}
