//! Historical price access port (the price oracle).

use crate::domain::error::SignalTraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort: Sync {
    /// Bars for `code` with `start_date <= date <= end_date`, sorted by date.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SignalTraderError>;

    fn list_symbols(&self) -> Result<Vec<String>, SignalTraderError>;
}
