//! OHLCV bar representation and close-price lookups.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Close of the bar dated exactly `date`.
pub fn close_on(bars: &[OhlcvBar], date: NaiveDate) -> Option<f64> {
    bars.iter().find(|b| b.date == date).map(|b| b.close)
}

/// Close of the most recent bar dated on or before `date`.
pub fn latest_close(bars: &[OhlcvBar], date: NaiveDate) -> Option<f64> {
    bars.iter()
        .filter(|b| b.date <= date)
        .max_by_key(|b| b.date)
        .map(|b| b.close)
}
