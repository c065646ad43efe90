#![allow(dead_code)]

use chrono::NaiveDate;
use signaltrader::adapters::score_model::ScoreFileModel;
use signaltrader::domain::config::RunConfig;
use signaltrader::domain::error::SignalTraderError;
pub use signaltrader::domain::ohlcv::OhlcvBar;
use signaltrader::domain::position::{ClosedTrade, Position};
use signaltrader::ports::data_port::DataPort;
use signaltrader::ports::ledger_port::{Ledger, LedgerSummary, OpenOutcome};
use std::collections::{BTreeMap, HashMap};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    /// One bar per listed day, all prices equal to the close.
    pub fn with_closes(self, code: &str, closes: &[(u32, f64)]) -> Self {
        let bars = closes
            .iter()
            .map(|&(d, close)| make_bar(code, date(d), close))
            .collect();
        self.with_bars(code, bars)
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SignalTraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(SignalTraderError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(code)
            .ok_or_else(|| SignalTraderError::unavailable(code, "no price file"))?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SignalTraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// A day in January 2021. The 1st is a Friday.
pub fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
}

pub fn make_bar(code: &str, date: NaiveDate, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000,
    }
}

/// Scores CSV text from `(day, code, score)` rows.
pub fn scores_csv(rows: &[(u32, &str, f64)]) -> String {
    let mut out = String::from("date,code,score\n");
    for (d, code, score) in rows {
        out.push_str(&format!("{},{},{}\n", date(*d), code, score));
    }
    out
}

pub fn score_model(
    name: &str,
    rows: &[(u32, &str, f64)],
    prices: MockDataPort,
) -> ScoreFileModel<MockDataPort> {
    ScoreFileModel::from_reader(name, scores_csv(rows).as_bytes(), prices).unwrap()
}

pub fn make_config(codes: &[&str], capital: f64, start: u32, end: u32) -> RunConfig {
    RunConfig {
        threshold: 0.9,
        ..RunConfig::new(
            codes.iter().map(|c| c.to_string()).collect(),
            capital,
            date(start),
            date(end),
        )
    }
}

/// Ledger that reports every buy as opened but never records it.
pub struct ForgetfulLedger {
    positions: BTreeMap<String, Position>,
    capital: f64,
}

impl ForgetfulLedger {
    pub fn new(capital: f64) -> Self {
        Self {
            positions: BTreeMap::new(),
            capital,
        }
    }
}

impl Ledger for ForgetfulLedger {
    fn open_position(
        &mut self,
        code: &str,
        price: f64,
        date: NaiveDate,
    ) -> Result<OpenOutcome, SignalTraderError> {
        Ok(OpenOutcome::Opened(Position {
            code: code.to_string(),
            quantity: 1,
            entry_price: price,
            entry_date: date,
            allocation: price,
        }))
    }

    fn close_position(
        &mut self,
        code: &str,
        _price: f64,
        _entry_date: NaiveDate,
        _exit_date: NaiveDate,
    ) -> Result<ClosedTrade, SignalTraderError> {
        Err(SignalTraderError::invariant(format!("{code} is not held")))
    }

    fn open_positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    fn summary(&self) -> LedgerSummary {
        LedgerSummary {
            initial_capital: self.capital,
            cash: self.capital,
            total_gain: 0.0,
        }
    }

    fn history(&self) -> &[ClosedTrade] {
        &[]
    }
}
