//! Model adapter backed by precomputed scores.
//!
//! Scores come from a CSV with columns `date,code,score`, produced offline
//! by whatever trained the model. Prices come from a `DataPort`. A score is
//! buy-eligible (signal 0) when it reaches the threshold.

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::domain::error::SignalTraderError;
use crate::domain::exit_policy::{evaluate_exit, ExitDecision, ExitRequest};
use crate::domain::ohlcv::{close_on, latest_close};
use crate::ports::data_port::DataPort;
use crate::ports::model_port::{PredictiveModel, Prediction, NO_BUY_SIGNAL};

/// How far back the exit check looks for the latest close.
pub const PRICE_LOOKBACK_DAYS: i64 = 10;

pub struct ScoreFileModel<D: DataPort> {
    name: String,
    scores: HashMap<(String, NaiveDate), f64>,
    prices: D,
}

impl<D: DataPort> ScoreFileModel<D> {
    pub fn from_csv<P: AsRef<Path>>(
        name: &str,
        path: P,
        prices: D,
    ) -> Result<Self, SignalTraderError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| SignalTraderError::Data {
            reason: format!("failed to open scores {}: {}", path.display(), e),
        })?;
        Self::from_reader(name, file, prices)
    }

    pub fn from_reader<R: Read>(name: &str, reader: R, prices: D) -> Result<Self, SignalTraderError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut scores = HashMap::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| SignalTraderError::Data {
                reason: format!("scores CSV parse error: {}", e),
            })?;
            let bad_row = |what: &str| SignalTraderError::Data {
                reason: format!("scores row {}: {}", line + 1, what),
            };
            let date = record
                .get(0)
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .ok_or_else(|| bad_row("invalid date"))?;
            let code = record
                .get(1)
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| bad_row("missing code"))?;
            let score: f64 = record
                .get(2)
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| bad_row("invalid score"))?;
            scores.insert((code, date), score);
        }

        Ok(ScoreFileModel {
            name: name.to_string(),
            scores,
            prices,
        })
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    fn current_price(&self, code: &str, date: NaiveDate) -> Result<Option<f64>, SignalTraderError> {
        let start = date
            .checked_sub_signed(Duration::days(PRICE_LOOKBACK_DAYS))
            .unwrap_or(NaiveDate::MIN);
        match self.prices.fetch_ohlcv(code, start, date) {
            Ok(bars) => Ok(latest_close(&bars, date)),
            Err(SignalTraderError::DataUnavailable { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl<D: DataPort> PredictiveModel for ScoreFileModel<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        threshold: f64,
    ) -> Result<Prediction, SignalTraderError> {
        let score = *self
            .scores
            .get(&(code.to_string(), end_date))
            .ok_or_else(|| SignalTraderError::unavailable(code, format!("no score on {end_date}")))?;

        let bars = self.prices.fetch_ohlcv(code, start_date, end_date)?;
        let close_price = close_on(&bars, end_date)
            .ok_or_else(|| SignalTraderError::unavailable(code, format!("no bar on {end_date}")))?;

        let signal = if score >= threshold { 0 } else { NO_BUY_SIGNAL };
        Ok(Prediction {
            score,
            signal,
            close_price,
        })
    }

    fn decide_exit(&self, request: &ExitRequest<'_>) -> Result<ExitDecision, SignalTraderError> {
        let price = self.current_price(request.code, request.current_date)?;
        Ok(evaluate_exit(
            request.entry_price,
            request.entry_date,
            request.current_date,
            price,
            &request.params,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::exit_policy::{ExitAction, ExitParams, ExitReason};
    use crate::domain::ohlcv::OhlcvBar;

    struct FixedPrices(Vec<OhlcvBar>);

    impl DataPort for FixedPrices {
        fn fetch_ohlcv(
            &self,
            code: &str,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, SignalTraderError> {
            let bars: Vec<_> = self
                .0
                .iter()
                .filter(|b| b.code == code && b.date >= start_date && b.date <= end_date)
                .cloned()
                .collect();
            if self.0.iter().any(|b| b.code == code) {
                Ok(bars)
            } else {
                Err(SignalTraderError::unavailable(code, "unknown"))
            }
        }

        fn list_symbols(&self) -> Result<Vec<String>, SignalTraderError> {
            Ok(vec![])
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn bar(code: &str, d: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            code: code.into(),
            date: date(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
        }
    }

    fn model() -> ScoreFileModel<FixedPrices> {
        let scores = "date,code,score\n\
            2021-01-04,ebay,0.995\n\
            2021-01-04,AMZN,0.50\n\
            2021-01-09,EBAY,0.999\n";
        let prices = FixedPrices(vec![
            bar("EBAY", 4, 60.0),
            bar("EBAY", 5, 62.5),
            bar("EBAY", 8, 58.0),
            bar("AMZN", 4, 3200.0),
        ]);
        ScoreFileModel::from_reader("LR_v1_predict", scores.as_bytes(), prices).unwrap()
    }

    #[test]
    fn loads_scores() {
        let m = model();
        assert_eq!(m.len(), 3);
        assert_eq!(m.name(), "LR_v1_predict");
    }

    #[test]
    fn predict_thresholds_score() {
        let m = model();
        let p = m.predict("EBAY", date(1), date(4), 0.99).unwrap();
        assert_eq!(p.signal, 0);
        assert_eq!(p.close_price, 60.0);
        assert!((p.score - 0.995).abs() < 1e-12);

        let p = m.predict("AMZN", date(1), date(4), 0.99).unwrap();
        assert_eq!(p.signal, NO_BUY_SIGNAL);
        assert!(!p.is_buy_eligible());
    }

    #[test]
    fn predict_without_score_is_unavailable() {
        let m = model();
        let err = m.predict("EBAY", date(1), date(5), 0.99).unwrap_err();
        assert!(matches!(err, SignalTraderError::DataUnavailable { .. }));
    }

    #[test]
    fn predict_on_non_trading_day_is_unavailable() {
        // Score exists for Saturday the 9th but there is no bar.
        let m = model();
        let err = m.predict("EBAY", date(1), date(9), 0.99).unwrap_err();
        assert!(matches!(err, SignalTraderError::DataUnavailable { .. }));
    }

    #[test]
    fn decide_exit_uses_latest_close() {
        let m = model();
        let params = ExitParams {
            sell_perc: 0.04,
            hold_till: 5,
            stop_perc: 0.005,
        };
        let request = ExitRequest {
            code: "EBAY",
            entry_price: 60.0,
            entry_date: date(4),
            current_date: date(5),
            params,
        };
        let d = m.decide_exit(&request).unwrap();
        assert_eq!(d.action, ExitAction::Sell);
        assert_eq!(d.reason, Some(ExitReason::TakeProfit));
        assert_eq!(d.price, Some(62.5));

        // Sunday the 10th falls back to Friday's close.
        let request = ExitRequest {
            current_date: date(10),
            ..request
        };
        let d = m.decide_exit(&request).unwrap();
        assert_eq!(d.price, Some(58.0));
        assert_eq!(d.reason, Some(ExitReason::StopLoss));
    }

    #[test]
    fn decide_exit_without_price_holds() {
        let m = model();
        let request = ExitRequest {
            code: "SNAP",
            entry_price: 60.0,
            entry_date: date(4),
            current_date: date(20),
            params: ExitParams {
                sell_perc: 0.04,
                hold_till: 5,
                stop_perc: 0.005,
            },
        };
        let d = m.decide_exit(&request).unwrap();
        assert_eq!(d, ExitDecision::hold(None));
    }

    #[test]
    fn malformed_scores_rejected() {
        let result = ScoreFileModel::from_reader(
            "m",
            "date,code,score\n2021-01-04,EBAY,high\n".as_bytes(),
            FixedPrices(vec![]),
        );
        assert!(matches!(result, Err(SignalTraderError::Data { .. })));
    }
}
