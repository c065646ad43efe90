//! Daily candidate scanner.
//!
//! Every instrument in the universe is scored independently over a
//! lookback window ending on the current day. Each query yields a
//! `ScanOutcome`; failures become `Excluded` entries rather than aborting
//! the scan. Eligible candidates are then stable-sorted by score,
//! highest first, so ties keep universe order.

use chrono::{Duration, NaiveDate};
use log::debug;
use rayon::prelude::*;

use crate::ports::model_port::PredictiveModel;

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub code: String,
    pub score: f64,
    pub signal: i32,
    pub close_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExclusionReason {
    /// The model or price lookup failed for this day.
    DataUnavailable(String),
    /// The model answered, but its signal says "do not buy".
    NotBuyEligible { signal: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Eligible(Candidate),
    Excluded {
        code: String,
        reason: ExclusionReason,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateRanking {
    pub candidates: Vec<Candidate>,
    pub excluded: Vec<(String, ExclusionReason)>,
}

impl CandidateRanking {
    /// Build a ranking from outcomes given in universe order.
    pub fn from_outcomes(outcomes: Vec<ScanOutcome>) -> Self {
        let mut ranking = CandidateRanking::default();
        for outcome in outcomes {
            match outcome {
                ScanOutcome::Eligible(c) => ranking.candidates.push(c),
                ScanOutcome::Excluded { code, reason } => ranking.excluded.push((code, reason)),
            }
        }
        // sort_by is stable: equal scores keep scan order.
        ranking
            .candidates
            .sort_by(|a, b| b.score.total_cmp(&a.score));
        ranking
    }

    pub fn top(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// Score one instrument for the window `[day - lookback_days, day]`.
pub fn scan_instrument<M: PredictiveModel + ?Sized>(
    code: &str,
    day: NaiveDate,
    model: &M,
    threshold: f64,
    lookback_days: u32,
) -> ScanOutcome {
    let Some(start) = day.checked_sub_signed(Duration::days(i64::from(lookback_days))) else {
        return ScanOutcome::Excluded {
            code: code.to_string(),
            reason: ExclusionReason::DataUnavailable(format!(
                "{lookback_days}-day window before {day} is out of range"
            )),
        };
    };
    match model.predict(code, start, day, threshold) {
        Ok(prediction) if prediction.is_buy_eligible() => ScanOutcome::Eligible(Candidate {
            code: code.to_string(),
            score: prediction.score,
            signal: prediction.signal,
            close_price: prediction.close_price,
        }),
        Ok(prediction) => ScanOutcome::Excluded {
            code: code.to_string(),
            reason: ExclusionReason::NotBuyEligible {
                signal: prediction.signal,
            },
        },
        Err(e) => {
            debug!("{day}: excluding {code} ({e})");
            ScanOutcome::Excluded {
                code: code.to_string(),
                reason: ExclusionReason::DataUnavailable(e.to_string()),
            }
        }
    }
}

/// Rank the universe for `day`.
///
/// With `parallel` the per-instrument queries run on the rayon pool. The
/// collect preserves universe order and completes before sorting, so the
/// ranking is identical to the sequential one.
pub fn scan<M: PredictiveModel + ?Sized>(
    day: NaiveDate,
    universe: &[String],
    model: &M,
    threshold: f64,
    lookback_days: u32,
    parallel: bool,
) -> CandidateRanking {
    let outcomes: Vec<ScanOutcome> = if parallel {
        universe
            .par_iter()
            .map(|code| scan_instrument(code, day, model, threshold, lookback_days))
            .collect()
    } else {
        universe
            .iter()
            .map(|code| scan_instrument(code, day, model, threshold, lookback_days))
            .collect()
    };
    CandidateRanking::from_outcomes(outcomes)
}
