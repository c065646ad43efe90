//! File results writer.
//!
//! Each run gets its own directory, `<results_dir>/<run_id>/`, holding:
//! - `history.csv`: one row per closed trade
//! - `open_positions.csv`: positions left open at the end of the run
//! - `summary.json`: capital, realized gain and trade statistics
//! - `params.json`: the effective run configuration

use serde::Serialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::domain::error::SignalTraderError;
use crate::domain::metrics::{CodeResult, TradeStats};
use crate::ports::report_port::{ResultsWriter, RunReport};

pub struct CsvResultsWriter {
    results_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    run_id: &'a str,
    model: &'a str,
    initial_capital: f64,
    final_cash: f64,
    total_gain: f64,
    days_simulated: i64,
    open_positions: usize,
    stats: TradeStats,
    per_code: Vec<CodeResult>,
}

impl CsvResultsWriter {
    pub fn new(results_dir: PathBuf) -> Self {
        Self { results_dir }
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.results_dir.join(run_id)
    }
}

fn output_err(path: &Path, e: impl std::fmt::Display) -> SignalTraderError {
    SignalTraderError::Output {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn write_csv<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<(), SignalTraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| output_err(path, e))?;
    // serialize() emits the header with the first row; an empty file still gets one.
    if rows.is_empty() {
        wtr.write_record(header).map_err(|e| output_err(path, e))?;
    }
    for row in rows {
        wtr.serialize(row).map_err(|e| output_err(path, e))?;
    }
    wtr.flush().map_err(|e| output_err(path, e))?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SignalTraderError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| output_err(path, e))?;
    fs::write(path, json + "\n").map_err(|e| output_err(path, e))
}

const TRADE_HEADER: &[&str] = &[
    "code",
    "quantity",
    "entry_price",
    "exit_price",
    "entry_date",
    "exit_date",
    "pnl",
];

const POSITION_HEADER: &[&str] = &["code", "quantity", "entry_price", "entry_date", "allocation"];

impl ResultsWriter for CsvResultsWriter {
    fn write(&self, report: &RunReport<'_>) -> Result<String, SignalTraderError> {
        let result = report.result;
        let mut parts = Path::new(&result.run_id).components();
        if !matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None)) {
            return Err(SignalTraderError::Output {
                reason: format!("run id '{}' is not a plain directory name", result.run_id),
            });
        }
        let dir = self.run_dir(&result.run_id);
        fs::create_dir_all(&dir).map_err(|e| output_err(&dir, e))?;

        write_csv(&dir.join("history.csv"), &result.trades, TRADE_HEADER)?;
        write_csv(
            &dir.join("open_positions.csv"),
            &result.open_positions,
            POSITION_HEADER,
        )?;

        let summary = Summary {
            run_id: &result.run_id,
            model: report.model_name,
            initial_capital: result.summary.initial_capital,
            final_cash: result.summary.cash,
            total_gain: result.summary.total_gain,
            days_simulated: result.days_simulated,
            open_positions: result.open_positions.len(),
            stats: TradeStats::compute(&result.trades, result.summary.initial_capital),
            per_code: CodeResult::compute_per_code(&result.trades),
        };
        write_json(&dir.join("summary.json"), &summary)?;
        write_json(&dir.join("params.json"), report.config)?;

        Ok(dir.display().to_string())
    }
}
