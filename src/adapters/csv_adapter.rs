//! CSV file price adapter.
//!
//! One file per instrument, `<CODE>.csv`, with a header row and columns
//! `date,open,high,low,close,volume`. Files are parsed once and kept in
//! memory; the simulator asks for overlapping windows every day.

use crate::domain::error::SignalTraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

pub struct CsvAdapter {
    base_path: PathBuf,
    cache: RwLock<HashMap<String, Arc<Vec<OhlcvBar>>>>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn load(&self, code: &str) -> Result<Arc<Vec<OhlcvBar>>, SignalTraderError> {
        if let Ok(cache) = self.cache.read() {
            if let Some(bars) = cache.get(code) {
                return Ok(Arc::clone(bars));
            }
        }

        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| {
            SignalTraderError::unavailable(code, format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| SignalTraderError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            bars.push(parse_bar(code, &record)?);
        }
        bars.sort_by_key(|b| b.date);

        let bars = Arc::new(bars);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(code.to_string(), Arc::clone(&bars));
        }
        Ok(bars)
    }
}

fn field<'r>(record: &'r StringRecord, index: usize, name: &str) -> Result<&'r str, SignalTraderError> {
    record.get(index).ok_or_else(|| SignalTraderError::Data {
        reason: format!("missing {name} column"),
    })
}

fn number<T: std::str::FromStr>(
    record: &StringRecord,
    index: usize,
    name: &str,
) -> Result<T, SignalTraderError>
where
    T::Err: std::fmt::Display,
{
    field(record, index, name)?
        .trim()
        .parse()
        .map_err(|e| SignalTraderError::Data {
            reason: format!("invalid {name} value: {e}"),
        })
}

fn parse_bar(code: &str, record: &StringRecord) -> Result<OhlcvBar, SignalTraderError> {
    let date_str = field(record, 0, "date")?;
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
        SignalTraderError::Data {
            reason: format!("invalid date format: {}", e),
        }
    })?;

    Ok(OhlcvBar {
        code: code.to_string(),
        date,
        open: number(record, 1, "open")?,
        high: number(record, 2, "high")?,
        low: number(record, 3, "low")?,
        close: number(record, 4, "close")?,
        volume: number(record, 5, "volume")?,
    })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SignalTraderError> {
        let bars = self.load(code)?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, SignalTraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| SignalTraderError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SignalTraderError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(code) = name_str.strip_suffix(".csv") {
                symbols.push(code.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2021-01-06,100.0,110.0,90.0,105.0,50000\n\
            2021-01-04,105.0,115.0,100.0,110.0,60000\n\
            2021-01-05,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("EBAY.csv"), csv_content).unwrap();
        fs::write(path.join("AMZN.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();
        fs::write(
            path.join("BAD.csv"),
            "date,open,high,low,close,volume\n2021-01-04,1,2,0.5,abc,10\n",
        )
        .unwrap();

        (dir, path)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_ohlcv("EBAY", date(1), date(31)).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(4));
        assert_eq!(bars[0].close, 110.0);
        assert_eq!(bars[2].date, date(6));
        assert_eq!(bars[2].volume, 50000);
        assert_eq!(bars[0].code, "EBAY");
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_ohlcv("EBAY", date(5), date(5)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].date, date(5));

        // Served from cache the second time.
        let bars = adapter.fetch_ohlcv("EBAY", date(4), date(5)).unwrap();
        assert_eq!(bars.len(), 2);
    }

    #[test]
    fn missing_file_is_data_unavailable() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_ohlcv("XYZ", date(1), date(31));
        assert!(matches!(result, Err(SignalTraderError::DataUnavailable { code, .. }) if code == "XYZ"));
    }

    #[test]
    fn malformed_value_is_data_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_ohlcv("BAD", date(1), date(31));
        assert!(matches!(result, Err(SignalTraderError::Data { .. })));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let symbols = adapter.list_symbols().unwrap();
        assert_eq!(symbols, vec!["AMZN", "BAD", "EBAY"]);
    }
}
