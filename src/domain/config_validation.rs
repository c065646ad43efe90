//! Configuration file validation.
//!
//! Checks every INI field before a `RunConfig` is built, so a typo is
//! reported against its section and key instead of silently falling back
//! to a default.

use crate::domain::config::EndOfRunPolicy;
use crate::domain::error::SignalTraderError;
use crate::domain::universe::{parse_codes, ALL_SYMBOLS};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Every key the simulator reads, by section.
pub const KNOWN_KEYS: &[(&str, &[&str])] = &[
    (
        "backtest",
        &[
            "start_date",
            "end_date",
            "initial_capital",
            "codes",
            "lookback_days",
            "buy_fraction",
            "end_of_run",
            "parallel_scan",
        ],
    ),
    (
        "strategy",
        &["model_name", "threshold", "take_profit", "hold_till", "stop_loss"],
    ),
    ("data", &["price_dir", "scores_file"]),
    ("output", &["results_dir"]),
];

/// Keys in known sections that nothing reads, usually typos.
pub fn unknown_keys(config: &dyn ConfigPort) -> Vec<(String, String)> {
    KNOWN_KEYS
        .iter()
        .flat_map(|(section, known)| {
            config
                .keys(section)
                .into_iter()
                .filter(|key| !known.contains(&key.as_str()))
                .map(move |key| (section.to_string(), key))
        })
        .collect()
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    validate_initial_capital(config)?;
    validate_dates(config)?;
    validate_codes(config)?;
    validate_lookback(config)?;
    validate_buy_fraction(config)?;
    validate_end_of_run(config)?;
    optional_bool(config, "backtest", "parallel_scan")?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    if let Some(name) = config.get_value("strategy", "model_name") {
        validate_model_name(&name)?;
    }
    optional_f64(config, "strategy", "threshold")?;
    non_negative(config, "strategy", "take_profit")?;
    non_negative(config, "strategy", "stop_loss")?;
    if let Some(v) = optional_i64(config, "strategy", "hold_till")? {
        if v < 0 {
            return Err(invalid("strategy", "hold_till", "hold_till must be non-negative"));
        }
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    for key in ["price_dir", "scores_file"] {
        if config.get_value("data", key).is_none() {
            return Err(SignalTraderError::ConfigMissing {
                section: "data".to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_all(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_data_config(config)
}

/// Parse a required `YYYY-MM-DD` value.
pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<NaiveDate, SignalTraderError> {
    let value = config
        .get_value(section, key)
        .ok_or_else(|| SignalTraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })?;
    NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|_| {
        invalid(
            section,
            key,
            &format!("invalid {key} format, expected YYYY-MM-DD"),
        )
    })
}

/// `Ok(None)` when absent, an error when present but not a number.
pub fn optional_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, SignalTraderError> {
    match config.get_value(section, key) {
        None => Ok(None),
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(invalid(section, key, &format!("'{raw}' is not a number"))),
        },
    }
}

pub fn optional_i64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<i64>, SignalTraderError> {
    match config.get_value(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("'{raw}' is not an integer"))),
    }
}

pub fn optional_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<bool>, SignalTraderError> {
    match config.get_value(section, key) {
        None => Ok(None),
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => Err(invalid(section, key, &format!("'{raw}' is not a boolean"))),
        },
    }
}

/// The model name becomes a directory name under the results directory.
pub fn validate_model_name(name: &str) -> Result<(), SignalTraderError> {
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(invalid(
            "strategy",
            "model_name",
            &format!("'{name}' must not contain path separators or be '.' or '..'"),
        ));
    }
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> SignalTraderError {
    SignalTraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), SignalTraderError> {
    if let Some(v) = optional_f64(config, section, key)? {
        if v < 0.0 {
            return Err(invalid(section, key, &format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    match optional_f64(config, "backtest", "initial_capital")? {
        None => Err(SignalTraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
        }),
        Some(v) if v <= 0.0 => Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        )),
        Some(_) => Ok(()),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    let start_date = parse_date(config, "backtest", "start_date")?;
    let end_date = parse_date(config, "backtest", "end_date")?;

    if start_date > end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    match config.get_value("backtest", "codes") {
        None => Err(SignalTraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "codes".to_string(),
        }),
        Some(codes) if codes == ALL_SYMBOLS => Ok(()),
        Some(codes) => parse_codes(&codes).map(|_| ()).map_err(Into::into),
    }
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    if let Some(v) = optional_i64(config, "backtest", "lookback_days")? {
        if v < 1 || v > i64::from(u32::MAX) {
            return Err(invalid(
                "backtest",
                "lookback_days",
                "lookback_days must be at least 1",
            ));
        }
    }
    Ok(())
}

fn validate_buy_fraction(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    if let Some(v) = optional_f64(config, "backtest", "buy_fraction")? {
        if v <= 0.0 || v > 1.0 {
            return Err(invalid(
                "backtest",
                "buy_fraction",
                "buy_fraction must be between 0 and 1",
            ));
        }
    }
    Ok(())
}

fn validate_end_of_run(config: &dyn ConfigPort) -> Result<(), SignalTraderError> {
    if let Some(v) = config.get_value("backtest", "end_of_run") {
        v.parse::<EndOfRunPolicy>()
            .map_err(|reason| invalid("backtest", "end_of_run", &reason))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BASE: &str = "[backtest]\ninitial_capital = 3000\nstart_date = 2021-01-01\nend_date = 2021-01-31\ncodes = EBAY,AMZN\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_backtest(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{BASE}{extra}"))
    }

    #[test]
    fn unknown_keys_are_listed() {
        let config = with_backtest("stop_los = 0.1\n[strategy]\nthreshold = 0.9\ntreshold = 0.8\n");
        assert_eq!(
            unknown_keys(&config),
            vec![
                ("backtest".to_string(), "stop_los".to_string()),
                ("strategy".to_string(), "treshold".to_string()),
            ]
        );
        assert!(unknown_keys(&make_config(BASE)).is_empty());
    }

    #[test]
    fn model_name_must_be_a_plain_name() {
        for name in ["../escape", "a/b", "a\\b", ".."] {
            let config = make_config(&format!("[strategy]\nmodel_name = {name}\n"));
            let err = validate_strategy_config(&config).unwrap_err();
            assert!(
                matches!(err, SignalTraderError::ConfigInvalid { ref key, .. } if key == "model_name"),
                "{name} accepted"
            );
        }
        let config = make_config("[strategy]\nmodel_name = LR_v1.predict\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = with_backtest("lookback_days = 30\nbuy_fraction = 1.0\nend_of_run = force_close\nparallel_scan = yes\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_required_and_positive() {
        let config = make_config("[backtest]\nstart_date = 2021-01-01\nend_date = 2021-01-31\ncodes = EBAY\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigMissing { key, .. } if key == "initial_capital"));

        let config = make_config("[backtest]\ninitial_capital = 0\nstart_date = 2021-01-01\nend_date = 2021-01-31\ncodes = EBAY\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "initial_capital"));
    }

    #[test]
    fn non_numeric_capital_is_reported() {
        let config = make_config("[backtest]\ninitial_capital = lots\nstart_date = 2021-01-01\nend_date = 2021-01-31\ncodes = EBAY\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "initial_capital"));
    }

    #[test]
    fn start_after_end_fails() {
        let config = make_config("[backtest]\ninitial_capital = 3000\nstart_date = 2021-02-01\nend_date = 2021-01-31\ncodes = EBAY\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn same_start_and_end_passes() {
        let config = make_config("[backtest]\ninitial_capital = 3000\nstart_date = 2021-01-31\nend_date = 2021-01-31\ncodes = EBAY\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn bad_date_format_fails() {
        let config = make_config("[backtest]\ninitial_capital = 3000\nstart_date = 2021/01/01\nend_date = 2021-01-31\ncodes = EBAY\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn codes_required() {
        let config = make_config("[backtest]\ninitial_capital = 3000\nstart_date = 2021-01-01\nend_date = 2021-01-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigMissing { key, .. } if key == "codes"));
    }

    #[test]
    fn duplicate_codes_fail() {
        let config = make_config("[backtest]\ninitial_capital = 3000\nstart_date = 2021-01-01\nend_date = 2021-01-31\ncodes = EBAY,ebay\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "codes"));
    }

    #[test]
    fn star_codes_pass() {
        let config = make_config("[backtest]\ninitial_capital = 3000\nstart_date = 2021-01-01\nend_date = 2021-01-31\ncodes = *\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn bad_optional_backtest_values_fail() {
        for (extra, key) in [
            ("lookback_days = 0\n", "lookback_days"),
            ("buy_fraction = 1.5\n", "buy_fraction"),
            ("end_of_run = maybe\n", "end_of_run"),
            ("parallel_scan = perhaps\n", "parallel_scan"),
        ] {
            let err = validate_backtest_config(&with_backtest(extra)).unwrap_err();
            assert!(
                matches!(err, SignalTraderError::ConfigInvalid { key: ref k, .. } if k == key),
                "expected {key} to be rejected, got {err}"
            );
        }
    }

    #[test]
    fn strategy_defaults_pass() {
        let config = make_config("[strategy]\n");
        assert!(validate_strategy_config(&config).is_ok());
    }

    #[test]
    fn strategy_values_checked() {
        let config = make_config("[strategy]\nthreshold = 1\ntake_profit = 0.03\nhold_till = 1\nstop_loss = 0.03\n");
        assert!(validate_strategy_config(&config).is_ok());

        let config = make_config("[strategy]\nstop_loss = -0.1\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "stop_loss"));

        let config = make_config("[strategy]\nhold_till = -1\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "hold_till"));

        let config = make_config("[strategy]\nthreshold = high\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigInvalid { key, .. } if key == "threshold"));
    }

    #[test]
    fn data_section_required() {
        let config = make_config("[data]\nprice_dir = prices\n");
        let err = validate_data_config(&config).unwrap_err();
        assert!(matches!(err, SignalTraderError::ConfigMissing { key, .. } if key == "scores_file"));

        let config = make_config("[data]\nprice_dir = prices\nscores_file = scores.csv\n");
        assert!(validate_data_config(&config).is_ok());
    }
}
