//! Instrument universe parsing.
//!
//! Codes come from a comma-separated config value. The special value `*`
//! selects every symbol the price source knows about.

use crate::domain::error::SignalTraderError;
use crate::ports::data_port::DataPort;
use std::collections::HashSet;

pub const ALL_SYMBOLS: &str = "*";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

impl From<UniverseError> for SignalTraderError {
    fn from(err: UniverseError) -> Self {
        SignalTraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "codes".to_string(),
            reason: err.to_string(),
        }
    }
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Resolve a code list, expanding `*` through the data port.
pub fn resolve_universe(
    input: &str,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, SignalTraderError> {
    if input.trim() == ALL_SYMBOLS {
        return data_port.list_symbols();
    }
    Ok(parse_codes(input)?)
}
