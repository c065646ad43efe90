//! Domain error types.

/// Top-level error type for signaltrader.
#[derive(Debug, thiserror::Error)]
pub enum SignalTraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    /// A single instrument has no usable data for the requested window.
    /// Routine (weekends, holidays, unlisted codes); the scanner excludes
    /// the instrument and carries on.
    #[error("no data for {code}: {reason}")]
    DataUnavailable { code: String, reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("model error: {reason}")]
    Model { reason: String },

    /// The buy/sell state machine and the ledger disagree. Never recovered.
    #[error("invariant violation: {reason}")]
    InvariantViolation { reason: String },

    #[error("failed to write results: {reason}")]
    Output { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SignalTraderError {
    pub fn invariant(reason: impl Into<String>) -> Self {
        SignalTraderError::InvariantViolation {
            reason: reason.into(),
        }
    }

    pub fn unavailable(code: &str, reason: impl Into<String>) -> Self {
        SignalTraderError::DataUnavailable {
            code: code.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit status for this error class.
    pub fn exit_status(&self) -> u8 {
        match self {
            SignalTraderError::Io(_) | SignalTraderError::Output { .. } => 1,
            SignalTraderError::ConfigParse { .. }
            | SignalTraderError::ConfigMissing { .. }
            | SignalTraderError::ConfigInvalid { .. } => 2,
            SignalTraderError::DataUnavailable { .. }
            | SignalTraderError::Data { .. }
            | SignalTraderError::Model { .. } => 3,
            SignalTraderError::InvariantViolation { .. } => 4,
        }
    }
}

impl From<&SignalTraderError> for std::process::ExitCode {
    fn from(err: &SignalTraderError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
