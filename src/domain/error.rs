//! Domain error types.
//!
//! Risk limit rejections are deliberately absent: they are ordinary outcomes
//! reported through [`crate::domain::risk::RiskDecision`].

/// Top-level error type for robo.
#[derive(Debug, thiserror::Error)]
pub enum RoboError {
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

    #[error("unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("strategy {strategy} requires parameter {name}")]
    MissingParameter { strategy: String, name: String },

    #[error("invalid market data for {symbol}: {reason}")]
    DataValidation { symbol: String, reason: String },

    #[error("insufficient data for {symbol}: have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        bars: usize,
        minimum: usize,
    },

    #[error("execution failed: {reason}")]
    Execution { reason: String },

    #[error("no open position for {symbol}")]
    PositionNotFound { symbol: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RoboError {
    /// Configuration-level errors abort a run before any simulation starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RoboError::ConfigParse { .. }
                | RoboError::ConfigMissing { .. }
                | RoboError::ConfigInvalid { .. }
                | RoboError::UnknownStrategy { .. }
                | RoboError::MissingParameter { .. }
        )
    }

    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        RoboError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<&RoboError> for std::process::ExitCode {
    fn from(err: &RoboError) -> Self {
        let code: u8 = match err {
            RoboError::Io(_) | RoboError::Csv(_) => 1,
            RoboError::ConfigParse { .. }
            | RoboError::ConfigMissing { .. }
            | RoboError::ConfigInvalid { .. } => 2,
            RoboError::UnknownStrategy { .. } | RoboError::MissingParameter { .. } => 4,
            RoboError::DataValidation { .. } | RoboError::InsufficientData { .. } => 5,
            RoboError::Execution { .. } | RoboError::PositionNotFound { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
