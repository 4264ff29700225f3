//! CLI-specific error types

use std::fmt;
use std::io;

use crate::optimizer::{OptimizerError, OptimizerErrorCode};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Argument accepted by clap but unusable
    InvalidArgument,
    /// Error raised by the optimizer itself
    Optimizer(OptimizerErrorCode),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "PLANOPT_CLI_CONFIG_ERROR",
            Self::IoError => "PLANOPT_CLI_IO_ERROR",
            Self::InvalidArgument => "PLANOPT_CLI_INVALID_ARGUMENT",
            Self::Optimizer(code) => code.code(),
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<OptimizerError> for CliError {
    fn from(e: OptimizerError) -> Self {
        match e.code() {
            OptimizerErrorCode::ConfigInvalid => Self::config_error(e.to_string()),
            code => Self::new(CliErrorCode::Optimizer(code), e.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_error_keeps_its_code() {
        let err: CliError = OptimizerError::invalid_query("query text is empty").into();
        assert_eq!(err.code_str(), "PLANOPT_QUERY_INVALID");
        assert!(err.message().contains("empty"));
    }

    #[test]
    fn test_config_error_maps_to_cli_config() {
        let err: CliError = OptimizerError::invalid_config("bad").into();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_display_includes_code() {
        let err = CliError::invalid_argument("draws must be > 0");
        assert_eq!(
            err.to_string(),
            "PLANOPT_CLI_INVALID_ARGUMENT: draws must be > 0"
        );
    }
}
