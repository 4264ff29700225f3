//! Optimizer error types
//!
//! Error codes:
//! - PLANOPT_QUERY_INVALID (REJECT, never cached)
//! - PLANOPT_STORE_EXECUTION_FAILED (propagated from the backend, never cached)
//! - PLANOPT_CONFIG_INVALID (construction only)
//!
//! Cost estimation and plan selection have no error path.

use std::fmt;

use thiserror::Error;

use super::backend::StoreError;

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Stable error codes exposed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerErrorCode {
    /// Empty or malformed query text
    QueryInvalid,
    /// Backend failed while executing the selected plan
    StoreExecutionFailed,
    /// Configuration could not be read or failed validation
    ConfigInvalid,
}

impl OptimizerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            OptimizerErrorCode::QueryInvalid => "PLANOPT_QUERY_INVALID",
            OptimizerErrorCode::StoreExecutionFailed => "PLANOPT_STORE_EXECUTION_FAILED",
            OptimizerErrorCode::ConfigInvalid => "PLANOPT_CONFIG_INVALID",
        }
    }
}

impl fmt::Display for OptimizerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the optimizer facade
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Query text rejected before any cache or plan work
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Backend execution failed; carried verbatim
    #[error("Store execution failed: {0}")]
    StoreExecution(#[from] StoreError),

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OptimizerError {
    /// Create an invalid query error
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        OptimizerError::InvalidQuery(reason.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        OptimizerError::InvalidConfig(reason.into())
    }

    /// Returns the error code
    pub fn code(&self) -> OptimizerErrorCode {
        match self {
            OptimizerError::InvalidQuery(_) => OptimizerErrorCode::QueryInvalid,
            OptimizerError::StoreExecution(_) => OptimizerErrorCode::StoreExecutionFailed,
            OptimizerError::InvalidConfig(_) => OptimizerErrorCode::ConfigInvalid,
        }
    }

    /// Whether the caller may retry. The optimizer itself never does.
    pub fn is_retryable(&self) -> bool {
        match self {
            OptimizerError::StoreExecution(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the backend error if this is an execution failure
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            OptimizerError::StoreExecution(e) => Some(e),
            _ => None,
        }
    }
}
