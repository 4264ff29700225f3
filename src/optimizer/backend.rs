//! Storage backend seam
//!
//! The optimizer never touches data itself. Once a plan is selected, its
//! final text is handed to a `StorageBackend` together with the original
//! positional arguments. Failures come back as `StoreError` and are
//! propagated to the caller unchanged; the optimizer never retries.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

/// One result row as produced by the backend
pub type Row = Value;

/// Error raised by a storage backend during execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    code: Option<String>,
    retryable: bool,
}

impl StoreError {
    /// Create a new backend error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: false,
        }
    }

    /// Attach a backend-specific code (e.g. an SQLSTATE)
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Mark as transient
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Executes a finalized query string against a set of parameters
pub trait StorageBackend: Send + Sync {
    /// Execute `query` with positional `args`, returning all rows
    fn execute(&self, query: &str, args: &[Value]) -> Result<Vec<Row>, StoreError>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    fn execute(&self, query: &str, args: &[Value]) -> Result<Vec<Row>, StoreError> {
        (**self).execute(query, args)
    }
}
