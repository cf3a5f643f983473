//! Store errors
//!
//! One enum for every failure the engine can surface. Storage internals are
//! opaque to external callers: `Storage` and `Internal` both display a
//! generic message; the detail stays in `Debug` output and logs.

use chainbank_canon::CanonError;
use chainbank_core::{AmountError, CurrencyError};
use thiserror::Error;

/// Errors that can occur in ledger operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("validation error: currency mismatch")]
    CurrencyMismatch,

    #[error("not found")]
    NotFound,

    #[error("idempotency key used with different payload")]
    IdempotencyConflict,

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("storage failure")]
    Storage(#[from] sqlx::Error),

    /// A storage invariant the engine maintains itself was found broken.
    /// Externally indistinguishable from `Storage`.
    #[error("storage failure")]
    Internal(String),
}

/// Coarse error classification for boundary mapping (HTTP status codes,
/// metrics labels). `CurrencyMismatch` is a Validation subkind; `Internal`
/// is Storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    IdempotencyConflict,
    Cancelled,
    DeadlineExceeded,
    Storage,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) | StoreError::CurrencyMismatch => ErrorKind::Validation,
            StoreError::NotFound => ErrorKind::NotFound,
            StoreError::IdempotencyConflict => ErrorKind::IdempotencyConflict,
            StoreError::Cancelled => ErrorKind::Cancelled,
            StoreError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            StoreError::Storage(_) | StoreError::Internal(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }
}

impl From<CurrencyError> for StoreError {
    fn from(err: CurrencyError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<AmountError> for StoreError {
    fn from(err: AmountError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<CanonError> for StoreError {
    fn from(err: CanonError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

/// True when the underlying storage error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
