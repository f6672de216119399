//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input shape (non-positive cut dimension, unit weight <= 0, ...).
    /// Always rejected before anything is mutated.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Usage error: the operation is not legal in the current state
    /// (adjusting before QC, halting without a reason, empty routing).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Unknown item, job, recipe or session. The whole operation is aborted.
    #[error("not found: {0}")]
    NotFound(String),

    /// Recoverable conflict: lost race, stale version, confirm-scan mismatch.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether the caller may retry or re-enter input after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
