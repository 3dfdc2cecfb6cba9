//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Only deterministic input failures live here. "Not enough data to estimate"
/// is a normal outcome and is modelled as `Ok(None)` by callers, never as an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. negative window, NaN quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Require `value` to be a finite, non-negative number.
pub fn ensure_non_negative(field: &str, value: f64) -> DomainResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "{field} must be a finite non-negative number (got {value})"
        )))
    }
}

/// Require `value` to be a finite, strictly positive number.
pub fn ensure_positive(field: &str, value: f64) -> DomainResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DomainError::validation(format!(
            "{field} must be a finite positive number (got {value})"
        )))
    }
}
