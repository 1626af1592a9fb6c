//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures (validation, stock
/// floor, lifecycle guards). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. zero quantity, unsupported file type).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A `saida` movement would drive the inventory record below zero.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    /// The RMA is already cancelled (cancel / return-to-stock / transition refused).
    #[error("rma is already cancelled")]
    AlreadyCancelled,

    /// Deletion requires a cancelled RMA.
    #[error("rma cannot be deleted while in status '{status}'")]
    InvalidDeleteState { status: String },

    /// A conflict occurred (e.g. concurrent status change).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            available,
            requested,
        }
    }

    /// Business-rule failures are shown to end users verbatim.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, DomainError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_reports_both_quantities() {
        let err = DomainError::insufficient_stock(4, 10);
        assert_eq!(
            err.to_string(),
            "insufficient stock: available 4, requested 10"
        );
    }

    #[test]
    fn invalid_delete_state_names_the_status() {
        let err = DomainError::InvalidDeleteState {
            status: "pendente".to_string(),
        };
        assert!(err.to_string().contains("pendente"));
        assert!(err.is_business_rule());
        assert!(!DomainError::conflict("stale").is_business_rule());
    }
}
