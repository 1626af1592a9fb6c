use thiserror::Error;

use rmaledger_core::DomainError;

use crate::blob::BlobError;
use crate::store::StoreError;

/// Error taxonomy of the RMA service.
///
/// Business-rule variants carry messages meant for end users; `Storage`
/// is an infrastructure failure and should be logged, not shown verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("rma is already cancelled")]
    AlreadyCancelled,

    #[error("rma cannot be deleted while in status '{status}'")]
    InvalidDeleteState { status: String },

    /// Concurrent modification detected (optimistic check, numbering retries exhausted).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable machine-readable code, used by the HTTP layer.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InsufficientStock { .. } => "insufficient_stock",
            ServiceError::AlreadyCancelled => "already_cancelled",
            ServiceError::InvalidDeleteState { .. } => "invalid_delete_state",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Storage(_) => "storage_error",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::InsufficientStock {
                available,
                requested,
            } => ServiceError::InsufficientStock {
                available,
                requested,
            },
            DomainError::AlreadyCancelled => ServiceError::AlreadyCancelled,
            DomainError::InvalidDeleteState { status } => ServiceError::InvalidDeleteState { status },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::DuplicateNumber(number) => {
                ServiceError::Conflict(format!("rma number {number} already exists"))
            }
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Rejected(err) => err.into(),
            StoreError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<BlobError> for ServiceError {
    fn from(value: BlobError) -> Self {
        match value {
            BlobError::NotFound(key) => ServiceError::NotFound(format!("blob {key}")),
            BlobError::InvalidKey(key) => ServiceError::Validation(format!("invalid storage key '{key}'")),
            BlobError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_domain_errors_keep_their_meaning() {
        let err: ServiceError = StoreError::Rejected(DomainError::insufficient_stock(4, 10)).into();
        assert_eq!(
            err,
            ServiceError::InsufficientStock {
                available: 4,
                requested: 10
            }
        );
        assert_eq!(err.code(), "insufficient_stock");
    }

    #[test]
    fn invalid_ids_are_validation_failures() {
        let err: ServiceError = DomainError::invalid_id("RmaId: bad").into();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
