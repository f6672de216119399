use thiserror::Error;

use shopfloor_core::DomainError;

use crate::command_dispatcher::DispatchError;
use crate::event_store::EventStoreError;
use crate::projections::ProjectionError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure surfaced by the shop-floor services.
///
/// Business rejections come through as `Domain` unchanged, and so does a lost
/// optimistic race that outlived every retry (`DomainError::Conflict`).
/// Everything else is an infrastructure fault.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(DomainError),

    #[error(transparent)]
    Dispatch(DispatchError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl ServiceError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            ServiceError::Domain(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::NotFound(_)))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Conflict(_)))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::Validation(_)))
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, ServiceError::Domain(DomainError::InvariantViolation(_)))
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        ServiceError::Domain(err)
    }
}

impl From<EventStoreError> for ServiceError {
    fn from(err: EventStoreError) -> Self {
        ServiceError::Dispatch(DispatchError::Store(err))
    }
}

impl From<DispatchError> for ServiceError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Domain(e) => ServiceError::Domain(e),
            DispatchError::Concurrency { attempts, message } => ServiceError::Domain(
                DomainError::conflict(format!("gave up after {attempts} attempt(s): {message}")),
            ),
            other => ServiceError::Dispatch(other),
        }
    }
}
