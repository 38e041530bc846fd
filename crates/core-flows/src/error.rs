//! Module service errors.

use thiserror::Error;
use workflows_sdk::StepError;

/// Errors returned by module services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The service refused the operation.
    #[error("{service} service error: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
}

impl ServiceError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn unavailable(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            reason: reason.into(),
        }
    }
}

impl From<ServiceError> for StepError {
    fn from(error: ServiceError) -> Self {
        StepError::from_error(&error)
    }
}

/// Convenience type alias for module service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
