use std::fmt::Display;

use super::capacity::CapacityError;
use super::domain::OverallStatus;
use super::store::RepositoryError;

/// Error returned by every workflow operation.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("cannot {action} while application is {}", .status.label())]
    InvalidState {
        action: &'static str,
        status: OverallStatus,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    CapacityExceeded(#[from] CapacityError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(action: &'static str, status: OverallStatus) -> Self {
        Self::InvalidState { action, status }
    }

    /// Short machine-readable kind for transport adapters.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Validation(_) => "validation",
            WorkflowError::NotFound { .. } => "not_found",
            WorkflowError::Forbidden(_) => "forbidden",
            WorkflowError::InvalidState { .. } => "invalid_state",
            WorkflowError::Conflict(_) => "conflict",
            WorkflowError::CapacityExceeded(_) => "capacity_exceeded",
            WorkflowError::Store(_) => "store",
        }
    }
}
