//! Element operation errors and the caller-facing error taxonomy.

use crate::graph::GraphError;
use crate::store::{StoreError, StoreMutationError};
use serde::{Deserialize, Serialize};

/// Error class reported to callers of the element service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidArgument,
    ReferentialIntegrity,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::ReferentialIntegrity => "referential_integrity",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Errors returned by [`crate::ElementService`].
#[derive(Debug, thiserror::Error)]
pub enum ElementError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ElementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ElementError::NotFound(_) => ErrorKind::NotFound,
            ElementError::Conflict(_) => ErrorKind::Conflict,
            ElementError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ElementError::ReferentialIntegrity(_) => ErrorKind::ReferentialIntegrity,
            ElementError::Storage(StoreError::InvalidProjectId(_)) => ErrorKind::InvalidArgument,
            ElementError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ElementError::InvalidArgument(message.into())
    }
}

impl From<GraphError> for ElementError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::DuplicateId(_) => ElementError::Conflict(err.to_string()),
            GraphError::ElementNotFound(_) | GraphError::OwnerNotFound(_) => {
                ElementError::NotFound(err.to_string())
            }
            GraphError::CyclicContainment { .. } => ElementError::InvalidArgument(err.to_string()),
        }
    }
}

impl From<StoreMutationError<ElementError>> for ElementError {
    fn from(err: StoreMutationError<ElementError>) -> Self {
        match err {
            StoreMutationError::Store(source) => ElementError::Storage(source),
            StoreMutationError::Mutation(source) => source,
        }
    }
}
