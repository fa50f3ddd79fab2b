//! Error taxonomy for the course asset index.
//!
//! Three layers:
//! - `StoreError`: failures from the link store backend
//! - `CollaboratorError`: failures reported by external services (schemas, catalog)
//! - `ReconcileError`: what the reconciler and guard surface to callers

use thiserror::Error;

/// Link store failures
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Link already exists: course={course_id} content={content_id} asset={asset_id}")]
    Duplicate {
        course_id: String,
        content_id: String,
        asset_id: String,
    },

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Failures reported by a collaborator service
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while reconciling links or guarding asset deletion
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("{resource} {id} is in use by {} course(s)", courses.len())]
    ResourceInUse {
        resource: &'static str,
        id: String,
        courses: Vec<String>,
        contents: Vec<String>,
    },

    #[error("Malformed content document: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl ReconcileError {
    /// Stable condition code for callers that map errors onto API responses
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::NotFound { .. } => "NOT_FOUND",
            ReconcileError::ResourceInUse { .. } => "RESOURCE_IN_USE",
            ReconcileError::MalformedDocument(_) => "INVALID_DATA",
            ReconcileError::Store(_) => "STORE_ERROR",
            ReconcileError::Collaborator(_) => "COLLABORATOR_ERROR",
        }
    }

    pub(crate) fn asset_not_found(id: impl Into<String>) -> Self {
        ReconcileError::NotFound {
            resource: "asset",
            id: id.into(),
        }
    }
}
