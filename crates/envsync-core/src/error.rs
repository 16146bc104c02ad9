//! Error types for store access and sync requests.
//!
//! Store errors are split by scope: [`StoreError::Unavailable`] means the
//! environment itself cannot be reached and is fatal to a request; every
//! other variant concerns a single record and is absorbed per entity by
//! the orchestrator.

use thiserror::Error;

use crate::models::EntityKind;

/// Result type for [`Store`](crate::store::Store) operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The environment cannot be reached or queried at all.
    #[error("environment '{environment}' is unavailable: {message}")]
    Unavailable {
        environment: String,
        message: String,
    },

    /// `insert_many` hit an id that already exists.
    #[error("{collection}/{id} already exists in environment '{environment}'")]
    Conflict {
        collection: EntityKind,
        id: String,
        environment: String,
    },

    /// A document was written to a collection of a different kind.
    #[error("cannot store a {found} document in the {expected} collection")]
    KindMismatch {
        expected: EntityKind,
        found: EntityKind,
    },

    /// Any other backend failure (decoding, constraint, I/O on one record).
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unavailable(environment: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            environment: environment.into(),
            message: message.into(),
        }
    }

    /// Whether this error is scoped to the whole environment rather than one record.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

/// Errors that abort a whole resolve/preview/commit request.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The source or target environment could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Source and target name the same environment.
    #[error("source and target environment are both '{0}'")]
    SameEnvironment(String),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        SyncError::StoreUnavailable(err)
    }
}
