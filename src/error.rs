use thiserror::Error;

/// Failure taxonomy for the local analysis store.
///
/// The store never retries internally; every variant is returned to the
/// caller, which decides whether the operation matters enough to surface.
/// A `StorageUnavailable` at startup is expected to degrade the embedding
/// application to "history unavailable" rather than abort it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be opened, migrated, or reached. Not retryable
    /// without environment-level remediation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The engine rejected a write or query, or a record field could not
    /// be serialized for storage.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// A point operation targeted an id that does not exist. Reads model
    /// this as `None` instead; only update/delete-style paths raise it.
    #[error("analysis '{0}' not found")]
    NotFound(String),

    /// A stored row no longer parses (datetime, enum, JSON column, or
    /// image blob). Read-side counterpart of `PersistenceFailure`.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::PersistenceFailure(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
