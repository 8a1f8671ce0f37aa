use thiserror::Error;

/// Failure of the underlying key-value medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not encode value: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The medium refused the write (quota exceeded, read-only, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by catalog and query operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no entry with id '{0}'")]
    NotFound(String),

    #[error("invalid entry: {0}")]
    Validation(String),

    /// The blocking task running a catalog write did not finish.
    #[error("catalog task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
