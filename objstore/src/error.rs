use std::io;

/// Errors reported by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key does not name an object.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key cannot be mapped onto the backend (e.g. escapes the root).
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// No backend is registered under this name.
    #[error("invalid storage: {0}")]
    Unsupported(String),

    /// The stream was already closed.
    #[error("read/write on closed stream")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Map an I/O error on `key`, turning `ENOENT` into [`StorageError::NotFound`].
    #[must_use]
    pub fn from_io(key: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(key.to_string())
        } else {
            Self::Io(err)
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result alias for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;
