use std::io;

use objstore::StorageError;

use crate::idgen::Handle;
use crate::registry::HandleKind;

/// Errors reported by the boundary.
///
/// The `Display` text is what a native caller receives as the error string.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid handle {0}")]
    InvalidHandle(Handle),

    #[error("handle {handle} is a {actual}, expected a {expected}")]
    WrongHandleKind {
        handle: Handle,
        expected: HandleKind,
        actual: HandleKind,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The background upload behind a writer failed.
    #[error("upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The background upload task panicked or was cancelled.
    #[error("upload of {key} aborted: {reason}")]
    UploadAborted { key: String, reason: String },

    #[error("failed to start I/O runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The process-wide instance could not be initialized.
    #[error("objectfs unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
