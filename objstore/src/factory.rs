//! Backend selection by name

use std::sync::Arc;

use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::file::FileStorage;
use crate::mem::MemStorage;
use crate::storage::ObjectStorage;

/// Build the backend registered under `name`.
///
/// | name     | endpoint                      |
/// |----------|-------------------------------|
/// | `mem`    | bucket name, only for display |
/// | `file`   | root directory (`""` is `.`)  |
/// | `sqlite` | database path (`""` is memory)|
///
/// Names are matched case-insensitively. None of the local backends use the
/// credentials.
///
/// # Errors
///
/// [`StorageError::Unsupported`] for an unknown name, or whatever the
/// backend reports when it is opened.
pub fn create_storage(
    name: &str,
    endpoint: &str,
    access_key: &str,
    secret_key: &str,
    token: &str,
) -> StorageResult<Arc<dyn ObjectStorage>> {
    let has_credentials = !(access_key.is_empty() && secret_key.is_empty() && token.is_empty());
    debug!(name, endpoint, has_credentials, "creating storage");

    let storage: Arc<dyn ObjectStorage> = match name.to_ascii_lowercase().as_str() {
        "mem" => Arc::new(MemStorage::new(endpoint)),
        "file" => Arc::new(FileStorage::new(endpoint)),
        #[cfg(feature = "sqlite")]
        "sqlite" => Arc::new(crate::sqlite::SqliteStorage::new(endpoint)?),
        _ => return Err(StorageError::Unsupported(name.to_string())),
    };
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_are_case_insensitive() {
        let s = create_storage("MEM", "bucket", "", "", "").unwrap();
        assert_eq!(s.describe(), "mem://bucket/");
        let s = create_storage("File", "/tmp/data", "ak", "sk", "").unwrap();
        assert_eq!(s.describe(), "file:///tmp/data/");
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = create_storage("s4", "", "", "", "").err().unwrap();
        assert!(matches!(err, StorageError::Unsupported(ref n) if n == "s4"));
        assert_eq!(err.to_string(), "invalid storage: s4");
    }

    #[test]
    fn empty_file_endpoint_is_current_dir() {
        let s = create_storage("file", "", "", "", "").unwrap();
        assert_eq!(s.describe(), "file://./");
    }
}
