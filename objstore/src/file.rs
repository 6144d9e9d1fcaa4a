//! Local directory implementation of ObjectStorage
//!
//! Keys are paths relative to the root directory. Directories are listed as
//! keys with a trailing `/`. Uploads go to a temporary sibling file that is
//! renamed into place once the stream ends, so readers never see a partial
//! object.

use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, Take};
use tracing::{debug, trace, warn};

use crate::error::{StorageError, StorageResult};
use crate::object::Object;
use crate::storage::{limit_to_usize, ObjectStorage, ObjectStream};
use crate::stream::{BoxReader, ObjectReader};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

const COPY_CHUNK: usize = 64 * 1024;

/// Directory-backed object storage
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Store objects under `root`. An empty root means the current directory.
    #[must_use]
    pub fn new(root: &str) -> Self {
        let root = if root.is_empty() { "." } else { root };
        Self {
            root: PathBuf::from(root),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key onto a path below the root, rejecting escapes.
    fn path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key.trim_end_matches('/'));
        let mut path = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidKey(key.to_string()));
                }
            }
        }
        Ok(path)
    }

    /// Key for `path`, which must be below the root.
    fn key_of(&self, path: &Path, is_dir: bool) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if key.is_empty() {
            return None;
        }
        if is_dir {
            key.push('/');
        }
        Some(key)
    }

    /// Collect every entry whose key could match `prefix`, unsorted.
    async fn walk(&self, prefix: &str) -> StorageResult<Vec<Object>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = match fs::symlink_metadata(&path).await {
                    Ok(meta) => meta,
                    Err(e) => {
                        // entry vanished between read_dir and stat
                        trace!(path = %path.display(), error = %e, "skipping entry");
                        continue;
                    }
                };
                let is_dir = meta.is_dir();
                let Some(key) = self.key_of(&path, is_dir) else {
                    continue;
                };
                if is_dir && (prefix.starts_with(&key) || key.starts_with(prefix)) {
                    pending.push(path);
                }
                if key.starts_with(prefix) {
                    found.push(to_object(key, &meta));
                }
            }
        }
        Ok(found)
    }

    /// Entries within `prefix` after `marker`, in key order.
    async fn sorted_after(&self, prefix: &str, marker: &str) -> StorageResult<Vec<Object>> {
        let mut objects = self.walk(prefix).await?;
        objects.retain(|o| o.key() > marker);
        objects.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(objects)
    }
}

#[async_trait]
impl ObjectStorage for FileStorage {
    fn describe(&self) -> String {
        let root = self.root.display().to_string();
        if root.ends_with('/') {
            format!("file://{root}")
        } else {
            format!("file://{root}/")
        }
    }

    async fn create(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    async fn get(&self, key: &str, offset: i64, limit: i64) -> StorageResult<BoxReader> {
        let path = self.path(key)?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        if file.metadata().await?.is_dir() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        let offset = u64::try_from(offset).unwrap_or(0);
        if offset > 0 {
            file.seek(std::io::SeekFrom::Start(offset)).await?;
        }
        let limit = u64::try_from(limit)
            .ok()
            .filter(|&limit| limit > 0)
            .unwrap_or(u64::MAX);
        Ok(Box::new(FileReader {
            file: Some(file.take(limit)),
        }))
    }

    async fn put(&self, key: &str, reader: &mut dyn ObjectReader) -> StorageResult<()> {
        let path = self.path(key)?;
        if key.ends_with('/') {
            fs::create_dir_all(&path).await?;
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?
            .to_string_lossy()
            .into_owned();
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_file_name(format!(".{file_name}.tmp.{}.{seq}", std::process::id()));

        let result = copy_into(&tmp, reader).await;
        if let Err(e) = result {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "failed to remove temporary file");
            }
            return Err(e);
        }
        fs::rename(&tmp, &path).await?;
        debug!(key, "stored file object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path(key)?;
        let result = match fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir(&path).await,
            Ok(_) => fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> StorageResult<Object> {
        let path = self.path(key)?;
        let meta = fs::symlink_metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        let key = if meta.is_dir() && !key.ends_with('/') {
            format!("{key}/")
        } else {
            key.to_string()
        };
        Ok(to_object(key, &meta))
    }

    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        limit: i64,
    ) -> StorageResult<Vec<Object>> {
        let mut objects = self.sorted_after(prefix, marker).await?;
        objects.truncate(limit_to_usize(limit));
        Ok(objects)
    }

    /// One walk of the tree instead of one per page.
    async fn list_all<'a>(&'a self, prefix: &str, marker: &str) -> StorageResult<ObjectStream<'a>> {
        let objects = self.sorted_after(prefix, marker).await?;
        trace!(prefix, marker, found = objects.len(), "walked tree");
        Ok(stream::iter(objects.into_iter().map(Ok::<Object, StorageError>)).boxed())
    }
}

async fn copy_into(tmp: &Path, reader: &mut dyn ObjectReader) -> StorageResult<()> {
    let mut out = fs::File::create(tmp).await?;
    let mut chunk = vec![0u8; COPY_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        #[allow(clippy::indexing_slicing)]
        out.write_all(&chunk[..n]).await?;
    }
    out.flush().await?;
    out.sync_all().await?;
    Ok(())
}

fn to_object(key: String, meta: &Metadata) -> Object {
    let size = if meta.is_dir() {
        0
    } else {
        i64::try_from(meta.len()).unwrap_or(i64::MAX)
    };
    let mtime = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
    Object::new(key, size, mtime)
        .with_dir(meta.is_dir())
        .with_symlink(meta.file_type().is_symlink())
}

/// Reader over a byte range of a local file
struct FileReader {
    file: Option<Take<fs::File>>,
}

#[async_trait]
impl ObjectReader for FileReader {
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        let Some(file) = self.file.as_mut() else {
            return Err(StorageError::Closed);
        };
        Ok(file.read(buf).await?)
    }

    async fn close(&mut self) -> StorageResult<()> {
        // Dropping the handle closes the descriptor
        self.file = None;
        Ok(())
    }
}
