//! The object storage capability
//!
//! Backends are consumed only through this trait. All methods are async; the
//! boundary drives them from its own runtime.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::error::{StorageError, StorageResult};
use crate::object::Object;
use crate::stream::{BoxReader, ObjectReader};

/// Page size used by the default [`ObjectStorage::list_all`].
pub const LIST_PAGE_SIZE: i64 = 1000;

/// Lazy sequence of objects produced by [`ObjectStorage::list_all`].
pub type ObjectStream<'a> = BoxStream<'a, StorageResult<Object>>;

/// Trait for object storage backends
///
/// Keys are plain strings; a key ending in `/` names a directory entry.
/// Listing order is lexicographic by key.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Human readable description, e.g. `mem://bucket/`.
    fn describe(&self) -> String;

    /// Create the bucket/container/root if it does not exist yet.
    async fn create(&self) -> StorageResult<()>;

    /// Open `key` for reading, starting at `offset`, at most `limit` bytes.
    ///
    /// A `limit` of zero or less reads to the end of the object.
    async fn get(&self, key: &str, offset: i64, limit: i64) -> StorageResult<BoxReader>;

    /// Store everything `reader` yields under `key`, replacing any old value.
    ///
    /// Blocks until `reader` reaches end of stream. The reader is not closed
    /// here; that is the caller's job.
    async fn put(&self, key: &str, reader: &mut dyn ObjectReader) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Metadata of `key`, or `NotFound`.
    async fn head(&self, key: &str) -> StorageResult<Object>;

    /// At most `limit` objects whose key starts with `prefix` and sorts
    /// strictly after `marker`. A negative `limit` means no limit.
    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        limit: i64,
    ) -> StorageResult<Vec<Object>>;

    /// Every object after `marker` within `prefix`, lazily.
    ///
    /// The default implementation walks [`ObjectStorage::list`] page by page.
    async fn list_all<'a>(&'a self, prefix: &str, marker: &str) -> StorageResult<ObjectStream<'a>> {
        let prefix = prefix.to_string();
        let pages = stream::try_unfold(Some(marker.to_string()), move |marker| {
            let prefix = prefix.clone();
            async move {
                let Some(marker) = marker else {
                    return Ok::<_, StorageError>(None);
                };
                let page = self.list(&prefix, &marker, LIST_PAGE_SIZE).await?;
                let next = match page.last() {
                    Some(last) if i64::try_from(page.len()).unwrap_or(i64::MAX) >= LIST_PAGE_SIZE => {
                        Some(last.key().to_string())
                    }
                    _ => None,
                };
                if page.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some((page, next)))
                }
            }
        });
        Ok(pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<Object, StorageError>)))
            .try_flatten()
            .boxed())
    }
}

/// Apply `limit` the way [`ObjectStorage::list`] documents it.
#[must_use]
pub(crate) fn limit_to_usize(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(usize::MAX)
}
