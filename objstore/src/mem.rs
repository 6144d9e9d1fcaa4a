//! In-memory implementation of ObjectStorage

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::object::Object;
use crate::storage::{limit_to_usize, ObjectStorage};
use crate::stream::{read_to_end, BoxReader, ObjectReader, SliceReader};

struct MemObject {
    data: Arc<[u8]>,
    mtime: SystemTime,
}

/// In-memory implementation of ObjectStorage
///
/// Ordered map based storage, useful for testing and single-process use.
/// Readers share the stored bytes, so an object replaced or deleted while a
/// reader is open keeps serving the old content to that reader.
pub struct MemStorage {
    name: String,
    objects: Mutex<BTreeMap<String, MemObject>>,
}

impl MemStorage {
    /// Create a new empty store
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of stored objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

impl Default for MemStorage {
    fn default() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl ObjectStorage for MemStorage {
    fn describe(&self) -> String {
        format!("mem://{}/", self.name)
    }

    async fn create(&self) -> StorageResult<()> {
        // Nothing to provision
        Ok(())
    }

    async fn get(&self, key: &str, offset: i64, limit: i64) -> StorageResult<BoxReader> {
        let objects = self.objects.lock();
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::new(SliceReader::new(
            Arc::clone(&object.data),
            offset,
            limit,
        )))
    }

    async fn put(&self, key: &str, reader: &mut dyn ObjectReader) -> StorageResult<()> {
        // Read outside the lock; a failed upload leaves the old value in place
        let data = read_to_end(reader).await?;
        let object = MemObject {
            data: Arc::from(data),
            mtime: SystemTime::now(),
        };
        self.objects.lock().insert(key.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn head(&self, key: &str) -> StorageResult<Object> {
        let objects = self.objects.lock();
        objects
            .get(key)
            .map(|object| to_object(key, object))
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        limit: i64,
    ) -> StorageResult<Vec<Object>> {
        // Keys sharing a prefix are contiguous, so start at whichever of
        // prefix/marker sorts later and stop at the first non-matching key.
        let start = if marker >= prefix {
            Bound::Excluded(marker)
        } else {
            Bound::Included(prefix)
        };

        let objects = self.objects.lock();
        Ok(objects
            .range::<str, _>((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(limit_to_usize(limit))
            .map(|(key, object)| to_object(key, object))
            .collect())
    }
}

fn to_object(key: &str, object: &MemObject) -> Object {
    let size = i64::try_from(object.data.len()).unwrap_or(i64::MAX);
    Object::new(key, size, object.mtime)
}
