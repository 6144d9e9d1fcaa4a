//! SQLite-backed implementation of `ObjectStorage`
//!
//! All objects live in one table of the database file named by the
//! endpoint. Values are stored whole; readers get an in-memory window of the
//! loaded blob.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::object::Object;
use crate::storage::ObjectStorage;
use crate::stream::{read_to_end, BoxReader, ObjectReader, SliceReader};

/// SQLite-backed object storage
///
/// One connection guarded by a mutex; every statement is short, so callers
/// on other threads wait at most one statement.
pub struct SqliteStorage {
    /// Path to the SQLite database file
    db_path: String,
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) the database at `db_path`.
    ///
    /// The objects table is created by [`ObjectStorage::create`].
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn new(db_path: &str) -> StorageResult<Self> {
        let conn = if db_path.is_empty() || db_path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(db_path)?
        };
        Ok(Self {
            db_path: db_path.to_string(),
            conn: Mutex::new(conn),
        })
    }
}

fn unix_to_time(secs: i64) -> SystemTime {
    match u64::try_from(secs) {
        Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs),
        Err(_) => UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()),
    }
}

fn row_to_object(key: String, size: i64, mtime: i64) -> Object {
    Object::new(key, size, unix_to_time(mtime))
}

#[async_trait]
impl ObjectStorage for SqliteStorage {
    fn describe(&self) -> String {
        format!("sqlite://{}", self.db_path)
    }

    async fn create(&self) -> StorageResult<()> {
        self.conn.lock().execute(
            "CREATE TABLE IF NOT EXISTS objects (
                key TEXT PRIMARY KEY,
                data BLOB NOT NULL,
                mtime INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    async fn get(&self, key: &str, offset: i64, limit: i64) -> StorageResult<BoxReader> {
        let data: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(
                "SELECT data FROM objects WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        let data = data.ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(Box::new(SliceReader::new(Arc::from(data), offset, limit)))
    }

    async fn put(&self, key: &str, reader: &mut dyn ObjectReader) -> StorageResult<()> {
        let data = read_to_end(reader).await?;
        let mtime = Object::new(key, 0, SystemTime::now()).mtime_unix();
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO objects (key, data, mtime) VALUES (?1, ?2, ?3)",
            params![key, data, mtime],
        )?;
        debug!(key, bytes = data.len(), "stored sqlite object");
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM objects WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn head(&self, key: &str) -> StorageResult<Object> {
        let row: Option<(i64, i64)> = self
            .conn
            .lock()
            .query_row(
                "SELECT length(data), mtime FROM objects WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (size, mtime) = row.ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(row_to_object(key.to_string(), size, mtime))
    }

    async fn list(
        &self,
        prefix: &str,
        marker: &str,
        limit: i64,
    ) -> StorageResult<Vec<Object>> {
        let conn = self.conn.lock();
        // SQLite treats a negative LIMIT as "no limit"
        let mut stmt = conn.prepare(
            "SELECT key, length(data), mtime FROM objects
             WHERE key > ?1 AND substr(key, 1, length(?2)) = ?2
             ORDER BY key LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![marker, prefix, limit], |row| {
            Ok(row_to_object(row.get(0)?, row.get(1)?, row.get(2)?))
        })?;
        let objects = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(objects)
    }
}
