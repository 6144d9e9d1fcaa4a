//! Readable byte streams exchanged with backends
//!
//! `get` hands out an [`ObjectReader`], `put` consumes one. The trait is
//! object safe so the boundary can pin any reader behind one handle type.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Chunk size used when draining a reader.
const COPY_CHUNK: usize = 64 * 1024;

/// A readable, closable byte stream.
///
/// `read` returns `Ok(0)` at end of stream. `close` releases the underlying
/// resource; closing twice is allowed and the second call does nothing.
#[async_trait]
pub trait ObjectReader: Send {
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize>;

    async fn close(&mut self) -> StorageResult<()>;
}

pub type BoxReader = Box<dyn ObjectReader>;

#[async_trait]
impl<R: ObjectReader + ?Sized> ObjectReader for Box<R> {
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        (**self).read(buf).await
    }

    async fn close(&mut self) -> StorageResult<()> {
        (**self).close().await
    }
}

/// Drain `reader` into memory.
///
/// # Errors
/// Propagates the first read error; the partial data is discarded.
pub async fn read_to_end(reader: &mut dyn ObjectReader) -> StorageResult<Vec<u8>> {
    let mut data = Vec::new();
    let mut chunk = vec![0u8; COPY_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        #[allow(clippy::indexing_slicing)]
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(data)
}

/// Reader over a window of shared, immutable bytes.
pub struct SliceReader {
    data: Arc<[u8]>,
    pos: usize,
    end: usize,
    closed: bool,
}

impl SliceReader {
    /// Read `data[offset..offset + limit]`, clamped to the data.
    ///
    /// A `limit` of zero or less reads to the end.
    #[must_use]
    pub fn new(data: Arc<[u8]>, offset: i64, limit: i64) -> Self {
        let len = data.len();
        let pos = usize::try_from(offset.max(0)).unwrap_or(usize::MAX).min(len);
        let end = match usize::try_from(limit) {
            Ok(limit) if limit > 0 => pos.saturating_add(limit).min(len),
            _ => len,
        };
        Self {
            data,
            pos,
            end,
            closed: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }
}

#[async_trait]
impl ObjectReader for SliceReader {
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        let to_read = self.remaining().min(buf.len());
        let end_pos = self.pos + to_read;
        // to_read <= end - pos and to_read <= buf.len()
        #[allow(clippy::indexing_slicing)]
        buf[..to_read].copy_from_slice(&self.data[self.pos..end_pos]);
        self.pos = end_pos;
        Ok(to_read)
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.closed = true;
        Ok(())
    }
}

impl std::fmt::Debug for SliceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SliceReader")
            .field("pos", &self.pos)
            .field("end", &self.end)
            .field("closed", &self.closed)
            .finish()
    }
}
