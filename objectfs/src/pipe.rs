//! In-memory pipe between a native writer and an async reader
//!
//! - The writer side is driven by a native thread and blocks while the pipe
//!   is full
//! - The reader side implements [`ObjectReader`] and is consumed on the
//!   runtime, typically by a backend `put`
//! - Chunks are moved, never shared; the reader sees exactly the written
//!   bytes in write order
//!
//! Closing (or dropping) the writer is end of stream. Closing the reader
//! makes every further write fail with `BrokenPipe`.

use std::fmt;
use std::io;

use async_trait::async_trait;
use objstore::{ObjectReader, StorageError, StorageResult};
use tokio::sync::mpsc;

/// Create a connected pair holding at most `capacity` chunks in flight.
#[must_use]
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        PipeWriter {
            tx: Some(tx),
            written: 0,
        },
        PipeReader {
            rx,
            pending: Vec::new(),
            pos: 0,
            closed: false,
        },
    )
}

/// Writer side of the pipe
///
/// # Blocking
///
/// `write` blocks the calling thread while the pipe is full. It must not be
/// called from inside an async context.
pub struct PipeWriter {
    tx: Option<mpsc::Sender<Vec<u8>>>,
    written: u64,
}

impl PipeWriter {
    /// Hand `data` to the reader.
    ///
    /// Returns the number of bytes written. An empty write returns 0 and
    /// does not wake the reader.
    ///
    /// # Errors
    ///
    /// `BrokenPipe` if the reader is gone, or if this writer was closed.
    pub fn write(&mut self, data: Vec<u8>) -> io::Result<usize> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write on closed pipe",
            ));
        };
        if data.is_empty() {
            return Ok(0);
        }
        let n = data.len();
        tx.blocking_send(data)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "write on closed pipe"))?;
        self.written += n as u64;
        Ok(n)
    }

    /// Signal end of stream to the reader.
    pub fn close(&mut self) {
        if self.tx.take().is_none() {
            log::warn!("PipeWriter::close() called on already closed writer: {self:?}");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_none()
    }

    /// Total bytes accepted so far
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.written
    }
}

impl fmt::Debug for PipeWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipeWriter(closed={}, tell={})",
            self.is_closed(),
            self.written
        )
    }
}

/// Reader side of the pipe
pub struct PipeReader {
    rx: mpsc::Receiver<Vec<u8>>,
    /// Chunk being drained, valid from `pos`
    pending: Vec<u8>,
    pos: usize,
    closed: bool,
}

#[async_trait]
impl ObjectReader for PipeReader {
    async fn read(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.pending.len() {
            match self.rx.recv().await {
                Some(chunk) => {
                    self.pending = chunk;
                    self.pos = 0;
                }
                // All writers are gone
                None => return Ok(0),
            }
        }
        let n = (self.pending.len() - self.pos).min(buf.len());
        #[allow(clippy::indexing_slicing)]
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    async fn close(&mut self) -> StorageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.rx.close();
        // Release buffered chunks now rather than on drop
        while self.rx.try_recv().is_ok() {}
        self.pending = Vec::new();
        self.pos = 0;
        Ok(())
    }
}

impl fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PipeReader(closed={}, pending={})",
            self.closed,
            self.pending.len() - self.pos.min(self.pending.len())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objstore::read_to_end;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn reader_sees_writes_in_order() {
        let rt = runtime();
        let (mut writer, mut reader) = pipe(2);
        let consumer = rt.spawn(async move { read_to_end(&mut reader).await });

        for chunk in [&b"hello"[..], b"", b", ", b"world"] {
            writer.write(chunk.to_vec()).unwrap();
        }
        assert_eq!(writer.tell(), 12);
        writer.close();

        let data = rt.block_on(consumer).unwrap().unwrap();
        assert_eq!(data, b"hello, world");
    }

    #[test]
    fn small_reads_split_chunks() {
        let rt = runtime();
        let (mut writer, mut reader) = pipe(4);
        writer.write(b"abcdef".to_vec()).unwrap();
        drop(writer);

        rt.block_on(async {
            let mut buf = [0u8; 4];
            assert_eq!(reader.read(&mut buf).await.unwrap(), 4);
            assert_eq!(&buf, b"abcd");
            assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
            assert_eq!(&buf[..2], b"ef");
            assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
        });
    }

    #[test]
    fn write_after_reader_close_is_broken_pipe() {
        let rt = runtime();
        let (mut writer, mut reader) = pipe(1);
        rt.block_on(reader.close()).unwrap();

        let err = writer.write(b"x".to_vec()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(writer.tell(), 0);
    }

    #[test]
    fn write_after_close_fails() {
        let (mut writer, _reader) = pipe(1);
        writer.close();
        assert!(writer.is_closed());
        writer.close();
        assert!(writer.write(b"x".to_vec()).is_err());
    }

    #[test]
    fn blocked_writer_wakes_when_reader_closes() {
        let rt = runtime();
        let (mut writer, mut reader) = pipe(1);
        let producer = std::thread::spawn(move || {
            writer.write(b"one".to_vec())?;
            writer.write(b"two".to_vec())?;
            writer.write(b"three".to_vec())
        });

        rt.block_on(async {
            let mut buf = [0u8; 3];
            assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
            reader.close().await.unwrap();
        });
        let result = producer.join().unwrap();
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }
}
