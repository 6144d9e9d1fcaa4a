//! Values that live behind handles
//!
//! Reader and writer wrappers own a stream and remember whether it was
//! closed, so an explicit close followed by unpin closes the stream once.
//! Calls that touch a backend block the calling thread on the runtime.

use std::fmt;
use std::sync::Arc;

use objstore::{BoxReader, Object, ObjectReader, ObjectStorage, StorageError};
use parking_lot::Mutex;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use crate::bridge::Upload;
use crate::error::Result;
use crate::pipe::PipeWriter;

struct ReaderState {
    stream: BoxReader,
    closed: bool,
}

/// Readable stream behind a reader handle
///
/// `closing` lives outside the state lock so a close from another thread
/// can interrupt a read that is waiting for data.
pub struct ReaderRef {
    state: Mutex<ReaderState>,
    closing: watch::Sender<bool>,
}

impl ReaderRef {
    #[must_use]
    pub fn new(stream: BoxReader) -> Self {
        let (closing, _) = watch::channel(false);
        Self {
            state: Mutex::new(ReaderState {
                stream,
                closed: false,
            }),
            closing,
        }
    }

    /// Read into `buf`; `Ok(0)` is end of stream.
    ///
    /// A pending read returns `Closed` as soon as [`ReaderRef::close`] is
    /// called.
    ///
    /// # Errors
    ///
    /// Stream errors, or `Closed` after [`ReaderRef::close`].
    pub fn read(&self, runtime: &Runtime, buf: &mut [u8]) -> Result<usize> {
        let mut closing = self.closing.subscribe();
        if *closing.borrow_and_update() {
            return Err(StorageError::Closed.into());
        }
        let mut state = self.state.lock();
        if state.closed {
            return Err(StorageError::Closed.into());
        }
        let stream = &mut state.stream;
        let read = runtime.block_on(async move {
            tokio::select! {
                biased;
                _ = closing.wait_for(|closed| *closed) => Err(StorageError::Closed),
                read = stream.read(buf) => read,
            }
        });
        Ok(read?)
    }

    /// Close the stream. Only the first call reaches the stream.
    ///
    /// # Errors
    ///
    /// Whatever the stream reports on close.
    pub fn close(&self, runtime: &Runtime) -> Result<()> {
        // wakes a read holding the state lock
        self.closing.send_replace(true);
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        Ok(runtime.block_on(state.stream.close())?)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closing.borrow()
    }

    /// Upload the rest of this stream to `storage` under `key`.
    ///
    /// The stream is closed afterwards, also when the upload fails.
    ///
    /// # Errors
    ///
    /// The `put` error first, then any close error.
    pub fn upload_to(
        &self,
        runtime: &Runtime,
        storage: &dyn ObjectStorage,
        key: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed || *self.closing.borrow() {
            return Err(StorageError::Closed.into());
        }
        state.closed = true;
        self.closing.send_replace(true);
        let stream = &mut state.stream;
        let (put, close) = runtime.block_on(async move {
            let put = storage.put(key, &mut **stream).await;
            let close = stream.close().await;
            (put, close)
        });
        put?;
        close?;
        Ok(())
    }
}

impl fmt::Debug for ReaderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReaderRef(closed={})", self.is_closed())
    }
}

struct WriterState {
    sink: Option<PipeWriter>,
    upload: Option<Upload>,
}

/// Writable stream behind a writer handle
///
/// Either a bare pipe end or the front of a background upload.
pub struct WriterRef {
    state: Mutex<WriterState>,
}

impl WriterRef {
    /// Writer with no upload behind it.
    #[must_use]
    pub fn new(sink: PipeWriter) -> Self {
        Self {
            state: Mutex::new(WriterState {
                sink: Some(sink),
                upload: None,
            }),
        }
    }

    /// Writer feeding `upload`.
    #[must_use]
    pub fn uploading(sink: PipeWriter, upload: Upload) -> Self {
        Self {
            state: Mutex::new(WriterState {
                sink: Some(sink),
                upload: Some(upload),
            }),
        }
    }

    /// Write all of `data`, blocking while the pipe is full.
    ///
    /// # Errors
    ///
    /// `Closed` after close. If the upload behind this writer already
    /// ended with an error, that error; the writer is closed in that case.
    pub fn write(&self, runtime: &Runtime, data: Vec<u8>) -> Result<usize> {
        let mut state = self.state.lock();
        let Some(sink) = state.sink.as_mut() else {
            return Err(StorageError::Closed.into());
        };
        match sink.write(data) {
            Ok(n) => Ok(n),
            Err(broken) => {
                // The consumer is gone; report why if an upload was behind it
                state.sink = None;
                if let Some(upload) = state.upload.take() {
                    upload.wait(runtime)?;
                }
                Err(StorageError::Io(broken).into())
            }
        }
    }

    /// Signal end of stream and wait for the upload, if any.
    ///
    /// Repeated calls succeed without doing anything.
    ///
    /// # Errors
    ///
    /// The upload outcome, see [`Upload::wait`].
    pub fn close(&self, runtime: &Runtime) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(mut sink) = state.sink.take() {
            sink.close();
        }
        match state.upload.take() {
            Some(upload) => upload.wait(runtime),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().sink.is_none()
    }
}

impl fmt::Debug for WriterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "WriterRef(sink={:?}, upload={:?})",
            state.sink,
            state.upload.as_ref().map(Upload::key)
        )
    }
}

/// Object metadata behind an object handle
#[derive(Debug, Clone)]
pub struct ObjectRef {
    object: Object,
}

impl ObjectRef {
    #[must_use]
    pub fn new(object: Object) -> Self {
        Self { object }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        self.object.key()
    }

    #[must_use]
    pub fn size(&self) -> i64 {
        self.object.size()
    }

    /// Modification time in unix seconds
    #[must_use]
    pub fn mtime(&self) -> i64 {
        self.object.mtime_unix()
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.object.is_dir()
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        !self.object.is_dir()
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.object.is_symlink()
    }
}

/// Backend behind a storage handle
pub struct StorageRef {
    storage: Arc<dyn ObjectStorage>,
}

impl StorageRef {
    #[must_use]
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    #[must_use]
    pub fn describe(&self) -> String {
        self.storage.describe()
    }
}

impl fmt::Debug for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageRef({})", self.storage.describe())
    }
}
