//! The boundary façade
//!
//! [`ObjectFs`] owns the handle registry and the I/O runtime. Every method
//! blocks the calling thread until the backend is done, except
//! [`ObjectFs::storage_put`], which leaves the upload running behind the
//! returned writer.
//!
//! Methods must not be called from inside the façade's own runtime.

use std::sync::Arc;

use futures::TryStreamExt;
use objstore::{create_storage, Object, ObjectStorage};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, trace};

use crate::bridge::start_upload;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::idgen::Handle;
use crate::pipe::pipe;
use crate::registry::Registry;
use crate::wrappers::{ObjectRef, ReaderRef, StorageRef, WriterRef};

pub struct ObjectFs {
    registry: Registry,
    runtime: Runtime,
    config: Config,
}

impl ObjectFs {
    /// # Errors
    ///
    /// Invalid configuration, or the runtime cannot be started.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name("objectfs-io")
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        debug!(?config, "objectfs started");
        Ok(Self {
            registry: Registry::new(),
            runtime,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live handles of any kind
    #[must_use]
    pub fn pinned(&self) -> usize {
        self.registry.len()
    }

    fn storage(&self, handle: Handle) -> Result<Arc<dyn ObjectStorage>> {
        Ok(Arc::clone(self.registry.get::<StorageRef>(handle)?.storage()))
    }

    fn pin_objects(&self, objects: Vec<Object>) -> Vec<Handle> {
        objects
            .into_iter()
            .map(|object| self.registry.pin(ObjectRef::new(object)))
            .collect()
    }

    // ---- storage lifecycle ----

    /// Build the backend `name` and pin it.
    ///
    /// # Errors
    ///
    /// Unknown backend name, or the backend cannot be opened.
    pub fn create_storage(
        &self,
        name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        token: &str,
    ) -> Result<Handle> {
        let storage = create_storage(name, endpoint, access_key, secret_key, token)?;
        Ok(self.pin_storage(storage))
    }

    /// Pin an already built backend.
    pub fn pin_storage(&self, storage: Arc<dyn ObjectStorage>) -> Handle {
        let handle = self.registry.pin(StorageRef::new(storage));
        debug!(%handle, "storage pinned");
        handle
    }

    /// # Errors
    ///
    /// Invalid handle.
    pub fn storage_unpin(&self, handle: Handle) -> Result<()> {
        self.registry.unpin::<StorageRef>(handle)?;
        Ok(())
    }

    // ---- storage operations ----

    /// # Errors
    ///
    /// Invalid handle or backend error.
    pub fn storage_create(&self, handle: Handle) -> Result<()> {
        let storage = self.storage(handle)?;
        Ok(self.runtime.block_on(storage.create())?)
    }

    /// Open `key` for reading. A `limit` of zero or less reads to the end.
    ///
    /// # Errors
    ///
    /// Invalid handle, not found, or backend error.
    pub fn storage_get(&self, handle: Handle, key: &str, offset: i64, limit: i64) -> Result<Handle> {
        let storage = self.storage(handle)?;
        let stream = self.runtime.block_on(storage.get(key, offset, limit))?;
        Ok(self.registry.pin(ReaderRef::new(stream)))
    }

    /// Start an upload of `key` and return the writer feeding it.
    ///
    /// The upload outcome is reported by `writer_close`.
    ///
    /// # Errors
    ///
    /// Invalid handle only; backend errors surface on the writer.
    pub fn storage_put(&self, handle: Handle, key: &str) -> Result<Handle> {
        let storage = self.storage(handle)?;
        let (sink, upload) = start_upload(
            &self.runtime,
            storage,
            key.to_string(),
            self.config.pipe_capacity,
        );
        Ok(self.registry.pin(WriterRef::uploading(sink, upload)))
    }

    /// Upload everything left in `reader` under `key`.
    ///
    /// The reader is closed whatever happens, but stays pinned.
    ///
    /// # Errors
    ///
    /// Invalid handles, or the upload error.
    pub fn storage_put_reader(&self, handle: Handle, key: &str, reader: Handle) -> Result<()> {
        let storage = self.storage(handle)?;
        let reader = self.registry.get::<ReaderRef>(reader)?;
        reader.upload_to(&self.runtime, storage.as_ref(), key)
    }

    /// # Errors
    ///
    /// Invalid handle or backend error. A missing key is not an error.
    pub fn storage_delete(&self, handle: Handle, key: &str) -> Result<()> {
        let storage = self.storage(handle)?;
        Ok(self.runtime.block_on(storage.delete(key))?)
    }

    /// # Errors
    ///
    /// Invalid handle, not found, or backend error.
    pub fn storage_head(&self, handle: Handle, key: &str) -> Result<Handle> {
        let storage = self.storage(handle)?;
        let object = self.runtime.block_on(storage.head(key))?;
        Ok(self.registry.pin(ObjectRef::new(object)))
    }

    /// One page of objects after `marker`. A negative `limit` means all.
    ///
    /// # Errors
    ///
    /// Invalid handle or backend error; nothing is pinned then.
    pub fn storage_list(
        &self,
        handle: Handle,
        prefix: &str,
        marker: &str,
        limit: i64,
    ) -> Result<Vec<Handle>> {
        let storage = self.storage(handle)?;
        let objects = self.runtime.block_on(storage.list(prefix, marker, limit))?;
        trace!(%handle, prefix, marker, limit, found = objects.len(), "listed");
        Ok(self.pin_objects(objects))
    }

    /// Every object after `marker`, collected before returning.
    ///
    /// # Errors
    ///
    /// Invalid handle or backend error; nothing is pinned then.
    pub fn storage_list_all(&self, handle: Handle, prefix: &str, marker: &str) -> Result<Vec<Handle>> {
        let storage = self.storage(handle)?;
        let objects = self.runtime.block_on(async {
            storage
                .list_all(prefix, marker)
                .await?
                .try_collect::<Vec<Object>>()
                .await
        })?;
        trace!(%handle, prefix, marker, found = objects.len(), "listed all");
        Ok(self.pin_objects(objects))
    }

    /// # Errors
    ///
    /// Invalid handle.
    pub fn storage_describe(&self, handle: Handle) -> Result<String> {
        Ok(self.registry.get::<StorageRef>(handle)?.describe())
    }

    /// A connected reader/writer pair not bound to any backend call.
    ///
    /// # Errors
    ///
    /// Invalid handle.
    pub fn storage_create_reader_writer(&self, handle: Handle) -> Result<(Handle, Handle)> {
        self.registry.get::<StorageRef>(handle)?;
        let (sink, source) = pipe(self.config.pipe_capacity);
        let reader = self.registry.pin(ReaderRef::new(Box::new(source)));
        let writer = self.registry.pin(WriterRef::new(sink));
        Ok((reader, writer))
    }

    // ---- readers ----

    /// # Errors
    ///
    /// Invalid handle, closed reader, or stream error.
    pub fn reader_read(&self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        self.registry
            .get::<ReaderRef>(handle)?
            .read(&self.runtime, buf)
    }

    /// # Errors
    ///
    /// Invalid handle or stream error.
    pub fn reader_close(&self, handle: Handle) -> Result<()> {
        self.registry
            .get::<ReaderRef>(handle)?
            .close(&self.runtime)
    }

    /// Close the reader if still open, then release it.
    ///
    /// # Errors
    ///
    /// Invalid handle, or the close error. The handle is released either way.
    pub fn reader_unpin(&self, handle: Handle) -> Result<()> {
        let reader = self.registry.get::<ReaderRef>(handle)?;
        let closed = reader.close(&self.runtime);
        self.registry.unpin::<ReaderRef>(handle)?;
        closed
    }

    // ---- writers ----

    /// # Errors
    ///
    /// Invalid handle, closed writer, or the error of a failed upload.
    pub fn writer_write(&self, handle: Handle, data: Vec<u8>) -> Result<usize> {
        self.registry
            .get::<WriterRef>(handle)?
            .write(&self.runtime, data)
    }

    /// End the stream and wait for the upload behind it, if any.
    ///
    /// # Errors
    ///
    /// Invalid handle or the upload error.
    pub fn writer_close(&self, handle: Handle) -> Result<()> {
        self.registry
            .get::<WriterRef>(handle)?
            .close(&self.runtime)
    }

    /// Close the writer if still open, then release it.
    ///
    /// # Errors
    ///
    /// Invalid handle, or the upload error if the writer was still open.
    /// The handle is released either way.
    pub fn writer_unpin(&self, handle: Handle) -> Result<()> {
        let writer = self.registry.get::<WriterRef>(handle)?;
        let closed = writer.close(&self.runtime);
        self.registry.unpin::<WriterRef>(handle)?;
        closed
    }

    // ---- objects ----

    /// # Errors
    ///
    /// Invalid handle.
    pub fn object(&self, handle: Handle) -> Result<Arc<ObjectRef>> {
        self.registry.get::<ObjectRef>(handle)
    }

    /// # Errors
    ///
    /// Invalid handle.
    pub fn object_unpin(&self, handle: Handle) -> Result<()> {
        self.registry.unpin::<ObjectRef>(handle)?;
        Ok(())
    }
}

impl std::fmt::Debug for ObjectFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFs")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
