//! Streaming write bridge
//!
//! Backends want a whole readable stream for `put`; native callers write in
//! pieces. The bridge runs `put` on the runtime, fed by a pipe whose writer
//! end goes back to the caller.

use std::sync::Arc;

use objstore::{ObjectReader, ObjectStorage, StorageResult};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::pipe::{pipe, PipeWriter};

/// A `put` running in the background
pub struct Upload {
    key: String,
    task: JoinHandle<StorageResult<()>>,
}

impl Upload {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Block until the upload ends and report its outcome.
    ///
    /// The writer end must already be closed, otherwise this waits forever.
    ///
    /// # Errors
    ///
    /// `Upload` with the backend error, or `UploadAborted` if the task
    /// panicked.
    pub fn wait(self, runtime: &Runtime) -> Result<()> {
        let Upload { key, task } = self;
        match runtime.block_on(task) {
            Ok(Ok(())) => {
                debug!(key = %key, "upload finished");
                Ok(())
            }
            Ok(Err(source)) => {
                error!(key = %key, error = %source, "upload failed");
                Err(Error::Upload { key, source })
            }
            Err(join) => {
                error!(key = %key, error = %join, "upload task aborted");
                Err(Error::UploadAborted {
                    key,
                    reason: join.to_string(),
                })
            }
        }
    }
}

/// Start `storage.put(key, ..)` fed by a fresh pipe.
///
/// Returns the writer end and the running upload. The pipe reader is closed
/// when `put` returns, whatever the outcome, so a failed upload turns further
/// writes into errors instead of blocking forever.
pub fn start_upload(
    runtime: &Runtime,
    storage: Arc<dyn ObjectStorage>,
    key: String,
    capacity: usize,
) -> (PipeWriter, Upload) {
    let (writer, mut reader) = pipe(capacity);
    let task_key = key.clone();
    let task = runtime.spawn(async move {
        let result = storage.put(&task_key, &mut reader).await;
        if let Err(e) = reader.close().await {
            warn!(key = %task_key, error = %e, "failed to close upload pipe");
        }
        result
    });
    debug!(key = %key, "upload started");
    (writer, Upload { key, task })
}
