//! Object storage backends for objectfs
//!
//! Every backend implements [`ObjectStorage`]. The boundary crate only ever
//! talks to `Arc<dyn ObjectStorage>`, so the concrete backend is picked once
//! by [`create_storage`] and never inspected again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  objectfs (boundary layer)          │
//! │  - handles, pipes, C exports        │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ ObjectStorage + ObjectReader
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  ObjectStorage (capability)         │
//! │  - create/get/put/delete/head       │
//! │  - list pages, lazy list_all        │
//! └─────────────────────────────────────┘
//!      ▲           ▲            ▲
//!      │           │            │
//!  MemStorage  FileStorage  SqliteStorage
//! ```

pub mod error;
pub mod factory;
pub mod file;
pub mod mem;
pub mod object;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod storage;
pub mod stream;

pub use error::{StorageError, StorageResult};
pub use factory::create_storage;
pub use file::FileStorage;
pub use mem::MemStorage;
pub use object::Object;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
pub use storage::{ObjectStorage, ObjectStream, LIST_PAGE_SIZE};
pub use stream::{read_to_end, BoxReader, ObjectReader, SliceReader};
