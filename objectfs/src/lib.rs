//! ABI-safe C boundary over object storage backends
//!
//! Native callers hold opaque [`Handle`]s; the values behind them live in a
//! [`Registry`] until the matching unpin. The Rust façade is [`ObjectFs`];
//! the C exports in [`ffi`] drive one process-wide instance of it.
//!
//! ```text
//!  native caller
//!      │  handles, C strings, byte buffers
//!      ▼
//!  ffi ── dup (copy in) ── marshal (result records out)
//!      │
//!      ▼
//!  ObjectFs ── Registry ── Reader/Writer/Object/Storage wrappers
//!      │                        │
//!      │ block_on               │ pipe ── bridge (background put)
//!      ▼                        ▼
//!  tokio runtime ─────────► objstore::ObjectStorage
//! ```

pub mod bridge;
pub mod config;
pub mod dup;
pub mod error;
pub mod ffi;
pub mod fs;
pub mod idgen;
pub mod logging;
pub mod marshal;
pub mod pipe;
pub mod registry;
pub mod wrappers;

pub use config::Config;
pub use error::{Error, Result};
pub use fs::ObjectFs;
pub use idgen::Handle;
pub use logging::init_logging;
pub use registry::{HandleKind, Registry};
