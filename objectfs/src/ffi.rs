//! Exported C functions
//!
//! Thin shims over one process-wide [`ObjectFs`]: copy the arguments in,
//! call the façade, marshal the result out. No panic crosses the boundary.
//! Handle misuse is reported as an error where the signature allows it,
//! otherwise logged.
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

use std::any::Any;
use std::ffi::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use lazy_static::lazy_static;
use tracing::{error, warn};

use crate::config::Config;
use crate::dup::{borrow_bytes_mut, dup_bytes, dup_str, free_c_string, into_c_string};
use crate::error::{Error, Result};
use crate::fs::ObjectFs;
use crate::idgen::Handle;
use crate::logging::init_logging;
use crate::marshal::{
    free_handle_array, Marshal, ObjfsHandleResult, ObjfsListResult, ObjfsReaderWriter,
    ObjfsSizeResult, ObjfsStatus,
};

lazy_static! {
    static ref INSTANCE: std::result::Result<ObjectFs, String> = Config::from_env()
        .and_then(ObjectFs::new)
        .map_err(|e| {
            error!(error = %e, "failed to initialize objectfs");
            e.to_string()
        });
}

fn instance() -> Result<&'static ObjectFs> {
    INSTANCE
        .as_ref()
        .map_err(|e| Error::Unavailable(e.clone()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn call<T>(op: &str, f: impl FnOnce(&ObjectFs) -> Result<T>) -> std::result::Result<Result<T>, String> {
    catch_unwind(AssertUnwindSafe(|| instance().and_then(f))).map_err(|panic| {
        let message = panic_message(&*panic);
        error!(op, panic = %message, "panic in exported call");
        format!("{op}: panic: {message}")
    })
}

/// Fallible call: errors and panics become `ok == false`.
fn guarded<M: Marshal>(op: &str, f: impl FnOnce(&ObjectFs) -> Result<M::Value>) -> M {
    match call(op, f) {
        Ok(result) => M::from_result(result),
        Err(panic) => M::failure(into_c_string(panic)),
    }
}

/// Accessor: errors are logged and read as the zero value.
fn accessor<T: Default>(op: &str, f: impl FnOnce(&ObjectFs) -> Result<T>) -> T {
    match call(op, f) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            error!(op, error = %e, "accessor on bad handle");
            T::default()
        }
        Err(_) => T::default(),
    }
}

/// Unpin: nothing to report to, so errors are logged.
fn release(op: &str, f: impl FnOnce(&ObjectFs) -> Result<()>) {
    if let Ok(Err(e)) = call(op, f) {
        warn!(op, error = %e, "release failed");
    }
}

// ---- storage ----

#[no_mangle]
pub unsafe extern "C" fn CreateStorage(
    name: *const c_char,
    endpoint: *const c_char,
    access_key: *const c_char,
    secret_key: *const c_char,
    token: *const c_char,
) -> ObjfsHandleResult {
    guarded("CreateStorage", |fs| {
        fs.create_storage(
            &dup_str(name)?,
            &dup_str(endpoint)?,
            &dup_str(access_key)?,
            &dup_str(secret_key)?,
            &dup_str(token)?,
        )
    })
}

#[no_mangle]
pub extern "C" fn StorageCreate(storage: Handle) -> ObjfsStatus {
    guarded("StorageCreate", |fs| fs.storage_create(storage))
}

/// `limit <= 0` reads to the end of the object.
#[no_mangle]
pub unsafe extern "C" fn StorageGet(
    storage: Handle,
    key: *const c_char,
    offset: i64,
    limit: i64,
) -> ObjfsHandleResult {
    guarded("StorageGet", |fs| {
        fs.storage_get(storage, &dup_str(key)?, offset, limit)
    })
}

#[no_mangle]
pub unsafe extern "C" fn StoragePut(storage: Handle, key: *const c_char) -> ObjfsHandleResult {
    guarded("StoragePut", |fs| fs.storage_put(storage, &dup_str(key)?))
}

#[no_mangle]
pub unsafe extern "C" fn StoragePutReader(
    storage: Handle,
    key: *const c_char,
    reader: Handle,
) -> ObjfsStatus {
    guarded("StoragePutReader", |fs| {
        fs.storage_put_reader(storage, &dup_str(key)?, reader)
    })
}

#[no_mangle]
pub unsafe extern "C" fn StorageDelete(storage: Handle, key: *const c_char) -> ObjfsStatus {
    guarded("StorageDelete", |fs| fs.storage_delete(storage, &dup_str(key)?))
}

#[no_mangle]
pub unsafe extern "C" fn StorageHead(storage: Handle, key: *const c_char) -> ObjfsHandleResult {
    guarded("StorageHead", |fs| fs.storage_head(storage, &dup_str(key)?))
}

#[no_mangle]
pub unsafe extern "C" fn StorageList(
    storage: Handle,
    prefix: *const c_char,
    marker: *const c_char,
    limit: i64,
) -> ObjfsListResult {
    guarded("StorageList", |fs| {
        fs.storage_list(storage, &dup_str(prefix)?, &dup_str(marker)?, limit)
    })
}

#[no_mangle]
pub unsafe extern "C" fn StorageListAll(
    storage: Handle,
    prefix: *const c_char,
    marker: *const c_char,
) -> ObjfsListResult {
    guarded("StorageListAll", |fs| {
        fs.storage_list_all(storage, &dup_str(prefix)?, &dup_str(marker)?)
    })
}

/// Caller frees the result with `StringFree`.
#[no_mangle]
pub extern "C" fn StorageDescribe(storage: Handle) -> *mut c_char {
    into_c_string(accessor("StorageDescribe", |fs| {
        fs.storage_describe(storage)
    }))
}

#[no_mangle]
pub extern "C" fn StorageCreateReaderWriter(storage: Handle) -> ObjfsReaderWriter {
    guarded("StorageCreateReaderWriter", |fs| {
        fs.storage_create_reader_writer(storage)
    })
}

#[no_mangle]
pub extern "C" fn StorageUnpin(storage: Handle) {
    release("StorageUnpin", |fs| fs.storage_unpin(storage));
}

// ---- readers ----

/// End of stream is `ok == true, n == 0`.
#[no_mangle]
pub unsafe extern "C" fn ReaderRead(reader: Handle, buf: *mut u8, len: usize) -> ObjfsSizeResult {
    guarded("ReaderRead", |fs| {
        fs.reader_read(reader, borrow_bytes_mut(buf, len))
    })
}

#[no_mangle]
pub extern "C" fn ReaderClose(reader: Handle) -> ObjfsStatus {
    guarded("ReaderClose", |fs| fs.reader_close(reader))
}

#[no_mangle]
pub extern "C" fn ReaderUnpin(reader: Handle) {
    release("ReaderUnpin", |fs| fs.reader_unpin(reader));
}

// ---- writers ----

#[no_mangle]
pub unsafe extern "C" fn WriterWrite(writer: Handle, buf: *const u8, len: usize) -> ObjfsSizeResult {
    guarded("WriterWrite", |fs| {
        fs.writer_write(writer, dup_bytes(buf, len))
    })
}

/// Waits for the upload behind the writer and reports its outcome.
#[no_mangle]
pub extern "C" fn WriterClose(writer: Handle) -> ObjfsStatus {
    guarded("WriterClose", |fs| fs.writer_close(writer))
}

#[no_mangle]
pub extern "C" fn WriterUnpin(writer: Handle) {
    release("WriterUnpin", |fs| fs.writer_unpin(writer));
}

// ---- objects ----

/// Caller frees the result with `StringFree`.
#[no_mangle]
pub extern "C" fn ObjectKey(object: Handle) -> *mut c_char {
    into_c_string(accessor("ObjectKey", |fs| {
        Ok(fs.object(object)?.key().to_string())
    }))
}

#[no_mangle]
pub extern "C" fn ObjectSize(object: Handle) -> i64 {
    accessor("ObjectSize", |fs| Ok(fs.object(object)?.size()))
}

/// Unix seconds
#[no_mangle]
pub extern "C" fn ObjectMtime(object: Handle) -> i64 {
    accessor("ObjectMtime", |fs| Ok(fs.object(object)?.mtime()))
}

#[no_mangle]
pub extern "C" fn ObjectIsDir(object: Handle) -> bool {
    accessor("ObjectIsDir", |fs| Ok(fs.object(object)?.is_dir()))
}

#[no_mangle]
pub extern "C" fn ObjectIsFile(object: Handle) -> bool {
    accessor("ObjectIsFile", |fs| Ok(fs.object(object)?.is_file()))
}

#[no_mangle]
pub extern "C" fn ObjectIsSymlink(object: Handle) -> bool {
    accessor("ObjectIsSymlink", |fs| Ok(fs.object(object)?.is_symlink()))
}

#[no_mangle]
pub extern "C" fn ObjectUnpin(object: Handle) {
    release("ObjectUnpin", |fs| fs.object_unpin(object));
}

// ---- memory and logging ----

#[no_mangle]
pub unsafe extern "C" fn StringFree(s: *mut c_char) {
    free_c_string(s);
}

/// Frees the array only; unpin the handles in it separately.
#[no_mangle]
pub unsafe extern "C" fn ObjectListFree(objects: *mut Handle, len: i64) {
    free_handle_array(objects, len);
}

/// Route logs to stderr. Returns false if logging was already set up.
#[no_mangle]
pub extern "C" fn ObjectfsInitLogging() -> bool {
    catch_unwind(init_logging).unwrap_or(false)
}
