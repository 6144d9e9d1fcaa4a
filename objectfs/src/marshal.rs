//! C-compatible result records
//!
//! Every fallible export returns one of these. `ok == true` means `err` is
//! null and the payload is set; `ok == false` means `err` is a caller-owned
//! message (release with `StringFree`) and the payload is zero.

use std::ffi::c_char;
use std::ptr;

use tracing::debug;

use crate::dup::into_c_string;
use crate::error::Result;
use crate::idgen::Handle;

/// Build a C result record from a Rust result.
pub trait Marshal: Sized {
    type Value;

    fn success(value: Self::Value) -> Self;

    /// Failure carrying an already converted message
    fn failure(err: *mut c_char) -> Self;

    fn from_result(result: Result<Self::Value>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(e) => {
                debug!(error = %e, "call failed");
                Self::failure(into_c_string(e.to_string()))
            }
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct ObjfsStatus {
    pub ok: bool,
    pub err: *mut c_char,
}

impl Marshal for ObjfsStatus {
    type Value = ();

    fn success((): ()) -> Self {
        Self {
            ok: true,
            err: ptr::null_mut(),
        }
    }

    fn failure(err: *mut c_char) -> Self {
        Self { ok: false, err }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct ObjfsHandleResult {
    pub ok: bool,
    pub err: *mut c_char,
    pub handle: Handle,
}

impl Marshal for ObjfsHandleResult {
    type Value = Handle;

    fn success(handle: Handle) -> Self {
        Self {
            ok: true,
            err: ptr::null_mut(),
            handle,
        }
    }

    fn failure(err: *mut c_char) -> Self {
        Self {
            ok: false,
            err,
            handle: Handle::NULL,
        }
    }
}

/// Byte count of a read or write
#[repr(C)]
#[derive(Debug)]
pub struct ObjfsSizeResult {
    pub ok: bool,
    pub err: *mut c_char,
    pub n: i64,
}

impl Marshal for ObjfsSizeResult {
    type Value = usize;

    fn success(n: usize) -> Self {
        Self {
            ok: true,
            err: ptr::null_mut(),
            n: i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    fn failure(err: *mut c_char) -> Self {
        Self { ok: false, err, n: 0 }
    }
}

/// Array of object handles
///
/// `objects` holds exactly `len` handles and is null when `len` is 0.
/// Release the array with `ObjectListFree`; the handles inside are unpinned
/// separately.
#[repr(C)]
#[derive(Debug)]
pub struct ObjfsListResult {
    pub ok: bool,
    pub err: *mut c_char,
    pub len: i64,
    pub objects: *mut Handle,
}

impl Marshal for ObjfsListResult {
    type Value = Vec<Handle>;

    fn success(handles: Vec<Handle>) -> Self {
        let (objects, len) = into_handle_array(handles);
        Self {
            ok: true,
            err: ptr::null_mut(),
            len,
            objects,
        }
    }

    fn failure(err: *mut c_char) -> Self {
        Self {
            ok: false,
            err,
            len: 0,
            objects: ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct ObjfsReaderWriter {
    pub ok: bool,
    pub err: *mut c_char,
    pub reader: Handle,
    pub writer: Handle,
}

impl Marshal for ObjfsReaderWriter {
    type Value = (Handle, Handle);

    fn success((reader, writer): (Handle, Handle)) -> Self {
        Self {
            ok: true,
            err: ptr::null_mut(),
            reader,
            writer,
        }
    }

    fn failure(err: *mut c_char) -> Self {
        Self {
            ok: false,
            err,
            reader: Handle::NULL,
            writer: Handle::NULL,
        }
    }
}

/// Leak `handles` as an exactly sized heap array.
fn into_handle_array(handles: Vec<Handle>) -> (*mut Handle, i64) {
    if handles.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let len = i64::try_from(handles.len()).unwrap_or(i64::MAX);
    let array = Box::into_raw(handles.into_boxed_slice());
    (array.cast::<Handle>(), len)
}

/// Take back an array made by [`into_handle_array`].
///
/// # Safety
///
/// `objects`/`len` must be exactly what a list result returned, and the
/// array must not be used afterwards.
pub unsafe fn free_handle_array(objects: *mut Handle, len: i64) {
    let Ok(len) = usize::try_from(len) else {
        return;
    };
    if objects.is_null() || len == 0 {
        return;
    }
    drop(Box::from_raw(ptr::slice_from_raw_parts_mut(objects, len)));
}
