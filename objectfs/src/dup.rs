//! Copying data across the C boundary
//!
//! Nothing the caller passes in is retained: strings and buffers are copied
//! into owned Rust values before use. Strings going out are heap-allocated
//! here and must come back through [`free_c_string`].

use std::ffi::{c_char, CStr, CString};

use crate::error::{Error, Result};

/// Copy a NUL-terminated UTF-8 string. A null pointer reads as `""`.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
///
/// # Errors
///
/// `InvalidArgument` if the bytes are not UTF-8.
pub unsafe fn dup_str(ptr: *const c_char) -> Result<String> {
    if ptr.is_null() {
        return Ok(String::new());
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map(str::to_owned)
        .map_err(|e| Error::InvalidArgument(format!("string is not valid UTF-8: {e}")))
}

/// Copy `len` bytes starting at `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for reads of `len` bytes, or `len` must be 0.
#[must_use]
pub unsafe fn dup_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len).to_vec()
}

/// Borrow a caller buffer for the duration of one call.
///
/// # Safety
///
/// `ptr` must be valid for writes of `len` bytes, or `len` must be 0, and
/// nothing else may access the buffer during the call.
pub unsafe fn borrow_bytes_mut<'a>(ptr: *mut u8, len: usize) -> &'a mut [u8] {
    if ptr.is_null() || len == 0 {
        return &mut [];
    }
    std::slice::from_raw_parts_mut(ptr, len)
}

/// Hand `s` to the caller as an owned C string.
///
/// Interior NULs are dropped so the conversion cannot fail.
#[must_use]
pub fn into_c_string(s: impl Into<String>) -> *mut c_char {
    let mut bytes = s.into().into_bytes();
    bytes.retain(|&b| b != 0);
    // No NULs left
    CString::new(bytes)
        .unwrap_or_default()
        .into_raw()
}

/// Release a string produced by [`into_c_string`]. Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or come from [`into_c_string`], and must not be used
/// afterwards.
pub unsafe fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}
