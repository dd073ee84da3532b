//! C-ABI wrapper around `http-engine-core`.
//!
//! # Overview
//! Exposes the single-flight request engine through `extern "C"` functions:
//! build a request, submit it with a completion callback, abort or wait,
//! then read the response through accessor functions.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Clients, requests and responses are opaque pointers created by
//!   `*_new` functions (or handed to the callback) and released by the
//!   matching `*_free` function. Strings returned as `*mut c_char` are
//!   owned by the caller and released with `http_free_string`; `*const`
//!   returns are borrowed from their handle.
//! - Outcomes are plain integers: `HTTP_RESULT_OK`, a negative
//!   `HTTP_RESULT_*` engine code, or a positive transport code.

pub mod types;

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use http_engine::{result_code, ClientConfig, RequestDatagram, SubmitOptions};

use types::*;

/// Borrow a C string argument as UTF-8. `None` for null or invalid input.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives
/// the returned reference.
unsafe fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

fn millis(ms: u32) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms.into()))
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client with default settings (certificate validation on, no
/// transfer timeout).
///
/// Returns null if an internal panic occurs.
/// The caller must free the returned pointer with `http_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_new() -> *mut FfiHttpClient {
    catch_unwind(|| {
        let client = http_engine::Client::new();
        Box::into_raw(Box::new(FfiHttpClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a client with explicit settings.
///
/// `verify_certificates = false` accepts any server identity and should only
/// be used against trusted hosts. `transfer_timeout_ms = 0` means no overall
/// limit per attempt.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_new_with_options(
    verify_certificates: bool,
    transfer_timeout_ms: u32,
) -> *mut FfiHttpClient {
    catch_unwind(|| {
        let mut config = ClientConfig::new();
        config.verify_certificates = verify_certificates;
        config.transfer_timeout = millis(transfer_timeout_ms);
        let client = http_engine::Client::with_config(config);
        Box::into_raw(Box::new(FfiHttpClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `http_client_new*`. Safe to call with null.
///
/// A running request is aborted and its callback has returned before this
/// function returns, unless called from inside that callback.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_free(client: *mut FfiHttpClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Submission control
// ---------------------------------------------------------------------------

/// Submit `request` in the background.
///
/// The request is copied; it may be freed or reused right after this call.
/// `connect_timeout_ms = 0` selects the 5000 ms default. Only timeouts are
/// retried, up to `retry_count` extra attempts.
///
/// Returns false, without invoking `callback`, if the client is busy, an
/// argument is null, or the background thread cannot be started. Otherwise
/// `callback` is invoked exactly once with `user_data`.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_request(
    client: *const FfiHttpClient,
    request: *const FfiHttpRequest,
    callback: Option<FfiCompletionCallback>,
    user_data: *mut c_void,
    connect_timeout_ms: u32,
    retry_count: u32,
) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() || request.is_null() {
            return false;
        }
        let Some(callback) = callback else {
            return false;
        };
        let client = unsafe { &*client };
        let request = unsafe { &*request };

        let mut options = SubmitOptions::default().with_retries(retry_count);
        if let Some(timeout) = millis(connect_timeout_ms) {
            options = options.with_connect_timeout(timeout);
        }
        let user_data = UserData(user_data);
        client
            .inner
            .submit_with(&request.inner, options, move |outcome, response| {
                let user_data = user_data.into_raw();
                callback(result_code(&outcome), FfiHttpResponse::from_core(response), user_data);
            })
            .is_ok()
    }))
    .unwrap_or(false)
}

/// Ask the running request to stop. Returns immediately; safe with null.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_abort(client: *const FfiHttpClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            unsafe { &*client }.inner.abort();
        }));
    }
}

/// Wait for the running request to finish.
///
/// A negative `timeout_ms` waits indefinitely, zero polls. Returns true when
/// no request is running, including when none was ever submitted or
/// `client` is null.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_wait(client: *const FfiHttpClient, timeout_ms: i64) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return true;
        }
        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        unsafe { &*client }.inner.wait(timeout)
    }))
    .unwrap_or(false)
}

/// Whether a request is currently running.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_is_busy(client: *const FfiHttpClient) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        unsafe { &*client }.inner.is_busy()
    }))
    .unwrap_or(false)
}

/// Set the proxy for later requests. Null clears it.
///
/// Returns false if `client` is null or `proxy` is not valid UTF-8.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_set_proxy(client: *const FfiHttpClient, proxy: *const c_char) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &*client };
        if proxy.is_null() {
            client.inner.set_proxy(None);
            return true;
        }
        match unsafe { str_arg(proxy) } {
            Some(proxy) => {
                client.inner.set_proxy(Some(proxy.to_string()));
                true
            }
            None => false,
        }
    }))
    .unwrap_or(false)
}

/// Current proxy, or null when none is set.
///
/// The caller must free the returned string with `http_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn http_client_get_proxy(client: *const FfiHttpClient) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        match unsafe { &*client }.inner.proxy() {
            Some(proxy) => into_c_string(proxy),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Start a request for `url` with no headers and an empty body.
///
/// Returns null if `url` is null or not valid UTF-8.
/// The caller must free the returned pointer with `http_request_free`.
#[unsafe(no_mangle)]
pub extern "C" fn http_request_new(method: FfiHttpMethod, url: *const c_char) -> *mut FfiHttpRequest {
    catch_unwind(|| {
        let Some(url) = (unsafe { str_arg(url) }) else {
            return std::ptr::null_mut();
        };
        let inner = RequestDatagram::new(method.into(), url);
        Box::into_raw(Box::new(FfiHttpRequest { inner }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Append a header. Repeated names are kept in order.
#[unsafe(no_mangle)]
pub extern "C" fn http_request_add_header(
    request: *mut FfiHttpRequest,
    name: *const c_char,
    value: *const c_char,
) -> bool {
    catch_unwind(|| {
        if request.is_null() {
            return false;
        }
        let (Some(name), Some(value)) = (unsafe { str_arg(name) }, unsafe { str_arg(value) }) else {
            return false;
        };
        unsafe { &mut *request }.inner.add_header(name, value);
        true
    })
    .unwrap_or(false)
}

/// Replace the body with a copy of `len` bytes at `data`.
///
/// `data` may be null only when `len` is zero, which clears the body.
#[unsafe(no_mangle)]
pub extern "C" fn http_request_set_body(request: *mut FfiHttpRequest, data: *const u8, len: usize) -> bool {
    catch_unwind(|| {
        if request.is_null() || (data.is_null() && len > 0) {
            return false;
        }
        let bytes: &[u8] = if len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(data, len) }
        };
        unsafe { &mut *request }.inner.set_body(bytes);
        true
    })
    .unwrap_or(false)
}

/// Free a request created by `http_request_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn http_request_free(request: *mut FfiHttpRequest) {
    if !request.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(request) });
        });
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// HTTP status code, 0 when the transfer did not complete.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_status(response: *const FfiHttpResponse) -> u16 {
    catch_unwind(|| {
        if response.is_null() {
            return 0;
        }
        unsafe { &*response }.inner.status()
    })
    .unwrap_or(0)
}

/// Borrow the body bytes and write their count to `len` (if non-null).
///
/// Returns null if `response` is null.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_body(response: *const FfiHttpResponse, len: *mut usize) -> *const u8 {
    catch_unwind(|| {
        if response.is_null() {
            return std::ptr::null();
        }
        let body = unsafe { &*response }.inner.body();
        if !len.is_null() {
            unsafe { *len = body.len() };
        }
        body.as_ptr()
    })
    .unwrap_or(std::ptr::null())
}

/// Number of received header fields. Fields containing a NUL byte are not
/// visible through this API.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_header_count(response: *const FfiHttpResponse) -> usize {
    catch_unwind(|| {
        if response.is_null() {
            return 0;
        }
        unsafe { &*response }.headers.len()
    })
    .unwrap_or(0)
}

/// Borrow the name of header `index`, or null when out of range.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_header_name(response: *const FfiHttpResponse, index: usize) -> *const c_char {
    catch_unwind(|| {
        if response.is_null() {
            return std::ptr::null();
        }
        match unsafe { &*response }.headers.get(index) {
            Some((name, _)) => name.as_ptr(),
            None => std::ptr::null(),
        }
    })
    .unwrap_or(std::ptr::null())
}

/// Borrow the value of header `index`, or null when out of range.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_header_value(response: *const FfiHttpResponse, index: usize) -> *const c_char {
    catch_unwind(|| {
        if response.is_null() {
            return std::ptr::null();
        }
        match unsafe { &*response }.headers.get(index) {
            Some((_, value)) => value.as_ptr(),
            None => std::ptr::null(),
        }
    })
    .unwrap_or(std::ptr::null())
}

/// Borrow the value of the first header named `name` (ASCII
/// case-insensitive), or null when absent.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_find_header(response: *const FfiHttpResponse, name: *const c_char) -> *const c_char {
    catch_unwind(|| {
        if response.is_null() {
            return std::ptr::null();
        }
        let Some(name) = (unsafe { str_arg(name) }) else {
            return std::ptr::null();
        };
        unsafe { &*response }
            .headers
            .iter()
            .find(|(n, _)| n.as_bytes().eq_ignore_ascii_case(name.as_bytes()))
            .map_or(std::ptr::null(), |(_, value)| value.as_ptr())
    })
    .unwrap_or(std::ptr::null())
}

/// Free a response handed to a completion callback. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn http_response_free(response: *mut FfiHttpResponse) {
    if !response.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(response) });
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Whether `url` uses the `https` scheme. False for null.
#[unsafe(no_mangle)]
pub extern "C" fn http_is_https(url: *const c_char) -> bool {
    catch_unwind(|| unsafe { str_arg(url) }.is_some_and(http_engine::is_https)).unwrap_or(false)
}

/// Free a string returned by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn http_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { std::ffi::CString::from_raw(s) });
        });
    }
}
