//! Types crossing the FFI boundary.
//!
//! # Design
//! Clients, requests and responses are opaque handles: C only ever holds a
//! pointer and goes through accessor functions, so the Rust layout stays
//! private. Only the method enum, the callback signature and the result
//! codes are part of the C-visible ABI. Response headers are converted to
//! C strings once, when the response is handed over, so accessors can return
//! borrowed pointers that stay valid until `http_response_free`. Fields
//! containing a NUL byte cannot be represented and are skipped.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use http_engine::{Method, RequestDatagram, ResponseDatagram};

/// Transfer finished; inspect the response status.
pub const HTTP_RESULT_OK: i32 = 0;
/// The client has no transport handle.
pub const HTTP_RESULT_NO_HANDLE: i32 = -1;
/// The transport cannot express the request method.
pub const HTTP_RESULT_UNSUPPORTED_METHOD: i32 = -2;
/// `http_client_abort` ended the transfer.
pub const HTTP_RESULT_ABORTED: i32 = -4;

/// Opaque handle to a client. Free with `http_client_free`.
pub struct FfiHttpClient {
    pub(crate) inner: http_engine::Client,
}

/// Opaque handle to a request under construction. Free with
/// `http_request_free`.
pub struct FfiHttpRequest {
    pub(crate) inner: RequestDatagram,
}

/// Opaque handle to a finished response. Free with `http_response_free`.
pub struct FfiHttpResponse {
    pub(crate) inner: ResponseDatagram,
    pub(crate) headers: Vec<(CString, CString)>,
}

impl FfiHttpResponse {
    /// Move a core response to the heap for the C caller.
    pub(crate) fn from_core(response: ResponseDatagram) -> *mut Self {
        // A field with an interior NUL has no C string form and is left out
        // of the C view.
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                Some((
                    CString::new(name.as_str()).ok()?,
                    CString::new(value.as_str()).ok()?,
                ))
            })
            .collect();
        Box::into_raw(Box::new(FfiHttpResponse {
            inner: response,
            headers,
        }))
    }
}

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Head = 2,
    Delete = 3,
    Put = 4,
    Patch = 5,
    Options = 6,
    Trace = 7,
    Connect = 8,
}

impl From<FfiHttpMethod> for Method {
    fn from(m: FfiHttpMethod) -> Self {
        match m {
            FfiHttpMethod::Get => Method::Get,
            FfiHttpMethod::Post => Method::Post,
            FfiHttpMethod::Head => Method::Head,
            FfiHttpMethod::Delete => Method::Delete,
            FfiHttpMethod::Put => Method::Put,
            FfiHttpMethod::Patch => Method::Patch,
            FfiHttpMethod::Options => Method::Options,
            FfiHttpMethod::Trace => Method::Trace,
            FfiHttpMethod::Connect => Method::Connect,
        }
    }
}

/// Completion callback invoked once per accepted request, on the client's
/// background thread.
///
/// `result` is `HTTP_RESULT_OK`, a negative `HTTP_RESULT_*` code, or a
/// positive transport error code. The callee owns `response` and must
/// release it with `http_response_free`.
pub type FfiCompletionCallback =
    extern "C" fn(result: i32, response: *mut FfiHttpResponse, user_data: *mut c_void);

/// Caller context passed back verbatim to the completion callback.
pub(crate) struct UserData(pub(crate) *mut c_void);

// The pointer is never dereferenced on the Rust side; keeping it valid
// across threads is the C caller's contract.
unsafe impl Send for UserData {}

impl UserData {
    /// Consume the wrapper. Closures must call this rather than touch the
    /// field, so they capture the whole `Send` wrapper.
    pub(crate) fn into_raw(self) -> *mut c_void {
        self.0
    }
}

/// Copy a Rust string into a heap C string owned by the caller.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(c) => c.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
