//! Request and response datagrams.
//!
//! # Design
//! A datagram is a self-contained value describing one request or one
//! response, independent of any transport state. `RequestDatagram` is built
//! by the caller and snapshotted (deep-copied) by the engine on submission.
//! `ResponseDatagram` is the accumulator the transport writes into through
//! the `ResponseSink` capability; it belongs to the background execution
//! until it is handed to the completion callback.
//!
//! All fields use owned types (`String`, `Vec<u8>`), so copies never alias
//! the same body buffer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::GrowableByteBuffer;
use crate::error::CapacityError;
use crate::header::{display_line, format_header_line, parse_header_line};
use crate::transport::ResponseSink;

/// Ordered header pairs. Names may repeat.
pub type Headers = Vec<(String, String)>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Head,
    Delete,
    Put,
    Patch,
    Options,
    Trace,
    Connect,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Head => "HEAD",
            Self::Delete => "DELETE",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }

    /// Whether the request body is handed to the transport for this method.
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown http method: {0}")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "HEAD" => Ok(Self::Head),
            "DELETE" => Ok(Self::Delete),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "OPTIONS" => Ok(Self::Options),
            "TRACE" => Ok(Self::Trace),
            "CONNECT" => Ok(Self::Connect),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Whether `url` uses the `https` scheme (case-insensitive).
pub fn is_https(url: &str) -> bool {
    url.get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https:"))
}

/// An outbound request described as plain data.
///
/// Cloning deep-copies the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDatagram {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl RequestDatagram {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Append a header; an existing header of the same name is kept.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// Replace the body with a copy of `data`.
    pub fn set_body(&mut self, data: &[u8]) {
        self.body.clear();
        self.body.extend_from_slice(data);
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn is_https(&self) -> bool {
        is_https(&self.url)
    }

    /// Headers serialized as `"name: value"` lines, in insertion order.
    pub fn header_lines(&self) -> Vec<String> {
        self.headers
            .iter()
            .map(|(name, value)| format_header_line(name, value))
            .collect()
    }
}

/// An inbound response, accumulated while the transfer runs.
///
/// The status stays 0 until a transfer completes successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseDatagram {
    status: u16,
    headers: Headers,
    body: GrowableByteBuffer,
}

impl ResponseDatagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    /// First header named `name`, compared ASCII case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of header `name`, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(self.body.as_slice()).into_owned()
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn body_capacity(&self) -> usize {
        self.body.capacity()
    }

    pub fn append_body(&mut self, chunk: &[u8]) -> Result<(), CapacityError> {
        self.body.append(chunk)
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body.into_vec()
    }

    /// Forget everything received so far, keeping the body allocation.
    pub(crate) fn reset(&mut self) {
        self.status = 0;
        self.headers.clear();
        self.body.clear();
    }
}

impl ResponseSink for ResponseDatagram {
    fn on_chunk(&mut self, data: &[u8]) -> Result<(), CapacityError> {
        tracing::trace!(target: "http_engine::sink", len = data.len(), "body chunk");
        self.append_body(data)
    }

    fn on_header_line(&mut self, line: &[u8]) -> usize {
        match parse_header_line(line) {
            Some((name, value)) => self.headers.push((name, value)),
            None => {
                let text = display_line(line);
                tracing::trace!(target: "http_engine::sink", line = %text.trim_end(), "non-field header line");
            }
        }
        line.len()
    }
}
