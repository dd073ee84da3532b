//! Asynchronous single-flight HTTP request engine.
//!
//! # Overview
//! Callers describe a request as a `RequestDatagram`, hand it to a `Client`
//! together with a completion callback and receive the outcome plus a
//! `ResponseDatagram` once the background transfer finished. A client runs
//! at most one request at a time; it can be aborted and waited on from any
//! thread.
//!
//! # Design
//! - The network work is delegated to a `Transport`. `UreqTransport` is the
//!   default; tests plug in scripted transports through the same trait.
//! - Received data flows through the `ResponseSink` capability into a
//!   `ResponseDatagram`: header lines via `header::parse_header_line`, body
//!   chunks via `GrowableByteBuffer`.
//! - Outcomes carry stable numeric codes (`RequestError::code`) so the C
//!   boundary in the `ffi` crate can pass plain integers.
//! - The engine reports through `tracing` only; nothing is printed unless
//!   the embedding application installs a subscriber.

pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod header;
pub mod http;
pub mod transport;
pub mod ureq_transport;

pub use buffer::GrowableByteBuffer;
pub use client::{Client, Outcome};
pub use config::{ClientConfig, SubmitOptions};
pub use error::{result_code, CapacityError, ConfigureError, RequestError, SubmitError, TransportError, RESULT_OK};
pub use http::{is_https, Headers, Method, RequestDatagram, ResponseDatagram};
pub use transport::{ResponseSink, TimeoutHandle, Transfer, Transport};
pub use ureq_transport::UreqTransport;
