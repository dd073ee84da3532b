//! The contract between the engine and the protocol engine doing the I/O.
//!
//! # Design
//! The engine never touches the network itself. For each submission it
//! builds a `Transfer` from the request snapshot, calls `configure` once and
//! `perform` once per attempt. Received data flows back through a
//! `ResponseSink`, which the engine points at a fresh `ResponseDatagram`.
//!
//! Cancellation uses a forced timeout: every transport exposes a
//! `TimeoutHandle` the engine can shrink from another thread while a
//! blocking `perform` is running. The transport checks it at every point
//! where it can give up (before delivering headers, between body chunks)
//! and fails the attempt with `TransportError::TimedOut` once expired.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{CapacityError, ConfigureError, TransportError};
use crate::http::Method;

/// Everything a transport needs to run one request.
///
/// Borrowed from the engine's request snapshot for the whole submission.
#[derive(Debug, Clone)]
pub struct Transfer<'a> {
    pub url: &'a str,
    pub method: Method,
    /// Outbound headers as `"name: value"` lines, in order, repeats allowed.
    pub header_lines: Vec<String>,
    /// Present only for methods that carry a body.
    pub body: Option<&'a [u8]>,
    pub connect_timeout: Duration,
    /// Overall limit for one attempt, if configured.
    pub transfer_timeout: Option<Duration>,
    pub proxy: Option<&'a str>,
    pub verify_certificates: bool,
}

/// Receiver for data arriving during a transfer.
pub trait ResponseSink {
    /// Accept one body fragment. An error aborts the attempt.
    fn on_chunk(&mut self, data: &[u8]) -> Result<(), CapacityError>;

    /// Accept one raw header line (line ending included) and return the
    /// number of bytes consumed. Anything other than `line.len()` aborts
    /// the attempt.
    fn on_header_line(&mut self, line: &[u8]) -> usize;
}

/// A protocol engine the request engine can drive.
///
/// One value corresponds to one reusable lower-level handle; it is created
/// with the client and dropped after the client's last execution finished.
pub trait Transport: Send + 'static {
    /// Create the handle. A failure leaves the client without a handle and
    /// every submission then fails with `RequestError::NoTransportHandle`.
    fn open() -> Result<Self, TransportError>
    where
        Self: Sized;

    /// Prepare the handle for `transfer`. Called once per submission.
    fn configure(&mut self, transfer: &Transfer<'_>) -> Result<(), ConfigureError>;

    /// Run one blocking attempt, feeding `sink` in arrival order.
    fn perform(
        &mut self,
        transfer: &Transfer<'_>,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError>;

    /// Status code of the last successful attempt.
    fn response_code(&self) -> u16;

    /// Handle to this transport's overall timeout.
    fn overall_timeout(&self) -> &TimeoutHandle;
}

#[derive(Debug, Default)]
struct TimeoutState {
    limit: Option<Duration>,
    started: Option<Instant>,
}

/// Overall-timeout knob shared between a transport and the engine.
///
/// The limit is measured from the start of the current attempt and may be
/// changed at any time, including while an attempt is running.
#[derive(Debug, Clone, Default)]
pub struct TimeoutHandle {
    state: Arc<Mutex<TimeoutState>>,
}

impl TimeoutHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or with `None`, remove) the overall limit.
    pub fn set(&self, limit: Option<Duration>) {
        self.state.lock().limit = limit;
    }

    pub fn limit(&self) -> Option<Duration> {
        self.state.lock().limit
    }

    /// Mark the start of an attempt. Transports call this from `perform`.
    pub fn start_attempt(&self) {
        self.state.lock().started = Some(Instant::now());
    }

    /// Time left before the limit is hit, `None` when unlimited.
    pub fn remaining(&self) -> Option<Duration> {
        let state = self.state.lock();
        let limit = state.limit?;
        let elapsed = state.started.map(|at| at.elapsed()).unwrap_or_default();
        Some(limit.saturating_sub(elapsed))
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Fail the attempt with `TimedOut` if the limit has been reached.
    pub fn check(&self) -> Result<(), TransportError> {
        if self.expired() {
            Err(TransportError::TimedOut)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_expires() {
        let handle = TimeoutHandle::new();
        handle.start_attempt();
        assert_eq!(handle.remaining(), None);
        assert!(!handle.expired());
        assert!(handle.check().is_ok());
    }

    #[test]
    fn forced_limit_expires_mid_attempt() {
        let handle = TimeoutHandle::new();
        handle.start_attempt();
        let shared = handle.clone();
        shared.set(Some(Duration::from_millis(1)));
        std::thread::sleep(Duration::from_millis(5));
        assert!(handle.expired());
        assert_eq!(handle.check(), Err(TransportError::TimedOut));
    }

    #[test]
    fn generous_limit_leaves_time() {
        let handle = TimeoutHandle::new();
        handle.set(Some(Duration::from_secs(60)));
        handle.start_attempt();
        assert!(handle.remaining().unwrap() > Duration::from_secs(59));
        assert!(!handle.expired());
    }

    #[test]
    fn clearing_the_limit_revives_the_handle() {
        let handle = TimeoutHandle::new();
        handle.set(Some(Duration::ZERO));
        assert!(handle.expired());
        handle.set(None);
        assert!(!handle.expired());
        assert_eq!(handle.limit(), None);
    }
}
