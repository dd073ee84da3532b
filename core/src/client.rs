//! Single-flight asynchronous request engine.
//!
//! # Design
//! A `Client` owns one transport handle and runs at most one request at a
//! time. `submit` snapshots the request, flips the engine from `Idle` to
//! `Busy` and hands the work to a dedicated background thread; it never
//! blocks on I/O. The background thread configures the transport, performs
//! the transfer (retrying only on timeout), invokes the completion callback
//! exactly once and only then returns the engine to `Idle`. A submission
//! racing against that transition is therefore rejected until the callback
//! has returned.
//!
//! Cancellation is a signal: `abort` raises a flag and shrinks the
//! transport's overall timeout to one millisecond, so the blocking attempt
//! fails fast. The flag turns the resulting timeout into
//! `RequestError::Aborted` and keeps the retry loop from starting another
//! attempt.
//!
//! The completion callback runs on the background thread. It must not call
//! `wait` on the client that invoked it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::{ClientConfig, SubmitOptions};
use crate::error::{result_code, RequestError, SubmitError};
use crate::http::{RequestDatagram, ResponseDatagram};
use crate::transport::{TimeoutHandle, Transfer, Transport};
use crate::ureq_transport::UreqTransport;

/// Overall timeout forced onto the transport by `abort`.
pub const ABORT_TIMEOUT: Duration = Duration::from_millis(1);

/// Outcome of a submission as seen by the completion callback.
pub type Outcome = Result<(), RequestError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Busy,
}

struct Shared<T> {
    transport: Mutex<Option<T>>,
    timeout: Option<TimeoutHandle>,
    abort: AtomicBool,
    state: Mutex<State>,
    done: Condvar,
    proxy: Mutex<Option<String>>,
    config: ClientConfig,
}

/// Asynchronous HTTP client with at most one request in flight.
///
/// Dropping the client aborts the running request and waits for its
/// callback to finish.
pub struct Client<T: Transport = UreqTransport> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Client<UreqTransport> {
    pub fn new() -> Self {
        Self::open(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::open(config)
    }
}

impl Default for Client<UreqTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    /// Create a client, opening a fresh transport handle.
    ///
    /// If the handle cannot be created the client is still returned, and
    /// every submission completes with `RequestError::NoTransportHandle`.
    pub fn open(config: ClientConfig) -> Self {
        let transport = match T::open() {
            Ok(transport) => Some(transport),
            Err(err) => {
                warn!(target: "http_engine::client", error = %err, "failed to open transport handle");
                None
            }
        };
        Self::build(transport, config)
    }

    /// Create a client around an existing transport handle.
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self::build(Some(transport), config)
    }

    fn build(transport: Option<T>, config: ClientConfig) -> Self {
        let timeout = transport.as_ref().map(|t| t.overall_timeout().clone());
        let proxy = config.proxy.clone();
        Self {
            shared: Arc::new(Shared {
                transport: Mutex::new(transport),
                timeout,
                abort: AtomicBool::new(false),
                state: Mutex::new(State::Idle),
                done: Condvar::new(),
                proxy: Mutex::new(proxy),
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Whether the transport handle was created.
    pub fn has_transport(&self) -> bool {
        // The timeout handle exists exactly when the transport does.
        self.shared.timeout.is_some()
    }

    /// Submit with the default connect timeout and no retries.
    pub fn submit<F>(&self, request: &RequestDatagram, callback: F) -> Result<(), SubmitError>
    where
        F: FnOnce(Outcome, ResponseDatagram) + Send + 'static,
    {
        self.submit_with(request, SubmitOptions::default(), callback)
    }

    /// Start `request` in the background.
    ///
    /// Returns `SubmitError::Busy` without touching the running submission
    /// when one has not finished yet. Otherwise `callback` is invoked exactly
    /// once, from the background thread, with the outcome and the response.
    pub fn submit_with<F>(
        &self,
        request: &RequestDatagram,
        options: SubmitOptions,
        callback: F,
    ) -> Result<(), SubmitError>
    where
        F: FnOnce(Outcome, ResponseDatagram) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if *state == State::Busy {
            debug!(target: "http_engine::client", url = %request.url, "rejected submission, client busy");
            return Err(SubmitError::Busy);
        }

        self.shared.abort.store(false, Ordering::SeqCst);
        if let Some(timeout) = &self.shared.timeout {
            timeout.set(None);
        }

        let shared = Arc::clone(&self.shared);
        let snapshot = request.clone();
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name.clone())
            .spawn(move || run(shared, snapshot, options, callback))
            .map_err(SubmitError::Spawn)?;
        *state = State::Busy;

        let previous = self.worker.lock().replace(handle);
        drop(state);

        // The previous worker already left `Busy`; reap it.
        if let Some(previous) = previous {
            reap(previous);
        }
        Ok(())
    }

    /// Request cancellation of the running submission, if any.
    ///
    /// Returns immediately; use `wait` to observe completion.
    pub fn abort(&self) {
        let _state = self.shared.state.lock();
        self.shared.abort.store(true, Ordering::SeqCst);
        if let Some(timeout) = &self.shared.timeout {
            timeout.set(Some(ABORT_TIMEOUT));
        }
    }

    /// Block until the current submission finished or `timeout` elapsed.
    ///
    /// `None` waits indefinitely, `Some(Duration::ZERO)` polls. Returns
    /// whether the engine is idle, which is also the case when nothing was
    /// ever submitted.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.shared.state.lock();
        let deadline = timeout.and_then(|limit| Instant::now().checked_add(limit));
        while *state == State::Busy {
            match deadline {
                Some(deadline) => {
                    if self.shared.done.wait_until(&mut state, deadline).timed_out() {
                        return *state == State::Idle;
                    }
                }
                // Unbounded, or a deadline too far out to represent.
                None => self.shared.done.wait(&mut state),
            }
        }
        true
    }

    pub fn is_busy(&self) -> bool {
        *self.shared.state.lock() == State::Busy
    }

    /// Proxy applied to every later submission. `None` clears it.
    pub fn set_proxy(&self, proxy: Option<String>) {
        *self.shared.proxy.lock() = proxy;
    }

    pub fn proxy(&self) -> Option<String> {
        self.shared.proxy.lock().clone()
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        self.abort();
        let Some(handle) = self.worker.get_mut().take() else {
            return;
        };
        // Dropped from inside its own callback; the thread ends by itself.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        reap(handle);
    }
}

/// Join a finished request thread, reporting a panic that escaped it.
fn reap(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!(target: "http_engine::client", "request thread panicked");
    }
}

/// Returns the engine to `Idle` when the background execution ends, even by
/// unwinding.
struct IdleGuard<'a, T> {
    shared: &'a Shared<T>,
}

impl<T> Drop for IdleGuard<'_, T> {
    fn drop(&mut self) {
        *self.shared.state.lock() = State::Idle;
        self.shared.done.notify_all();
    }
}

fn run<T, F>(shared: Arc<Shared<T>>, request: RequestDatagram, options: SubmitOptions, callback: F)
where
    T: Transport,
    F: FnOnce(Outcome, ResponseDatagram),
{
    let _idle = IdleGuard { shared: &shared };
    debug!(
        target: "http_engine::client",
        method = %request.method,
        url = %request.url,
        retries = options.retry_count,
        "request started"
    );

    let (outcome, response) = shared.execute(&request, options);
    debug!(
        target: "http_engine::client",
        url = %request.url,
        status = response.status(),
        code = result_code(&outcome),
        "request finished"
    );

    let delivered = panic::catch_unwind(AssertUnwindSafe(move || callback(outcome, response)));
    if delivered.is_err() {
        warn!(target: "http_engine::client", url = %request.url, "completion callback panicked");
    }
}

impl<T: Transport> Shared<T> {
    fn aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    fn execute(&self, request: &RequestDatagram, options: SubmitOptions) -> (Outcome, ResponseDatagram) {
        let mut response = ResponseDatagram::new();
        let mut guard = self.transport.lock();
        let Some(transport) = guard.as_mut() else {
            return (Err(RequestError::NoTransportHandle), response);
        };

        let proxy = self.proxy.lock().clone();
        let transfer = Transfer {
            url: &request.url,
            method: request.method,
            header_lines: request.header_lines(),
            body: request
                .method
                .carries_body()
                .then_some(request.body.as_slice()),
            connect_timeout: options.connect_timeout,
            transfer_timeout: self.config.transfer_timeout,
            proxy: proxy.as_deref(),
            verify_certificates: self.config.verify_certificates,
        };
        if let Err(err) = transport.configure(&transfer) {
            return (Err(err.into()), response);
        }

        let mut retries_left = options.retry_count;
        let mut attempt: u32 = 1;
        let outcome = loop {
            if self.aborted() {
                break Err(RequestError::Aborted);
            }
            response.reset();
            debug!(target: "http_engine::client", attempt, "performing transfer");
            match transport.perform(&transfer, &mut response) {
                Ok(()) => break Ok(()),
                Err(err) if err.is_timeout() && retries_left > 0 && !self.aborted() => {
                    retries_left -= 1;
                    attempt += 1;
                    debug!(target: "http_engine::client", retries_left, "attempt timed out, retrying");
                }
                Err(err) => break Err(RequestError::from(err)),
            }
        };

        match outcome {
            Ok(()) => {
                response.set_status(transport.response_code());
                (Ok(()), response)
            }
            // Partial data from an aborted transfer is not handed out.
            Err(_) if self.aborted() => (Err(RequestError::Aborted), ResponseDatagram::new()),
            Err(err) => (Err(err), response),
        }
    }
}
