//! `Transport` implementation over `ureq`.
//!
//! # Design
//! `configure` validates the transfer and builds a fresh `ureq::Agent`
//! carrying the connect timeout, optional overall timeout, proxy and TLS
//! verification mode.
//!
//! ureq has no way to cancel a call in flight, so `perform` hands the
//! blocking call to a short-lived I/O thread that reports the response head,
//! body chunks and the final result over a bounded channel. The attempt's
//! thread waits on that channel in `POLL_INTERVAL` slices and checks the
//! overall timeout between them, so a forced timeout ends the attempt even
//! while the server has not answered yet. The head is replayed to the sink
//! as raw header lines (status line, one `name: value\r\n` line per field,
//! blank terminator).

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use ureq::http;

use crate::error::{ConfigureError, TransportError};
use crate::header::parse_header_line;
use crate::http::Method;
use crate::transport::{ResponseSink, TimeoutHandle, Transfer, Transport};

const CHUNK_SIZE: usize = 16 * 1024;
/// How often a blocked attempt re-checks its overall timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Body chunks buffered between the I/O thread and the sink.
const EVENT_BACKLOG: usize = 4;
const IO_THREAD_NAME: &str = "http-engine-io";

/// Blocking HTTP/1.1 transport backed by a `ureq::Agent`.
#[derive(Default)]
pub struct UreqTransport {
    agent: Option<ureq::Agent>,
    status: u16,
    timeout: TimeoutHandle,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for UreqTransport {
    fn open() -> Result<Self, TransportError> {
        Ok(Self::new())
    }

    fn configure(&mut self, transfer: &Transfer<'_>) -> Result<(), ConfigureError> {
        ureq_method(transfer.method)?;

        let uri: http::Uri = transfer
            .url
            .parse()
            .map_err(|_| TransportError::UrlMalformed)?;
        match uri.scheme_str() {
            Some(scheme)
                if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {}
            Some(_) => return Err(TransportError::UnsupportedProtocol.into()),
            None => return Err(TransportError::UrlMalformed.into()),
        }

        let proxy = match transfer.proxy {
            Some(url) => {
                Some(ureq::Proxy::new(url).map_err(|_| TransportError::CouldntResolveProxy)?)
            }
            None => None,
        };
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!transfer.verify_certificates)
            .build();

        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(transfer.connect_timeout))
            .timeout_global(transfer.transfer_timeout)
            .proxy(proxy)
            .tls_config(tls)
            .build()
            .new_agent();

        self.agent = Some(agent);
        self.status = 0;
        Ok(())
    }

    fn perform(
        &mut self,
        transfer: &Transfer<'_>,
        sink: &mut dyn ResponseSink,
    ) -> Result<(), TransportError> {
        let agent = self
            .agent
            .clone()
            .ok_or(TransportError::BadFunctionArgument)?;
        self.timeout.start_attempt();
        self.status = 0;

        let method = ureq_method(transfer.method).map_err(|_| TransportError::BadFunctionArgument)?;
        let mut builder = http::Request::builder().method(method).uri(transfer.url);
        for line in &transfer.header_lines {
            let (name, value) =
                parse_header_line(line.as_bytes()).ok_or(TransportError::BadFunctionArgument)?;
            builder = builder.header(name, value);
        }
        let request = builder
            .body(transfer.body.map(<[u8]>::to_vec))
            .map_err(|_| TransportError::BadFunctionArgument)?;

        let (tx, rx) = bounded(EVENT_BACKLOG);
        thread::Builder::new()
            .name(IO_THREAD_NAME.into())
            .spawn(move || fetch(&agent, request, &tx))
            .map_err(|_| TransportError::FailedInit)?;

        let mut status = 0;
        loop {
            let event = match rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    self.timeout.check()?;
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::RecvError),
            };
            // Dropping `rx` on an early return stops the I/O thread at its
            // next send.
            self.timeout.check()?;
            match event {
                Event::Head(parts) => {
                    deliver_head(&parts, sink)?;
                    status = parts.status.as_u16();
                }
                Event::Chunk(chunk) => sink
                    .on_chunk(&chunk)
                    .map_err(|_| TransportError::WriteError)?,
                Event::Done(result) => {
                    result?;
                    self.status = status;
                    return Ok(());
                }
            }
        }
    }

    fn response_code(&self) -> u16 {
        self.status
    }

    fn overall_timeout(&self) -> &TimeoutHandle {
        &self.timeout
    }
}

/// What the I/O thread reports back to `perform`, in arrival order.
enum Event {
    Head(http::response::Parts),
    Chunk(Vec<u8>),
    Done(Result<(), TransportError>),
}

/// Run the blocking request and stream its results into `tx`.
///
/// Returns as soon as the receiving side is gone; a request still waiting
/// on the network then finishes (or times out) on its own.
fn fetch(agent: &ureq::Agent, request: http::Request<Option<Vec<u8>>>, tx: &Sender<Event>) {
    let (parts, body) = request.into_parts();
    let response = match body {
        Some(body) => agent.run(http::Request::from_parts(parts, body)),
        None => agent.run(http::Request::from_parts(parts, ())),
    };
    let response = match response {
        Ok(response) => response,
        Err(err) => {
            let _ = tx.send(Event::Done(Err(map_ureq_error(err))));
            return;
        }
    };

    let (parts, body) = response.into_parts();
    if tx.send(Event::Head(parts)).is_err() {
        return;
    }

    let mut reader = body.into_reader();
    loop {
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                let _ = tx.send(Event::Done(Err(TransportError::from_io(&err))));
                return;
            }
        };
        chunk.truncate(read);
        if tx.send(Event::Chunk(chunk)).is_err() {
            return;
        }
    }
    let _ = tx.send(Event::Done(Ok(())));
}

fn ureq_method(method: Method) -> Result<http::Method, ConfigureError> {
    Ok(match method {
        Method::Get => http::Method::GET,
        Method::Post => http::Method::POST,
        Method::Head => http::Method::HEAD,
        Method::Delete => http::Method::DELETE,
        Method::Put => http::Method::PUT,
        Method::Patch => http::Method::PATCH,
        Method::Options => http::Method::OPTIONS,
        Method::Trace => http::Method::TRACE,
        // Tunnel setup belongs to the proxy layer, not to a request.
        Method::Connect => return Err(ConfigureError::UnsupportedMethod(method)),
    })
}

/// Replay a parsed response head to `sink` as raw header lines.
fn deliver_head(
    parts: &http::response::Parts,
    sink: &mut dyn ResponseSink,
) -> Result<(), TransportError> {
    let status_line = format!(
        "{:?} {} {}\r\n",
        parts.version,
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or("")
    );
    feed_line(sink, status_line.as_bytes())?;

    for (name, value) in &parts.headers {
        let mut line = Vec::with_capacity(name.as_str().len() + value.len() + 4);
        line.extend_from_slice(name.as_str().as_bytes());
        line.extend_from_slice(b": ");
        line.extend_from_slice(value.as_bytes());
        line.extend_from_slice(b"\r\n");
        feed_line(sink, &line)?;
    }

    feed_line(sink, b"\r\n")
}

fn feed_line(sink: &mut dyn ResponseSink, line: &[u8]) -> Result<(), TransportError> {
    if sink.on_header_line(line) == line.len() {
        Ok(())
    } else {
        Err(TransportError::WriteError)
    }
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::TimedOut,
        ureq::Error::HostNotFound => TransportError::CouldntResolveHost,
        ureq::Error::ConnectionFailed => TransportError::CouldntConnect,
        ureq::Error::BadUri(_) => TransportError::UrlMalformed,
        ureq::Error::TooManyRedirects => TransportError::TooManyRedirects,
        ureq::Error::InvalidProxyUrl | ureq::Error::ConnectProxyFailed(_) => {
            TransportError::CouldntResolveProxy
        }
        ureq::Error::Io(ref io) => TransportError::from_io(io),
        _ => TransportError::RecvError,
    }
}
