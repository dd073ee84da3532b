//! Error types for the request engine.
//!
//! # Design
//! Nothing is thrown across the asynchronous boundary: every outcome of a
//! submission reaches the caller through the completion callback as
//! `Result<(), RequestError>`. Each error also has a stable numeric code so
//! embedders behind the C boundary can switch on plain integers. Transport
//! codes are positive and follow libcurl's numbering; engine-level
//! conditions are negative.

use std::collections::TryReserveError;
use std::io;

use crate::http::Method;

/// Result code reported for a successful transfer.
pub const RESULT_OK: i32 = 0;

/// Transport-level failures of a single transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum TransportError {
    #[error("unsupported protocol")]
    UnsupportedProtocol,

    /// The transport could not start the attempt.
    #[error("failed to start the transfer")]
    FailedInit,

    #[error("malformed url")]
    UrlMalformed,

    #[error("could not resolve or connect to proxy")]
    CouldntResolveProxy,

    #[error("could not resolve host")]
    CouldntResolveHost,

    #[error("could not connect to server")]
    CouldntConnect,

    /// A response sink rejected received data.
    #[error("failed writing received data")]
    WriteError,

    /// The only failure the engine retries.
    #[error("operation timed out")]
    TimedOut,

    #[error("tls handshake failed")]
    SslConnect,

    /// The request could not be expressed, e.g. an invalid header name.
    #[error("bad request argument")]
    BadFunctionArgument,

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("failed sending data")]
    SendError,

    #[error("failed receiving data")]
    RecvError,
}

impl TransportError {
    /// Positive libcurl-compatible code for this failure.
    pub fn code(self) -> i32 {
        match self {
            Self::UnsupportedProtocol => 1,
            Self::FailedInit => 2,
            Self::UrlMalformed => 3,
            Self::CouldntResolveProxy => 5,
            Self::CouldntResolveHost => 6,
            Self::CouldntConnect => 7,
            Self::WriteError => 23,
            Self::TimedOut => 28,
            Self::SslConnect => 35,
            Self::BadFunctionArgument => 43,
            Self::TooManyRedirects => 47,
            Self::SendError => 55,
            Self::RecvError => 56,
        }
    }

    pub fn is_timeout(self) -> bool {
        self == Self::TimedOut
    }

    /// Classify an I/O error raised while a transfer was in progress.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            io::ErrorKind::ConnectionRefused => Self::CouldntConnect,
            io::ErrorKind::BrokenPipe => Self::SendError,
            _ => Self::RecvError,
        }
    }
}

/// Failure reported to the completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The client's transport handle could not be created.
    #[error("no transport handle")]
    NoTransportHandle,

    /// The transport cannot express this method.
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    /// `abort` was called while the request was in flight.
    #[error("request aborted by user")]
    Aborted,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RequestError {
    /// Numeric result code: negative for engine conditions, the transport's
    /// positive code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Self::NoTransportHandle => -1,
            Self::UnsupportedMethod(_) => -2,
            Self::Aborted => -4,
            Self::Transport(err) => err.code(),
        }
    }
}

/// Numeric result code of a finished submission (`RESULT_OK` on success).
pub fn result_code(outcome: &Result<(), RequestError>) -> i32 {
    match outcome {
        Ok(()) => RESULT_OK,
        Err(err) => err.code(),
    }
}

/// Errors a transport can raise while being configured for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigureError {
    #[error("unsupported method {0}")]
    UnsupportedMethod(Method),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<ConfigureError> for RequestError {
    fn from(err: ConfigureError) -> Self {
        match err {
            ConfigureError::UnsupportedMethod(method) => Self::UnsupportedMethod(method),
            ConfigureError::Transport(err) => Self::Transport(err),
        }
    }
}

/// Synchronous rejection of `Client::submit`.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// A previous submission has not finished yet.
    #[error("client is busy with another request")]
    Busy,

    #[error("failed to spawn request thread: {0}")]
    Spawn(#[source] io::Error),
}

/// The body buffer could not grow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("body buffer allocation failed: {0}")]
pub struct CapacityError(#[from] TryReserveError);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_codes_are_negative() {
        assert_eq!(RequestError::NoTransportHandle.code(), -1);
        assert_eq!(RequestError::UnsupportedMethod(Method::Connect).code(), -2);
        assert_eq!(RequestError::Aborted.code(), -4);
    }

    #[test]
    fn transport_codes_pass_through() {
        let err = RequestError::from(TransportError::TimedOut);
        assert_eq!(err.code(), 28);
        assert_eq!(err.to_string(), "operation timed out");
    }

    #[test]
    fn result_code_of_success_is_zero() {
        assert_eq!(result_code(&Ok(())), RESULT_OK);
        assert_eq!(result_code(&Err(RequestError::Aborted)), -4);
    }

    #[test]
    fn io_timeouts_classify_as_timeouts() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(TransportError::from_io(&err).is_timeout());
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert_eq!(TransportError::from_io(&err), TransportError::RecvError);
    }

    #[test]
    fn configure_error_maps_to_request_error() {
        let err: RequestError = ConfigureError::UnsupportedMethod(Method::Trace).into();
        assert_eq!(err, RequestError::UnsupportedMethod(Method::Trace));
        let err: RequestError = ConfigureError::Transport(TransportError::UrlMalformed).into();
        assert_eq!(err.code(), 3);
    }
}
