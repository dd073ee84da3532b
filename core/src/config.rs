//! Client-wide and per-submission settings.

use std::time::Duration;

/// Connect timeout used when a submission does not override it.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings fixed when a `Client` is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Validate the server certificate and host name. On by default.
    pub verify_certificates: bool,
    /// Overall limit for a single attempt; `None` means unlimited.
    pub transfer_timeout: Option<Duration>,
    /// Initial proxy, replaceable later with `Client::set_proxy`.
    pub proxy: Option<String>,
    /// Name of the background thread running each submission.
    pub thread_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            verify_certificates: true,
            transfer_timeout: None,
            proxy: None,
            thread_name: "http-engine".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept any server identity.
    ///
    /// # Warning
    ///
    /// This is insecure and should only be used against trusted test hosts.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.verify_certificates = false;
        self
    }

    pub fn with_transfer_timeout(mut self, timeout: Duration) -> Self {
        self.transfer_timeout = Some(timeout);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// Settings for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub connect_timeout: Duration,
    /// Extra attempts allowed after an attempt times out.
    pub retry_count: u32,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_count: 0,
        }
    }
}

impl SubmitOptions {
    pub fn new(connect_timeout: Duration, retry_count: u32) -> Self {
        Self {
            connect_timeout,
            retry_count,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }
}
