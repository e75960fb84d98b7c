//! Configuration types for HTTP and WebSocket clients.

use std::time::Duration;

use crate::http::HeaderMap;
use crate::tls::TlsConfig;

/// Default size of a single transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("skylark/", env!("CARGO_PKG_VERSION"));

/// Connection-level options shared by the HTTP and WebSocket clients.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Connection timeout. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Number of bytes requested from the transport per read.
    pub read_chunk_size: usize,
    /// Value of the `User-Agent` header when the request does not set one.
    pub user_agent: String,
    /// TLS configuration for `https://` and `wss://` endpoints.
    pub tls: TlsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            no_delay: true,
            connect_timeout: None,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            tls: TlsConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the number of bytes requested per transport read.
    ///
    /// Values below 1 are clamped to 1.
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    /// Set the default `User-Agent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the TLS configuration for secure connections.
    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Accept invalid TLS certificates (DANGEROUS - for testing only).
    ///
    /// # Warning
    ///
    /// This disables certificate verification and makes the connection
    /// vulnerable to man-in-the-middle attacks.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.tls.danger_accept_invalid_certs = true;
        self
    }
}

/// Configuration for a WebSocket connection.
#[derive(Clone, Debug)]
pub struct WebSocketConfig {
    /// The WebSocket URL (ws:// or wss://).
    pub url: String,
    /// Extra headers to send with the upgrade request.
    pub headers: HeaderMap,
    /// Connection-level options.
    pub client: ClientConfig,
}

impl WebSocketConfig {
    /// Create a new WebSocket configuration with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HeaderMap::new(),
            client: ClientConfig::default(),
        }
    }

    /// Add a custom header for the WebSocket handshake.
    ///
    /// Headers the handshake itself requires (`Upgrade`, `Connection`,
    /// `Sec-WebSocket-Key`, `Sec-WebSocket-Version`) always take precedence.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Set the connection-level options.
    pub fn client_config(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Set TLS configuration for secure connections.
    pub fn tls_config(mut self, tls: TlsConfig) -> Self {
        self.client.tls = tls;
        self
    }

    /// Accept invalid TLS certificates (DANGEROUS - for testing only).
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.client.tls.danger_accept_invalid_certs = true;
        self
    }
}
