//! Connection endpoints derived from URLs.

use url::Url;

use crate::error::{NetworkError, Result};

/// The parts of a URL needed to open a connection and address a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl Endpoint {
    /// Parse an `http`, `https`, `ws` or `wss` URL.
    ///
    /// The port defaults to 80 (or 443 for the secure schemes). The request
    /// target is the URL path followed by its query string, and is `/` when
    /// the URL has no path.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)?;
        let scheme = url.scheme().to_ascii_lowercase();
        if !matches!(scheme.as_str(), "http" | "https" | "ws" | "wss") {
            return Err(NetworkError::InvalidUrl(format!(
                "unsupported scheme '{scheme}' in {input}"
            )));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| NetworkError::InvalidUrl(format!("missing host in {input}")))?
            .to_string();
        let secure = matches!(scheme.as_str(), "https" | "wss");
        let port = url.port().unwrap_or(if secure { 443 } else { 80 });

        let mut path = url.path().to_string();
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
        })
    }

    /// The URL scheme, lowercased.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host name or address literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port to connect to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The request target (path and query).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the connection must be wrapped in TLS.
    pub fn is_secure(&self) -> bool {
        matches!(self.scheme.as_str(), "https" | "wss")
    }

    /// The `host:port` pair used for socket address resolution.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host.trim_matches(|c| c == '[' || c == ']'), self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// The value of the `Host` request header.
    ///
    /// The port is omitted when it is 80 or 443.
    pub fn host_header(&self) -> String {
        if self.port == 80 || self.port == 443 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}{}", self.scheme, self.host_header(), self.path)
    }
}
