//! Error types for the networking module.

/// Network-specific errors.
///
/// Every variant names the stage that failed (connect, transport, TLS,
/// response parsing, content decoding, WebSocket handshake, protocol) and
/// carries the underlying cause as text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Connection could not be established (DNS resolution or socket connect).
    #[error("Connect error: {0}")]
    Connect(String),

    /// Reading from or writing to an established connection failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The response has no header/body boundary.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The status line could not be parsed.
    #[error("Malformed status line: {0}")]
    MalformedStatusLine(String),

    /// The header block could not be parsed.
    #[error("Malformed headers: {0}")]
    MalformedHeaders(String),

    /// The response uses a `Content-Encoding` this client cannot decode.
    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    /// The response body failed to decompress.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The server answered the WebSocket upgrade with a non-101 status.
    #[error("WebSocket handshake rejected: server responded with status {status}")]
    HandshakeRejected {
        /// The status code the server returned.
        status: u16,
    },

    /// The server's `Sec-WebSocket-Accept` does not match the handshake key.
    #[error("WebSocket handshake failed: expected accept value {expected}, got {actual:?}")]
    HandshakeAcceptMismatch {
        /// The accept value derived from our key.
        expected: String,
        /// The value the server sent, if any.
        actual: Option<String>,
    },

    /// The peer violated the WebSocket framing protocol.
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    /// The operation requires an open connection.
    #[error("Not connected")]
    NotConnected,

    /// HTTP error status (4xx or 5xx).
    #[error("HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<rustls::Error> for NetworkError {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
