//! Logging facilities for Skylark.
//!
//! Skylark uses the `tracing` crate for instrumentation. The library never
//! installs a subscriber; to see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("skylark_net=debug")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Every event is emitted with one of the [`targets`] below, so a filter
//! directive can select a single subsystem (for example only the WebSocket
//! receive loop).

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "skylark_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "skylark_core::signal";
    /// Byte-stream transport (TCP/TLS) target.
    pub const TRANSPORT: &str = "skylark_net::transport";
    /// TLS configuration target.
    pub const TLS: &str = "skylark_net::tls";
    /// HTTP request/response exchange target.
    pub const HTTP: &str = "skylark_net::http";
    /// WebSocket handshake and engine target.
    pub const WEBSOCKET: &str = "skylark_net::websocket";
    /// WebSocket receive loop target.
    pub const WEBSOCKET_RECV: &str = "skylark_net::websocket::recv";
}

/// Span names used throughout Skylark for tracing.
pub mod span_names {
    /// One HTTP request/response exchange.
    pub const HTTP_REQUEST: &str = "skylark::http_request";
    /// The WebSocket opening handshake.
    pub const WEBSOCKET_HANDSHAKE: &str = "skylark::websocket_handshake";
}
