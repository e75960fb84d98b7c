//! Networking for Skylark.
//!
//! This crate provides blocking client-side networking:
//!
//! - **HTTP/1.1 client**: request serialization, response framing and body
//!   decoding (chunked transfer coding; gzip, deflate and Brotli content coding)
//! - **WebSocket client**: RFC 6455 opening handshake, frame codec, and a
//!   background receive loop with automatic ping replies
//! - **Transports**: plain TCP and TLS (rustls) byte streams behind the
//!   [`Transport`] trait
//!
//! # HTTP Client
//!
//! ```ignore
//! use skylark_net::{ClientConfig, HttpClient, HttpRequest};
//!
//! let client = HttpClient::connect("https://api.example.com", ClientConfig::default())?;
//! let response = client.request(HttpRequest::get("/data").header("Accept", "application/json"))?;
//!
//! let data: MyData = response.json()?;
//! ```
//!
//! # WebSocket Client
//!
//! Events are delivered through [`skylark_core::Signal`]s:
//!
//! ```ignore
//! use skylark_net::{WebSocketClient, WebSocketConfig};
//!
//! let client = WebSocketClient::new(WebSocketConfig::new("wss://echo.example.com"));
//!
//! client.message_received().connect(|frame| {
//!     println!("Received: {}", frame);
//! });
//! client.closed().connect(|_| println!("closed"));
//!
//! client.connect()?;
//! client.send_text("Hello")?;
//! ```
//!
//! # Threading
//!
//! Every call blocks the calling thread. An open WebSocket owns one
//! background thread that reads frames; `message_received` and a
//! server-initiated `closed` are emitted on that thread. The thread is
//! stopped and joined when the client is dropped.
//!
//! # Logging
//!
//! Events are emitted with `tracing` under the targets listed in
//! [`skylark_core::logging::targets`].

pub mod config;
pub mod endpoint;
mod error;
pub mod http;
pub mod tls;
pub mod transport;
pub mod websocket;

pub use config::{ClientConfig, WebSocketConfig};
pub use endpoint::Endpoint;
pub use error::{NetworkError, Result};
pub use http::{HeaderMap, HttpClient, HttpMethod, HttpRequest, HttpResponse, fetch};
pub use tls::{Certificate, TlsConfig, TlsVersion};
pub use transport::{TcpTransport, Transport};
pub use websocket::{CloseCode, CloseReason, Frame, Opcode, WebSocketClient, WebSocketState};
