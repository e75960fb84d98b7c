//! WebSocket client (RFC 6455).
//!
//! This module provides:
//! - The opening handshake over an HTTP/1.1 connection (ws:// and wss://)
//! - A frame codec with client masking and 7/16/64-bit payload lengths
//! - A background receive loop that answers pings and reports frames
//!   through signals
//!
//! # Example
//!
//! ```ignore
//! use skylark_net::config::WebSocketConfig;
//! use skylark_net::websocket::WebSocketClient;
//!
//! let config = WebSocketConfig::new("wss://echo.example.com")
//!     .header("Authorization", "Bearer token");
//!
//! let client = WebSocketClient::new(config);
//!
//! client.opened().connect(|_| {
//!     println!("Connected to server!");
//! });
//!
//! client.message_received().connect(|frame| {
//!     if let Some(text) = frame.text_payload() {
//!         println!("Received: {}", text);
//!     }
//! });
//!
//! client.closed().connect(|_| {
//!     println!("Disconnected from server");
//! });
//!
//! client.connect()?;
//! client.send_text("Hello, WebSocket!")?;
//! ```
//!
//! Extensions, subprotocol negotiation and message reassembly are not
//! handled: every data frame is delivered as it arrives.

mod client;
pub mod frame;
pub mod handshake;
mod message;

pub use client::WebSocketClient;
pub use frame::{Decoded, Frame, Opcode};
pub use message::{CloseCode, CloseReason, WebSocketState};
