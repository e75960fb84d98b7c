//! Blocking HTTP/1.1 client.
//!
//! This module frames HTTP/1.1 messages over a [`Transport`](crate::transport::Transport):
//! it serializes requests, reads responses off the byte stream, and decodes
//! the body (chunked transfer coding, then gzip, deflate or Brotli content
//! coding).
//!
//! # Example
//!
//! ```ignore
//! use skylark_net::config::ClientConfig;
//! use skylark_net::http::{HttpClient, HttpRequest};
//!
//! let client = HttpClient::connect("https://api.example.com", ClientConfig::default())?;
//!
//! let response = client.request(HttpRequest::get("/users"))?;
//! println!("Status: {}", response.status());
//! println!("Body: {}", response.text());
//!
//! let response = client.request(
//!     HttpRequest::post("/users").json(&serde_json::json!({"name": "John"})),
//! )?;
//! ```
//!
//! For a single request, [`fetch`] connects, sends and returns the response.

mod client;
mod headers;
mod reader;
mod request;
mod response;

pub use client::{HttpClient, fetch};
pub use headers::HeaderMap;
pub use reader::{FrameRead, StreamReader};
pub use request::{HttpMethod, HttpRequest};
pub use response::{HttpResponse, decode_chunked, decompress};
