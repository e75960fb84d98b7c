//! WebSocket client implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use skylark_core::Signal;
use skylark_core::logging::{span_names, targets};

use super::frame::{self, Frame, Opcode};
use super::handshake;
use super::message::{CloseReason, WebSocketState};
use crate::config::WebSocketConfig;
use crate::endpoint::Endpoint;
use crate::error::{NetworkError, Result};
use crate::http::{FrameRead, HttpClient, StreamReader};
use crate::transport::{TcpTransport, Transport};

/// Name of the background thread that reads frames.
const RECEIVE_THREAD_NAME: &str = "skylark-ws-recv";

/// Connection state shared with the receive thread.
struct Shared {
    transport: Mutex<Option<Arc<dyn Transport>>>,
    /// Serializes whole frames onto the transport.
    write_lock: Mutex<()>,
    listening: AtomicBool,
    close_emitted: AtomicBool,
    state: Mutex<WebSocketState>,
    opened: Signal<()>,
    closed: Signal<()>,
    message_received: Signal<Frame>,
}

impl Shared {
    fn new() -> Self {
        Self {
            transport: Mutex::new(None),
            write_lock: Mutex::new(()),
            listening: AtomicBool::new(false),
            close_emitted: AtomicBool::new(false),
            state: Mutex::new(WebSocketState::Disconnected),
            opened: Signal::new(),
            closed: Signal::new(),
            message_received: Signal::new(),
        }
    }

    fn state(&self) -> WebSocketState {
        *self.state.lock()
    }

    fn set_state(&self, state: WebSocketState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            tracing::debug!(target: targets::WEBSOCKET, from = %previous, to = %state, "state changed");
        }
    }

    /// Mask and write one frame.
    fn write_frame(&self, frame: &Frame) -> Result<()> {
        let transport = self
            .transport
            .lock()
            .clone()
            .ok_or(NetworkError::NotConnected)?;
        let bytes = frame::encode(frame);

        let _guard = self.write_lock.lock();
        transport.write_all(&bytes)?;
        tracing::trace!(target: targets::WEBSOCKET, opcode = ?frame.opcode, len = frame.payload.len(), "frame sent");
        Ok(())
    }

    /// Emit `closed` unless it already fired for this connection.
    fn emit_closed(&self) {
        if !self.close_emitted.swap(true, Ordering::SeqCst) {
            self.closed.emit(());
        }
    }

    /// Stop listening and report the connection as closed.
    fn finish(&self) {
        self.listening.store(false, Ordering::SeqCst);
        self.set_state(WebSocketState::Closed);
        self.emit_closed();
    }
}

/// A WebSocket client.
///
/// The client performs the opening handshake on the calling thread, then
/// reads frames on a background thread and reports them through signals.
/// Pings are answered automatically; Pongs are swallowed.
///
/// # Signals
///
/// - [`opened`](Self::opened): the handshake succeeded. Emitted on the
///   thread that called `connect`, before any other event of the connection.
/// - [`message_received`](Self::message_received): a Text, Binary or
///   Continuation frame arrived. Emitted on the receive thread.
/// - [`closed`](Self::closed): the connection ended, by [`close`](Self::close),
///   by a Close frame from the server, or because the stream failed. Emitted
///   at most once.
///
/// # Example
///
/// ```ignore
/// use skylark_net::config::WebSocketConfig;
/// use skylark_net::websocket::WebSocketClient;
///
/// let client = WebSocketClient::new(WebSocketConfig::new("wss://echo.example.com"));
///
/// client.message_received().connect(|frame| {
///     println!("Received: {}", frame);
/// });
///
/// client.connect()?;
/// client.send_text("Hello, WebSocket!")?;
/// client.close()?;
/// ```
pub struct WebSocketClient {
    config: WebSocketConfig,
    key: String,
    shared: Arc<Shared>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketClient {
    /// Create a new client. No connection is made until [`connect`](Self::connect).
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            key: handshake::encode_key(&handshake::generate_key()),
            shared: Arc::new(Shared::new()),
            receiver: Mutex::new(None),
        }
    }

    /// Get the current connection state.
    pub fn state(&self) -> WebSocketState {
        self.shared.state()
    }

    /// Check if the handshake has completed and the connection is not closed.
    pub fn is_open(&self) -> bool {
        self.state() == WebSocketState::Open
    }

    /// Get the URL this client connects to.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// The `Sec-WebSocket-Key` sent in the handshake.
    pub fn handshake_key(&self) -> &str {
        &self.key
    }

    /// Emitted once the handshake has been accepted.
    pub fn opened(&self) -> &Signal<()> {
        &self.shared.opened
    }

    /// Emitted when the connection ends.
    pub fn closed(&self) -> &Signal<()> {
        &self.shared.closed
    }

    /// Emitted for every data frame received.
    pub fn message_received(&self) -> &Signal<Frame> {
        &self.shared.message_received
    }

    /// Connect to the configured URL and perform the opening handshake.
    pub fn connect(&self) -> Result<()> {
        self.begin_handshake()?;
        let endpoint = self.endpoint_or_close()?;
        let transport = match TcpTransport::connect(&endpoint, &self.config.client) {
            Ok(transport) => transport,
            Err(e) => {
                self.shared.set_state(WebSocketState::Closed);
                return Err(e);
            }
        };
        self.handshake(endpoint, Arc::new(transport))
    }

    /// Perform the opening handshake over an already connected transport.
    pub fn connect_with_transport(&self, transport: Arc<dyn Transport>) -> Result<()> {
        self.begin_handshake()?;
        let endpoint = self.endpoint_or_close()?;
        self.handshake(endpoint, transport)
    }

    fn begin_handshake(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if *state != WebSocketState::Disconnected {
            return Err(NetworkError::Protocol(format!(
                "cannot connect a client that is {}",
                *state
            )));
        }
        *state = WebSocketState::Handshaking;
        Ok(())
    }

    fn endpoint_or_close(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.config.url).inspect_err(|_| {
            self.shared.set_state(WebSocketState::Closed);
        })
    }

    fn handshake(&self, endpoint: Endpoint, transport: Arc<dyn Transport>) -> Result<()> {
        let span = tracing::debug_span!(
            target: targets::WEBSOCKET,
            span_names::WEBSOCKET_HANDSHAKE,
            url = %self.config.url,
        );
        let entered = span.enter();

        let reader = match self.upgrade(endpoint, transport.clone()) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::debug!(target: targets::WEBSOCKET, error = %e, "handshake failed");
                let _ = transport.shutdown();
                self.shared.set_state(WebSocketState::Closed);
                return Err(e);
            }
        };

        *self.shared.transport.lock() = Some(transport.clone());
        self.shared.listening.store(true, Ordering::SeqCst);
        self.shared.set_state(WebSocketState::Open);
        tracing::info!(target: targets::WEBSOCKET, url = %self.config.url, "connection open");
        drop(entered);

        // `opened` precedes every event the receive thread can emit.
        self.shared.opened.emit(());
        if !self.shared.listening.load(Ordering::SeqCst) {
            // An `opened` slot already closed the connection.
            return Ok(());
        }

        let shared = self.shared.clone();
        let spawned = std::thread::Builder::new()
            .name(RECEIVE_THREAD_NAME.to_string())
            .spawn(move || receive_loop(shared, reader));
        match spawned {
            Ok(handle) => {
                *self.receiver.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                let _ = transport.shutdown();
                self.shared.finish();
                Err(NetworkError::Transport(format!(
                    "failed to start receive thread: {e}"
                )))
            }
        }
    }

    /// Send the upgrade request and validate the answer.
    fn upgrade(&self, endpoint: Endpoint, transport: Arc<dyn Transport>) -> Result<StreamReader> {
        let path = endpoint.path().to_string();
        let http = HttpClient::with_transport(endpoint, transport, self.config.client.clone());
        let request = handshake::upgrade_request(&path, &self.key, &self.config.headers);

        let response = http.request_head(request)?;
        handshake::validate_response(&response, &self.key)?;

        let (_, reader) = http.into_parts();
        Ok(reader)
    }

    /// Send a text message.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send_frame(Frame::text(text))
    }

    /// Send a binary message.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(Frame::binary(data))
    }

    /// Send a ping. The server's pong is not reported.
    pub fn send_ping(&self, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(Frame::ping(payload))
    }

    /// Send an arbitrary frame.
    ///
    /// The frame is masked and written before this returns.
    pub fn send_frame(&self, frame: Frame) -> Result<()> {
        if !self.is_open() {
            return Err(NetworkError::NotConnected);
        }
        self.shared.write_frame(&frame)
    }

    /// Close the connection without a status code.
    ///
    /// Sends an empty Close frame, stops dispatching and emits `closed`. The
    /// server's reply is not awaited.
    pub fn close(&self) -> Result<()> {
        self.close_with_frame(Frame::close())
    }

    /// Close the connection with a status code and optional reason.
    pub fn close_with(&self, reason: CloseReason) -> Result<()> {
        if !reason.code.is_sendable() {
            return Err(NetworkError::Protocol(format!(
                "close code {} cannot be sent",
                reason.code.as_u16()
            )));
        }
        self.close_with_frame(Frame::close_with(&reason))
    }

    fn close_with_frame(&self, frame: Frame) -> Result<()> {
        match self.state() {
            WebSocketState::Open => {}
            WebSocketState::Closed => return Ok(()),
            WebSocketState::Disconnected | WebSocketState::Handshaking => {
                return Err(NetworkError::NotConnected);
            }
        }

        self.shared.listening.store(false, Ordering::SeqCst);
        let sent = self.shared.write_frame(&frame);
        if let Err(e) = &sent {
            tracing::warn!(target: targets::WEBSOCKET, error = %e, "failed to send close frame");
        }
        self.shared.finish();
        sent
    }
}

impl Drop for WebSocketClient {
    fn drop(&mut self) {
        self.shared.listening.store(false, Ordering::SeqCst);

        let transport = self.shared.transport.lock().take();
        if let Some(transport) = &transport {
            if let Err(e) = transport.shutdown() {
                tracing::debug!(target: targets::WEBSOCKET, error = %e, "shutdown failed");
            }
        }

        if let Some(handle) = self.receiver.lock().take() {
            // A slot on the receive thread may drop the last reference.
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                tracing::error!(target: targets::WEBSOCKET, "receive thread panicked");
            }
        }

        drop(transport);
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Read and dispatch frames until the connection ends or listening stops.
fn receive_loop(shared: Arc<Shared>, mut reader: StreamReader) {
    tracing::debug!(target: targets::WEBSOCKET_RECV, "receive loop started");

    loop {
        let result = reader.read_frame();
        if !shared.listening.load(Ordering::SeqCst) {
            tracing::trace!(target: targets::WEBSOCKET_RECV, "listening stopped, dropping read result");
            break;
        }

        match result {
            Ok(FrameRead::Frame(frame)) => {
                tracing::trace!(target: targets::WEBSOCKET_RECV, %frame, "frame received");
                match frame.opcode {
                    Opcode::Close => {
                        tracing::debug!(
                            target: targets::WEBSOCKET_RECV,
                            reason = ?frame.close_reason(),
                            "server closed the connection"
                        );
                        shared.listening.store(false, Ordering::SeqCst);
                        // Echo the status code back, as RFC 6455 section 5.5.1 asks.
                        let reply = match frame.close_reason() {
                            Some(reason) if reason.code.is_sendable() => {
                                Frame::close_with(&CloseReason::new(reason.code))
                            }
                            _ => Frame::close(),
                        };
                        if let Err(e) = shared.write_frame(&reply) {
                            tracing::debug!(target: targets::WEBSOCKET_RECV, error = %e, "close reply not sent");
                        }
                        shared.finish();
                        break;
                    }
                    Opcode::Ping => {
                        if let Err(e) = shared.write_frame(&Frame::pong(frame.payload)) {
                            tracing::warn!(target: targets::WEBSOCKET_RECV, error = %e, "failed to answer ping");
                        }
                    }
                    Opcode::Pong => {}
                    Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                        shared.message_received.emit(frame);
                    }
                }
            }
            Ok(FrameRead::Eof) => {
                tracing::warn!(target: targets::WEBSOCKET_RECV, "connection ended without a close frame");
                shared.finish();
                break;
            }
            Err(e) => {
                tracing::warn!(target: targets::WEBSOCKET_RECV, error = %e, "receive failed");
                shared.finish();
                break;
            }
        }
    }

    tracing::debug!(target: targets::WEBSOCKET_RECV, "receive loop stopped");
}
