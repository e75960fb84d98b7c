//! Shared test helpers: a scripted WebSocket server behind the `Transport` trait.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use skylark_net::Transport;
use skylark_net::websocket::frame::{Decoded, decode};
use skylark_net::websocket::handshake::compute_accept_key;
use skylark_net::websocket::{Frame, Opcode};

/// Install a log subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How the fake server answers the upgrade request.
#[derive(Clone, Debug)]
pub enum Handshake {
    /// `101` with the correct accept value.
    Accept,
    /// The given status and no accept value.
    Reject(u16),
    /// `101` with a wrong accept value.
    WrongAccept,
}

#[derive(Default)]
struct PeerState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    handshake_len: Option<usize>,
    eof: bool,
}

/// An in-memory server end of a WebSocket connection.
///
/// Reads block until the test queues bytes or ends the stream. The upgrade
/// response is generated from the key the client writes, and is delivered
/// ahead of any frames queued before the handshake.
pub struct FakePeer {
    state: Mutex<PeerState>,
    ready: Condvar,
    handshake: Handshake,
}

impl FakePeer {
    pub fn new(handshake: Handshake) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PeerState::default()),
            ready: Condvar::new(),
            handshake,
        })
    }

    /// Queue raw bytes for the client to read.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.state.lock().incoming.extend(bytes);
        self.ready.notify_all();
    }

    /// Queue an unmasked server frame.
    pub fn push_frame(&self, opcode: Opcode, payload: &[u8]) {
        self.push_bytes(&server_frame(opcode, payload));
    }

    /// End the stream: reads return 0 once queued bytes are consumed.
    pub fn end_stream(&self) {
        self.state.lock().eof = true;
        self.ready.notify_all();
    }

    /// Everything the client wrote, including the upgrade request.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// The upgrade request head, once complete.
    pub fn request_head(&self) -> Option<String> {
        let state = self.state.lock();
        let len = state.handshake_len?;
        Some(String::from_utf8_lossy(&state.written[..len]).into_owned())
    }

    /// Frames the client wrote after the upgrade request, unmasked.
    pub fn written_frames(&self) -> Vec<Frame> {
        let state = self.state.lock();
        let Some(start) = state.handshake_len else {
            return Vec::new();
        };
        let mut rest = &state.written[start..];
        let mut frames = Vec::new();
        while let Ok(Decoded::Complete { frame, consumed }) = decode(rest) {
            frames.push(frame);
            rest = &rest[consumed..];
        }
        frames
    }

    /// Raw bytes the client wrote after the upgrade request.
    pub fn written_after_handshake(&self) -> Vec<u8> {
        let state = self.state.lock();
        match state.handshake_len {
            Some(start) => state.written[start..].to_vec(),
            None => Vec::new(),
        }
    }

    fn answer_handshake(&self, state: &mut PeerState) {
        let Some(end) = find(&state.written, b"\r\n\r\n") else {
            return;
        };
        let end = end + 4;
        state.handshake_len = Some(end);

        let head = String::from_utf8_lossy(&state.written[..end]).into_owned();
        let key = head
            .split("\r\n")
            .find_map(|line| line.strip_prefix("sec-websocket-key: "))
            .unwrap_or_default()
            .to_string();

        let response = match &self.handshake {
            Handshake::Accept => format!(
                "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
                compute_accept_key(&key)
            ),
            Handshake::Reject(status) => {
                format!("HTTP/1.1 {status} Rejected\r\nContent-Length: 0\r\n\r\n")
            }
            Handshake::WrongAccept => "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nSec-WebSocket-Accept: bm90IHRoZSByaWdodCB2YWx1ZQ==\r\n\r\n".to_string(),
        };

        for byte in response.bytes().rev() {
            state.incoming.push_front(byte);
        }
    }
}

impl Transport for FakePeer {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        while state.incoming.is_empty() && !state.eof {
            self.ready.wait(&mut state);
        }
        let n = buf.len().min(state.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(state.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.written.extend_from_slice(buf);
        if state.handshake_len.is_none() {
            self.answer_handshake(&mut state);
            self.ready.notify_all();
        }
        Ok(buf.len())
    }

    fn shutdown(&self) -> io::Result<()> {
        self.end_stream();
        Ok(())
    }
}

/// Encode an unmasked frame the way a server sends it.
pub fn server_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | opcode.as_u8()];
    match payload.len() {
        len @ 0..=125 => out.push(len as u8),
        len @ 126..=65535 => {
            out.push(126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        len => {
            out.push(127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
    }
    out.extend_from_slice(payload);
    out
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
