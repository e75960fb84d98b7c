//! Accumulates transport bytes into whole HTTP messages and WebSocket frames.

use std::io;
use std::sync::Arc;

use skylark_core::logging::targets;

use super::headers::HeaderMap;
use super::response::{find, is_chunked};
use crate::config::DEFAULT_READ_CHUNK_SIZE;
use crate::error::{NetworkError, Result};
use crate::transport::Transport;
use crate::websocket::frame::{self, Decoded, Frame};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Outcome of [`StreamReader::read_frame`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameRead {
    /// A complete frame.
    Frame(Frame),
    /// The transport reached end-of-data before a full frame arrived.
    Eof,
}

/// A buffered reader over a shared transport.
///
/// Bytes that arrive beyond the message or frame being read stay buffered
/// and are handed out by the next call, so a reader can switch from HTTP
/// messages to WebSocket frames mid-stream without losing data.
pub struct StreamReader {
    transport: Arc<dyn Transport>,
    buf: Vec<u8>,
    chunk: Vec<u8>,
}

impl StreamReader {
    /// Create a reader with the default chunk size.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_chunk_size(transport, DEFAULT_READ_CHUNK_SIZE)
    }

    /// Create a reader that requests `chunk_size` bytes per transport read.
    pub fn with_chunk_size(transport: Arc<dyn Transport>, chunk_size: usize) -> Self {
        Self {
            transport,
            buf: Vec::new(),
            chunk: vec![0; chunk_size.max(1)],
        }
    }

    /// The transport this reader pulls from.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Bytes received but not yet returned.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Read one HTTP message.
    ///
    /// Reads through the header terminator, then as much body as the headers
    /// announce: `Content-Length` bytes, or up to the terminal chunk of a
    /// chunked body. Without either, the message ends with whatever body
    /// bytes are already buffered. If the transport closes first, everything
    /// collected so far is returned.
    pub fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut message = self.read_head()?;
        if !message.ends_with(HEADER_TERMINATOR) {
            return Ok(message);
        }

        let headers = parse_framing_headers(&message);
        if let Some(length) = headers
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            while self.buf.len() < length {
                if self.fill()? == 0 {
                    break;
                }
            }
            let take = length.min(self.buf.len());
            message.extend(self.buf.drain(..take));
        } else if is_chunked(&headers) {
            let end = loop {
                if let Some(end) = chunked_body_end(&self.buf) {
                    break end;
                }
                if self.fill()? == 0 {
                    break self.buf.len();
                }
            };
            message.extend(self.buf.drain(..end));
        } else {
            message.append(&mut self.buf);
        }

        tracing::trace!(target: targets::HTTP, bytes = message.len(), "read response");
        Ok(message)
    }

    /// Read through the header terminator, leaving later bytes buffered.
    ///
    /// If the transport closes before the terminator arrives, the partial
    /// head is returned.
    pub fn read_head(&mut self) -> Result<Vec<u8>> {
        let mut searched = 0;
        loop {
            if let Some(pos) = find(&self.buf[searched..], HEADER_TERMINATOR) {
                let end = searched + pos + HEADER_TERMINATOR.len();
                return Ok(self.buf.drain(..end).collect());
            }
            // The terminator may straddle two reads.
            searched = self.buf.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
            if self.fill()? == 0 {
                return Ok(std::mem::take(&mut self.buf));
            }
        }
    }

    /// Read the next WebSocket frame.
    pub fn read_frame(&mut self) -> Result<FrameRead> {
        loop {
            if let Decoded::Complete { frame, consumed } = frame::decode(&self.buf)? {
                self.buf.drain(..consumed);
                return Ok(FrameRead::Frame(frame));
            }
            if self.fill()? == 0 {
                if !self.buf.is_empty() {
                    tracing::debug!(
                        target: targets::WEBSOCKET_RECV,
                        pending = self.buf.len(),
                        "stream ended inside a frame"
                    );
                }
                return Ok(FrameRead::Eof);
            }
        }
    }

    /// Perform one transport read into the buffer, returning the byte count.
    fn fill(&mut self) -> Result<usize> {
        loop {
            match self.transport.read(&mut self.chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&self.chunk[..n]);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(NetworkError::Transport(format!("read failed: {e}"))),
            }
        }
    }
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("buffered", &self.buf.len())
            .field("chunk_size", &self.chunk.len())
            .finish()
    }
}

/// Headers of a head block, for deciding how much body follows.
///
/// Malformed heads yield an empty map; the response parser reports them.
fn parse_framing_headers(head: &[u8]) -> HeaderMap {
    let text = String::from_utf8_lossy(head);
    text.split_once("\r\n")
        .and_then(|(_, block)| HeaderMap::parse(block).ok())
        .unwrap_or_default()
}

/// Length of a complete chunked body at the front of `buf`, including the
/// terminal chunk and trailer section.
///
/// Returns `None` while more bytes are needed. A malformed size line ends
/// the body at the bytes available.
fn chunked_body_end(buf: &[u8]) -> Option<usize> {
    let mut pos = 0;
    loop {
        let line_len = find(&buf[pos..], b"\r\n")?;
        let line = &buf[pos..pos + line_len];
        let size = std::str::from_utf8(line)
            .ok()
            .map(|l| l.split(';').next().unwrap_or("").trim())
            .and_then(|digits| usize::from_str_radix(digits, 16).ok());
        let Some(size) = size else {
            return Some(buf.len());
        };
        pos += line_len + 2;

        if size == 0 {
            let trailers = &buf[pos..];
            if trailers.starts_with(b"\r\n") {
                return Some(pos + 2);
            }
            return find(trailers, HEADER_TERMINATOR).map(|end| pos + end + HEADER_TERMINATOR.len());
        }

        pos = pos.checked_add(size)?.checked_add(2)?;
        if pos > buf.len() {
            return None;
        }
    }
}
