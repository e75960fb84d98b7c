//! Blocking byte-stream transports.
//!
//! The protocol layers only ever see a [`Transport`]: a connected, full-duplex
//! byte stream with blocking reads and writes. [`TcpTransport`] provides one
//! over TCP, optionally wrapped in TLS. Tests substitute their own
//! implementations to script a peer.
//!
//! All methods take `&self` so one transport can be shared between the thread
//! that writes requests and frames and the background thread that reads.

mod tcp;

pub use tcp::TcpTransport;

use std::io;

use crate::error::{NetworkError, Result};

/// A connected, blocking, full-duplex byte stream.
pub trait Transport: Send + Sync {
    /// Read up to `buf.len()` bytes.
    ///
    /// Blocks until at least one byte is available. Returns `Ok(0)` once the
    /// peer has closed the stream.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write some prefix of `buf`, returning how many bytes were accepted.
    fn write(&self, buf: &[u8]) -> io::Result<usize>;

    /// Shut down both directions of the stream.
    ///
    /// A read blocked in another thread returns once the stream is shut down.
    fn shutdown(&self) -> io::Result<()>;

    /// Write the whole buffer, looping over partial writes.
    ///
    /// A write that makes no progress is reported as a transport error rather
    /// than retried.
    fn write_all(&self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(NetworkError::Transport(format!(
                        "connection closed with {} bytes left to write",
                        buf.len()
                    )));
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(NetworkError::Transport(format!("write failed: {e}"))),
            }
        }
        Ok(())
    }
}
