//! TCP transport with optional TLS.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;
use rustls::{ClientConnection, StreamOwned};
use skylark_core::logging::targets;

use super::Transport;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{NetworkError, Result};
use crate::tls;

/// How long a TLS read holds the session before letting writers in.
const TLS_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A stream that may or may not be TLS-encrypted.
enum MaybeTlsStream {
    Plain(TcpStream),
    Tls {
        /// Second handle on the socket, used for shutdown without the session lock.
        socket: TcpStream,
        session: Mutex<StreamOwned<ClientConnection, TcpStream>>,
    },
}

/// A blocking TCP connection, optionally wrapped in TLS.
///
/// Plain sockets are read and written concurrently through shared references.
/// A TLS session is a single state machine, so reads and writes take turns on
/// it: the socket gets a short read timeout and a read that times out releases
/// the session before trying again. To callers the read still blocks until
/// data arrives or the stream closes.
pub struct TcpTransport {
    stream: MaybeTlsStream,
    peer: String,
}

impl TcpTransport {
    /// Connect to the endpoint, performing the TLS handshake for secure schemes.
    pub fn connect(endpoint: &Endpoint, config: &ClientConfig) -> Result<Self> {
        let address = endpoint.address();
        let socket = Self::connect_socket(&address, config)?;
        socket
            .set_nodelay(config.no_delay)
            .map_err(|e| NetworkError::Connect(format!("failed to configure socket: {e}")))?;

        let stream = if endpoint.is_secure() {
            Self::wrap_tls(socket, endpoint, config)?
        } else {
            MaybeTlsStream::Plain(socket)
        };

        tracing::debug!(
            target: targets::TRANSPORT,
            peer = %address,
            secure = endpoint.is_secure(),
            "connected"
        );

        Ok(Self {
            stream,
            peer: address,
        })
    }

    /// The `host:port` this transport is connected to.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Whether the stream is TLS-encrypted.
    pub fn is_secure(&self) -> bool {
        matches!(self.stream, MaybeTlsStream::Tls { .. })
    }

    fn connect_socket(address: &str, config: &ClientConfig) -> Result<TcpStream> {
        let addrs = address
            .to_socket_addrs()
            .map_err(|e| NetworkError::Connect(format!("failed to resolve {address}: {e}")))?;

        let mut last_error = None;
        for addr in addrs {
            let attempt = match config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(socket) => return Ok(socket),
                Err(e) => {
                    tracing::trace!(target: targets::TRANSPORT, %addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(NetworkError::Connect(match last_error {
            Some(e) => format!("unable to connect to {address}: {e}"),
            None => format!("no addresses found for {address}"),
        }))
    }

    fn wrap_tls(
        mut socket: TcpStream,
        endpoint: &Endpoint,
        config: &ClientConfig,
    ) -> Result<MaybeTlsStream> {
        let rustls_config = config.tls.build_rustls_config()?;
        let name = tls::server_name(endpoint.host())?;
        let mut connection = ClientConnection::new(rustls_config, name)?;

        while connection.is_handshaking() {
            connection
                .complete_io(&mut socket)
                .map_err(|e| NetworkError::Tls(format!("handshake with {} failed: {e}", endpoint.host())))?;
        }

        let shutdown_handle = socket
            .try_clone()
            .map_err(|e| NetworkError::Connect(format!("failed to clone socket: {e}")))?;
        socket
            .set_read_timeout(Some(TLS_POLL_INTERVAL))
            .map_err(|e| NetworkError::Connect(format!("failed to configure socket: {e}")))?;

        Ok(MaybeTlsStream::Tls {
            socket: shutdown_handle,
            session: Mutex::new(StreamOwned::new(connection, socket)),
        })
    }
}

fn is_poll_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Flush buffered TLS records, releasing the session between attempts.
fn flush_session<S: Write>(session: &Mutex<S>) -> io::Result<()> {
    loop {
        let mut session = session.lock();
        match session.flush() {
            Ok(()) => return Ok(()),
            Err(e) if is_poll_timeout(&e) => {
                drop(session);
                std::thread::yield_now();
            }
            Err(e) => return Err(e),
        }
    }
}

impl Transport for TcpTransport {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match &self.stream {
            MaybeTlsStream::Plain(socket) => (&*socket).read(buf),
            MaybeTlsStream::Tls { session, .. } => loop {
                let mut session = session.lock();
                match session.read(buf) {
                    Ok(n) => return Ok(n),
                    // Peers commonly close without close_notify.
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(0),
                    Err(e) if is_poll_timeout(&e) => {
                        drop(session);
                        std::thread::yield_now();
                    }
                    Err(e) => return Err(e),
                }
            },
        }
    }

    fn write(&self, buf: &[u8]) -> io::Result<usize> {
        match &self.stream {
            MaybeTlsStream::Plain(socket) => (&*socket).write(buf),
            MaybeTlsStream::Tls { session, .. } => {
                let accepted = loop {
                    let mut session = session.lock();
                    match session.write(buf) {
                        Ok(n) => break n,
                        Err(e) if is_poll_timeout(&e) => {
                            drop(session);
                            std::thread::yield_now();
                        }
                        Err(e) => return Err(e),
                    }
                };
                // The session now owns those bytes; only the flush may repeat.
                flush_session(session)?;
                Ok(accepted)
            }
        }
    }

    fn shutdown(&self) -> io::Result<()> {
        let socket = match &self.stream {
            MaybeTlsStream::Plain(socket) => socket,
            MaybeTlsStream::Tls { socket, .. } => socket,
        };
        match socket.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.peer)
            .field("secure", &self.is_secure())
            .finish()
    }
}
