//! Transport layer abstraction.
//!
//! The client never touches sockets directly. The monitor asks a
//! [`Connector`] to open a fresh [`Transport`] handle for every connection
//! attempt, connects it, and shares it with the transmit and receive workers
//! until the connection is closed.
//!
//! # Implementations
//!
//! - `SocketConnector`: real TCP/IPv4 and Unix domain stream sockets (socket2)
//!
//! Any closure `Fn(&Endpoint) -> Result<Box<dyn Transport>>` is also a
//! connector, which is how tests plug in in-memory transports.
//!
//! # Example
//!
//! ```rust,no_run
//! use xstream::{Connector, Endpoint, SocketConnector};
//!
//! let endpoint = Endpoint::tcp("127.0.0.1", 5000);
//! let transport = SocketConnector.open(&endpoint)?;
//! transport.connect(&endpoint, None)?;
//! transport.send(b"Hello")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Read;
use std::net::Shutdown;
use std::time::Duration;

use socket2::{Socket, Type};

use crate::endpoint::Endpoint;
use crate::error::{Error, ErrorKind, Result};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: i32 = 0;

/// A connected (or connecting) byte-stream handle.
///
/// All methods take `&self`: one thread sends while another is blocked in
/// [`Transport::recv`], and the monitor may call [`Transport::shutdown`] at any
/// time to unblock both.
pub trait Transport: Send + Sync {
    /// Connects the handle to `endpoint`.
    fn connect(&self, endpoint: &Endpoint, timeout: Option<Duration>) -> Result<()>;

    /// Writes bytes from the buffer.
    ///
    /// Returns the number of bytes written, which may be less than `buf.len()`.
    fn send(&self, buf: &[u8]) -> std::io::Result<usize>;

    /// Blocks until bytes are available and reads them into the buffer.
    ///
    /// Returns `Ok(0)` once the peer has closed the stream.
    fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Shuts down both directions, waking any blocked `recv`/`send`.
    fn shutdown(&self) -> std::io::Result<()>;

    /// Writes all bytes, resuming after partial writes.
    fn send_all(&self, mut buf: &[u8]) -> std::io::Result<()> {
        while !buf.is_empty() {
            match self.send(buf) {
                Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Opens transport handles for an endpoint.
pub trait Connector: Send + Sync {
    /// Creates a new, unconnected handle for `endpoint`.
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>>;
}

impl<F> Connector for F
where
    F: Fn(&Endpoint) -> Result<Box<dyn Transport>> + Send + Sync,
{
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        self(endpoint)
    }
}

/// Connector backed by OS stream sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    fn open(&self, endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        let socket = Socket::new(endpoint.domain(), Type::STREAM, None)
            .map_err(|e| Error::new(ErrorKind::OpenFailure, e))?;

        #[cfg(any(target_os = "macos", target_os = "ios"))]
        socket
            .set_nosigpipe(true)
            .map_err(|e| Error::new(ErrorKind::OpenFailure, e))?;

        log::trace!("Opened {:?} stream socket for {}", endpoint.domain(), endpoint);
        Ok(Box::new(SocketTransport { socket }))
    }
}

/// [`Transport`] over a socket2 stream socket.
#[derive(Debug)]
pub struct SocketTransport {
    socket: Socket,
}

impl Transport for SocketTransport {
    fn connect(&self, endpoint: &Endpoint, timeout: Option<Duration>) -> Result<()> {
        let addr = endpoint.sock_addr()?;
        let result = match timeout {
            Some(timeout) => self.socket.connect_timeout(&addr, timeout),
            None => self.socket.connect(&addr),
        };
        result.map_err(|e| Error::new(ErrorKind::ConnectFailure, e))
    }

    fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        self.socket.send_with_flags(buf, SEND_FLAGS)
    }

    fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        (&self.socket).read(buf)
    }

    fn shutdown(&self) -> std::io::Result<()> {
        self.socket.shutdown(Shutdown::Both)
    }
}
