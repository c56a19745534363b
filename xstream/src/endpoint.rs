//! Connection target descriptor.

use core::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};

use socket2::{Domain, SockAddr};

use crate::error::{Error, ErrorKind, Result};

/// The endpoint a [`crate::Client`] connects to.
///
/// Immutable once the client is built. Only the fields of the matching
/// variant are meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP over IPv4.
    Tcp {
        /// Dotted-quad IPv4 address, e.g. `127.0.0.1`.
        address: String,
        /// TCP port.
        port: u16,
    },
    /// Unix domain stream socket.
    Unix {
        /// Filesystem path of the listening socket.
        path: PathBuf,
    },
}

impl Endpoint {
    /// TCP/IPv4 endpoint.
    pub fn tcp(address: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            address: address.into(),
            port,
        }
    }

    /// Unix domain socket endpoint.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Endpoint::Unix {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Socket domain used to open a socket for this endpoint.
    pub fn domain(&self) -> Domain {
        match self {
            Endpoint::Tcp { .. } => Domain::IPV4,
            Endpoint::Unix { .. } => Domain::UNIX,
        }
    }

    /// Resolves the endpoint into a socket address.
    ///
    /// The address is not looked up: a TCP address must be a literal IPv4
    /// address. A malformed address is a connect failure.
    pub fn sock_addr(&self) -> Result<SockAddr> {
        match self {
            Endpoint::Tcp { address, port } => {
                let ip: Ipv4Addr = address.parse().map_err(|_| {
                    Error::new(
                        ErrorKind::ConnectFailure,
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            format!("invalid IPv4 address: {address}"),
                        ),
                    )
                })?;
                Ok(SockAddr::from(SocketAddrV4::new(ip, *port)))
            }
            Endpoint::Unix { path } => {
                SockAddr::unix(path).map_err(|e| Error::new(ErrorKind::ConnectFailure, e))
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { address, port } => write!(f, "tcp://{address}:{port}"),
            Endpoint::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_sock_addr() {
        let endpoint = Endpoint::tcp("127.0.0.1", 5000);
        let addr = endpoint.sock_addr().unwrap();
        assert_eq!(
            addr.as_socket_ipv4(),
            Some(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5000))
        );
        assert_eq!(endpoint.domain(), Domain::IPV4);
    }

    #[test]
    fn test_invalid_tcp_address() {
        let endpoint = Endpoint::tcp("localhost", 5000);
        let err = endpoint.sock_addr().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectFailure);
    }

    #[test]
    fn test_unix_sock_addr() {
        let endpoint = Endpoint::unix("/tmp/xstream.sock");
        let addr = endpoint.sock_addr().unwrap();
        assert!(addr.is_unix());
        assert_eq!(addr.as_pathname(), Some(Path::new("/tmp/xstream.sock")));
        assert_eq!(endpoint.domain(), Domain::UNIX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Endpoint::tcp("10.0.0.1", 80).to_string(), "tcp://10.0.0.1:80");
        assert_eq!(Endpoint::unix("/run/a.sock").to_string(), "unix:///run/a.sock");
    }
}
