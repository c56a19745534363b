//! Error types for xstream.

use core::fmt;

/// Failure categories reported through the error callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The socket could not be created.
    OpenFailure,
    /// The connect attempt failed.
    ConnectFailure,
    /// A payload could not be written. The payload is attached.
    SendFailure,
    /// A receive failed.
    ReadFailure,
    /// Shutting down a connected socket failed.
    CloseFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::OpenFailure => write!(f, "Socket open failure"),
            ErrorKind::ConnectFailure => write!(f, "Socket connect failure"),
            ErrorKind::SendFailure => write!(f, "Socket send failure"),
            ErrorKind::ReadFailure => write!(f, "Socket read failure"),
            ErrorKind::CloseFailure => write!(f, "Socket close failure"),
        }
    }
}

/// A transport failure: what was attempted plus the OS error behind it.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: std::io::Error,
}

impl Error {
    /// Wraps an I/O error as a failure of kind `kind`.
    pub fn new(kind: ErrorKind, source: std::io::Error) -> Self {
        Error { kind, source }
    }

    /// What was being attempted.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The underlying I/O error.
    pub fn io(&self) -> &std::io::Error {
        &self.source
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        std::io::Error::new(err.source.kind(), err)
    }
}

/// Result type for xstream operations.
pub type Result<T> = core::result::Result<T, Error>;
