//! # XStream - A Threaded Byte-Stream Client
//!
//! XStream keeps a single outbound connection to a TCP/IPv4 or Unix domain
//! socket endpoint and moves opaque bytes over it:
//!
//! - **Lifecycle state machine**: open/close requests are validated against the
//!   current [`ConnectionState`] and carried out by a dedicated monitor thread
//! - **Ordered transmit**: payloads are queued and written in FIFO order,
//!   partial writes are resumed until the payload is fully sent
//! - **Continuous receive**: inbound bytes are handed to a callback chunk by
//!   chunk, exactly as the socket returned them
//! - **Callback-only failures**: socket errors never reach the caller as a
//!   panic or a return value, they are reported through the error callback
//! - **Custom transport support**: the socket layer sits behind the
//!   [`Connector`]/[`Transport`] traits
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Client (facade)                     │
//! │  start / request_open / request_close / enqueue_payload  │
//! ├─────────────────────────────────────────────────────────┤
//! │                      Worker threads                      │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │   Monitor   │ │  Transmit   │ │     Receive     │   │
//! │  │ open/close  │ │ drain queue │ │  chunk -> cb    │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                     Transport Layer                      │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │   socket2 TCP/IPv4 or Unix stream (Connector)    │   │
//! │  └─────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use xstream::{Client, ConnectionState};
//!
//! let client = Client::tcp("127.0.0.1", 5000);
//! client.set_receive_callback(|bytes| println!("received {} bytes", bytes.len()));
//! client.set_error_callback(|kind, payload| {
//!     eprintln!("{kind} (payload: {:?})", payload.map(|p| p.len()));
//! });
//!
//! client.start();
//! while !client.is_running() {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//!
//! client.request_open();
//! while client.state() != ConnectionState::Connected {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//! }
//! client.enqueue_payload(b"Hello, World!");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod callback;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
mod queue;
mod signal;
pub mod state;
pub mod transport;
mod worker;

// Re-export commonly used types
pub use client::Client;
pub use config::ClientConfig;
pub use endpoint::Endpoint;
pub use error::{Error, ErrorKind, Result};
pub use state::ConnectionState;
pub use transport::{Connector, SocketConnector, Transport};
pub use worker::WorkerState;

/// Default receive buffer size in bytes
pub const DEFAULT_RX_BUFFER_SIZE: usize = 1024;

/// Default delay after the first failed receive, in milliseconds
pub const DEFAULT_READ_BACKOFF_MS: u64 = 10;

/// Default ceiling for the receive failure backoff, in milliseconds
pub const DEFAULT_MAX_READ_BACKOFF_MS: u64 = 1000;

/// Default number of consecutive failed receives before the stream is
/// considered severed
pub const DEFAULT_MAX_READ_FAILURES: u32 = 8;
