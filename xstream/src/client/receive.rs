//! Receive worker.

use std::io::ErrorKind as IoErrorKind;
use std::sync::Arc;

use crate::error::ErrorKind;
use crate::transport::Transport;
use crate::worker::WorkerState;

use super::Inner;

/// How one connection's read loop ended.
enum ReadEnd {
    /// The connection left `Connected` (or a new one replaced it).
    Closed,
    /// The peer closed the stream or the socket is unusable.
    Severed,
    /// Shutdown was requested.
    Stopped,
}

/// Errors after which the stream cannot deliver any more bytes.
fn is_fatal(kind: IoErrorKind) -> bool {
    matches!(
        kind,
        IoErrorKind::ConnectionReset
            | IoErrorKind::ConnectionAborted
            | IoErrorKind::BrokenPipe
            | IoErrorKind::NotConnected
            | IoErrorKind::UnexpectedEof
    )
}

/// Errors that say nothing about the stream's health.
fn is_retryable(kind: IoErrorKind) -> bool {
    matches!(
        kind,
        IoErrorKind::Interrupted | IoErrorKind::WouldBlock | IoErrorKind::TimedOut
    )
}

impl Inner {
    pub(super) fn run_receive(self: Arc<Self>) {
        self.receive.enter_running();
        let stop = || self.receive.is_ending();
        let mut buf = vec![0u8; self.config.rx_buffer_size];

        // Sleeps until the monitor publishes a connection.
        while let Some(session) = self.state.wait_connected(stop) {
            let end = match self.transport_for(session) {
                Some(transport) => self.read_session(session, transport.as_ref(), &mut buf),
                None => ReadEnd::Closed,
            };

            match end {
                ReadEnd::Stopped => break,
                ReadEnd::Severed => {
                    *self.severed.lock() = Some(session);
                    self.monitor.wake();
                }
                ReadEnd::Closed => {}
            }

            // Don't read from this session again.
            self.state.wait_session_end(session, stop);
        }

        self.receive.set_state(WorkerState::Inactive);
        log::debug!("receive worker exited");
    }

    fn read_session(&self, session: u64, transport: &dyn Transport, buf: &mut [u8]) -> ReadEnd {
        let mut failures = 0u32;

        loop {
            if self.receive.is_ending() {
                return ReadEnd::Stopped;
            }

            let result = transport.recv(buf);

            // Our own close or shutdown unblocks the read; that is not an error.
            if self.receive.is_ending() && !matches!(result, Ok(n) if n > 0) {
                return ReadEnd::Stopped;
            }

            match result {
                Ok(0) => {
                    if !self.is_live(session) {
                        return ReadEnd::Closed;
                    }
                    log::info!("Peer closed connection to {}", self.endpoint);
                    return ReadEnd::Severed;
                }
                Ok(n) => {
                    failures = 0;
                    log::trace!("Received {} bytes", n);
                    self.callbacks.received(&buf[..n]);
                }
                Err(e) if is_retryable(e.kind()) => {}
                Err(e) => {
                    if !self.is_live(session) {
                        return ReadEnd::Closed;
                    }

                    log::warn!("Failed to read from {}: {}", self.endpoint, e);
                    self.callbacks.error(ErrorKind::ReadFailure, None);

                    if is_fatal(e.kind()) {
                        return ReadEnd::Severed;
                    }

                    failures += 1;
                    if failures >= self.config.max_read_failures {
                        log::error!(
                            "{} consecutive read failures from {}, giving up on connection",
                            failures,
                            self.endpoint
                        );
                        return ReadEnd::Severed;
                    }
                    std::thread::sleep(self.config.read_backoff_for(failures));
                }
            }
        }
    }
}
