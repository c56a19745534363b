//! Connection monitor worker.

use std::sync::Arc;

use crate::error::ErrorKind;
use crate::state::ConnectionState;
use crate::transport::Transport;
use crate::worker::WorkerState;

use super::{Inner, Link};

impl Inner {
    pub(super) fn run_monitor(self: Arc<Self>) {
        self.monitor.enter_running();

        /* Wake-ups come from:
            1. request_open (state is now Opening)
            2. request_close (state is now Closing)
            3. the receive worker finding the stream severed
            4. shutdown
        */
        loop {
            self.monitor.wait();
            if self.monitor.is_ending() {
                break;
            }
            self.service_connection();
        }

        self.release_transport();
        let previous = self.state.reset();
        if matches!(
            previous,
            ConnectionState::Connected | ConnectionState::Closing
        ) {
            log::info!("Disconnected from {} on shutdown", self.endpoint);
            self.callbacks.disconnected();
        }
        self.monitor.set_state(WorkerState::Inactive);
        log::debug!("monitor worker exited");
    }

    fn service_connection(&self) {
        let severed = self.severed.lock().take();
        if let Some(session) = severed {
            if self.is_live(session) {
                log::info!("Connection to {} severed by peer", self.endpoint);
                self.state
                    .transition(ConnectionState::Connected, ConnectionState::Closing);
            }
        }

        match self.state.get() {
            ConnectionState::Opening => self.open_connection(),
            ConnectionState::Closing => self.close_connection(),
            ConnectionState::NotConnected | ConnectionState::Connected => {}
        }
    }

    /// Opening -> Connected, or back to NotConnected on failure.
    fn open_connection(&self) {
        let transport: Arc<dyn Transport> = match self.connector.open(&self.endpoint) {
            Ok(transport) => Arc::from(transport),
            Err(e) => {
                log::error!("Failed to open socket for {}: {}", self.endpoint, e);
                self.callbacks.error(ErrorKind::OpenFailure, None);
                self.abort_open();
                return;
            }
        };

        if let Err(e) = transport.connect(&self.endpoint, self.config.connect_timeout) {
            log::error!("Failed to connect to {}: {}", self.endpoint, e);
            self.callbacks.error(ErrorKind::ConnectFailure, None);
            let _ = transport.shutdown();
            drop(transport);
            self.abort_open();
            return;
        }

        // Only this thread moves into Connected, so the next session number
        // is known before the transition publishes it.
        let (_, session) = self.state.snapshot();
        let session = session.wrapping_add(1);
        *self.link.write() = Some(Link { session, transport });

        if self
            .state
            .transition(ConnectionState::Opening, ConnectionState::Connected)
        {
            log::info!("Connected to {} (session {})", self.endpoint, session);
            self.callbacks.connected();
        } else {
            self.release_transport();
        }
    }

    fn abort_open(&self) {
        self.state
            .transition(ConnectionState::Opening, ConnectionState::NotConnected);
        self.callbacks.disconnected();
    }

    /// Closing -> NotConnected.
    fn close_connection(&self) {
        let link = self.link.write().take();
        if let Some(link) = link {
            if let Err(e) = link.transport.shutdown() {
                if e.kind() != std::io::ErrorKind::NotConnected {
                    log::warn!("Failed to shut down connection to {}: {}", self.endpoint, e);
                    self.callbacks.error(ErrorKind::CloseFailure, None);
                }
            }
            // The socket closes once the workers drop their clones.
        }

        if self
            .state
            .transition(ConnectionState::Closing, ConnectionState::NotConnected)
        {
            log::info!("Disconnected from {}", self.endpoint);
            self.callbacks.disconnected();
        }
    }

    /// Unpublishes and shuts down whatever transport is live. Idempotent.
    fn release_transport(&self) {
        let link = self.link.write().take();
        if let Some(link) = link {
            if let Err(e) = link.transport.shutdown() {
                log::debug!("Shutdown of session {} transport: {}", link.session, e);
            }
        }
    }
}
