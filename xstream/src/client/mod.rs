//! The client facade and its shared state.
//!
//! A [`Client`] owns three worker threads for its whole active lifetime:
//!
//! - **monitor**: opens, connects and closes the transport, and is the only
//!   thread that moves the connection out of `Opening` and `Closing`
//! - **transmit**: drains the outbound queue in FIFO order
//! - **receive**: reads from the live transport and hands chunks to the
//!   receive callback
//!
//! The facade only validates requests, records the `Opening`/`Closing` entry
//! and wakes the worker that has to act on it.

mod monitor;
mod receive;
mod transmit;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::callback::Callbacks;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::ErrorKind;
use crate::queue::OutboundQueue;
use crate::state::{ConnectionState, StateCell};
use crate::transport::{Connector, SocketConnector, Transport};
use crate::worker::{Worker, WorkerState};

/// The transport of one established connection.
struct Link {
    session: u64,
    transport: Arc<dyn Transport>,
}

pub(crate) struct Inner {
    endpoint: Endpoint,
    config: ClientConfig,
    connector: Box<dyn Connector>,
    state: StateCell,
    link: RwLock<Option<Link>>,
    queue: OutboundQueue,
    callbacks: Callbacks,
    monitor: Worker,
    transmit: Worker,
    receive: Worker,
    /// Session the receive worker found severed, waiting for the monitor.
    severed: Mutex<Option<u64>>,
}

impl Inner {
    /// Transport of the live connection, if any.
    fn transport(&self) -> Option<Arc<dyn Transport>> {
        self.link.read().as_ref().map(|link| link.transport.clone())
    }

    /// Transport of `session`, if that connection is still published.
    fn transport_for(&self, session: u64) -> Option<Arc<dyn Transport>> {
        self.link
            .read()
            .as_ref()
            .filter(|link| link.session == session)
            .map(|link| link.transport.clone())
    }

    fn is_live(&self, session: u64) -> bool {
        self.state.snapshot() == (ConnectionState::Connected, session)
    }
}

/// Threaded byte-stream client for one TCP/IPv4 or Unix domain endpoint.
///
/// Nothing happens on the wire until [`Client::start`] has spawned the
/// workers and [`Client::request_open`] has been accepted. Dropping the
/// client stops the workers and closes the connection.
pub struct Client {
    inner: Arc<Inner>,
    started: AtomicBool,
    /// Set once a started client is stopped; requests are refused from then on.
    stopped: AtomicBool,
}

impl Client {
    /// Client for `endpoint` with the default configuration.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_config(endpoint, ClientConfig::default())
    }

    /// Client for a TCP/IPv4 endpoint.
    pub fn tcp(address: impl Into<String>, port: u16) -> Self {
        Self::new(Endpoint::tcp(address, port))
    }

    /// Client for a Unix domain socket endpoint.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Self::new(Endpoint::unix(path))
    }

    /// Client for `endpoint` over OS sockets, tuned by `config`.
    pub fn with_config(endpoint: Endpoint, config: ClientConfig) -> Self {
        Self::with_connector(endpoint, config, SocketConnector)
    }

    /// Client whose transports come from `connector` instead of OS sockets.
    pub fn with_connector(
        endpoint: Endpoint,
        config: ClientConfig,
        connector: impl Connector + 'static,
    ) -> Self {
        Client {
            inner: Arc::new(Inner {
                endpoint,
                config,
                connector: Box::new(connector),
                state: StateCell::new(),
                link: RwLock::new(None),
                queue: OutboundQueue::new(),
                callbacks: Callbacks::default(),
                monitor: Worker::with_signal("monitor"),
                transmit: Worker::with_signal("transmit"),
                receive: Worker::new("receive"),
                severed: Mutex::new(None),
            }),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// The endpoint this client connects to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// The configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Spawns the monitor, transmit and receive workers.
    ///
    /// Returns false if the workers were already started (a stopped client
    /// cannot be started again) or a thread could not be spawned.
    pub fn start(&self) -> bool {
        if self.started.swap(true, Ordering::SeqCst) {
            return false;
        }

        let inner = &self.inner;
        let spawned = {
            let monitor = inner.clone();
            let transmit = inner.clone();
            let receive = inner.clone();
            inner.monitor.spawn(move || monitor.run_monitor()).is_ok()
                && inner.transmit.spawn(move || transmit.run_transmit()).is_ok()
                && inner.receive.spawn(move || receive.run_receive()).is_ok()
        };

        if !spawned {
            self.stop();
            return false;
        }

        log::info!("Client for {} started", inner.endpoint);
        true
    }

    /// Whether the workers are up. The monitor's run state stands in for all
    /// three.
    pub fn is_running(&self) -> bool {
        self.inner.monitor.state() == WorkerState::Running
    }

    /// Run states of the monitor, transmit and receive workers.
    pub fn worker_states(&self) -> (WorkerState, WorkerState, WorkerState) {
        (
            self.inner.monitor.state(),
            self.inner.transmit.state(),
            self.inner.receive.state(),
        )
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    /// Whether `stop` ran after a successful or attempted `start`.
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Asks the monitor to open a connection.
    ///
    /// Accepted only in `NotConnected`, and never once the client has been
    /// stopped; otherwise returns false and changes nothing. A request made
    /// before [`Client::start`] is serviced as soon as the monitor runs.
    pub fn request_open(&self) -> bool {
        let inner = &self.inner;
        if self.is_stopped() {
            log::debug!("Open rejected: client for {} is stopped", inner.endpoint);
            return false;
        }
        if !inner
            .state
            .transition(ConnectionState::NotConnected, ConnectionState::Opening)
        {
            log::debug!("Open rejected in state {}", inner.state.get());
            return false;
        }
        // A stop that raced us may have reset the state already; nobody would
        // service this request.
        if self.is_stopped() {
            inner
                .state
                .transition(ConnectionState::Opening, ConnectionState::NotConnected);
            log::debug!("Open rejected: client for {} is stopped", inner.endpoint);
            return false;
        }
        log::info!("Opening connection to {}", inner.endpoint);
        inner.monitor.wake();
        true
    }

    /// Asks the monitor to close the connection.
    ///
    /// Accepted only in `Connected` and before the client is stopped;
    /// otherwise returns false and changes nothing.
    pub fn request_close(&self) -> bool {
        let inner = &self.inner;
        if self.is_stopped() {
            log::debug!("Close rejected: client for {} is stopped", inner.endpoint);
            return false;
        }
        if !inner
            .state
            .transition(ConnectionState::Connected, ConnectionState::Closing)
        {
            log::debug!("Close rejected in state {}", inner.state.get());
            return false;
        }
        log::info!("Closing connection to {}", inner.endpoint);
        inner.monitor.wake();
        true
    }

    /// Queues a copy of `payload` for transmission.
    ///
    /// Rejects empty payloads. Accepted in every connection state; a payload
    /// sent while disconnected is reported as [`ErrorKind::SendFailure`].
    pub fn enqueue_payload(&self, payload: &[u8]) -> bool {
        if !self.inner.queue.push(payload) {
            return false;
        }
        log::trace!("Queued {} byte payload", payload.len());
        self.inner.transmit.wake();
        true
    }

    /// Drops every queued payload.
    ///
    /// Payloads the transmit worker has already taken off the queue are still
    /// sent.
    pub fn clear_outbound_payloads(&self) {
        let dropped = self.inner.queue.clear();
        log::debug!("Cleared {} queued payloads", dropped);
    }

    /// Number of payloads waiting in the outbound queue.
    pub fn pending_payloads(&self) -> usize {
        self.inner.queue.len()
    }

    /// Replaces the handler run after a connection is established.
    pub fn set_connected_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks.set_connected(Arc::new(callback));
    }

    /// Replaces the handler run after a connection is torn down, including
    /// a failed open or connect attempt.
    pub fn set_disconnected_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.callbacks.set_disconnected(Arc::new(callback));
    }

    /// Replaces the handler that receives each inbound chunk.
    pub fn set_receive_callback<F>(&self, callback: F)
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner.callbacks.set_received(Arc::new(callback));
    }

    /// Replaces the handler for transport failures. Send failures carry the
    /// dropped payload.
    pub fn set_error_callback<F>(&self, callback: F)
    where
        F: Fn(ErrorKind, Option<&[u8]>) + Send + Sync + 'static,
    {
        self.inner.callbacks.set_error(Arc::new(callback));
    }

    /// Stops the workers and closes the connection. Idempotent.
    ///
    /// Receive is told to stop first, then transmit, then the monitor, which
    /// shuts the transport down on its way out and so unblocks a pending
    /// receive. All three are joined last.
    pub fn stop(&self) {
        let inner = &self.inner;
        // Before the workers are told to end, so a racing request_open sees it.
        if self.started.load(Ordering::SeqCst) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        let receive = inner.receive.request_end();
        if receive {
            inner.state.notify();
        }
        let transmit = inner.transmit.request_end();
        let monitor = inner.monitor.request_end();
        if !(receive || transmit || monitor) {
            return;
        }

        log::debug!("Stopping client for {}", inner.endpoint);
        // The monitor may be busy in a callback that is calling us.
        if let Some(transport) = inner.transport() {
            let _ = transport.shutdown();
        }
        inner.monitor.join();
        inner.transmit.join();
        inner.receive.join();
        log::info!("Client for {} stopped", inner.endpoint);
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.stop();
    }
}

impl core::fmt::Debug for Client {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.inner.state.get())
            .field("pending", &self.inner.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests;
