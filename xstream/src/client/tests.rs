use super::*;
use crate::error::{Error, Result};
use parking_lot::Condvar;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize};
use std::time::{Duration, Instant};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[derive(Default)]
struct PeerState {
    inbound: VecDeque<u8>,
    hung_up: bool,
    shut: bool,
}

/// The far end of one mock connection.
#[derive(Default)]
struct Peer {
    sent: Mutex<Vec<u8>>,
    state: Mutex<PeerState>,
    ready: Condvar,
}

impl Peer {
    fn push(&self, bytes: &[u8]) {
        let mut state = self.state.lock();
        state.inbound.extend(bytes);
        self.ready.notify_all();
    }

    fn hang_up(&self) {
        let mut state = self.state.lock();
        state.hung_up = true;
        self.ready.notify_all();
    }

    fn sent(&self) -> Vec<u8> {
        self.sent.lock().clone()
    }
}

/// Holds threads in [`Gate::pass`] while closed. Starts open.
#[derive(Default)]
struct Gate {
    closed: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn closed() -> Self {
        Gate {
            closed: Mutex::new(true),
            changed: Condvar::new(),
        }
    }

    fn close(&self) {
        *self.closed.lock() = true;
    }

    fn open(&self) {
        *self.closed.lock() = false;
        self.changed.notify_all();
    }

    fn pass(&self) {
        let mut closed = self.closed.lock();
        while *closed {
            self.changed.wait(&mut closed);
        }
    }
}

#[derive(Default)]
struct Behaviour {
    fail_open: AtomicBool,
    refuse_connect: AtomicBool,
    fail_reads: AtomicBool,
    fail_shutdown: AtomicBool,
    shutdown_gate: Gate,
    /// Bytes accepted per send call; 0 means unlimited.
    max_write: AtomicUsize,
    peers: Mutex<Vec<Arc<Peer>>>,
}

#[derive(Clone, Default)]
struct MockConnector {
    behaviour: Arc<Behaviour>,
}

impl MockConnector {
    fn peer(&self) -> Arc<Peer> {
        self.behaviour.peers.lock().last().cloned().expect("no connection opened")
    }

    fn opened(&self) -> usize {
        self.behaviour.peers.lock().len()
    }
}

impl Connector for MockConnector {
    fn open(&self, _endpoint: &Endpoint) -> Result<Box<dyn Transport>> {
        if self.behaviour.fail_open.load(Ordering::SeqCst) {
            return Err(Error::new(
                ErrorKind::OpenFailure,
                std::io::Error::other("no sockets left"),
            ));
        }
        let peer = Arc::new(Peer::default());
        self.behaviour.peers.lock().push(peer.clone());
        Ok(Box::new(MockTransport {
            peer,
            behaviour: self.behaviour.clone(),
        }))
    }
}

struct MockTransport {
    peer: Arc<Peer>,
    behaviour: Arc<Behaviour>,
}

impl Transport for MockTransport {
    fn connect(&self, _endpoint: &Endpoint, _timeout: Option<Duration>) -> Result<()> {
        if self.behaviour.refuse_connect.load(Ordering::SeqCst) {
            return Err(Error::new(
                ErrorKind::ConnectFailure,
                std::io::ErrorKind::ConnectionRefused.into(),
            ));
        }
        Ok(())
    }

    fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        if self.peer.state.lock().shut {
            return Err(std::io::ErrorKind::BrokenPipe.into());
        }
        let n = match self.behaviour.max_write.load(Ordering::SeqCst) {
            0 => buf.len(),
            max => buf.len().min(max),
        };
        self.peer.sent.lock().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.behaviour.fail_reads.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("device error"));
        }
        let mut state = self.peer.state.lock();
        loop {
            if !state.inbound.is_empty() {
                let n = buf.len().min(state.inbound.len());
                for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
            if state.shut || state.hung_up {
                return Ok(0);
            }
            self.peer.ready.wait(&mut state);
        }
    }

    fn shutdown(&self) -> std::io::Result<()> {
        self.behaviour.shutdown_gate.pass();
        let mut state = self.peer.state.lock();
        state.shut = true;
        self.peer.ready.notify_all();
        if self.behaviour.fail_shutdown.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("shutdown refused"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct Recorder {
    connected: AtomicUsize,
    disconnected: AtomicUsize,
    errors: Mutex<Vec<(ErrorKind, Option<Vec<u8>>)>>,
    received: Mutex<Vec<Vec<u8>>>,
}

impl Recorder {
    fn attach(client: &Client) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());

        let r = recorder.clone();
        client.set_connected_callback(move || {
            r.connected.fetch_add(1, Ordering::SeqCst);
        });
        let r = recorder.clone();
        client.set_disconnected_callback(move || {
            r.disconnected.fetch_add(1, Ordering::SeqCst);
        });
        let r = recorder.clone();
        client.set_error_callback(move |kind, payload| {
            r.errors.lock().push((kind, payload.map(<[u8]>::to_vec)));
        });
        let r = recorder.clone();
        client.set_receive_callback(move |bytes| {
            r.received.lock().push(bytes.to_vec());
        });

        recorder
    }

    fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn error_kinds(&self) -> Vec<ErrorKind> {
        self.errors.lock().iter().map(|(kind, _)| *kind).collect()
    }

    fn received_bytes(&self) -> Vec<u8> {
        self.received.lock().concat()
    }
}

fn mock_client(config: ClientConfig) -> (Client, MockConnector, Arc<Recorder>) {
    let connector = MockConnector::default();
    let client = Client::with_connector(
        Endpoint::tcp("127.0.0.1", 5000),
        config,
        connector.clone(),
    );
    let recorder = Recorder::attach(&client);
    (client, connector, recorder)
}

fn start(client: &Client) {
    assert!(client.start());
    wait_until("workers running", || client.is_running());
}

fn connect(client: &Client) {
    assert!(client.request_open());
    wait_until("connected", || client.state() == ConnectionState::Connected);
}

fn disconnect(client: &Client) {
    assert!(client.request_close());
    wait_until("disconnected", || {
        client.state() == ConnectionState::NotConnected
    });
}

#[test]
fn test_start_twice() {
    let (client, _, _) = mock_client(ClientConfig::default());
    assert!(!client.is_running());
    start(&client);
    assert!(!client.start());
}

#[test]
fn test_requests_rejected_outside_source_state() {
    let (client, _, recorder) = mock_client(ClientConfig::default());
    start(&client);

    assert!(!client.request_close());
    assert_eq!(client.state(), ConnectionState::NotConnected);

    connect(&client);
    assert!(!client.request_open());
    assert_eq!(client.state(), ConnectionState::Connected);

    disconnect(&client);
    assert!(!client.request_close());

    assert_eq!(recorder.connected(), 1);
    assert_eq!(recorder.disconnected(), 1);
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_requests_rejected_while_opening() {
    let mock = MockConnector::default();
    let gate = Arc::new(Gate::closed());
    let entered = Arc::new(AtomicBool::new(false));

    let connector = {
        let gate = gate.clone();
        let entered = entered.clone();
        let mock = mock.clone();
        move |endpoint: &Endpoint| {
            entered.store(true, Ordering::SeqCst);
            gate.pass();
            mock.open(endpoint)
        }
    };
    let client = Client::with_connector(
        Endpoint::tcp("127.0.0.1", 5000),
        ClientConfig::default(),
        connector,
    );
    let recorder = Recorder::attach(&client);
    start(&client);

    assert!(client.request_open());
    wait_until("monitor opening", || entered.load(Ordering::SeqCst));

    assert!(!client.request_open());
    assert!(!client.request_close());
    assert_eq!(client.state(), ConnectionState::Opening);
    assert_eq!(recorder.connected(), 0);
    assert_eq!(recorder.disconnected(), 0);

    gate.open();
    wait_until("connected", || client.state() == ConnectionState::Connected);
    assert_eq!(recorder.connected(), 1);
    assert_eq!(recorder.disconnected(), 0);
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_requests_rejected_while_closing() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    start(&client);
    connect(&client);

    connector.behaviour.shutdown_gate.close();
    assert!(client.request_close());
    assert!(!client.request_open());
    assert!(!client.request_close());
    assert_eq!(client.state(), ConnectionState::Closing);
    assert_eq!(recorder.disconnected(), 0);

    connector.behaviour.shutdown_gate.open();
    wait_until("disconnected", || {
        client.state() == ConnectionState::NotConnected
    });
    assert_eq!(recorder.connected(), 1);
    assert_eq!(recorder.disconnected(), 1);
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_empty_payload_rejected() {
    let (client, _, recorder) = mock_client(ClientConfig::default());
    start(&client);

    assert!(!client.enqueue_payload(&[]));
    assert_eq!(client.pending_payloads(), 0);

    std::thread::sleep(Duration::from_millis(20));
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_send_before_connect_reports_payload() {
    let (client, _, recorder) = mock_client(ClientConfig::default());
    start(&client);

    assert!(client.enqueue_payload(b"too early"));
    wait_until("send failure", || !recorder.errors.lock().is_empty());

    std::thread::sleep(Duration::from_millis(20));
    let errors = recorder.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorKind::SendFailure);
    assert_eq!(errors[0].1.as_deref(), Some(&b"too early"[..]));
    assert_eq!(client.pending_payloads(), 0);
}

#[test]
fn test_partial_writes_keep_order() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    connector.behaviour.max_write.store(3, Ordering::SeqCst);
    start(&client);
    connect(&client);

    let mut expected = Vec::new();
    for i in 0..100 {
        let payload = format!("payload-{i};");
        expected.extend_from_slice(payload.as_bytes());
        assert!(client.enqueue_payload(payload.as_bytes()));
    }

    let peer = connector.peer();
    wait_until("all payloads sent", || peer.sent().len() == expected.len());
    assert_eq!(peer.sent(), expected);
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_send_failure_drops_only_that_payload() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    start(&client);
    connect(&client);
    let peer = connector.peer();

    assert!(client.enqueue_payload(b"one"));
    wait_until("first payload", || peer.sent() == b"one");

    disconnect(&client);
    assert!(client.enqueue_payload(b"lost"));
    wait_until("send failure", || !recorder.errors.lock().is_empty());

    connect(&client);
    assert!(client.enqueue_payload(b"two"));
    let peer = connector.peer();
    wait_until("second payload", || peer.sent() == b"two");

    let errors = recorder.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0], (ErrorKind::SendFailure, Some(b"lost".to_vec())));
}

#[test]
fn test_received_chunks_respect_buffer_size() {
    let config = ClientConfig::new().with_rx_buffer_size(1024);
    let (client, connector, recorder) = mock_client(config);
    start(&client);
    connect(&client);

    let payload: Vec<u8> = (0..8196u32).map(|i| (i % 251) as u8).collect();
    connector.peer().push(&payload);

    wait_until("payload received", || {
        recorder.received_bytes().len() == payload.len()
    });
    assert_eq!(recorder.received_bytes(), payload);
    let received = recorder.received.lock();
    assert!(received.len() >= 9);
    assert!(received.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= 1024));
}

#[test]
fn test_open_failure() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    connector.behaviour.fail_open.store(true, Ordering::SeqCst);
    start(&client);

    assert!(client.request_open());
    wait_until("open failure", || recorder.disconnected() == 1);
    assert_eq!(client.state(), ConnectionState::NotConnected);
    assert_eq!(recorder.error_kinds(), vec![ErrorKind::OpenFailure]);
    assert_eq!(recorder.connected(), 0);

    connector.behaviour.fail_open.store(false, Ordering::SeqCst);
    connect(&client);
}

#[test]
fn test_connect_failure() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    connector.behaviour.refuse_connect.store(true, Ordering::SeqCst);
    start(&client);

    assert!(client.request_open());
    wait_until("connect failure", || recorder.disconnected() == 1);
    assert_eq!(client.state(), ConnectionState::NotConnected);
    assert_eq!(recorder.error_kinds(), vec![ErrorKind::ConnectFailure]);
    assert!(connector.peer().state.lock().shut);
}

#[test]
fn test_repeated_open_close() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    start(&client);

    for _ in 0..5 {
        connect(&client);
        disconnect(&client);
        assert_eq!(client.pending_payloads(), 0);
    }

    assert_eq!(connector.opened(), 5);
    assert_eq!(recorder.connected(), 5);
    assert_eq!(recorder.disconnected(), 5);
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_peer_hang_up_disconnects_once() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    start(&client);
    connect(&client);

    connector.peer().hang_up();
    wait_until("disconnected", || {
        client.state() == ConnectionState::NotConnected
    });
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.disconnected(), 1);
    assert!(recorder.error_kinds().is_empty());

    connect(&client);
    assert_eq!(recorder.connected(), 2);
}

#[test]
fn test_read_failures_back_off_then_sever() {
    let config = ClientConfig::new()
        .with_read_backoff(Duration::from_millis(1), Duration::from_millis(4))
        .with_max_read_failures(3);
    let (client, connector, recorder) = mock_client(config);
    connector.behaviour.fail_reads.store(true, Ordering::SeqCst);
    start(&client);
    connect(&client);

    wait_until("disconnected", || recorder.disconnected() == 1);
    assert_eq!(client.state(), ConnectionState::NotConnected);
    assert_eq!(recorder.error_kinds(), vec![ErrorKind::ReadFailure; 3]);
}

#[test]
fn test_close_failure_reported() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    connector.behaviour.fail_shutdown.store(true, Ordering::SeqCst);
    start(&client);
    connect(&client);
    disconnect(&client);

    assert_eq!(recorder.error_kinds(), vec![ErrorKind::CloseFailure]);
    assert_eq!(recorder.disconnected(), 1);
}

#[test]
fn test_clear_before_start() {
    let (client, _, recorder) = mock_client(ClientConfig::default());
    assert!(client.enqueue_payload(b"a"));
    assert!(client.enqueue_payload(b"b"));
    assert_eq!(client.pending_payloads(), 2);

    client.clear_outbound_payloads();
    assert_eq!(client.pending_payloads(), 0);

    start(&client);
    std::thread::sleep(Duration::from_millis(20));
    assert!(recorder.error_kinds().is_empty());
}

#[test]
fn test_stop_while_connected() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    start(&client);
    connect(&client);

    client.stop();
    assert_eq!(
        client.worker_states(),
        (WorkerState::Inactive, WorkerState::Inactive, WorkerState::Inactive)
    );
    assert_eq!(client.state(), ConnectionState::NotConnected);
    assert_eq!(recorder.disconnected(), 1);
    assert!(connector.peer().state.lock().shut);
    assert!(recorder.error_kinds().is_empty());

    assert!(!client.start());
    client.stop();
}

#[test]
fn test_stop_without_start() {
    let (client, _, _) = mock_client(ClientConfig::default());
    client.stop();
    assert_eq!(
        client.worker_states(),
        (WorkerState::Inactive, WorkerState::Inactive, WorkerState::Inactive)
    );
}

#[test]
fn test_request_open_after_stop() {
    let (client, connector, recorder) = mock_client(ClientConfig::default());
    start(&client);
    client.stop();

    assert!(!client.request_open());
    assert!(!client.request_close());
    assert_eq!(client.state(), ConnectionState::NotConnected);
    assert!(!client.start());
    assert_eq!(connector.opened(), 0);
    assert_eq!(recorder.disconnected(), 0);
}

#[test]
fn test_request_open_before_start_is_serviced() {
    let (client, _, recorder) = mock_client(ClientConfig::default());
    assert!(client.request_open());
    assert_eq!(client.state(), ConnectionState::Opening);

    start(&client);
    wait_until("connected", || client.state() == ConnectionState::Connected);
    assert_eq!(recorder.connected(), 1);
}

#[test]
fn test_reopen_refused_during_shutdown() {
    let (client, connector, _) = mock_client(ClientConfig::default());
    let client = Arc::new(client);
    let accepted = Arc::new(Mutex::new(None));

    start(&client);
    connect(&client);

    let weak = Arc::downgrade(&client);
    let slot = accepted.clone();
    client.set_disconnected_callback(move || {
        if let Some(client) = weak.upgrade() {
            *slot.lock() = Some(client.request_open());
        }
    });

    client.stop();
    assert_eq!(*accepted.lock(), Some(false));
    assert_eq!(client.state(), ConnectionState::NotConnected);
    assert_eq!(connector.opened(), 1);
}

#[test]
fn test_reopen_from_disconnected_callback() {
    let (client, connector, _) = mock_client(ClientConfig::default());
    let client = Arc::new(client);
    let reopened = Arc::new(AtomicBool::new(false));

    let weak = Arc::downgrade(&client);
    let flag = reopened.clone();
    client.set_disconnected_callback(move || {
        if !flag.swap(true, Ordering::SeqCst) {
            if let Some(client) = weak.upgrade() {
                assert!(client.request_open());
            }
        }
    });

    start(&client);
    connect(&client);
    connector.peer().hang_up();

    wait_until("reconnected", || connector.opened() == 2);
    wait_until("connected", || client.state() == ConnectionState::Connected);
}
