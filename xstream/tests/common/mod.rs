//! Helpers shared by the socket integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use xstream::{Client, ConnectionState, ErrorKind};

pub const POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const WAIT_LIMIT: Duration = Duration::from_secs(10);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Records every callback invocation of a client.
#[derive(Default)]
pub struct Events {
    pub connected: AtomicUsize,
    pub disconnected: AtomicUsize,
    pub errors: Mutex<Vec<(ErrorKind, Option<Vec<u8>>)>>,
    pub chunks: Mutex<Vec<Vec<u8>>>,
}

impl Events {
    pub fn attach(client: &Client) -> Arc<Events> {
        let events = Arc::new(Events::default());

        let e = events.clone();
        client.set_connected_callback(move || {
            e.connected.fetch_add(1, Ordering::SeqCst);
        });
        let e = events.clone();
        client.set_disconnected_callback(move || {
            e.disconnected.fetch_add(1, Ordering::SeqCst);
        });
        let e = events.clone();
        client.set_error_callback(move |kind, payload| {
            e.errors.lock().unwrap().push((kind, payload.map(<[u8]>::to_vec)));
        });
        let e = events.clone();
        client.set_receive_callback(move |bytes| {
            e.chunks.lock().unwrap().push(bytes.to_vec());
        });

        events
    }

    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn disconnected(&self) -> usize {
        self.disconnected.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<(ErrorKind, Option<Vec<u8>>)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<u8> {
        self.chunks.lock().unwrap().concat()
    }
}

pub fn start(client: &Client) {
    assert!(client.start());
    wait_until("workers running", || client.is_running());
}

pub fn open(client: &Client) {
    assert!(client.request_open());
    wait_until("connected", || client.state() == ConnectionState::Connected);
}

pub fn close(client: &Client) {
    assert!(client.request_close());
    wait_until("disconnected", || {
        client.state() == ConnectionState::NotConnected
    });
}
