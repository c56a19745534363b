//! Connection lifecycle state machine.
//!
//! ```text
//!                  request_open
//!  NOT_CONNECTED ───────────────▶ OPENING
//!        ▲  ▲                        │
//!        │  └──── open/connect ──────┤
//!        │        failed             │ connected
//!        │                           ▼
//!     CLOSING ◀──── request_close ── CONNECTED
//!                   or peer closed
//! ```
//!
//! The state lives in a `StateCell`: a mutex-guarded value paired with a
//! condition variable, so the receive worker can sleep until a connection is
//! established instead of polling.

use core::fmt;

use parking_lot::{Condvar, Mutex};

/// Lifecycle state of the client's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in progress.
    #[default]
    NotConnected,
    /// The monitor is opening and connecting a socket.
    Opening,
    /// Connected; payloads flow in both directions.
    Connected,
    /// The monitor is shutting the socket down.
    Closing,
}

impl ConnectionState {
    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (NotConnected, Opening)
                | (Opening, Connected)
                | (Opening, NotConnected)
                | (Connected, Closing)
                | (Closing, NotConnected)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::NotConnected => write!(f, "NOT_CONNECTED"),
            ConnectionState::Opening => write!(f, "OPENING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Closing => write!(f, "CLOSING"),
        }
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    state: ConnectionState,
    /// Incremented on every transition into `Connected`.
    session: u64,
}

/// Shared connection state with change notification.
#[derive(Debug, Default)]
pub(crate) struct StateCell {
    inner: Mutex<Snapshot>,
    changed: Condvar,
}

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Current state together with the current session number.
    pub fn snapshot(&self) -> (ConnectionState, u64) {
        let inner = self.inner.lock();
        (inner.state, inner.session)
    }

    /// Moves `from -> to` if the current state is `from` and the edge is legal.
    ///
    /// Returns whether the transition happened.
    pub fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        if !from.can_transition_to(to) {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.state != from {
            return false;
        }
        inner.state = to;
        if to == ConnectionState::Connected {
            inner.session = inner.session.wrapping_add(1);
        }
        log::debug!("Connection state {} -> {}", from, to);
        self.changed.notify_all();
        true
    }

    /// Forces the state to `NotConnected`. Returns the previous state.
    pub(crate) fn reset(&self) -> ConnectionState {
        let mut inner = self.inner.lock();
        let previous = core::mem::take(&mut inner.state);
        self.changed.notify_all();
        previous
    }

    /// Wakes every thread blocked in one of the `wait_*` methods so it can
    /// re-check its exit condition.
    pub fn notify(&self) {
        let _inner = self.inner.lock();
        self.changed.notify_all();
    }

    /// Blocks until the state is `Connected` and returns its session number,
    /// or returns `None` once `stop()` is true.
    ///
    /// `stop` is evaluated under the state lock; whoever makes it true must
    /// call [`StateCell::notify`] afterwards.
    pub fn wait_connected(&self, stop: impl Fn() -> bool) -> Option<u64> {
        let mut inner = self.inner.lock();
        loop {
            if stop() {
                return None;
            }
            if inner.state == ConnectionState::Connected {
                return Some(inner.session);
            }
            self.changed.wait(&mut inner);
        }
    }

    /// Blocks while `session` is still the live connection.
    pub fn wait_session_end(&self, session: u64, stop: impl Fn() -> bool) {
        let mut inner = self.inner.lock();
        while !stop() && inner.state == ConnectionState::Connected && inner.session == session {
            self.changed.wait(&mut inner);
        }
    }
}
