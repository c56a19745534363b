//! Replaceable event handlers.
//!
//! Each handler sits behind its own lock and is cloned out before it runs, so
//! a handler may replace itself (or any other handler) while executing, and
//! two workers may run handlers at the same time.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::ErrorKind;

/// Called after the connection is established.
pub type ConnectedCallback = Arc<dyn Fn() + Send + Sync>;
/// Called after the connection is torn down.
pub type DisconnectedCallback = Arc<dyn Fn() + Send + Sync>;
/// Called with each received chunk.
pub type ReceiveCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;
/// Called with every transport failure; send failures carry the payload.
pub type ErrorCallback = Arc<dyn Fn(ErrorKind, Option<&[u8]>) + Send + Sync>;

/// The client's four handlers. Defaults do nothing.
pub struct Callbacks {
    connected: RwLock<ConnectedCallback>,
    disconnected: RwLock<DisconnectedCallback>,
    received: RwLock<ReceiveCallback>,
    error: RwLock<ErrorCallback>,
}

impl Default for Callbacks {
    fn default() -> Self {
        Self {
            connected: RwLock::new(Arc::new(|| {})),
            disconnected: RwLock::new(Arc::new(|| {})),
            received: RwLock::new(Arc::new(|_| {})),
            error: RwLock::new(Arc::new(|_, _| {})),
        }
    }
}

impl core::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Callbacks").finish_non_exhaustive()
    }
}

impl Callbacks {
    pub fn set_connected(&self, callback: ConnectedCallback) {
        *self.connected.write() = callback;
    }

    pub fn set_disconnected(&self, callback: DisconnectedCallback) {
        *self.disconnected.write() = callback;
    }

    pub fn set_received(&self, callback: ReceiveCallback) {
        *self.received.write() = callback;
    }

    pub fn set_error(&self, callback: ErrorCallback) {
        *self.error.write() = callback;
    }

    pub fn connected(&self) {
        let callback = self.connected.read().clone();
        callback();
    }

    pub fn disconnected(&self) {
        let callback = self.disconnected.read().clone();
        callback();
    }

    pub fn received(&self, bytes: &[u8]) {
        let callback = self.received.read().clone();
        callback(bytes);
    }

    pub fn error(&self, kind: ErrorKind, payload: Option<&[u8]>) {
        let callback = self.error.read().clone();
        callback(kind, payload);
    }
}
