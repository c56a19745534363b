//! Outbound payload queue.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// FIFO of payloads waiting for the transmit worker.
///
/// Entries are popped before they are written, so a failed write never puts
/// an entry back.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: Mutex<VecDeque<Vec<u8>>>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a copy of `payload`. Empty payloads are rejected.
    pub fn push(&self, payload: &[u8]) -> bool {
        if payload.is_empty() {
            return false;
        }
        self.entries.lock().push_back(payload.to_vec());
        true
    }

    pub fn pop(&self) -> Option<Vec<u8>> {
        self.entries.lock().pop_front()
    }

    /// Drops every queued entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
