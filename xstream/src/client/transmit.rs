//! Transmit worker.

use std::sync::Arc;

use crate::error::ErrorKind;
use crate::worker::WorkerState;

use super::Inner;

impl Inner {
    pub(super) fn run_transmit(self: Arc<Self>) {
        self.transmit.enter_running();

        /* Wait here until signalled to resume. This happens when:
            1. a payload was queued
            2. the client is shutting down
        */
        'wake: loop {
            self.transmit.wait();
            if self.transmit.is_ending() {
                break;
            }

            // Drain everything, including payloads queued while sending.
            while let Some(payload) = self.queue.pop() {
                self.send_payload(&payload);
                if self.transmit.is_ending() {
                    break 'wake;
                }
            }
        }

        if !self.queue.is_empty() {
            log::debug!(
                "transmit worker exiting with {} queued payloads",
                self.queue.len()
            );
        }
        self.transmit.set_state(WorkerState::Inactive);
        log::debug!("transmit worker exited");
    }

    /// Writes one payload in full. A failure drops the payload and hands it to
    /// the error callback.
    fn send_payload(&self, payload: &[u8]) {
        let result = match self.transport() {
            Some(transport) => transport.send_all(payload),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no connection",
            )),
        };

        match result {
            Ok(()) => log::trace!("Sent {} byte payload", payload.len()),
            Err(e) => {
                log::warn!("Failed to send {} byte payload: {}", payload.len(), e);
                self.callbacks.error(ErrorKind::SendFailure, Some(payload));
            }
        }
    }
}
