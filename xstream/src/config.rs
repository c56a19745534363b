//! Client configuration.

use std::time::Duration;

use crate::{
    DEFAULT_MAX_READ_BACKOFF_MS, DEFAULT_MAX_READ_FAILURES, DEFAULT_READ_BACKOFF_MS,
    DEFAULT_RX_BUFFER_SIZE,
};

/// Tunables for a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bytes requested per receive call.
    pub rx_buffer_size: usize,
    /// Upper bound on the connect step. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Delay after the first failed receive.
    pub read_backoff: Duration,
    /// Ceiling for the doubling receive backoff.
    pub max_read_backoff: Duration,
    /// Consecutive failed receives after which the stream is treated as severed.
    pub max_read_failures: u32,
}

impl ClientConfig {
    /// Configuration with the crate defaults.
    pub fn new() -> Self {
        Self {
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
            connect_timeout: None,
            read_backoff: Duration::from_millis(DEFAULT_READ_BACKOFF_MS),
            max_read_backoff: Duration::from_millis(DEFAULT_MAX_READ_BACKOFF_MS),
            max_read_failures: DEFAULT_MAX_READ_FAILURES,
        }
    }

    /// Sets the receive buffer size. Zero is bumped to one byte.
    pub fn with_rx_buffer_size(mut self, size: usize) -> Self {
        self.rx_buffer_size = size.max(1);
        self
    }

    /// Bounds the connect step.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the first and the largest delay between failed receives. `max`
    /// is raised to `initial` if smaller.
    pub fn with_read_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.read_backoff = initial;
        self.max_read_backoff = max.max(initial);
        self
    }

    /// Sets how many failed receives in a row sever the stream. Zero is
    /// bumped to one.
    pub fn with_max_read_failures(mut self, count: u32) -> Self {
        self.max_read_failures = count.max(1);
        self
    }

    /// Backoff to apply after `failures` consecutive failed receives.
    pub(crate) fn read_backoff_for(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.read_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_read_backoff)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
