//! Binary wake signal.

use parking_lot::{Condvar, Mutex};

/// A binary semaphore built from a flag and a condition variable.
///
/// A [`Signal::raise`] with nobody waiting is kept for the next
/// [`Signal::wait`]; further raises before that wait collapse into the same
/// single pending wake.
#[derive(Debug, Default)]
pub struct Signal {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases one waiter, or leaves a pending wake if none is waiting.
    pub fn raise(&self) {
        let mut pending = self.pending.lock();
        *pending = true;
        self.cond.notify_one();
    }

    /// Blocks until a wake is pending, then consumes it.
    pub fn wait(&self) {
        let mut pending = self.pending.lock();
        while !*pending {
            self.cond.wait(&mut pending);
        }
        *pending = false;
    }

    /// Consumes a pending wake without blocking. Returns whether one was pending.
    #[cfg(test)]
    pub fn try_take(&self) -> bool {
        let mut pending = self.pending.lock();
        core::mem::replace(&mut *pending, false)
    }
}
