//! Per-worker run state and thread handle.

use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

use crate::signal::Signal;

/// Run state of one worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WorkerState {
    /// Spawn requested, the thread has not reached its loop yet.
    Starting,
    /// Inside its loop.
    Running,
    /// Asked to exit.
    Ending,
    /// Not started, or exited.
    #[default]
    Inactive,
}

/// Lifecycle tracker for one worker thread.
#[derive(Debug)]
pub struct Worker {
    name: &'static str,
    state: RwLock<WorkerState>,
    signal: Option<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    /// A worker that is woken only through its run state.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: RwLock::new(WorkerState::Inactive),
            signal: None,
            handle: Mutex::new(None),
        }
    }

    /// A worker that blocks on its own wake signal.
    pub fn with_signal(name: &'static str) -> Self {
        Self {
            signal: Some(Signal::new()),
            ..Self::new(name)
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn is_ending(&self) -> bool {
        self.state() == WorkerState::Ending
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        *self.state.write() = state;
    }

    /// Starting -> Running. Does nothing if an exit was requested first.
    pub(crate) fn enter_running(&self) {
        let mut state = self.state.write();
        if *state == WorkerState::Starting {
            *state = WorkerState::Running;
            log::debug!("{} worker running", self.name);
        }
    }

    /// Requests the worker to exit and wakes it. Returns false if it was not
    /// started or is already exiting.
    pub(crate) fn request_end(&self) -> bool {
        {
            let mut state = self.state.write();
            if !matches!(*state, WorkerState::Starting | WorkerState::Running) {
                return false;
            }
            *state = WorkerState::Ending;
        }
        self.wake();
        true
    }

    /// Raises the wake signal, if this worker has one.
    pub fn wake(&self) {
        if let Some(signal) = &self.signal {
            signal.raise();
        }
    }

    /// Blocks on the wake signal. Returns immediately for workers without one.
    pub(crate) fn wait(&self) {
        if let Some(signal) = &self.signal {
            signal.wait();
        }
    }

    /// Spawns the worker thread running `body`.
    pub(crate) fn spawn<F>(&self, body: F) -> std::io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.set_state(WorkerState::Starting);
        match thread::Builder::new()
            .name(format!("xstream-{}", self.name))
            .spawn(body)
        {
            Ok(handle) => {
                *self.handle.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to spawn {} worker: {}", self.name, e);
                self.set_state(WorkerState::Inactive);
                Err(e)
            }
        }
    }

    /// Joins the worker thread.
    ///
    /// When called from the worker thread itself (a callback dropping the
    /// client), the thread is detached instead.
    pub(crate) fn join(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            log::warn!("{} worker stopped from its own thread; detaching", self.name);
            return;
        }
        if handle.join().is_err() {
            log::error!("{} worker panicked", self.name);
        }
        self.set_state(WorkerState::Inactive);
    }
}
