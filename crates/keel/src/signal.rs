//! One-shot cross-thread notification.
//!
//! The runtime uses two of these to coordinate unload: one owned by the
//! supervisor (`unload requested`) and one owned by the injecting caller
//! (`unload finished`). A signal is monotonic — once set it stays set, so
//! a waiter that arrives late observes completion immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// A one-shot, monotonic signal observable from any thread.
///
/// Single conceptual writer, any number of readers. Setting an
/// already-set signal is a no-op.
pub struct Signal {
    set: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl Signal {
    /// Create a new signal in the unset state.
    pub fn new() -> Self {
        Self {
            set: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Set the signal, waking all waiting threads. Idempotent.
    pub fn set(&self) {
        self.set.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    /// Check whether the signal has been set.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    /// Block until the signal is set. Returns immediately if already set.
    pub fn wait(&self) {
        if self.is_set() {
            return;
        }

        let guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        let _guard = self
            .condvar
            .wait_while(guard, |_| !self.is_set())
            .unwrap_or_else(|e| e.into_inner());
    }

    /// Wait for the specified duration or until the signal is set.
    ///
    /// Returns `true` if the signal was set, `false` on timeout.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        if self.is_set() {
            return true;
        }

        let guard = self.mutex.lock().unwrap_or_else(|e| e.into_inner());
        let result = self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_set());

        match result {
            Ok((_, timeout_result)) => !timeout_result.timed_out(),
            // Mutex poisoned, fall back to the atomic state
            Err(_) => self.is_set(),
        }
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}
