// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Data-available notification between producers and the dispatch loop.
//!
//! Producers (transport receive threads) call [`WakeNotifier::notify`]
//! after appending to a stream buffer; the dispatch thread blocks in
//! [`WakeNotifier::wait_timeout`] with the configured tick as an upper
//! bound. An atomic flag keeps the producer path lock-free; the condvar
//! is only involved when the consumer actually sleeps.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Wake-up signal with an atomic fast path and a condvar slow path.
#[derive(Debug, Default)]
pub struct WakeNotifier {
    pending: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl WakeNotifier {
    /// Create a notifier with no pending signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal that data is available. Never blocks the caller beyond a
    /// brief handshake with a sleeping consumer.
    pub fn notify(&self) {
        self.pending.store(true, Ordering::Release);
        // Taking the lock orders the store against a consumer that is
        // between its flag re-check and the condvar wait.
        drop(self.lock.lock());
        self.condvar.notify_one();
    }

    /// Consume a pending signal without waiting.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::Acquire)
    }

    /// Block until notified or `timeout` elapses.
    ///
    /// Returns `true` if a signal was consumed, `false` on a bare tick.
    /// A signal that races the deadline still counts as `true`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.take_pending() {
            return true;
        }

        let mut guard = self.lock.lock();
        if self.take_pending() {
            return true;
        }
        let _ = self.condvar.wait_for(&mut guard, timeout);
        drop(guard);

        self.take_pending()
    }
}
