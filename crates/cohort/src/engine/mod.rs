// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Single-threaded dispatch loop driving atomic delivery.
//!
//! # Architecture
//!
//! ```text
//! transport threads                  dispatch thread (run())
//!   buffer.push() + notify() --+
//!   report_transport_loss() ---+--> Waiting --(data | tick)--> Processing
//!                                     ^   drain buffers -> tracker   |
//!   any thread:                       |   events -> listener (caught)|
//!   stop() = cancel + notify          +------------------------------+
//! ```
//!
//! While a Processing pass runs, no other thread drains the same stream
//! buffers (producers only append). That single-drainer discipline is
//! what makes a coherent set's delivery atomic from the application's
//! point of view.

mod cancel;
mod wake;

pub use cancel::CancelToken;
pub use wake::WakeNotifier;

use crate::core::{Error, Result, Sample, StreamId};
use crate::listener::GroupListener;
use crate::loss::{LossReason, LossReporter};
use crate::qos::QoS;
use crate::reader::StreamBuffer;
use crate::tracker::{CoherencyTracker, DeliveryEvent};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Dispatch loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatcherState {
    /// Constructed, `run()` not yet called.
    Idle = 0,
    /// Blocked waiting for data or a tick.
    Waiting = 1,
    /// Draining buffers and invoking callbacks.
    Processing = 2,
    /// Loop exited (or is unwinding after `stop()`).
    ShuttingDown = 3,
}

impl DispatcherState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => DispatcherState::Waiting,
            2 => DispatcherState::Processing,
            3 => DispatcherState::ShuttingDown,
            _ => DispatcherState::Idle,
        }
    }
}

/// Event-driven delivery loop over a set of stream buffers.
///
/// One dispatcher owns the coherent-access pass for its buffers; `run()`
/// is called once, typically on a dedicated thread. Producers interact
/// only through [`Dispatcher::push`] (or the buffers directly plus
/// [`Dispatcher::wake_handle`]) and [`Dispatcher::report_transport_loss`].
pub struct Dispatcher {
    qos: QoS,
    buffers: BTreeMap<StreamId, Arc<StreamBuffer>>,
    listener: Arc<dyn GroupListener>,
    tracker: Mutex<CoherencyTracker>,
    loss: Arc<LossReporter>,
    wake: Arc<WakeNotifier>,
    cancel: CancelToken,
    state: AtomicU8,
    /// Loss signals queued by producer threads, consumed by the next pass.
    pending_losses: Mutex<Vec<(StreamId, u64, LossReason)>>,
}

impl Dispatcher {
    /// Create a dispatcher over `buffers`, delivering to `listener`.
    ///
    /// The `cancel` token is the only shutdown channel; keep a clone to
    /// request it later (or use [`Dispatcher::stop`]).
    pub fn new(
        qos: QoS,
        buffers: Vec<Arc<StreamBuffer>>,
        listener: Arc<dyn GroupListener>,
        cancel: CancelToken,
    ) -> Self {
        let loss = Arc::new(LossReporter::new());
        let streams: Vec<StreamId> = buffers.iter().map(|b| b.stream_id()).collect();
        let tracker = CoherencyTracker::new(qos, streams, Arc::clone(&loss));
        Self {
            qos,
            buffers: buffers.into_iter().map(|b| (b.stream_id(), b)).collect(),
            listener,
            tracker: Mutex::new(tracker),
            loss,
            wake: Arc::new(WakeNotifier::new()),
            cancel,
            state: AtomicU8::new(DispatcherState::Idle as u8),
            pending_losses: Mutex::new(Vec::new()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Loss counters shared with the tracker.
    #[must_use]
    pub fn loss_reporter(&self) -> Arc<LossReporter> {
        Arc::clone(&self.loss)
    }

    /// Signal producers use after appending to a buffer directly.
    #[must_use]
    pub fn wake_handle(&self) -> Arc<WakeNotifier> {
        Arc::clone(&self.wake)
    }

    /// Append a received sample to its stream's buffer and wake the loop.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] for a stream this dispatcher does not
    /// manage. [`Error::CapacityExceeded`] when the buffer is bounded and
    /// full; the drop is queued for loss accounting, never silent.
    pub fn push(&self, sample: Sample) -> Result<()> {
        let stream = sample.stream_id;
        let buffer = self.buffers.get(&stream).ok_or_else(|| {
            Error::InvalidState(format!("no buffer registered for {}", stream))
        })?;

        match buffer.push(sample) {
            Ok(()) => {
                self.wake.notify();
                Ok(())
            }
            Err(err) => {
                self.pending_losses
                    .lock()
                    .push((stream, 1, LossReason::CapacityExceeded));
                self.wake.notify();
                Err(err)
            }
        }
    }

    /// Queue an explicit transport loss signal for the next pass.
    ///
    /// Safe from any thread; the tracker consumes it on the dispatch
    /// thread so delivery stays single-threaded.
    pub fn report_transport_loss(&self, stream: StreamId, count: u64) {
        self.pending_losses
            .lock()
            .push((stream, count, LossReason::TransportLoss));
        self.wake.notify();
    }

    /// Request shutdown. Safe from any thread, including from inside a
    /// delivery callback; an in-flight pass finishes and delivers its
    /// queued groups before the loop exits.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.wake.notify();
    }

    /// Run the dispatch loop until the cancel token fires.
    ///
    /// Blocks the calling thread. Waits at most one tick between passes
    /// so shutdown requests are observed even without traffic.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] if called more than once.
    pub fn run(&self) -> Result<()> {
        self.state
            .compare_exchange(
                DispatcherState::Idle as u8,
                DispatcherState::Waiting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| Error::InvalidState("dispatcher already started".into()))?;

        log::debug!(
            "[dispatch] loop started over {} stream(s), tick {:?}",
            self.buffers.len(),
            self.qos.tick
        );

        while !self.cancel.is_cancelled() {
            let _signalled = self.wake.wait_timeout(self.qos.tick);

            self.state
                .store(DispatcherState::Processing as u8, Ordering::Release);
            let events = self.coherent_access_pass();
            self.dispatch(events);
            self.state
                .store(DispatcherState::Waiting as u8, Ordering::Release);
        }

        self.state
            .store(DispatcherState::ShuttingDown as u8, Ordering::Release);
        log::debug!("[dispatch] loop exited");
        Ok(())
    }

    /// One coherent-access pass: consume queued loss signals, drain every
    /// buffer into the tracker, expire stale groups. Collects events
    /// under the tracker lock but never invokes callbacks there.
    fn coherent_access_pass(&self) -> Vec<DeliveryEvent> {
        let mut events = Vec::new();
        let losses: Vec<_> = std::mem::take(&mut *self.pending_losses.lock());

        let mut tracker = self.tracker.lock();
        for (stream, count, reason) in losses {
            tracker.on_transport_loss(stream, count, reason, &mut events);
        }
        for buffer in self.buffers.values() {
            for sample in buffer.drain_not_read() {
                tracker.ingest(sample, &mut events);
            }
        }
        tracker.expire_stale(&mut events);
        events
    }

    /// Invoke the listener for each event. A panicking callback is
    /// logged and skipped; it never takes the loop down.
    fn dispatch(&self, events: Vec<DeliveryEvent>) {
        for event in events {
            let listener = Arc::clone(&self.listener);
            let outcome = catch_unwind(AssertUnwindSafe(move || match event {
                DeliveryEvent::Group(delivery) => listener.on_coherent_group(delivery),
                DeliveryEvent::Ungrouped(sample) => listener.on_sample(sample),
                DeliveryEvent::Loss { stream, status } => {
                    listener.on_samples_lost(stream, status);
                }
            }));
            if outcome.is_err() {
                log::error!("[dispatch] listener panicked; continuing with next event");
            }
        }
    }
}
