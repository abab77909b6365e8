// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! # cohort - Group-Coherent Presentation Engine
//!
//! A publisher brackets writes spanning multiple independent streams into
//! one *coherent set*; subscribers never observe a partial view of the
//! set: they receive either every sample of the set in one atomic
//! callback pass or, by policy, none of them plus an explicit loss
//! signal.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cohort::{CancelToken, ClosureGroupListener, Dispatcher, QoS, StreamBuffer, StreamId};
//! use std::sync::Arc;
//!
//! fn main() -> cohort::Result<()> {
//!     let time = Arc::new(StreamBuffer::new(StreamId(1)));
//!     let place = Arc::new(StreamBuffer::new(StreamId(2)));
//!
//!     let listener = Arc::new(ClosureGroupListener::new(|delivery| {
//!         println!("coherent set {} delivered", delivery.group_id);
//!     }));
//!
//!     let cancel = CancelToken::new();
//!     let dispatcher = Dispatcher::new(
//!         QoS::default().group_coherent(),
//!         vec![time, place],
//!         listener,
//!         cancel,
//!     );
//!
//!     // transport receive threads: dispatcher.push(sample)
//!     // dedicated dispatch thread:
//!     dispatcher.run()
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                       Publisher side                         |
//! |  CoherentWriter --(group id + seq stamping)--> TransportSink |
//! +--------------------------------------------------------------+
//! |                 (delivery substrate, external)               |
//! +--------------------------------------------------------------+
//! |                      Subscriber side                         |
//! |  StreamBuffer (per stream) -> CoherencyTracker -> Dispatcher |
//! |       ^ producers append        cross-stream        |        |
//! |                                 correlation         v        |
//! |                            GroupListener + LossReporter      |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CoherentWriter`] | Brackets writes into coherent sets |
//! | [`StreamBuffer`] | Per-stream arrival buffer fed by transport |
//! | [`CoherencyTracker`] | Correlates samples by group, decides fate |
//! | [`Dispatcher`] | Event loop delivering sets atomically |
//! | [`LossReporter`] | Monotonic per-stream loss counters |
//! | [`QoS`] | Presentation policy + engine tuning knobs |
//!
//! Transport, wire encoding, topic/type definitions and configuration
//! file loading are collaborators behind the [`TransportSink`] and
//! [`GroupListener`] seams, not part of this crate.

/// Core data model: identifiers, samples, group-id allocation, errors.
pub mod core;
/// Single-threaded dispatch loop and its wake/cancel primitives.
pub mod engine;
/// Application-facing delivery callbacks.
pub mod listener;
/// Loss accounting (monotonic per-stream counters).
pub mod loss;
/// Presentation policy and engine tuning knobs.
pub mod qos;
/// Reader-side per-stream buffering.
pub mod reader;
/// Cross-stream coherent-set correlation.
pub mod tracker;
/// Writer-side coherent-group bracketing.
pub mod writer;

pub use crate::core::{
    CoherentSetInfo, Error, GroupId, Result, Sample, SequenceAllocator, StreamId,
};
pub use engine::{CancelToken, Dispatcher, DispatcherState, WakeNotifier};
pub use listener::{ClosureGroupListener, GroupDelivery, GroupListener, SampleLostStatus};
pub use loss::{LossCounters, LossReason, LossReporter, LossSnapshot};
pub use qos::{Presentation, PresentationAccessScope, QoS};
pub use reader::StreamBuffer;
pub use tracker::{CoherencyTracker, DeliveryEvent};
pub use writer::{CoherentWriter, TransportSink};

/// cohort version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
