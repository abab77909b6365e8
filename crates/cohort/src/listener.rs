// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Application-facing delivery callbacks.
//!
//! A [`GroupListener`] receives coherent sets, ordinary samples and loss
//! notifications from the dispatch thread. All methods have default no-op
//! implementations, so an application only overrides the events it cares
//! about.
//!
//! # Thread Safety
//!
//! Callbacks are invoked synchronously from the dispatch thread. They must
//! be `Send + Sync` and should not block indefinitely; a long-running
//! callback delays subsequent dispatch cycles (it cannot corrupt engine
//! state). A panicking callback is caught at the dispatch boundary and
//! logged; it never terminates the loop.

use crate::core::{GroupId, Sample, StreamId};
use crate::loss::LossReason;
use std::collections::BTreeMap;

/// Status handed to [`GroupListener::on_samples_lost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleLostStatus {
    /// Total cumulative count of lost samples on this stream.
    pub total_count: u64,
    /// Change in `total_count` since the last callback.
    pub total_count_change: u64,
    /// Reason for the most recent loss.
    pub last_reason: LossReason,
}

/// One atomic delivery of coherent-set samples.
///
/// For a complete set this holds every touched stream's samples in
/// per-stream arrival order and `incomplete` is `false`. Under the
/// keep-incomplete policy, salvaged samples arrive as one delivery per
/// stream with `incomplete` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDelivery {
    /// The coherent group being delivered.
    pub group_id: GroupId,
    /// Samples per touched stream, each list in arrival order.
    pub streams: BTreeMap<StreamId, Vec<Sample>>,
    /// Set could not complete; samples are salvaged partials.
    pub incomplete: bool,
}

impl GroupDelivery {
    /// Total sample count across all streams in this delivery.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.streams.values().map(Vec::len).sum()
    }
}

/// Listener for subscriber-side delivery events.
///
/// # Example
///
/// ```ignore
/// struct SetPrinter;
///
/// impl GroupListener for SetPrinter {
///     fn on_coherent_group(&self, delivery: GroupDelivery) {
///         println!("set {} with {} samples", delivery.group_id, delivery.sample_count());
///     }
///
///     fn on_samples_lost(&self, stream: StreamId, status: SampleLostStatus) {
///         println!("{}: {} lost", stream, status.total_count_change);
///     }
/// }
/// ```
pub trait GroupListener: Send + Sync {
    /// Called once per delivered coherent set (or per salvaged stream
    /// slice when the set was incomplete and the keep policy is active).
    fn on_coherent_group(&self, delivery: GroupDelivery) {
        let _ = delivery;
    }

    /// Called for each sample written outside any coherent group.
    fn on_sample(&self, sample: Sample) {
        let _ = sample;
    }

    /// Called when samples are discarded (incomplete set drop, transport
    /// loss, capacity rejection).
    fn on_samples_lost(&self, stream: StreamId, status: SampleLostStatus) {
        let _ = (stream, status);
    }
}

/// Closure-based listener for applications that only want the coherent
/// group callback.
pub struct ClosureGroupListener<F: Fn(GroupDelivery) + Send + Sync> {
    callback: F,
}

impl<F: Fn(GroupDelivery) + Send + Sync> ClosureGroupListener<F> {
    /// Create a new closure-based listener.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F: Fn(GroupDelivery) + Send + Sync> GroupListener for ClosureGroupListener<F> {
    fn on_coherent_group(&self, delivery: GroupDelivery) {
        (self.callback)(delivery);
    }
}
