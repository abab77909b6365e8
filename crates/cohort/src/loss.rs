// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Loss accounting: monotonic per-stream counters for discarded samples.
//!
//! Mutated only by the [`CoherencyTracker`](crate::CoherencyTracker) (and
//! by buffer-capacity rejections routed through it); read by anyone via
//! [`LossReporter::snapshot`]. Purely additive bookkeeping, never fails.

use crate::core::StreamId;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Why samples were discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LossReason {
    /// No loss recorded yet.
    #[default]
    NotLost,
    /// Discarded as part of a coherent set that could not complete.
    IncompleteCoherentSet,
    /// Reported lost by the transport layer before reception.
    TransportLoss,
    /// Rejected by a capacity-bounded stream buffer.
    CapacityExceeded,
}

/// Running loss totals for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LossCounters {
    /// Total samples discarded on this stream.
    pub total_count: u64,
    /// Reason for the most recent discard.
    pub last_reason: LossReason,
}

/// Immutable copy of all per-stream loss counters.
pub type LossSnapshot = BTreeMap<StreamId, LossCounters>;

/// Accumulates per-stream loss counters.
#[derive(Debug, Default)]
pub struct LossReporter {
    counters: DashMap<StreamId, LossCounters>,
}

impl LossReporter {
    /// Create an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
        }
    }

    /// Record `count` discarded samples on `stream`.
    ///
    /// Returns the updated counters so callers can build a listener
    /// notification without a second lookup.
    pub fn on_samples_lost(&self, stream: StreamId, count: u64, reason: LossReason) -> LossCounters {
        let mut entry = self.counters.entry(stream).or_default();
        entry.total_count += count;
        entry.last_reason = reason;
        log::debug!(
            "[loss] {} lost {} sample(s) ({:?}), total {}",
            stream,
            count,
            reason,
            entry.total_count
        );
        *entry
    }

    /// Current counters for one stream.
    #[must_use]
    pub fn counters(&self, stream: StreamId) -> LossCounters {
        self.counters
            .get(&stream)
            .map(|c| *c)
            .unwrap_or_default()
    }

    /// Immutable copy of every stream's counters.
    #[must_use]
    pub fn snapshot(&self) -> LossSnapshot {
        self.counters
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Sum of losses across all streams.
    #[must_use]
    pub fn total_lost(&self) -> u64 {
        self.counters.iter().map(|e| e.value().total_count).sum()
    }
}
