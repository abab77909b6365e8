// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Per-group reception state.
//!
//! A [`GroupRecord`] lives from the first sample referencing its group id
//! until the tracker resolves the group (delivered or dropped). The wire
//! model carries no membership manifest, so the expected-stream set is the
//! set of streams registered with the tracker when the record is created;
//! a stream that never contributes is detected through later-group
//! inference, not awaited forever.

use crate::core::{GroupId, Sample, StreamId};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

/// Outcome of registering one sample into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegisterOutcome {
    /// Sample accepted into the record.
    Registered,
    /// Retransmission of a sequence number already held; ignored.
    Duplicate,
}

/// What one stream has contributed to a group so far.
#[derive(Debug, Default)]
struct StreamContribution {
    samples: Vec<Sample>,
    highest_seq: u64,
    /// `last_in_group` received for this stream.
    finished: bool,
    /// Non-contiguous sequence observed. The delivery substrate is
    /// reliable and in-order, so a gap is permanent.
    gapped: bool,
}

/// Reception state for one coherent group.
#[derive(Debug)]
pub(crate) struct GroupRecord {
    group_id: GroupId,
    /// Streams that must finish before the group is complete.
    expected: BTreeSet<StreamId>,
    received: BTreeMap<StreamId, StreamContribution>,
    /// Confirmed unrecoverable (gap, later-group inference, transport
    /// loss, or grace expiry).
    dead: bool,
    last_progress: Instant,
}

impl GroupRecord {
    pub(crate) fn new(group_id: GroupId, expected: BTreeSet<StreamId>, now: Instant) -> Self {
        Self {
            group_id,
            expected,
            received: BTreeMap::new(),
            dead: false,
            last_progress: now,
        }
    }

    pub(crate) fn group_id(&self) -> GroupId {
        self.group_id
    }

    /// Register an arriving sample. Detects in-stream duplicates and
    /// sequence gaps; a gap marks the whole group unrecoverable.
    pub(crate) fn register(&mut self, sample: Sample, now: Instant) -> RegisterOutcome {
        let contribution = self.received.entry(sample.stream_id).or_default();

        if sample.sequence_in_group <= contribution.highest_seq {
            return RegisterOutcome::Duplicate;
        }

        if sample.sequence_in_group != contribution.highest_seq + 1 {
            log::warn!(
                "[tracker] {} gap on {}: expected seq {}, got {}",
                self.group_id,
                sample.stream_id,
                contribution.highest_seq + 1,
                sample.sequence_in_group
            );
            contribution.gapped = true;
            self.dead = true;
        }

        contribution.highest_seq = sample.sequence_in_group;
        contribution.finished |= sample.last_in_group;
        contribution.samples.push(sample);
        self.last_progress = now;
        RegisterOutcome::Registered
    }

    /// Every expected stream has finished its contribution with no gap.
    pub(crate) fn is_complete(&self) -> bool {
        !self.dead
            && self.expected.iter().all(|stream| {
                self.received
                    .get(stream)
                    .is_some_and(|c| c.finished && !c.gapped)
            })
    }

    /// The stream still owes samples to this group: nothing received yet,
    /// or received but not finished. Used by later-group inference.
    pub(crate) fn has_open_contribution(&self, stream: StreamId) -> bool {
        self.expected.contains(&stream)
            && !self.received.get(&stream).is_some_and(|c| c.finished)
    }

    pub(crate) fn mark_dead(&mut self) {
        self.dead = true;
    }

    pub(crate) fn is_dead(&self) -> bool {
        self.dead
    }

    pub(crate) fn last_progress(&self) -> Instant {
        self.last_progress
    }

    /// Consume the record, yielding each contributing stream's samples in
    /// arrival order. Streams with no samples are omitted.
    pub(crate) fn into_streams(self) -> BTreeMap<StreamId, Vec<Sample>> {
        self.received
            .into_iter()
            .filter(|(_, c)| !c.samples.is_empty())
            .map(|(stream, c)| (stream, c.samples))
            .collect()
    }
}
