// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Cross-stream coherent-set correlation.
//!
//! The tracker decides, for each arriving sample, whether it completes,
//! extends, or invalidates a coherent group, and turns resolved groups
//! into delivery events for the dispatch loop.
//!
//! # Architecture
//!
//! ```text
//! StreamBuffer drains --> ingest() --+--> live GroupRecords (by GroupId)
//! transport loss ------> on_transport_loss()   |
//! dispatch tick -------> expire_stale()        v
//!                                    resolve from smallest live id:
//!                                      complete  -> Group delivery
//!                                      dead      -> drop + Loss, or
//!                                                   salvage (keep policy)
//! ```
//!
//! Groups resolve from the smallest live id upward so per-stream delivery
//! order always equals write order. A later group completing first waits
//! behind the pending head until the head resolves.
//!
//! Incompleteness is confirmed three ways: a sequence gap inside one
//! stream's contribution, a sample of a *later* group observed on a stream
//! that still owes samples to an earlier group, or an explicit loss signal
//! from the transport. A configurable grace period can additionally expire
//! groups that stall without progress.

mod record;


use crate::core::{GroupId, Sample, StreamId};
use crate::listener::{GroupDelivery, SampleLostStatus};
use crate::loss::{LossReason, LossReporter};
use crate::qos::QoS;
use record::{GroupRecord, RegisterOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// Retired group ids remembered for duplicate detection. Anything older
/// falls below the watermark and is rejected by monotonicity.
const RETIRED_GROUPS_KEPT: usize = 1024;

/// One delivery decision produced by the tracker.
#[derive(Debug)]
pub enum DeliveryEvent {
    /// Atomic delivery of a coherent set (or one salvaged stream slice).
    Group(GroupDelivery),
    /// Sample written outside any coherent group; bypasses grouping.
    Ungrouped(Sample),
    /// Samples were discarded; notify the loss observer.
    Loss {
        /// Stream the samples were discarded on.
        stream: StreamId,
        /// Updated loss status for that stream.
        status: SampleLostStatus,
    },
}

/// Correlates samples by group id across all registered streams.
///
/// Single-consumer: owned by the dispatch pass. Producers never touch it.
pub struct CoherencyTracker {
    qos: QoS,
    /// Streams registered with the subscriber session; every group is
    /// expected to finish on all of them (no membership manifest exists
    /// in the wire model).
    streams: BTreeSet<StreamId>,
    /// Live groups, smallest id first.
    groups: BTreeMap<GroupId, GroupRecord>,
    /// Recently retired ids (delivered or dropped).
    retired: BTreeSet<GroupId>,
    /// Ids at or below this are retired even if evicted from `retired`.
    watermark: Option<GroupId>,
    loss: Arc<LossReporter>,
}

impl CoherencyTracker {
    /// Create a tracker over the given subscribed streams.
    pub fn new(
        qos: QoS,
        streams: impl IntoIterator<Item = StreamId>,
        loss: Arc<LossReporter>,
    ) -> Self {
        Self {
            qos,
            streams: streams.into_iter().collect(),
            groups: BTreeMap::new(),
            retired: BTreeSet::new(),
            watermark: None,
            loss,
        }
    }

    /// Number of groups currently awaiting resolution.
    #[must_use]
    pub fn live_groups(&self) -> usize {
        self.groups.len()
    }

    /// Feed one arriving sample; resolved groups are appended to `out`.
    pub fn ingest(&mut self, sample: Sample, out: &mut Vec<DeliveryEvent>) {
        let Some(group_id) = sample.group_id() else {
            out.push(DeliveryEvent::Ungrouped(sample));
            return;
        };

        if self.is_retired(group_id) {
            log::debug!(
                "[tracker] duplicate sample for retired {} on {}, ignored",
                group_id,
                sample.stream_id
            );
            return;
        }

        // A later group's sample on this stream proves every earlier group
        // still owed samples by the stream will never get them.
        let stream = sample.stream_id;
        for (&id, record) in self.groups.range_mut(..group_id) {
            if !record.is_dead() && record.has_open_contribution(stream) {
                log::warn!(
                    "[tracker] {} arrived on {} while {} still open there, declaring incomplete",
                    group_id,
                    stream,
                    id
                );
                record.mark_dead();
            }
        }

        let now = Instant::now();
        let record = self.groups.entry(group_id).or_insert_with(|| {
            log::debug!("[tracker] new record for {}", group_id);
            GroupRecord::new(group_id, self.streams.clone(), now)
        });

        if record.register(sample, now) == RegisterOutcome::Duplicate {
            log::debug!("[tracker] duplicate sequence within live {}, ignored", group_id);
        }

        self.resolve_ready(out);
    }

    /// Transport reported `count` samples lost on `stream` before they
    /// ever reached a buffer. Every group the stream still owes samples
    /// to can no longer complete.
    pub fn on_transport_loss(
        &mut self,
        stream: StreamId,
        count: u64,
        reason: LossReason,
        out: &mut Vec<DeliveryEvent>,
    ) {
        let counters = self.loss.on_samples_lost(stream, count, reason);
        out.push(DeliveryEvent::Loss {
            stream,
            status: SampleLostStatus {
                total_count: counters.total_count,
                total_count_change: count,
                last_reason: counters.last_reason,
            },
        });

        for (&id, record) in self.groups.iter_mut() {
            if !record.is_dead() && record.has_open_contribution(stream) {
                log::warn!(
                    "[tracker] transport loss on {} invalidates {}",
                    stream,
                    id
                );
                record.mark_dead();
            }
        }

        self.resolve_ready(out);
    }

    /// Expire groups that made no progress within the configured grace
    /// period. No-op unless a grace period is set.
    pub fn expire_stale(&mut self, out: &mut Vec<DeliveryEvent>) {
        let Some(grace) = self.qos.grace_period else {
            return;
        };

        let now = Instant::now();
        let mut expired = false;
        for (&id, record) in self.groups.iter_mut() {
            if !record.is_dead()
                && !record.is_complete()
                && now.duration_since(record.last_progress()) >= grace
            {
                log::warn!("[tracker] {} exceeded grace period, declaring incomplete", id);
                record.mark_dead();
                expired = true;
            }
        }

        if expired {
            self.resolve_ready(out);
        }
    }

    /// Resolve from the smallest live id: deliver complete heads, drop or
    /// salvage dead heads, stop at the first still-pending group.
    fn resolve_ready(&mut self, out: &mut Vec<DeliveryEvent>) {
        loop {
            let Some((&head, record)) = self.groups.first_key_value() else {
                break;
            };
            let complete = record.is_complete();
            if !complete && !record.is_dead() {
                break;
            }
            let Some(record) = self.groups.remove(&head) else {
                break;
            };
            if complete {
                self.deliver_complete(record, out);
            } else {
                self.resolve_incomplete(record, out);
            }
            self.retire(head);
        }
    }

    fn deliver_complete(&self, record: GroupRecord, out: &mut Vec<DeliveryEvent>) {
        let group_id = record.group_id();
        let streams = record.into_streams();
        log::debug!(
            "[tracker] {} complete across {} stream(s)",
            group_id,
            streams.len()
        );
        out.push(DeliveryEvent::Group(GroupDelivery {
            group_id,
            streams,
            incomplete: false,
        }));
    }

    fn resolve_incomplete(&self, record: GroupRecord, out: &mut Vec<DeliveryEvent>) {
        let group_id = record.group_id();
        let streams = record.into_streams();

        if self.qos.presentation.drop_incomplete_coherent_set {
            for (stream, samples) in streams {
                let count = samples.len() as u64;
                let counters =
                    self.loss
                        .on_samples_lost(stream, count, LossReason::IncompleteCoherentSet);
                log::warn!(
                    "[tracker] dropping {} buffered sample(s) of incomplete {} on {}",
                    count,
                    group_id,
                    stream
                );
                out.push(DeliveryEvent::Loss {
                    stream,
                    status: SampleLostStatus {
                        total_count: counters.total_count,
                        total_count_change: count,
                        last_reason: counters.last_reason,
                    },
                });
            }
        } else {
            // Keep policy: salvage whatever arrived, one delivery per
            // stream, every sample tagged incomplete.
            for (stream, mut samples) in streams {
                for sample in &mut samples {
                    if let Some(info) = sample.group.as_mut() {
                        info.incomplete = true;
                    }
                }
                let mut slice = BTreeMap::new();
                slice.insert(stream, samples);
                out.push(DeliveryEvent::Group(GroupDelivery {
                    group_id,
                    streams: slice,
                    incomplete: true,
                }));
            }
        }
    }

    fn retire(&mut self, group_id: GroupId) {
        self.retired.insert(group_id);
        while self.retired.len() > RETIRED_GROUPS_KEPT {
            if let Some(oldest) = self.retired.pop_first() {
                self.watermark = Some(self.watermark.map_or(oldest, |w| w.max(oldest)));
            }
        }
    }

    fn is_retired(&self, group_id: GroupId) -> bool {
        self.retired.contains(&group_id) || self.watermark.is_some_and(|w| group_id <= w)
    }
}
