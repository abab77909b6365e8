// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Core identifiers and the sample data model.
//!
//! Everything the engine moves around is a [`Sample`]: an opaque payload
//! plus the metadata the coherency machinery needs. Samples written inside
//! a coherent group carry a [`CoherentSetInfo`] tag; ordinary samples do
//! not and bypass grouping entirely.

/// Identifier of one subscribed data stream ("topic" in DDS terms).
///
/// Opaque to the engine; the embedding session assigns them. Ordered so
/// cross-stream delivery maps iterate deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(pub u32);

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Identifier of one coherent group within a writer session.
///
/// Monotonically increasing per writer session; ordering reflects write
/// order. The reader side relies on this to infer that an unfinished group
/// will never complete once a later group shows up on the same stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u64);

impl GroupId {
    /// First group id a fresh writer session hands out.
    pub const FIRST: GroupId = GroupId(1);
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Coherent-set tag carried by every sample that belongs to a group.
///
/// Mirrors the per-sample set info a subscriber inspects after delivery:
/// which set the sample belonged to, and whether that set was salvaged
/// from an incomplete delivery. `incomplete` is only ever `true` on
/// samples handed out under the keep-incomplete policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoherentSetInfo {
    /// The coherent group this sample belongs to.
    pub group_id: GroupId,
    /// Set was incomplete; the sample is a salvaged partial.
    pub incomplete: bool,
}

impl CoherentSetInfo {
    /// Tag for a sample in a (so far) intact coherent set.
    #[must_use]
    pub const fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            incomplete: false,
        }
    }
}

/// One unit of user data moving through the engine.
///
/// Owned by the [`StreamBuffer`](crate::StreamBuffer) after reception,
/// then moved into the application callback on delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Stream this sample was written to.
    pub stream_id: StreamId,
    /// Opaque payload bytes (wire encoding is a collaborator concern).
    pub payload: Vec<u8>,
    /// Coherent-set membership; `None` for ordinary samples.
    pub group: Option<CoherentSetInfo>,
    /// 1-based position within this stream's contribution to the group.
    /// `0` for ordinary samples.
    pub sequence_in_group: u64,
    /// Marks the final sample this stream contributes to the group.
    pub last_in_group: bool,
}

impl Sample {
    /// Create a sample belonging to a coherent group.
    #[must_use]
    pub fn grouped(
        stream_id: StreamId,
        payload: Vec<u8>,
        group_id: GroupId,
        sequence_in_group: u64,
        last_in_group: bool,
    ) -> Self {
        Self {
            stream_id,
            payload,
            group: Some(CoherentSetInfo::new(group_id)),
            sequence_in_group,
            last_in_group,
        }
    }

    /// Create an ordinary sample outside any coherent group.
    #[must_use]
    pub fn ungrouped(stream_id: StreamId, payload: Vec<u8>) -> Self {
        Self {
            stream_id,
            payload,
            group: None,
            sequence_in_group: 0,
            last_in_group: false,
        }
    }

    /// Whether this sample belongs to a coherent group.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }

    /// Group id, if this sample belongs to a coherent group.
    #[must_use]
    pub fn group_id(&self) -> Option<GroupId> {
        self.group.map(|info| info.group_id)
    }
}
