// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Monotonic group-id issuance for a writer session.

use super::types::GroupId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Issues monotonically increasing [`GroupId`]s to a writer session.
///
/// Ids start at [`GroupId::FIRST`] and never repeat within a session.
/// Thread-safe; a session shared across producer threads still observes
/// strictly increasing ids.
#[derive(Debug)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    /// Create an allocator starting at [`GroupId::FIRST`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(GroupId::FIRST.0),
        }
    }

    /// Allocate the next group id.
    pub fn next_group_id(&self) -> GroupId {
        GroupId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Highest id issued so far, or `None` before the first allocation.
    #[must_use]
    pub fn last_issued(&self) -> Option<GroupId> {
        let next = self.next.load(Ordering::Relaxed);
        if next == GroupId::FIRST.0 {
            None
        } else {
            Some(GroupId(next - 1))
        }
    }
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}
