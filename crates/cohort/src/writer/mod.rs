// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Writer-side coherent-group bracketing.
//!
//! A [`CoherentWriter`] lets a publisher bracket writes across any number
//! of streams into one coherent set. Writes inside the bracket are staged
//! and stamped with the group id plus a per-stream running sequence;
//! `end_coherent_group()` marks each touched stream's final sample,
//! releases the whole set to the [`TransportSink`] and flushes it exactly
//! once. Writes outside a bracket pass straight through as ordinary
//! samples.

use crate::core::{Error, GroupId, Result, Sample, SequenceAllocator, StreamId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Outgoing seam to the delivery substrate.
///
/// The engine assumes the sink is reliable and order-preserving per
/// stream; retransmission is not this crate's concern.
pub trait TransportSink: Send + Sync {
    /// Hand one sample to the transport. Must not block the writer.
    fn publish(&self, sample: Sample);

    /// Push everything staged by the transport onto the wire.
    fn flush(&self);
}

/// State of one open coherent group.
struct OpenGroup {
    id: GroupId,
    /// Staged writes in emission order, across all touched streams.
    pending: Vec<Sample>,
    /// Next in-group sequence per touched stream (1-based).
    next_seq: BTreeMap<StreamId, u64>,
}

/// Publisher-side session bracketing writes into coherent sets.
///
/// # Example
///
/// ```ignore
/// let writer = CoherentWriter::new(sink);
/// writer.begin_coherent_group()?;
/// writer.write(time_stream, b"t1".to_vec());
/// writer.write(place_stream, b"p1".to_vec());
/// writer.end_coherent_group()?;  // set released + flushed atomically
/// ```
pub struct CoherentWriter {
    sink: Arc<dyn TransportSink>,
    groups: SequenceAllocator,
    session: Mutex<Option<OpenGroup>>,
    groups_written: AtomicU64,
}

impl CoherentWriter {
    /// Create a writer publishing through `sink`.
    pub fn new(sink: Arc<dyn TransportSink>) -> Self {
        Self {
            sink,
            groups: SequenceAllocator::new(),
            session: Mutex::new(None),
            groups_written: AtomicU64::new(0),
        }
    }

    /// Open a coherent group and return its id.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if a group is already open; nesting is
    /// forbidden and fatal to the call, the open group stays intact.
    pub fn begin_coherent_group(&self) -> Result<GroupId> {
        let mut session = self.session.lock();
        if let Some(open) = session.as_ref() {
            return Err(Error::Protocol(format!(
                "begin_coherent_group while {} is open (nesting forbidden)",
                open.id
            )));
        }

        let id = self.groups.next_group_id();
        log::debug!("[writer] begin {}", id);
        *session = Some(OpenGroup {
            id,
            pending: Vec::new(),
            next_seq: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Write one payload to `stream`.
    ///
    /// Inside an open group the sample is staged and stamped; it reaches
    /// the transport only on `end_coherent_group()`. Outside any group it
    /// is published immediately as an ordinary sample. Never blocks.
    pub fn write(&self, stream: StreamId, payload: Vec<u8>) {
        let mut session = self.session.lock();
        match session.as_mut() {
            Some(open) => {
                let seq = open.next_seq.entry(stream).or_insert(0);
                *seq += 1;
                open.pending
                    .push(Sample::grouped(stream, payload, open.id, *seq, false));
            }
            None => {
                self.sink.publish(Sample::ungrouped(stream, payload));
            }
        }
    }

    /// Close the open group: mark each touched stream's final sample,
    /// release the set to the transport and flush exactly once.
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] if no group is open.
    pub fn end_coherent_group(&self) -> Result<()> {
        let mut open = self
            .session
            .lock()
            .take()
            .ok_or_else(|| Error::Protocol("end_coherent_group without an open group".into()))?;

        // The last staged write per stream closes that stream's
        // contribution.
        let mut closed: HashSet<StreamId> = HashSet::new();
        for sample in open.pending.iter_mut().rev() {
            if closed.insert(sample.stream_id) {
                sample.last_in_group = true;
            }
        }

        let sample_count = open.pending.len();
        for sample in open.pending {
            self.sink.publish(sample);
        }
        self.sink.flush();
        self.groups_written.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "[writer] end {} ({} sample(s) on {} stream(s))",
            open.id,
            sample_count,
            closed.len()
        );
        Ok(())
    }

    /// Whether a coherent group is currently open.
    #[must_use]
    pub fn in_coherent_group(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Number of coherent groups released so far.
    #[must_use]
    pub fn groups_written(&self) -> u64 {
        self.groups_written.load(Ordering::Relaxed)
    }
}
