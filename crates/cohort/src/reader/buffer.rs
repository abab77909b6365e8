// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Per-stream arrival buffer between transport receive and dispatch.
//!
//! # Architecture
//!
//! ```text
//! transport threads          dispatch thread
//!   push() ----+
//!   push() ----+--> [S0][S1][S2][S3] --> drain_not_read()
//!   push() ----+
//! ```
//!
//! Producers append, a single consumer drains; the lock is never held
//! across the application callback. Samples are never reordered or
//! coalesced.

use crate::core::{Error, GroupId, Result, Sample, StreamId};
use crate::qos::QoS;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Arrival-ordered FIFO of not-yet-delivered samples for one stream.
pub struct StreamBuffer {
    stream_id: StreamId,
    /// `None` = unbounded.
    capacity: Option<usize>,
    inner: Mutex<VecDeque<Sample>>,
}

impl StreamBuffer {
    /// Create an unbounded buffer for `stream_id`.
    #[must_use]
    pub fn new(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            capacity: None,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Create a buffer bounded to `capacity` samples.
    ///
    /// A full buffer rejects `push` with [`Error::CapacityExceeded`]; the
    /// caller counts the drop through the loss reporter, it is never
    /// silent.
    #[must_use]
    pub fn with_capacity(stream_id: StreamId, capacity: usize) -> Self {
        Self {
            stream_id,
            capacity: Some(capacity),
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Buffer sized per the session's QoS: bounded iff
    /// [`QoS::buffer_capacity`](crate::QoS) is set.
    #[must_use]
    pub fn with_qos(stream_id: StreamId, qos: &QoS) -> Self {
        match qos.buffer_capacity {
            Some(capacity) => Self::with_capacity(stream_id, capacity),
            None => Self::new(stream_id),
        }
    }

    /// Stream this buffer belongs to.
    #[must_use]
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    /// Append a sample in arrival order. O(1), never blocks on the
    /// consumer (the lock is only held for the append itself).
    pub fn push(&self, sample: Sample) -> Result<()> {
        debug_assert_eq!(sample.stream_id, self.stream_id);

        let mut inner = self.inner.lock();
        if let Some(capacity) = self.capacity {
            if inner.len() >= capacity {
                log::warn!(
                    "[buffer] {} full, rejecting sample (capacity {})",
                    self.stream_id,
                    capacity
                );
                return Err(Error::CapacityExceeded {
                    stream: self.stream_id,
                    capacity,
                });
            }
        }
        inner.push_back(sample);
        Ok(())
    }

    /// Remove and return every buffered sample not yet read, preserving
    /// arrival order.
    #[must_use]
    pub fn drain_not_read(&self) -> Vec<Sample> {
        let mut inner = self.inner.lock();
        inner.drain(..).collect()
    }

    /// Clones of buffered samples carrying `group_id`, without removing
    /// them.
    #[must_use]
    pub fn peek_group_members(&self, group_id: GroupId) -> Vec<Sample> {
        let inner = self.inner.lock();
        inner
            .iter()
            .filter(|s| s.group_id() == Some(group_id))
            .cloned()
            .collect()
    }

    /// Number of buffered samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the buffer holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn sample(stream: StreamId, group: u64, seq: u64, last: bool) -> Sample {
        Sample::grouped(stream, vec![seq as u8], GroupId(group), seq, last)
    }

    #[test]
    fn test_push_drain_preserves_arrival_order() {
        let buf = StreamBuffer::new(StreamId(1));
        for seq in 1..=5 {
            buf.push(sample(StreamId(1), 1, seq, seq == 5))
                .expect("unbounded push succeeds");
        }

        let drained = buf.drain_not_read();
        let seqs: Vec<u64> = drained.iter().map(|s| s.sequence_in_group).collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_drain_removes_only_once() {
        let buf = StreamBuffer::new(StreamId(1));
        buf.push(sample(StreamId(1), 1, 1, true))
            .expect("push succeeds");

        assert_eq!(buf.drain_not_read().len(), 1);
        assert_eq!(buf.drain_not_read().len(), 0);
    }

    #[test]
    fn test_peek_group_members_does_not_remove() {
        let buf = StreamBuffer::new(StreamId(1));
        buf.push(sample(StreamId(1), 1, 1, true))
            .expect("push succeeds");
        buf.push(sample(StreamId(1), 2, 1, false))
            .expect("push succeeds");
        buf.push(Sample::ungrouped(StreamId(1), b"x".to_vec()))
            .expect("push succeeds");

        let members = buf.peek_group_members(GroupId(2));
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].group_id(), Some(GroupId(2)));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_capacity_bound_rejects_when_full() {
        let buf = StreamBuffer::with_capacity(StreamId(2), 2);
        buf.push(sample(StreamId(2), 1, 1, false))
            .expect("below capacity");
        buf.push(sample(StreamId(2), 1, 2, false))
            .expect("at capacity");

        let err = buf
            .push(sample(StreamId(2), 1, 3, true))
            .expect_err("push into full buffer must fail");
        match err {
            Error::CapacityExceeded { stream, capacity } => {
                assert_eq!(stream, StreamId(2));
                assert_eq!(capacity, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Draining frees capacity again.
        assert_eq!(buf.drain_not_read().len(), 2);
        buf.push(sample(StreamId(2), 1, 3, true))
            .expect("push after drain succeeds");
    }

    #[test]
    fn test_concurrent_producers_single_consumer() {
        let buf = Arc::new(StreamBuffer::new(StreamId(3)));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let buf = Arc::clone(&buf);
            handles.push(thread::spawn(move || {
                for seq in 0..100u64 {
                    buf.push(Sample::grouped(
                        StreamId(3),
                        Vec::new(),
                        GroupId(t + 1),
                        seq + 1,
                        false,
                    ))
                    .expect("unbounded push succeeds");
                }
            }));
        }
        for h in handles {
            h.join().expect("producer thread panicked");
        }

        assert_eq!(buf.drain_not_read().len(), 400);
    }
}
