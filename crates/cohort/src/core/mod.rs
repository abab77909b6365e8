// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Core data model: identifiers, samples, group-id allocation, errors.

pub mod sequence;
pub mod types;

pub use sequence::SequenceAllocator;
pub use types::{CoherentSetInfo, GroupId, Sample, StreamId};

/// Errors returned by cohort operations.
///
/// Recoverable *conditions* are deliberately not in this enum: duplicate
/// samples are logged and ignored, and incomplete coherent sets are
/// reported through the [`LossReporter`](crate::LossReporter) rather than
/// raised as errors.
#[derive(Debug)]
pub enum Error {
    /// Writer protocol violated: nested `begin_coherent_group()` or
    /// `end_coherent_group()` without an open group. Fatal to the call,
    /// never retried internally.
    Protocol(String),
    /// A capacity-bounded stream buffer was full; the sample was dropped
    /// and counted through the loss reporter.
    CapacityExceeded {
        /// Stream whose buffer rejected the sample.
        stream: StreamId,
        /// Configured capacity of that buffer.
        capacity: usize,
    },
    /// Invalid state for the requested operation (e.g. `run()` on a
    /// dispatcher that already ran).
    InvalidState(String),
    /// A bounded wait elapsed without data. Internal; the dispatcher
    /// treats this as an ordinary tick, not a failure.
    WouldBlock,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Protocol(msg) => write!(f, "Coherency protocol error: {}", msg),
            Error::CapacityExceeded { stream, capacity } => {
                write!(f, "Buffer for {} full (capacity {})", stream, capacity)
            }
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::WouldBlock => write!(f, "Operation would block"),
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for API results using the public [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::CapacityExceeded {
            stream: StreamId(3),
            capacity: 16,
        };
        assert_eq!(err.to_string(), "Buffer for stream#3 full (capacity 16)");

        let err = Error::Protocol("nested begin_coherent_group".to_string());
        assert!(err.to_string().contains("nested begin_coherent_group"));
    }
}
