// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Tracker ingest throughput: complete two-stream coherent sets.

use cohort::{CoherencyTracker, GroupId, LossReporter, QoS, Sample, StreamId};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::sync::Arc;

const A: StreamId = StreamId(1);
const B: StreamId = StreamId(2);
const GROUPS: u64 = 1_000;

fn complete_groups(payload_len: usize) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(GROUPS as usize * 2);
    for group in 1..=GROUPS {
        let payload: Vec<u8> = (0..payload_len).map(|_| fastrand::u8(..)).collect();
        samples.push(Sample::grouped(A, payload.clone(), GroupId(group), 1, true));
        samples.push(Sample::grouped(B, payload, GroupId(group), 1, true));
    }
    samples
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_ingest");
    group.throughput(criterion::Throughput::Elements(GROUPS));

    for payload_len in [16usize, 256] {
        group.bench_function(format!("complete_sets_{payload_len}B"), |b| {
            b.iter_batched(
                || complete_groups(payload_len),
                |samples| {
                    let loss = Arc::new(LossReporter::new());
                    let mut tracker = CoherencyTracker::new(
                        QoS::default().group_coherent(),
                        [A, B],
                        loss,
                    );
                    let mut events = Vec::new();
                    for sample in samples {
                        tracker.ingest(sample, &mut events);
                    }
                    black_box(events)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
