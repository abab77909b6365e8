// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 cohort contributors

//! Drop-vs-deliver policy for incomplete coherent sets, transport loss
//! signals and capacity backpressure.

use cohort::{
    CancelToken, Dispatcher, Error, GroupDelivery, GroupId, GroupListener, LossReason, QoS,
    Sample, SampleLostStatus, StreamBuffer, StreamId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const A: StreamId = StreamId(1);
const B: StreamId = StreamId(2);

#[derive(Default)]
struct CaptureListener {
    groups: Mutex<Vec<GroupDelivery>>,
    samples: Mutex<Vec<Sample>>,
    losses: Mutex<Vec<(StreamId, SampleLostStatus)>>,
}

impl GroupListener for CaptureListener {
    fn on_coherent_group(&self, delivery: GroupDelivery) {
        self.groups.lock().push(delivery);
    }

    fn on_sample(&self, sample: Sample) {
        self.samples.lock().push(sample);
    }

    fn on_samples_lost(&self, stream: StreamId, status: SampleLostStatus) {
        self.losses.lock().push((stream, status));
    }
}

fn harness(qos: QoS) -> (Arc<Dispatcher>, Arc<CaptureListener>) {
    let listener = Arc::new(CaptureListener::default());
    let dispatcher = Arc::new(Dispatcher::new(
        qos,
        vec![
            Arc::new(StreamBuffer::with_qos(A, &qos)),
            Arc::new(StreamBuffer::with_qos(B, &qos)),
        ],
        Arc::clone(&listener) as Arc<dyn GroupListener>,
        CancelToken::new(),
    ));
    (dispatcher, listener)
}

fn fast_qos() -> QoS {
    QoS::default().group_coherent().tick(Duration::from_millis(5))
}

fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_drop_policy_counts_every_buffered_sample() {
    let (dispatcher, listener) = harness(fast_qos());
    let loop_thread = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || dispatcher.run())
    };

    // G1 contributes two samples on A, nothing on B.
    dispatcher
        .push(Sample::grouped(A, b"a1".to_vec(), GroupId(1), 1, false))
        .expect("push succeeds");
    dispatcher
        .push(Sample::grouped(A, b"a2".to_vec(), GroupId(1), 2, true))
        .expect("push succeeds");
    // G2 on B invalidates G1.
    dispatcher
        .push(Sample::grouped(B, b"b2".to_vec(), GroupId(2), 1, true))
        .expect("push succeeds");

    assert!(wait_until(Duration::from_secs(5), || {
        !listener.losses.lock().is_empty()
    }));

    let losses = listener.losses.lock();
    assert_eq!(losses[0].0, A);
    assert_eq!(losses[0].1.total_count_change, 2, "both buffered samples");
    assert_eq!(losses[0].1.last_reason, LossReason::IncompleteCoherentSet);
    drop(losses);

    assert!(listener.groups.lock().is_empty(), "nothing delivered");
    let snapshot = dispatcher.loss_reporter().snapshot();
    assert_eq!(snapshot[&A].total_count, 2);
    assert!(!snapshot.contains_key(&B), "B had nothing buffered to drop");

    dispatcher.stop();
    loop_thread
        .join()
        .expect("dispatch thread panicked")
        .expect("run exits cleanly");
}

#[test]
fn test_keep_policy_delivers_partials_tagged_incomplete() {
    let (dispatcher, listener) = harness(fast_qos().keep_incomplete());
    let loop_thread = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || dispatcher.run())
    };

    dispatcher
        .push(Sample::grouped(A, b"a1".to_vec(), GroupId(1), 1, false))
        .expect("push succeeds");
    dispatcher
        .push(Sample::grouped(A, b"a2".to_vec(), GroupId(1), 2, true))
        .expect("push succeeds");
    dispatcher
        .push(Sample::grouped(B, b"b2".to_vec(), GroupId(2), 1, true))
        .expect("push succeeds");

    assert!(wait_until(Duration::from_secs(5), || {
        !listener.groups.lock().is_empty()
    }));

    let groups = listener.groups.lock();
    assert_eq!(groups.len(), 1, "one salvaged slice for stream A");
    let delivery = &groups[0];
    assert!(delivery.incomplete);
    assert_eq!(delivery.group_id, GroupId(1));
    assert_eq!(delivery.streams[&A].len(), 2);
    for sample in &delivery.streams[&A] {
        assert!(
            sample.group.expect("grouped sample").incomplete,
            "salvaged samples tagged incomplete"
        );
    }
    drop(groups);

    assert_eq!(
        dispatcher.loss_reporter().total_lost(),
        0,
        "kept samples are not counted as lost"
    );

    dispatcher.stop();
    loop_thread
        .join()
        .expect("dispatch thread panicked")
        .expect("run exits cleanly");
}

#[test]
fn test_transport_loss_signal_invalidates_and_counts() {
    let (dispatcher, listener) = harness(fast_qos());
    let loop_thread = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || dispatcher.run())
    };

    dispatcher
        .push(Sample::grouped(A, b"a1".to_vec(), GroupId(1), 1, true))
        .expect("push succeeds");
    dispatcher.report_transport_loss(B, 3);

    assert!(wait_until(Duration::from_secs(5), || {
        listener.losses.lock().len() >= 2
    }));

    let snapshot = dispatcher.loss_reporter().snapshot();
    assert_eq!(snapshot[&B].total_count, 3);
    assert_eq!(snapshot[&B].last_reason, LossReason::TransportLoss);
    // G1 could no longer complete; its buffered A sample was dropped.
    assert_eq!(snapshot[&A].total_count, 1);
    assert_eq!(snapshot[&A].last_reason, LossReason::IncompleteCoherentSet);
    assert!(listener.groups.lock().is_empty());

    dispatcher.stop();
    loop_thread
        .join()
        .expect("dispatch thread panicked")
        .expect("run exits cleanly");
}

#[test]
fn test_capacity_backpressure_is_counted_not_silent() {
    let qos = fast_qos().buffer_capacity(2);
    let (dispatcher, listener) = harness(qos);

    dispatcher
        .push(Sample::ungrouped(A, b"s1".to_vec()))
        .expect("below capacity");
    dispatcher
        .push(Sample::ungrouped(A, b"s2".to_vec()))
        .expect("at capacity");
    let err = dispatcher
        .push(Sample::ungrouped(A, b"s3".to_vec()))
        .expect_err("bounded buffer must reject");
    assert!(matches!(err, Error::CapacityExceeded { .. }));

    let loop_thread = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || dispatcher.run())
    };

    assert!(wait_until(Duration::from_secs(5), || {
        !listener.losses.lock().is_empty()
    }));

    let snapshot = dispatcher.loss_reporter().snapshot();
    assert_eq!(snapshot[&A].total_count, 1);
    assert_eq!(snapshot[&A].last_reason, LossReason::CapacityExceeded);
    assert_eq!(
        listener.samples.lock().len(),
        2,
        "accepted samples still delivered"
    );

    dispatcher.stop();
    loop_thread
        .join()
        .expect("dispatch thread panicked")
        .expect("run exits cleanly");
}

#[test]
fn test_grace_period_drops_stalled_group_without_traffic() {
    let qos = fast_qos().grace_period(Duration::from_millis(20));
    let (dispatcher, listener) = harness(qos);
    let loop_thread = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || dispatcher.run())
    };

    // G1 opens on A and then the world goes quiet.
    dispatcher
        .push(Sample::grouped(A, b"a1".to_vec(), GroupId(1), 1, false))
        .expect("push succeeds");

    assert!(
        wait_until(Duration::from_secs(5), || {
            !listener.losses.lock().is_empty()
        }),
        "grace expiry must fire from the tick alone"
    );

    let snapshot = dispatcher.loss_reporter().snapshot();
    assert_eq!(snapshot[&A].total_count, 1);
    assert_eq!(snapshot[&A].last_reason, LossReason::IncompleteCoherentSet);
    assert!(listener.groups.lock().is_empty());

    dispatcher.stop();
    loop_thread
        .join()
        .expect("dispatch thread panicked")
        .expect("run exits cleanly");
}
