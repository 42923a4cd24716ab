//! Benchmarks for measurement coordination

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rocktimer_core::{CheckpointEvent, CheckpointId, Source, TimestampNs};
use rocktimer_runtime::{Inbound, NodeConfig, TimerNode};
use rocktimer_state::{HistoryStore, MeasurementCoordinator};
use rocktimer_time::ManualClock;
use rocktimer_wire::WireMessage;

const TEE: u64 = 1_700_000_000_000_000_000;
const HOG_CLOSE: u64 = TEE + 3_120_000_000;
const HOG_FAR: u64 = HOG_CLOSE + 10_450_000_000;

fn remote() -> Source {
    Source::Remote(SocketAddr::from(([10, 0, 0, 2], 5000)))
}

fn pass_events() -> [CheckpointEvent; 3] {
    [
        CheckpointEvent::at(CheckpointId::Tee, TimestampNs::from_nanos(TEE), remote()),
        CheckpointEvent::at(CheckpointId::HogClose, TimestampNs::from_nanos(HOG_CLOSE), remote()),
        CheckpointEvent::at(CheckpointId::HogFar, TimestampNs::from_nanos(HOG_FAR), remote()),
    ]
}

fn bench_coordinator_full_pass(c: &mut Criterion) {
    let mut coordinator = MeasurementCoordinator::new(Arc::new(ManualClock::at_epoch()));
    let events = pass_events();

    c.bench_function("coordinator_full_pass", |b| {
        b.iter(|| {
            coordinator.arm();
            for event in &events {
                black_box(coordinator.handle_trigger(black_box(event)));
            }
            coordinator.drain_announcements()
        })
    });
}

fn bench_coordinator_idle_drop(c: &mut Criterion) {
    let mut coordinator = MeasurementCoordinator::new(Arc::new(ManualClock::at_epoch()));
    let event = CheckpointEvent::at(CheckpointId::HogClose, TimestampNs::from_nanos(HOG_CLOSE), remote());

    c.bench_function("coordinator_idle_drop", |b| {
        b.iter(|| coordinator.handle_trigger(black_box(&event)))
    });
}

fn bench_history_full_list(c: &mut Criterion) {
    let mut coordinator = MeasurementCoordinator::new(Arc::new(ManualClock::at_epoch()));
    let events = pass_events();
    for _ in 0..200 {
        coordinator.arm();
        for event in &events {
            coordinator.handle_trigger(event);
        }
    }
    let history: &HistoryStore = coordinator.history();

    c.bench_function("history_list_50", |b| {
        b.iter(|| black_box(history.list(black_box(50))))
    });
}

fn bench_node_ingest_pass(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::at_epoch());
    let node = TimerNode::new(
        NodeConfig {
            liveness_timeout: Duration::from_secs(10),
            local_checkpoint: None,
        },
        clock.clone(),
        None,
    );
    let _observer = node.subscribe();
    let messages = [
        WireMessage::trigger("tee", TimestampNs::from_nanos(TEE)),
        WireMessage::trigger("hog_close", TimestampNs::from_nanos(HOG_CLOSE)),
        WireMessage::trigger("hog_far", TimestampNs::from_nanos(HOG_FAR)),
    ];

    c.bench_function("node_ingest_pass", |b| {
        b.iter(|| {
            node.arm();
            for message in &messages {
                black_box(node.ingest(Inbound::new(message.clone(), remote())));
            }
            clock.advance(Duration::from_millis(1));
        })
    });
}

fn bench_node_heartbeat(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::at_epoch());
    let node = TimerNode::new(NodeConfig::default(), clock, None);
    let heartbeat = WireMessage::heartbeat("tee");

    c.bench_function("node_heartbeat", |b| {
        b.iter(|| node.ingest(Inbound::new(black_box(heartbeat.clone()), remote())))
    });
}

criterion_group!(
    benches,
    bench_coordinator_full_pass,
    bench_coordinator_idle_drop,
    bench_history_full_list,
    bench_node_ingest_pass,
    bench_node_heartbeat,
);
criterion_main!(benches);
