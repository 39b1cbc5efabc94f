//! # Peerlink Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | Router | Signal fan-out per session size |
//! | Router | Multipoint join + leave |
//! | Messenger | Inbound filter + dispatch |
//! | Names | Well-known name validation |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use session_protocol::{MulticastMessenger, SignalTable, DEFAULT_INTERFACE, DEFAULT_MEMBER};
use shared_bus::{BusAttachment, InMemoryRouter, NotificationStream};
use shared_types::entities::{BusId, SessionId, SessionPort, WellKnownName};
use shared_types::ipc::{Disposition, InboundSignal};
use shared_types::policy::{AcceptAll, AcceptPolicy};
use shared_types::session::{SessionOptions, TransportMask};

const PORT: SessionPort = SessionPort::new(42);

/// Host plus `joiners` peers in one multipoint session.
fn multipoint_session(
    router: &InMemoryRouter,
    joiners: usize,
) -> (BusAttachment, SessionId, Vec<NotificationStream>) {
    let options = SessionOptions::multipoint_messages();
    let policy: Arc<dyn AcceptPolicy> = Arc::new(AcceptAll);
    let host_name = WellKnownName::parse("org.peerlink.bench.host").unwrap();

    let (host, host_stream) = router.attach();
    assert_eq!(host.connect(), Disposition::Success);
    assert_eq!(host.request_name(&host_name), Disposition::Success);
    assert_eq!(host.advertise_name(&host_name, TransportMask::ANY), Disposition::Success);
    host.bind_session_port(PORT, options, policy).unwrap();

    let mut streams = vec![host_stream];
    let mut session = None;
    for _ in 0..joiners {
        let (peer, stream) = router.attach();
        assert_eq!(peer.connect(), Disposition::Success);
        session = Some(peer.join_session(&host_name, PORT, &options).unwrap());
        streams.push(stream);
    }
    (host, session.unwrap(), streams)
}

fn drain(streams: &mut [NotificationStream]) {
    for stream in streams {
        while let Ok(Some(_)) = stream.try_recv() {}
    }
}

// ============================================================================
// ROUTER
// ============================================================================

fn bench_signal_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("router-signal-fan-out");
    group.measurement_time(Duration::from_secs(5));

    for joiners in [1, 4, 16, 64] {
        let router = InMemoryRouter::new();
        let (host, session, mut streams) = multipoint_session(&router, joiners);
        let payload = vec![0u8; 128];

        group.throughput(Throughput::Elements(joiners as u64));
        group.bench_with_input(BenchmarkId::new("emit", joiners), &joiners, |b, _| {
            b.iter(|| {
                let delivered = host
                    .emit_signal(session, DEFAULT_INTERFACE, DEFAULT_MEMBER, &payload)
                    .unwrap();
                drain(&mut streams);
                black_box(delivered)
            })
        });
    }
    group.finish();
}

fn bench_join_leave(c: &mut Criterion) {
    let router = InMemoryRouter::new();
    let (_host, _session, mut streams) = multipoint_session(&router, 1);
    let host_name = WellKnownName::parse("org.peerlink.bench.host").unwrap();
    let options = SessionOptions::multipoint_messages();
    let (peer, peer_stream) = router.attach();
    assert_eq!(peer.connect(), Disposition::Success);
    streams.push(peer_stream);

    c.bench_function("router-join-leave", |b| {
        b.iter(|| {
            let session = peer.join_session(&host_name, PORT, &options).unwrap();
            black_box(peer.leave_session(session));
            drain(&mut streams);
        })
    });
}

// ============================================================================
// MESSENGER
// ============================================================================

fn bench_inbound_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("messenger-inbound");
    let local = BusId::new("bench", 1);
    let remote = BusId::new("bench", 2);
    let canonical = SessionId::new(7);
    let signals = SignalTable::new()
        .with(DEFAULT_INTERFACE, DEFAULT_MEMBER, |signal: &InboundSignal| {
            black_box(signal.payload.len());
        })
        .unwrap();
    let mut messenger = MulticastMessenger::new(DEFAULT_INTERFACE, DEFAULT_MEMBER, signals);

    let signal = |sender: &BusId, session_id: SessionId| InboundSignal {
        sender: sender.clone(),
        session_id,
        interface: DEFAULT_INTERFACE.to_string(),
        member: DEFAULT_MEMBER.to_string(),
        payload: b"{\"text\":\"hi\"}".to_vec(),
    };
    let delivered = signal(&remote, canonical);
    let cross = signal(&remote, SessionId::new(8));
    let echo = signal(&local, canonical);

    for (label, inbound) in [("delivered", &delivered), ("cross_channel", &cross), ("self_echo", &echo)] {
        group.bench_function(label, |b| {
            b.iter(|| black_box(messenger.on_receive(inbound, Some(canonical), &local)))
        });
    }
    group.finish();
}

// ============================================================================
// NAMES
// ============================================================================

fn bench_name_validation(c: &mut Criterion) {
    c.bench_function("well-known-name-parse", |b| {
        b.iter(|| black_box(WellKnownName::parse(black_box("org.peerlink.chat.lobby")).is_ok()))
    });
}

criterion_group!(
    benches,
    bench_signal_fan_out,
    bench_join_leave,
    bench_inbound_filter,
    bench_name_validation
);
criterion_main!(benches);
