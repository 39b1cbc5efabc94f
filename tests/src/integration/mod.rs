//! # Integration Fixtures
//!
//! A [`TestPeer`] is a coordinator worker on its own attachment, with an
//! event subscription and a log of every signal its handler received.

pub mod flows;
pub mod scenarios;

use std::sync::Arc;
use std::time::Duration;

use node_runtime::adapters::InMemoryBusAdapter;
use parking_lot::Mutex;
use session_protocol::{
    spawn, ChannelApi, ChannelConfig, ChannelStatus, CoordinatorEvent, CoordinatorHandle,
    SessionCoordinator, SignalTable,
};
use shared_bus::InMemoryRouter;
use shared_types::ipc::InboundSignal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Prefix every test channel lives under.
pub const TEST_PREFIX: &str = "x.y";

/// Upper bound on any wait for cross-peer progress.
pub const SETTLE: Duration = Duration::from_secs(2);

/// Channel settings for tests: prefix `x.y`, contact port 42.
pub fn test_config(auto_join: bool) -> ChannelConfig {
    ChannelConfig {
        name_prefix: TEST_PREFIX.to_string(),
        auto_join,
        ..ChannelConfig::default()
    }
}

/// One peer under test.
pub struct TestPeer {
    pub handle: CoordinatorHandle,
    pub events: broadcast::Receiver<CoordinatorEvent>,
    pub received: Arc<Mutex<Vec<InboundSignal>>>,
    pub worker: JoinHandle<()>,
}

impl TestPeer {
    /// Attach to `router` and start a worker. Panics on bad config.
    pub fn spawn(router: &InMemoryRouter, config: ChannelConfig) -> Self {
        let (attachment, notifications) = router.attach();
        let runtime = Arc::new(InMemoryBusAdapter::new(attachment));
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);
        let signals = SignalTable::new()
            .with(
                config.interface.clone(),
                config.member.clone(),
                move |signal: &InboundSignal| log.lock().push(signal.clone()),
            )
            .unwrap();
        let coordinator = SessionCoordinator::new(runtime, config)
            .unwrap()
            .with_signals(signals);
        let (handle, worker) = spawn(coordinator, notifications);
        let events = handle.subscribe();
        Self {
            handle,
            events,
            received,
            worker,
        }
    }

    /// Status snapshot.
    pub async fn status(&self) -> ChannelStatus {
        self.handle.status().await.unwrap()
    }

    /// Poll status until `done` holds.
    pub async fn wait_for(&self, what: &str, done: impl Fn(&ChannelStatus) -> bool) -> ChannelStatus {
        timeout(SETTLE, async {
            loop {
                let status = self.status().await;
                if done(&status) {
                    return status;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
    }

    /// Next event matching `wanted`, skipping others.
    pub async fn next_event(&mut self, wanted: impl Fn(&CoordinatorEvent) -> bool) -> CoordinatorEvent {
        timeout(SETTLE, async {
            loop {
                let event = self.events.recv().await.unwrap();
                if wanted(&event) {
                    return event;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("expected event never arrived"))
    }

    /// Drain events already published without waiting.
    pub fn drain_events(&mut self) -> Vec<CoordinatorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Payloads the handler received, in order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.received.lock().iter().map(|s| s.payload.clone()).collect()
    }

    /// Stop the worker.
    pub async fn stop(self) {
        self.handle.shutdown();
        self.worker.await.unwrap();
    }
}

/// Connect, host `instance`, start discovery.
pub async fn host_and_discover(peer: &TestPeer, instance: &str) {
    peer.handle.connect().await.unwrap();
    peer.handle.host_channel(instance).await.unwrap();
    peer.handle.start_discovery().await.unwrap();
}
