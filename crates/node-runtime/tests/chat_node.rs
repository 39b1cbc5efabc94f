//! End-to-end chat over the in-process router.

use std::time::Duration;

use node_runtime::{NodeConfig, NodeRuntime};
use session_protocol::{ChannelApi, SendOutcome};
use tokio::time::{sleep, timeout};

async fn wait_for_canonical(runtime: &NodeRuntime, nickname: &str) {
    let peer = runtime.peer(nickname).unwrap();
    timeout(Duration::from_secs(2), async {
        loop {
            if peer.status().await.unwrap().canonical.is_some() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{nickname} never joined a channel"));
}

async fn wait_for_lines(runtime: &NodeRuntime, nickname: &str, count: usize) {
    let peer = runtime.peer(nickname).unwrap();
    timeout(Duration::from_secs(2), async {
        while peer.history().lines().len() < count {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{nickname} never received {count} lines"));
}

#[tokio::test]
async fn test_default_node_chats() {
    let runtime = NodeRuntime::new(NodeConfig::default()).unwrap();
    runtime.start().await.unwrap();
    wait_for_canonical(&runtime, "bob").await;
    wait_for_canonical(&runtime, "carol").await;

    let outcome = runtime.say("bob", "hi").await.unwrap();
    assert!(matches!(outcome, SendOutcome::Sent { .. }));

    wait_for_lines(&runtime, "alice", 1).await;
    wait_for_lines(&runtime, "carol", 1).await;

    let bob = runtime.peer("bob").unwrap().handle().unique_name().short().to_string();
    let alice_lines = runtime.peer("alice").unwrap().history().lines();
    assert_eq!(alice_lines[0].from, bob);
    assert_eq!(alice_lines[0].text, "hi");

    let bob_lines = runtime.peer("bob").unwrap().history().lines();
    assert_eq!(bob_lines.len(), 1);
    assert_eq!(bob_lines[0].from, "Me");

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_say_from_unknown_peer_fails() {
    let runtime = NodeRuntime::new(NodeConfig::default()).unwrap();
    runtime.start().await.unwrap();

    let result = runtime.say("mallory", "hi").await;
    assert!(matches!(result, Err(node_runtime::NodeError::UnknownPeer(name)) if name == "mallory"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_releases_names() {
    let runtime = NodeRuntime::new(NodeConfig::default()).unwrap();
    runtime.start().await.unwrap();
    wait_for_canonical(&runtime, "bob").await;

    let alice = runtime.peer("alice").unwrap().handle().clone();
    assert!(alice.status().await.unwrap().hosted_name.is_some());
    alice.leave().await.unwrap();
    let status = alice.status().await.unwrap();
    assert!(status.hosted_name.is_none());
    assert!(status.joined_sessions.is_empty());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let mut config = NodeConfig::default();
    config.peers.clear();
    assert!(NodeRuntime::new(config).is_err());
}
