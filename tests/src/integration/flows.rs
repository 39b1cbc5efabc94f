//! # Channel Flows
//!
//! Whole channel lifecycles across three peers: discovery, auto-join,
//! chat, host departure and bus shutdown.

#[cfg(test)]
mod tests {
    use session_protocol::{ChannelApi, ChannelState, CoordinatorEvent, SendOutcome};
    use shared_bus::InMemoryRouter;
    use shared_types::entities::WellKnownName;

    use crate::integration::{host_and_discover, test_config, TestPeer, TEST_PREFIX};

    fn lobby() -> WellKnownName {
        WellKnownName::from_prefix(TEST_PREFIX, "lobby").unwrap()
    }

    #[tokio::test]
    async fn test_three_peers_share_one_lobby() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(true));
        let bob = TestPeer::spawn(&router, test_config(true));
        let carol = TestPeer::spawn(&router, test_config(true));

        host_and_discover(&alice, "lobby").await;
        let lobby_id = alice.handle.use_channel(&lobby()).await.unwrap();
        for peer in [&bob, &carol] {
            peer.handle.connect().await.unwrap();
            peer.handle.start_discovery().await.unwrap();
            peer.wait_for("auto-join", |s| s.canonical == Some(lobby_id))
                .await;
        }

        let outcome = bob.handle.send(b"hi".to_vec()).await.unwrap();
        assert_eq!(
            outcome,
            SendOutcome::Sent {
                session_id: lobby_id,
                recipients: 2
            }
        );

        alice.wait_for("alice to deliver", |s| s.messenger.delivered == 1).await;
        carol.wait_for("carol to deliver", |s| s.messenger.delivered == 1).await;
        assert_eq!(alice.payloads(), vec![b"hi".to_vec()]);
        assert_eq!(carol.payloads(), vec![b"hi".to_vec()]);
        assert!(bob.payloads().is_empty());
        assert_eq!(alice.status().await.state, ChannelState::Connected);

        alice.stop().await;
        bob.stop().await;
        carol.stop().await;
    }

    #[tokio::test]
    async fn test_found_then_lost_when_host_stops() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(false));
        let mut bob = TestPeer::spawn(&router, test_config(false));

        host_and_discover(&alice, "lobby").await;
        bob.handle.connect().await.unwrap();
        bob.handle.start_discovery().await.unwrap();

        let found = bob
            .next_event(|e| matches!(e, CoordinatorEvent::PeerFound(_)))
            .await;
        assert!(matches!(found, CoordinatorEvent::PeerFound(ad) if ad.name == lobby()));
        assert!(bob.status().await.joined_sessions.is_empty());

        alice.handle.stop_hosting().await.unwrap();

        let lost = bob
            .next_event(|e| matches!(e, CoordinatorEvent::PeerLost(_)))
            .await;
        assert!(matches!(lost, CoordinatorEvent::PeerLost(ad) if ad.name == lobby()));
        assert!(bob.status().await.found_names.is_empty());

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_host_leaving_ends_the_channel() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(true));
        let mut bob = TestPeer::spawn(&router, test_config(true));

        host_and_discover(&alice, "lobby").await;
        bob.handle.connect().await.unwrap();
        bob.handle.start_discovery().await.unwrap();
        let joined = bob
            .wait_for("bob to join", |s| s.canonical.is_some())
            .await
            .canonical
            .unwrap();

        alice.handle.leave().await.unwrap();

        let lost = bob
            .next_event(|e| matches!(e, CoordinatorEvent::SessionLost { .. }))
            .await;
        assert_eq!(lost, CoordinatorEvent::SessionLost { session_id: joined });
        let status = bob.wait_for("canonical cleared", |s| s.canonical.is_none()).await;
        assert!(status.joined_sessions.is_empty());
        assert_eq!(bob.handle.send(b"anyone?".to_vec()).await.unwrap(), SendOutcome::NoPeers);

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_disconnect_withdraws_advertisement() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(false));
        let mut bob = TestPeer::spawn(&router, test_config(false));

        host_and_discover(&alice, "lobby").await;
        bob.handle.connect().await.unwrap();
        bob.handle.start_discovery().await.unwrap();
        bob.next_event(|e| matches!(e, CoordinatorEvent::PeerFound(_)))
            .await;

        alice.handle.disconnect().await.unwrap();

        bob.next_event(|e| matches!(e, CoordinatorEvent::PeerLost(_)))
            .await;
        let status = alice.status().await;
        assert!(!status.connected);
        assert_eq!(status.hosted_name, None);

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_router_shutdown_stops_every_peer() {
        let router = InMemoryRouter::new();
        let mut alice = TestPeer::spawn(&router, test_config(true));
        let mut bob = TestPeer::spawn(&router, test_config(true));

        host_and_discover(&alice, "lobby").await;
        bob.handle.connect().await.unwrap();
        bob.handle.start_discovery().await.unwrap();
        bob.wait_for("bob to join", |s| s.canonical.is_some()).await;

        router.shutdown();

        for peer in [&mut alice, &mut bob] {
            peer.next_event(|e| matches!(e, CoordinatorEvent::BusStopping))
                .await;
            let status = peer.status().await;
            assert!(!status.connected);
            assert_eq!(status.canonical, None);
            assert!(peer.handle.connect().await.is_err());
        }

        alice.stop().await;
        bob.stop().await;
    }
}
