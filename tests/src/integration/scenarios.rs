//! # Protocol Properties
//!
//! Each test runs real coordinator workers against one router:
//!
//! 1. **Own advertisement**: our own `found` never triggers a join
//! 2. **Self echo**: our own signals never reach our handler
//! 3. **Cross-channel isolation**: with `Sa ≠ Sa'`, each peer only takes
//!    traffic on the session it joined last
//! 4. **Teardown ordering**: no joiner is admitted once unbind returns
//! 5. **Name conflict**: a held name fails fast, never queues
//! 6. **Leave then unbind**: both succeed, repeat leaves are no-ops

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use session_protocol::{ChannelApi, ChannelConfig, CoordinatorEvent, ProtocolError, SendOutcome};
    use shared_bus::InMemoryRouter;
    use shared_types::entities::{SessionPort, WellKnownName};
    use shared_types::policy::{AcceptAll, AcceptPolicy};
    use tokio::time::{sleep, timeout};

    use crate::integration::{host_and_discover, test_config, TestPeer, TEST_PREFIX};

    fn name(instance: &str) -> WellKnownName {
        WellKnownName::from_prefix(TEST_PREFIX, instance).unwrap()
    }

    // =========================================================================
    // DISCOVERY
    // =========================================================================

    #[tokio::test]
    async fn test_own_advertisement_never_joins() {
        let router = InMemoryRouter::new();
        let mut alice = TestPeer::spawn(&router, test_config(true));

        host_and_discover(&alice, "chatA").await;

        let found = alice
            .next_event(|e| matches!(e, CoordinatorEvent::PeerFound(_)))
            .await;
        assert!(matches!(found, CoordinatorEvent::PeerFound(ad) if ad.name == name("chatA")));

        let status = alice.status().await;
        assert!(status.joined_sessions.is_empty());
        assert_eq!(status.canonical, None);
        assert_eq!(status.found_names, vec![name("chatA")]);
        assert!(!alice
            .drain_events()
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::JoinFailed { .. })));

        alice.stop().await;
    }

    // =========================================================================
    // SIGNAL FILTERS
    // =========================================================================

    #[tokio::test]
    async fn test_self_echo_is_suppressed_on_self_joined_channel() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(true));
        let bob = TestPeer::spawn(&router, test_config(true));

        host_and_discover(&alice, "lobby").await;
        alice.handle.use_channel(&name("lobby")).await.unwrap();
        bob.handle.connect().await.unwrap();
        bob.handle.start_discovery().await.unwrap();
        bob.wait_for("bob to join", |s| s.canonical.is_some()).await;

        // Alice holds two endpoints, so one copy comes back to her.
        let outcome = alice.handle.send(b"ping".to_vec()).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Sent { recipients: 2, .. }));

        alice
            .wait_for("the echo to be dropped", |s| s.messenger.dropped_self_echo == 1)
            .await;
        bob.wait_for("bob to deliver", |s| s.messenger.delivered == 1).await;
        assert!(alice.payloads().is_empty());
        assert_eq!(bob.payloads(), vec![b"ping".to_vec()]);

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_mutual_join_keeps_sessions_apart() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(true));
        let bob = TestPeer::spawn(&router, test_config(true));

        host_and_discover(&alice, "chatA").await;
        host_and_discover(&bob, "chatB").await;

        let both = |s: &session_protocol::ChannelStatus| {
            s.canonical.is_some() && !s.routing_sessions.is_empty()
        };
        let a = alice.wait_for("alice to settle", both).await;
        let b = bob.wait_for("bob to settle", both).await;

        // Sa: alice joined bob. Sb: bob joined alice.
        let sa = a.canonical.unwrap();
        let sb = b.canonical.unwrap();
        assert_ne!(sa, sb);
        assert_eq!(a.routing_sessions, vec![sb]);
        assert_eq!(b.routing_sessions, vec![sa]);

        let outcome = alice.handle.send(b"from alice".to_vec()).await.unwrap();
        assert_eq!(
            outcome,
            SendOutcome::Sent {
                session_id: sa,
                recipients: 1
            }
        );
        bob.wait_for("bob to filter", |s| s.messenger.dropped_cross_channel == 1)
            .await;

        let outcome = bob.handle.send(b"from bob".to_vec()).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Sent { session_id, .. } if session_id == sb));
        alice
            .wait_for("alice to filter", |s| s.messenger.dropped_cross_channel == 1)
            .await;

        assert!(alice.payloads().is_empty());
        assert!(bob.payloads().is_empty());

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_hosted_traffic_dropped_while_using_other_channel() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(false));
        let bob = TestPeer::spawn(&router, test_config(false));
        let carol = TestPeer::spawn(&router, test_config(false));

        // Alice hosts chatA but uses bob's chatB; carol joins chatA.
        host_and_discover(&alice, "chatA").await;
        host_and_discover(&bob, "chatB").await;
        bob.handle.use_channel(&name("chatB")).await.unwrap();
        carol.handle.connect().await.unwrap();
        alice.handle.use_channel(&name("chatB")).await.unwrap();
        carol.handle.use_channel(&name("chatA")).await.unwrap();
        alice
            .wait_for("carol to arrive", |s| !s.routing_sessions.is_empty())
            .await;

        carol.handle.send(b"on chatA".to_vec()).await.unwrap();
        bob.handle.send(b"on chatB".to_vec()).await.unwrap();

        let status = alice
            .wait_for("both signals", |s| {
                s.messenger.delivered + s.messenger.dropped_cross_channel == 2
            })
            .await;
        assert_eq!(status.messenger.delivered, 1);
        assert_eq!(status.messenger.dropped_cross_channel, 1);
        assert_eq!(alice.payloads(), vec![b"on chatB".to_vec()]);

        alice.stop().await;
        bob.stop().await;
        carol.stop().await;
    }

    #[tokio::test]
    async fn test_used_channel_replaces_auto_joined_one() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(true));
        let bob = TestPeer::spawn(
            &router,
            ChannelConfig {
                name_prefix: "x.z".to_string(),
                auto_join: false,
                ..ChannelConfig::default()
            },
        );
        let carol = TestPeer::spawn(&router, test_config(true));
        let side = WellKnownName::parse("x.z.side").unwrap();

        host_and_discover(&alice, "lobby").await;
        alice.handle.use_channel(&name("lobby")).await.unwrap();
        bob.handle.connect().await.unwrap();
        bob.handle.host_channel("side").await.unwrap();
        bob.handle.use_channel(&side).await.unwrap();

        carol.handle.connect().await.unwrap();
        carol.handle.start_discovery().await.unwrap();
        let lobby_id = carol
            .wait_for("carol to auto-join", |s| s.canonical.is_some())
            .await
            .canonical
            .unwrap();

        let used = carol.handle.use_channel(&side).await.unwrap();
        assert_ne!(used, lobby_id);
        assert_eq!(carol.status().await.canonical, Some(used));

        let outcome = carol.handle.send(b"hello side".to_vec()).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Sent { session_id, .. } if session_id == used));
        bob.wait_for("bob to deliver", |s| s.messenger.delivered == 1).await;
        assert_eq!(bob.payloads(), vec![b"hello side".to_vec()]);

        bob.handle.send(b"back".to_vec()).await.unwrap();
        alice.handle.send(b"lobby chatter".to_vec()).await.unwrap();
        carol
            .wait_for("both signals", |s| {
                s.messenger.delivered == 1 && s.messenger.dropped_cross_channel == 1
            })
            .await;
        assert_eq!(carol.payloads(), vec![b"back".to_vec()]);
        assert!(alice.payloads().is_empty());

        alice.stop().await;
        bob.stop().await;
        carol.stop().await;
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    #[tokio::test]
    async fn test_no_joiner_admitted_after_unbind() {
        let router = InMemoryRouter::new();
        let mut alice = TestPeer::spawn(&router, test_config(false));
        let bob = TestPeer::spawn(&router, test_config(false));
        let policy: Arc<dyn AcceptPolicy> = Arc::new(AcceptAll);

        alice.handle.connect().await.unwrap();
        bob.handle.connect().await.unwrap();
        alice.handle.request_name(name("solo")).await.unwrap();
        let port = alice
            .handle
            .bind_port(SessionPort::new(77), policy)
            .await
            .unwrap();
        alice.handle.unbind_port(port).await.unwrap();

        let result = bob.handle.join_session(name("solo"), port).await;
        assert!(matches!(result, Err(ProtocolError::Unreachable(_))));

        sleep(Duration::from_millis(20)).await;
        assert!(!alice
            .drain_events()
            .iter()
            .any(|e| matches!(e, CoordinatorEvent::SessionJoined { .. })));
        assert!(alice.status().await.routing_sessions.is_empty());

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_channel_unreachable_after_leave() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(false));
        let bob = TestPeer::spawn(&router, test_config(false));

        host_and_discover(&alice, "chatA").await;
        bob.handle.connect().await.unwrap();
        alice.handle.leave().await.unwrap();

        let result = bob.handle.use_channel(&name("chatA")).await;
        assert!(matches!(result, Err(ProtocolError::Unreachable(_))));
        assert!(alice.status().await.routing_sessions.is_empty());

        alice.stop().await;
        bob.stop().await;
    }

    #[tokio::test]
    async fn test_leave_then_unbind() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(false));
        let mut bob = TestPeer::spawn(&router, test_config(false));
        let policy: Arc<dyn AcceptPolicy> = Arc::new(AcceptAll);

        alice.handle.connect().await.unwrap();
        bob.handle.connect().await.unwrap();
        alice.handle.request_name(name("host")).await.unwrap();
        let port = alice
            .handle
            .bind_port(SessionPort::new(77), policy)
            .await
            .unwrap();
        let session = bob.handle.join_session(name("host"), port).await.unwrap();
        alice
            .wait_for("the joiner", |s| s.routing_sessions.contains(&session))
            .await;

        alice.handle.leave_session(session).await.unwrap();
        alice.handle.unbind_port(port).await.unwrap();
        alice.handle.leave_session(session).await.unwrap();

        let lost = bob
            .next_event(|e| matches!(e, CoordinatorEvent::SessionLost { .. }))
            .await;
        assert_eq!(lost, CoordinatorEvent::SessionLost { session_id: session });
        assert!(alice.status().await.routing_sessions.is_empty());

        alice.stop().await;
        bob.stop().await;
    }

    // =========================================================================
    // NAMES
    // =========================================================================

    #[tokio::test]
    async fn test_name_conflict_fails_fast() {
        let router = InMemoryRouter::new();
        let alice = TestPeer::spawn(&router, test_config(false));
        let bob = TestPeer::spawn(&router, test_config(false));
        alice.handle.connect().await.unwrap();
        bob.handle.connect().await.unwrap();

        alice.handle.request_name(name("n")).await.unwrap();

        let theirs = timeout(Duration::from_millis(100), bob.handle.request_name(name("n")))
            .await
            .unwrap();
        assert_eq!(theirs, Err(ProtocolError::NameConflict(name("n"))));

        let again = timeout(Duration::from_millis(100), alice.handle.request_name(name("n")))
            .await
            .unwrap();
        assert_eq!(again, Err(ProtocolError::NameConflict(name("n"))));

        // A second host under the same instance is refused as well.
        let hosting = bob.handle.host_channel("n").await;
        assert!(matches!(hosting, Err(ProtocolError::NameConflict(_))));
        assert_eq!(bob.status().await.hosted_name, None);

        alice.stop().await;
        bob.stop().await;
    }
}
