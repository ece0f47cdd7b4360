//! End-to-end tests of the claim protocol across several nodes.
//!
//! Nodes share one [`LocalNetwork`] and one [`ManualClock`]. Nothing is
//! delivered until a test pumps the network, so every step is deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use commandeer::locality::{
    ClaimConfig, ClaimCoordinator, ClaimError, ClaimInterceptor, ClaimProtocolHandler,
    ConflictSignal, Delivery, DispatchError, Disposition, InboundMessage, LocalNetwork,
    ManualClock, MessageCatalog, NodeLifecycle, ProtocolMessage,
};
use commandeer::types::{CommandTypeId, QueueAddress};

const PLACE_ORDER: &str = "Shop.PlaceOrder";
const CANCEL_ORDER: &str = "Shop.CancelOrder";
const ORDER_PLACED: &str = "Shop.OrderPlaced";

struct Node {
    queue: String,
    coordinator: Arc<ClaimCoordinator>,
    interceptor: ClaimInterceptor,
    protocol: ClaimProtocolHandler,
    lifecycle: NodeLifecycle,
}

impl Node {
    fn new(network: &LocalNetwork, clock: &ManualClock, queue: &str) -> Self {
        let config = ClaimConfig::new("shop", queue)
            .with_claim_threshold(3)
            .with_expire_conflict(Duration::from_secs(60))
            .with_claim_length(Duration::from_secs(60));
        Self::with_config(network, clock, config)
    }

    fn with_config(network: &LocalNetwork, clock: &ManualClock, config: ClaimConfig) -> Self {
        let queue = config.instance_specific_queue.to_string();
        network.attach(queue.as_str());
        let catalog = MessageCatalog::new()
            .with_commands([PLACE_ORDER, CANCEL_ORDER])
            .register_event(ORDER_PLACED);
        let coordinator = Arc::new(
            ClaimCoordinator::with_clock(
                config,
                catalog,
                Arc::new(network.clone()),
                Arc::new(clock.clone()),
            )
            .expect("valid config"),
        );
        Self {
            queue,
            interceptor: ClaimInterceptor::new(coordinator.clone()),
            protocol: ClaimProtocolHandler::new(coordinator.clone()),
            lifecycle: NodeLifecycle::new(coordinator.clone()),
            coordinator,
        }
    }

    fn knows(&self, peer: &Node) {
        self.coordinator
            .membership()
            .add(QueueAddress::from(peer.queue.as_str()));
    }

    async fn conflict(&self, command_type: &str) -> Result<Disposition, ClaimError> {
        let message = command(command_type);
        self.interceptor
            .intercept(&message, || async {
                Err(DispatchError::from(ConflictSignal::new("order-1", 1, 2)))
            })
            .await
    }
}

fn command(command_type: &str) -> InboundMessage {
    InboundMessage::new(format!("{command_type}, Shop.Messages"), Bytes::from_static(b"{}"))
}

/// Deliver pending protocol envelopes until every inbox is quiet.
///
/// Returns the business messages that were delivered, per queue.
async fn pump(network: &LocalNetwork, nodes: &[&Node]) -> Vec<(String, InboundMessage)> {
    let mut business = Vec::new();
    loop {
        let mut delivered = 0;
        for node in nodes {
            for envelope in network.take_inbox(&node.queue) {
                delivered += 1;
                match ProtocolMessage::from_envelope(&envelope) {
                    Ok(message) => node.protocol.handle(&message).await,
                    Err(_) => business.push((node.queue.clone(), envelope)),
                }
            }
        }
        if delivered == 0 {
            return business;
        }
    }
}

#[tokio::test]
async fn test_threshold_claim_redirects_peer_traffic() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    a.knows(&b);

    // Two conflicts within the window surface unchanged.
    for _ in 0..2 {
        let err = a.conflict(PLACE_ORDER).await.unwrap_err();
        assert_eq!(err.as_conflict(), Some(&ConflictSignal::new("order-1", 1, 2)));
        clock.advance(Duration::from_secs(5));
    }

    // The third one claims the type.
    let outcome = a.conflict(PLACE_ORDER).await.unwrap();
    assert_eq!(
        outcome,
        Disposition::Claimed {
            command_type: CommandTypeId::from(PLACE_ORDER)
        }
    );
    assert!(a.coordinator.registry().contains(PLACE_ORDER).await);
    assert_eq!(a.coordinator.windows().len(PLACE_ORDER), 0);

    pump(&network, &[&a, &b]).await;
    let entry = b.coordinator.redirects().first(PLACE_ORDER).unwrap();
    assert_eq!(entry.destination.as_str(), "shop-a");
    assert_eq!(entry.owner, a.coordinator.instance());

    // B now forwards without running its own handler.
    let invoked = AtomicUsize::new(0);
    let message = command(PLACE_ORDER);
    let outcome = b
        .interceptor
        .intercept(&message, || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Disposition::Forwarded {
            destination: QueueAddress::from("shop-a")
        }
    );
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(b.coordinator.redirected_count(), 1);

    let delivered = pump(&network, &[&a, &b]).await;
    assert_eq!(delivered, vec![("shop-a".to_string(), message)]);
}

#[tokio::test]
async fn test_expired_claim_is_surrendered_on_next_claim() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    a.knows(&b);

    for _ in 0..3 {
        let _ = a.conflict(PLACE_ORDER).await;
    }
    pump(&network, &[&a, &b]).await;
    assert!(b.coordinator.redirects().contains(PLACE_ORDER));

    // Nothing expires on its own.
    clock.advance(Duration::from_secs(61));
    assert!(a.coordinator.registry().contains(PLACE_ORDER).await);
    assert!(b.coordinator.redirects().contains(PLACE_ORDER));

    network.clear_log();
    for _ in 0..2 {
        assert!(a.conflict(CANCEL_ORDER).await.unwrap_err().is_conflict());
    }
    let outcome = a.conflict(CANCEL_ORDER).await.unwrap();
    assert!(matches!(outcome, Disposition::Claimed { .. }));

    // Surrender of the expired claim goes out before the new claim.
    let kinds: Vec<&str> = network
        .sent_by(Delivery::Direct)
        .iter()
        .map(|sent| ProtocolMessage::from_envelope(&sent.message).unwrap().kind())
        .collect();
    assert_eq!(kinds, vec!["surrender", "claim"]);

    assert!(!a.coordinator.registry().contains(PLACE_ORDER).await);
    assert!(a.coordinator.registry().contains(CANCEL_ORDER).await);

    pump(&network, &[&a, &b]).await;
    assert!(!b.coordinator.redirects().contains(PLACE_ORDER));
    assert_eq!(
        b.coordinator.redirects().first(CANCEL_ORDER).unwrap().destination.as_str(),
        "shop-a"
    );

    // With the redirect gone, B watches and counts PlaceOrder again.
    let err = b.conflict(PLACE_ORDER).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(b.coordinator.windows().len(PLACE_ORDER), 1);
    assert_eq!(b.coordinator.redirected_count(), 0);
}

#[tokio::test]
async fn test_conflicts_outside_window_do_not_claim() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");

    for _ in 0..5 {
        let err = a.conflict(PLACE_ORDER).await.unwrap_err();
        assert!(err.is_conflict());
        clock.advance(Duration::from_secs(31));
    }
    assert!(a.coordinator.registry().is_empty().await);
    assert!(a.coordinator.windows().len(PLACE_ORDER) <= 2);
}

#[tokio::test]
async fn test_non_conflict_failures_are_not_counted() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");

    for _ in 0..5 {
        let err = a
            .interceptor
            .intercept(&command(PLACE_ORDER), || async {
                Err(DispatchError::failed(std::io::Error::other("disk full")))
            })
            .await
            .unwrap_err();
        match err {
            ClaimError::Handler(inner) => assert_eq!(inner.to_string(), "disk full"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(a.coordinator.windows().len(PLACE_ORDER), 0);
    assert!(a.coordinator.registry().is_empty().await);
}

#[tokio::test]
async fn test_events_pass_through_even_when_conflicting() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");

    for _ in 0..5 {
        assert!(a.conflict(ORDER_PLACED).await.unwrap_err().is_conflict());
    }
    assert_eq!(a.coordinator.windows().tracked_types(), 0);
    assert!(a.coordinator.registry().is_empty().await);
}

#[tokio::test]
async fn test_lifecycle_builds_membership_and_loops_back_claims() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    let c = Node::new(&network, &clock, "shop-c");

    for node in [&a, &b, &c] {
        assert!(node.lifecycle.start().await);
    }
    pump(&network, &[&a, &b, &c]).await;
    for node in [&a, &b, &c] {
        assert_eq!(node.coordinator.membership().len(), 3);
    }

    for _ in 0..3 {
        let _ = a.conflict(PLACE_ORDER).await;
    }
    pump(&network, &[&a, &b, &c]).await;

    // A's own claim came back to it and did not create a redirect to itself.
    assert!(!a.coordinator.redirects().contains(PLACE_ORDER));
    assert_eq!(a.coordinator.registry().len().await, 1);
    assert!(b.coordinator.redirects().contains(PLACE_ORDER));
    assert!(c.coordinator.redirects().contains(PLACE_ORDER));

    // Stopping A surrenders its claim and removes it from every membership set.
    assert_eq!(a.lifecycle.stop().await, 1);
    pump(&network, &[&a, &b, &c]).await;
    for node in [&b, &c] {
        assert!(!node.coordinator.redirects().contains(PLACE_ORDER));
        assert!(!node.coordinator.membership().contains("shop-a"));
        assert_eq!(node.coordinator.membership().len(), 2);
    }
}

#[tokio::test]
async fn test_concurrent_claims_keep_first_received_owner() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    let c = Node::new(&network, &clock, "shop-c");
    a.knows(&c);
    b.knows(&c);

    for _ in 0..3 {
        let _ = a.conflict(PLACE_ORDER).await;
    }
    for _ in 0..3 {
        let _ = b.conflict(PLACE_ORDER).await;
    }
    pump(&network, &[&c]).await;

    let entries = c.coordinator.redirects().entries_for(PLACE_ORDER);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].owner, a.coordinator.instance());

    // When the first owner surrenders, the backup takes over.
    assert_eq!(a.lifecycle.stop().await, 1);
    pump(&network, &[&c]).await;
    assert_eq!(
        c.coordinator.redirects().first(PLACE_ORDER).unwrap().owner,
        b.coordinator.instance()
    );
}

#[tokio::test]
async fn test_dead_member_redirects_are_purged() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    a.knows(&b);

    for _ in 0..3 {
        let _ = a.conflict(PLACE_ORDER).await;
    }
    pump(&network, &[&b]).await;
    assert!(b.coordinator.redirects().contains(PLACE_ORDER));

    // A disappears without surrendering; only its liveness-dead arrives.
    network.set_unreachable("shop-a");
    let dead = ProtocolMessage::Dead(commandeer::locality::LivenessNotice {
        endpoint: QueueAddress::from("shop-a"),
        instance: a.coordinator.instance(),
    });
    b.protocol.handle(&dead).await;
    assert!(!b.coordinator.redirects().contains(PLACE_ORDER));

    let outcome = b
        .interceptor
        .intercept(&command(PLACE_ORDER), || async { Ok(()) })
        .await
        .unwrap();
    assert_eq!(outcome, Disposition::Processed);
}

#[tokio::test]
async fn test_broadcast_failures_do_not_fail_the_claim() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    a.knows(&b);
    a.coordinator
        .membership()
        .add(QueueAddress::from("shop-stale"));

    for _ in 0..2 {
        let _ = a.conflict(PLACE_ORDER).await;
    }
    let outcome = a.conflict(PLACE_ORDER).await.unwrap();
    assert!(matches!(outcome, Disposition::Claimed { .. }));
    assert_eq!(network.inbox_len("shop-b"), 1);
}

#[tokio::test]
async fn test_forward_failure_keeps_message_unprocessed() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let a = Node::new(&network, &clock, "shop-a");
    let b = Node::new(&network, &clock, "shop-b");
    a.knows(&b);

    for _ in 0..3 {
        let _ = a.conflict(PLACE_ORDER).await;
    }
    pump(&network, &[&b]).await;
    network.set_unreachable("shop-a");

    let invoked = AtomicUsize::new(0);
    let err = b
        .interceptor
        .intercept(&command(PLACE_ORDER), || async {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Transport(_)));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(b.coordinator.redirected_count(), 0);
}

#[tokio::test]
async fn test_concurrent_conflicts_across_tasks() {
    let network = LocalNetwork::new();
    let clock = ManualClock::new(0);
    let config = ClaimConfig::new("shop", "shop-a")
        .with_claim_threshold(1_000)
        .with_expire_conflict(Duration::from_secs(60));
    let a = Arc::new(Node::with_config(&network, &clock, config));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let node = a.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                let _ = node.conflict(PLACE_ORDER).await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let window = a.coordinator.windows().snapshot(PLACE_ORDER);
    assert_eq!(window.len(), 400);
    assert!(window.iter().all(|record| record.command_type.as_str() == PLACE_ORDER));
}
