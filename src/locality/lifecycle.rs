//! Node start/stop announcements.
//!
//! On start the node publishes DomainAlive with its instance-specific queue,
//! so peers (and the node itself, via the publish loop-back) add it to their
//! membership sets. On stop it surrenders everything it still owns, then
//! publishes DomainDead.

use std::sync::Arc;

use tracing::{info, warn};

use super::coordinator::ClaimCoordinator;
use super::protocol::ProtocolMessage;

/// Hosting-lifecycle hooks of one node.
#[derive(Debug, Clone)]
pub struct NodeLifecycle {
    coordinator: Arc<ClaimCoordinator>,
}

impl NodeLifecycle {
    pub fn new(coordinator: Arc<ClaimCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Announce this node to the cluster.
    ///
    /// Returns false if the announcement could not be published.
    pub async fn start(&self) -> bool {
        let node = self.coordinator.node();
        let announced = self
            .coordinator
            .publish(&ProtocolMessage::Alive(node.liveness_notice()))
            .await;
        if announced {
            info!(
                endpoint = %node.endpoint,
                queue = %node.queue,
                instance = %node.instance,
                "Announced node to cluster"
            );
        } else {
            warn!(queue = %node.queue, "Node started without announcing itself");
        }
        announced
    }

    /// Surrender every local claim and announce departure.
    ///
    /// Returns the number of claims surrendered. Send failures are logged;
    /// the node stops regardless.
    pub async fn stop(&self) -> usize {
        let claims = self.coordinator.registry().drain_all().await;
        let surrendered = claims.len();
        self.coordinator.surrender(claims, "shutdown").await;

        let node = self.coordinator.node();
        let announced = self
            .coordinator
            .publish(&ProtocolMessage::Dead(node.liveness_notice()))
            .await;
        info!(
            queue = %node.queue,
            surrendered,
            announced,
            "Node left cluster"
        );
        surrendered
    }
}
