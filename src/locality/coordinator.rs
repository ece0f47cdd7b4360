//! The per-process claim coordinator.
//!
//! One [`ClaimCoordinator`] owns every piece of claim state for a node and is
//! shared by `Arc` between the interceptor, the protocol handler, and the
//! lifecycle. All state is safe for concurrent access from many in-flight
//! messages.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::classifier::{MessageCatalog, TypeClassifier};
use super::clock::{Clock, SystemClock};
use super::config::ClaimConfig;
use super::conflict_window::ConflictWindows;
use super::membership::MembershipTracker;
use super::metrics;
use super::protocol::{LivenessNotice, OwnershipNotice, ProtocolMessage};
use super::redirect::RedirectTable;
use super::registry::{Claim, ClaimRegistry};
use super::transport::Transport;
use crate::error::Result;
use crate::types::{CommandTypeId, InstanceId, QueueAddress};

/// Identity of the local node as announced to peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNode {
    /// Logical endpoint name shared by every instance of the service.
    pub endpoint: String,
    /// Queue only this instance consumes from.
    pub queue: QueueAddress,
    /// Random id generated once per process.
    pub instance: InstanceId,
}

impl LocalNode {
    pub fn new(endpoint: impl Into<String>, queue: impl Into<QueueAddress>) -> Self {
        Self {
            endpoint: endpoint.into(),
            queue: queue.into(),
            instance: InstanceId::generate(),
        }
    }

    /// Returns true if `instance` is this node.
    pub fn is_local(&self, instance: InstanceId) -> bool {
        self.instance == instance
    }

    pub(crate) fn ownership_notice(&self, command_type: CommandTypeId) -> OwnershipNotice {
        OwnershipNotice {
            endpoint: self.endpoint.clone(),
            queue: self.queue.clone(),
            instance: self.instance,
            command_type,
        }
    }

    pub(crate) fn liveness_notice(&self) -> LivenessNotice {
        LivenessNotice {
            endpoint: self.queue.clone(),
            instance: self.instance,
        }
    }
}

/// Outcome of one fan-out to the membership set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Claim state of one node.
pub struct ClaimCoordinator {
    config: ClaimConfig,
    node: LocalNode,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn Transport>,
    classifier: TypeClassifier,
    windows: ConflictWindows,
    registry: ClaimRegistry,
    redirects: RedirectTable,
    membership: MembershipTracker,
    redirected: AtomicU64,
}

impl fmt::Debug for ClaimCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimCoordinator")
            .field("node", &self.node)
            .field("config", &self.config)
            .field("redirected", &self.redirected_count())
            .finish_non_exhaustive()
    }
}

impl ClaimCoordinator {
    /// Create a coordinator using the system clock.
    ///
    /// Fails if the configuration does not validate.
    pub fn new(
        config: ClaimConfig,
        catalog: MessageCatalog,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Self::with_clock(config, catalog, transport, Arc::new(SystemClock::new()))
    }

    /// Create a coordinator with an explicit time source.
    pub fn with_clock(
        config: ClaimConfig,
        catalog: MessageCatalog,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let config = config.validated()?;
        let node = LocalNode::new(
            config.endpoint.clone(),
            config.instance_specific_queue.clone(),
        );
        Ok(Self {
            windows: ConflictWindows::new(config.expire_conflict),
            registry: ClaimRegistry::new(config.claim_length),
            classifier: TypeClassifier::new(catalog),
            redirects: RedirectTable::new(),
            membership: MembershipTracker::new(),
            redirected: AtomicU64::new(0),
            config,
            node,
            clock,
            transport,
        })
    }

    pub fn config(&self) -> &ClaimConfig {
        &self.config
    }

    pub fn node(&self) -> &LocalNode {
        &self.node
    }

    pub fn instance(&self) -> InstanceId {
        self.node.instance
    }

    pub fn classifier(&self) -> &TypeClassifier {
        &self.classifier
    }

    pub fn windows(&self) -> &ConflictWindows {
        &self.windows
    }

    pub fn registry(&self) -> &ClaimRegistry {
        &self.registry
    }

    pub fn redirects(&self) -> &RedirectTable {
        &self.redirects
    }

    pub fn membership(&self) -> &MembershipTracker {
        &self.membership
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub(crate) fn now(&self) -> super::clock::Millis {
        self.clock.now_millis()
    }

    /// Total messages forwarded to a remote claimant by this node.
    pub fn redirected_count(&self) -> u64 {
        self.redirected.load(Ordering::Relaxed)
    }

    pub(crate) fn record_redirect(&self) {
        self.redirected.fetch_add(1, Ordering::Relaxed);
        metrics::record_redirect();
    }

    /// Send `message` directly to every current member.
    ///
    /// Sends run in parallel and are all awaited. A failed send is logged and
    /// counted; it never fails the caller.
    pub(crate) async fn broadcast(&self, message: &ProtocolMessage) -> BroadcastReport {
        let members = self.membership.snapshot();
        if members.is_empty() {
            debug!(kind = message.kind(), "No cluster members to notify");
            return BroadcastReport::default();
        }

        let envelope = match message.to_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to encode protocol message");
                return BroadcastReport {
                    succeeded: 0,
                    failed: members.len(),
                };
            }
        };

        let start = Instant::now();
        let sends = members.iter().map(|member| {
            let envelope = envelope.clone();
            async move {
                let result = self.transport.send_immediate(member, envelope).await;
                if let Err(ref e) = result {
                    warn!(
                        kind = message.kind(),
                        member = %member,
                        error = %e,
                        "Failed to send protocol message to member"
                    );
                }
                result.is_ok()
            }
        });
        let results = join_all(sends).await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        let report = BroadcastReport {
            succeeded,
            failed: results.len() - succeeded,
        };
        metrics::record_broadcast(
            message.kind(),
            report.succeeded,
            report.failed,
            start.elapsed().as_secs_f64(),
        );
        debug!(
            kind = message.kind(),
            succeeded = report.succeeded,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }

    /// Send a Surrender for each claim to every member.
    ///
    /// `reason` labels the surrender metric ("expired" or "shutdown").
    pub(crate) async fn surrender(&self, claims: Vec<Claim>, reason: &str) {
        for claim in claims {
            info!(
                command_type = %claim.command_type,
                started_at = claim.started_at,
                reason,
                "Surrendering claim"
            );
            let message =
                ProtocolMessage::Surrender(self.node.ownership_notice(claim.command_type));
            self.broadcast(&message).await;
            metrics::record_surrender(reason);
        }
    }

    /// Publish `message` cluster-wide. Failures are logged, never returned.
    pub(crate) async fn publish(&self, message: &ProtocolMessage) -> bool {
        let envelope = match message.to_envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to encode protocol message");
                return false;
            }
        };
        match self.transport.publish(envelope).await {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = message.kind(), error = %e, "Failed to publish protocol message");
                false
            }
        }
    }
}
