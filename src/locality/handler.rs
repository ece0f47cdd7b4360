//! Reactions to inbound claim protocol messages.

use std::sync::Arc;

use tracing::{debug, info};

use super::coordinator::ClaimCoordinator;
use super::error::ClaimResult;
use super::metrics;
use super::protocol::{LivenessNotice, OwnershipNotice, ProtocolMessage};
use super::redirect::RedirectEntry;
use super::transport::InboundMessage;

/// Handler for Claim, Surrender, DomainAlive and DomainDead.
#[derive(Debug, Clone)]
pub struct ClaimProtocolHandler {
    coordinator: Arc<ClaimCoordinator>,
}

impl ClaimProtocolHandler {
    pub fn new(coordinator: Arc<ClaimCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Decode an envelope and handle it.
    ///
    /// Fails with [`crate::error::Error::NotProtocolMessage`] for envelopes of
    /// any other type, and with a codec error for malformed bodies.
    pub async fn handle_inbound(&self, message: &InboundMessage) -> ClaimResult<()> {
        let decoded = ProtocolMessage::from_envelope(message)?;
        self.handle(&decoded).await;
        Ok(())
    }

    /// Apply a decoded protocol message to local state.
    pub async fn handle(&self, message: &ProtocolMessage) {
        let origin = if self.coordinator.node().is_local(message.instance()) {
            "local"
        } else {
            "remote"
        };
        metrics::record_protocol_message(message.kind(), origin);

        match message {
            ProtocolMessage::Claim(notice) => self.on_claim(notice).await,
            ProtocolMessage::Surrender(notice) => self.on_surrender(notice),
            ProtocolMessage::Alive(notice) => self.on_alive(notice),
            ProtocolMessage::Dead(notice) => self.on_dead(notice),
        }
    }

    async fn on_claim(&self, notice: &OwnershipNotice) {
        if self.coordinator.node().is_local(notice.instance) {
            let now = self.coordinator.now();
            let inserted = self
                .coordinator
                .registry()
                .ensure(&notice.command_type, now)
                .await;
            debug!(
                command_type = %notice.command_type,
                inserted,
                "Received own claim"
            );
            return;
        }

        let claimants = self.coordinator.redirects().add(RedirectEntry {
            command_type: notice.command_type.clone(),
            destination: notice.queue.clone(),
            owner: notice.instance,
        });
        info!(
            command_type = %notice.command_type,
            destination = %notice.queue,
            owner = %notice.instance,
            claimants,
            "Command type claimed by peer"
        );
    }

    fn on_surrender(&self, notice: &OwnershipNotice) {
        if self.coordinator.node().is_local(notice.instance) {
            debug!(command_type = %notice.command_type, "Received own surrender");
            return;
        }

        let removed = self
            .coordinator
            .redirects()
            .remove(&notice.command_type, notice.instance);
        info!(
            command_type = %notice.command_type,
            owner = %notice.instance,
            removed,
            still_redirected = self.coordinator.redirects().contains(notice.command_type.as_str()),
            "Command type surrendered by peer"
        );
    }

    fn on_alive(&self, notice: &LivenessNotice) {
        self.coordinator.membership().add(notice.endpoint.clone());
    }

    fn on_dead(&self, notice: &LivenessNotice) {
        self.coordinator.membership().remove(notice.endpoint.as_str());

        let emptied = self.coordinator.redirects().remove_owner(notice.instance);
        if !emptied.is_empty() {
            info!(
                owner = %notice.instance,
                types = emptied.len(),
                "Dropped claims of departed member"
            );
        }
    }
}
