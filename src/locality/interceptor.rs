//! Per-message entry point of the claim protocol.
//!
//! The interceptor runs in front of every business handler:
//!
//! ```text
//! inbound ──► type? ──no──► downstream
//!               │
//!               ├─ ignored ───────────────► downstream
//!               ├─ redirected ────────────► forward to first claimant
//!               └─ watched ──► downstream ──► ok / error ──► caller
//!                                   │
//!                                conflict ──► window ──► below threshold ──► caller
//!                                                 │
//!                                            at threshold ──► sweep, claim, broadcast
//! ```

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use super::classifier::Classification;
use super::coordinator::ClaimCoordinator;
use super::error::{ClaimError, ClaimResult, ConflictSignal, DispatchError};
use super::metrics;
use super::protocol::ProtocolMessage;
use super::transport::InboundMessage;
use crate::types::{CommandTypeId, QueueAddress};

/// What happened to an intercepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The downstream handler ran and succeeded.
    Processed,
    /// The message was forwarded to a remote claimant; downstream never ran.
    Forwarded { destination: QueueAddress },
    /// The downstream conflict pushed the type over the threshold and this
    /// node claimed it. The conflict is consumed.
    Claimed { command_type: CommandTypeId },
}

/// Interceptor bound to one node's coordinator.
#[derive(Debug, Clone)]
pub struct ClaimInterceptor {
    coordinator: Arc<ClaimCoordinator>,
}

impl ClaimInterceptor {
    pub fn new(coordinator: Arc<ClaimCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<ClaimCoordinator> {
        &self.coordinator
    }

    /// Run `downstream` for `message`, unless the message's type is claimed
    /// elsewhere, and turn repeated conflicts into a claim.
    ///
    /// `downstream` is invoked at most once.
    pub async fn intercept<F, Fut>(
        &self,
        message: &InboundMessage,
        downstream: F,
    ) -> ClaimResult<Disposition>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), DispatchError>>,
    {
        let Some(command_type) = message.command_type() else {
            debug!(message_id = message.message_id(), "No enclosed type - passing through");
            return pass_through(downstream).await;
        };

        let classifier = self.coordinator.classifier();
        if classifier.cached(command_type.as_str()) == Some(Classification::Ignored) {
            return pass_through(downstream).await;
        }

        if let Some(entry) = self.coordinator.redirects().first(command_type.as_str()) {
            self.coordinator
                .transport()
                .forward(message, &entry.destination)
                .await?;
            self.coordinator.record_redirect();
            debug!(
                command_type = %command_type,
                message_id = message.message_id(),
                destination = %entry.destination,
                "Forwarded message to claimant"
            );
            return Ok(Disposition::Forwarded {
                destination: entry.destination,
            });
        }

        if !classifier.classify(&command_type).is_watched() {
            return pass_through(downstream).await;
        }

        match downstream().await {
            Ok(()) => Ok(Disposition::Processed),
            Err(DispatchError::Failed(err)) => Err(ClaimError::Handler(err)),
            Err(DispatchError::Conflict(signal)) => {
                self.on_conflict(command_type, signal, message).await
            }
        }
    }

    async fn on_conflict(
        &self,
        command_type: CommandTypeId,
        signal: ConflictSignal,
        message: &InboundMessage,
    ) -> ClaimResult<Disposition> {
        metrics::record_conflict(command_type.as_str());
        let now = self.coordinator.now();
        let observed = self.coordinator.windows().record(&command_type, now);
        let threshold = self.coordinator.config().claim_threshold as usize;

        if observed < threshold {
            debug!(
                command_type = %command_type,
                message_id = message.message_id(),
                observed,
                threshold,
                "Conflict below claim threshold"
            );
            return Err(ClaimError::Conflict(signal));
        }

        self.coordinator.windows().drain(command_type.as_str());

        let expired = self.coordinator.registry().sweep_expired(now).await;
        self.coordinator.surrender(expired, "expired").await;

        self.coordinator.registry().claim(&command_type, now).await;
        let notice = self
            .coordinator
            .node()
            .ownership_notice(command_type.clone());
        let report = self
            .coordinator
            .broadcast(&ProtocolMessage::Claim(notice))
            .await;
        metrics::record_claim(command_type.as_str());

        info!(
            command_type = %command_type,
            message_id = message.message_id(),
            conflicts = observed,
            notified = report.succeeded,
            failed = report.failed,
            "Claimed command type"
        );
        Ok(Disposition::Claimed { command_type })
    }
}

async fn pass_through<F, Fut>(downstream: F) -> ClaimResult<Disposition>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), DispatchError>>,
{
    downstream().await.map_err(ClaimError::from)?;
    Ok(Disposition::Processed)
}
