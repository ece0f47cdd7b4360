//! Claim protocol messages and their wire encoding.
//!
//! | Message | Fields | Sent by |
//! |---------|--------|---------|
//! | Claim | endpoint, queue, instance, commandType | interceptor, direct to each member |
//! | Surrender | endpoint, queue, instance, commandType | interceptor sweep / lifecycle stop |
//! | DomainAlive | endpoint, instance | lifecycle start, published |
//! | DomainDead | endpoint, instance | lifecycle stop, published |
//!
//! Bodies are JSON with camelCase field names; the envelope's
//! enclosed-message-types header names the message.

use serde::{Deserialize, Serialize};

use super::transport::InboundMessage;
use crate::constants::{
    CLAIM_MESSAGE_TYPE, DOMAIN_ALIVE_MESSAGE_TYPE, DOMAIN_DEAD_MESSAGE_TYPE,
    SURRENDER_MESSAGE_TYPE,
};
use crate::error::{Error, Result};
use crate::types::{CommandTypeId, InstanceId, QueueAddress};

/// Body of Claim and Surrender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipNotice {
    /// Logical endpoint name of the sender.
    pub endpoint: String,
    /// Sender's instance-specific queue; claimed commands are forwarded here.
    pub queue: QueueAddress,
    /// Sender's instance id.
    pub instance: InstanceId,
    /// The command type being claimed or surrendered.
    pub command_type: CommandTypeId,
}

/// Body of DomainAlive and DomainDead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessNotice {
    /// Address the sender is reachable at (its instance-specific queue).
    pub endpoint: QueueAddress,
    pub instance: InstanceId,
}

/// A claim protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    Claim(OwnershipNotice),
    Surrender(OwnershipNotice),
    Alive(LivenessNotice),
    Dead(LivenessNotice),
}

impl ProtocolMessage {
    /// Type identifier used in the envelope header.
    pub fn type_id(&self) -> &'static str {
        match self {
            ProtocolMessage::Claim(_) => CLAIM_MESSAGE_TYPE,
            ProtocolMessage::Surrender(_) => SURRENDER_MESSAGE_TYPE,
            ProtocolMessage::Alive(_) => DOMAIN_ALIVE_MESSAGE_TYPE,
            ProtocolMessage::Dead(_) => DOMAIN_DEAD_MESSAGE_TYPE,
        }
    }

    /// Returns a string label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::Claim(_) => "claim",
            ProtocolMessage::Surrender(_) => "surrender",
            ProtocolMessage::Alive(_) => "alive",
            ProtocolMessage::Dead(_) => "dead",
        }
    }

    /// Instance that sent the message.
    pub fn instance(&self) -> InstanceId {
        match self {
            ProtocolMessage::Claim(notice) | ProtocolMessage::Surrender(notice) => notice.instance,
            ProtocolMessage::Alive(notice) | ProtocolMessage::Dead(notice) => notice.instance,
        }
    }

    /// Returns true if `type_id` names one of the protocol messages.
    pub fn is_protocol_type(type_id: &str) -> bool {
        matches!(
            type_id,
            CLAIM_MESSAGE_TYPE
                | SURRENDER_MESSAGE_TYPE
                | DOMAIN_ALIVE_MESSAGE_TYPE
                | DOMAIN_DEAD_MESSAGE_TYPE
        )
    }

    /// Encode into a transport envelope.
    pub fn to_envelope(&self) -> Result<InboundMessage> {
        let body = match self {
            ProtocolMessage::Claim(notice) | ProtocolMessage::Surrender(notice) => {
                serde_json::to_vec(notice)?
            }
            ProtocolMessage::Alive(notice) | ProtocolMessage::Dead(notice) => {
                serde_json::to_vec(notice)?
            }
        };
        Ok(InboundMessage::new(self.type_id(), body))
    }

    /// Decode from a transport envelope.
    pub fn from_envelope(message: &InboundMessage) -> Result<Self> {
        let type_id = message
            .command_type()
            .ok_or(Error::MissingHeader(crate::constants::ENCLOSED_MESSAGE_TYPES_HEADER))?;

        let decoded = match type_id.as_str() {
            CLAIM_MESSAGE_TYPE => ProtocolMessage::Claim(serde_json::from_slice(&message.body)?),
            SURRENDER_MESSAGE_TYPE => {
                ProtocolMessage::Surrender(serde_json::from_slice(&message.body)?)
            }
            DOMAIN_ALIVE_MESSAGE_TYPE => {
                ProtocolMessage::Alive(serde_json::from_slice(&message.body)?)
            }
            DOMAIN_DEAD_MESSAGE_TYPE => {
                ProtocolMessage::Dead(serde_json::from_slice(&message.body)?)
            }
            other => return Err(Error::NotProtocolMessage(other.to_string())),
        };
        Ok(decoded)
    }
}
