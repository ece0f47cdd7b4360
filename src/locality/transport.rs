//! Transport contract consumed by the claim protocol.
//!
//! The transport itself (durable delivery, serialization of business
//! messages, retries, routing) lives outside this crate. The protocol needs
//! three primitives from it:
//!
//! - [`Transport::forward`]: re-send an inbound envelope verbatim to another
//!   queue (redirecting a claimed command)
//! - [`Transport::send_immediate`]: direct send to one address, dispatched
//!   immediately rather than batched with the current unit of work (Claim and
//!   Surrender fan-out)
//! - [`Transport::publish`]: cluster-wide publish (liveness announcements)
//!
//! Claim and Surrender go out as one direct send per member instead of one
//! publish: a shared publish queue that backs up would delay claims behind
//! unrelated traffic.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use super::error::TransportError;
use crate::constants::{
    ENCLOSED_MESSAGE_TYPES_HEADER, ENCLOSED_TYPE_SEPARATOR, MESSAGE_ID_HEADER,
    TYPE_QUALIFIER_SEPARATOR,
};
use crate::types::{CommandTypeId, QueueAddress};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// An envelope as delivered by the transport.
///
/// The body is kept as raw bytes: redirected messages are forwarded without
/// ever being deserialized on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl InboundMessage {
    /// Build an envelope for one enclosed type with a fresh message id.
    pub fn new(type_id: impl AsRef<str>, body: impl Into<Bytes>) -> Self {
        let mut headers = HashMap::new();
        headers.insert(
            ENCLOSED_MESSAGE_TYPES_HEADER.to_string(),
            type_id.as_ref().to_string(),
        );
        headers.insert(MESSAGE_ID_HEADER.to_string(), Uuid::new_v4().to_string());
        Self {
            headers,
            body: body.into(),
        }
    }

    /// Build an envelope without any type header.
    pub fn untyped(body: impl Into<Bytes>) -> Self {
        let mut headers = HashMap::new();
        headers.insert(MESSAGE_ID_HEADER.to_string(), Uuid::new_v4().to_string());
        Self {
            headers,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Transport message id, or `"unknown"` for envelopes without one.
    pub fn message_id(&self) -> &str {
        self.header(MESSAGE_ID_HEADER).unwrap_or("unknown")
    }

    /// The command type this envelope carries, if the header resolves to one.
    pub fn command_type(&self) -> Option<CommandTypeId> {
        self.header(ENCLOSED_MESSAGE_TYPES_HEADER)
            .and_then(parse_enclosed_type)
    }
}

/// Resolve the type identifier from an enclosed-message-types header value.
///
/// Takes the first `;` separated entry and truncates it at the first `,`
/// (dropping assembly/package qualifiers). Returns `None` if nothing is left.
pub fn parse_enclosed_type(header: &str) -> Option<CommandTypeId> {
    let first = header.split(ENCLOSED_TYPE_SEPARATOR).next()?;
    let name = first
        .split(TYPE_QUALIFIER_SEPARATOR)
        .next()
        .unwrap_or(first)
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(CommandTypeId::from(name))
    }
}

/// Transport primitives required by the claim protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Forward an inbound envelope, headers and body unchanged, to `destination`.
    async fn forward(&self, message: &InboundMessage, destination: &QueueAddress)
    -> TransportResult<()>;

    /// Send an envelope directly to `destination` with immediate dispatch.
    async fn send_immediate(
        &self,
        destination: &QueueAddress,
        message: InboundMessage,
    ) -> TransportResult<()>;

    /// Publish an envelope to every subscriber in the cluster.
    async fn publish(&self, message: InboundMessage) -> TransportResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_type() {
        assert_eq!(
            parse_enclosed_type("PlaceOrder"),
            Some(CommandTypeId::from("PlaceOrder"))
        );
    }

    #[test]
    fn test_parse_qualified_type() {
        assert_eq!(
            parse_enclosed_type("Shop.Commands.PlaceOrder, Shop.Messages, Version=1.0.0.0"),
            Some(CommandTypeId::from("Shop.Commands.PlaceOrder"))
        );
    }

    #[test]
    fn test_parse_multiple_enclosed_types_uses_first() {
        assert_eq!(
            parse_enclosed_type("Shop.PlaceOrder, Shop;Shop.ICommand, Shop"),
            Some(CommandTypeId::from("Shop.PlaceOrder"))
        );
    }

    #[test]
    fn test_parse_empty_header() {
        assert_eq!(parse_enclosed_type(""), None);
        assert_eq!(parse_enclosed_type("  , Shop"), None);
        assert_eq!(parse_enclosed_type(";PlaceOrder"), None);
    }

    #[test]
    fn test_envelope_accessors() {
        let message = InboundMessage::new("PlaceOrder, Shop", Bytes::from_static(b"{}"))
            .with_header("x-tenant", "acme");
        assert_eq!(message.command_type(), Some(CommandTypeId::from("PlaceOrder")));
        assert_eq!(message.header("x-tenant"), Some("acme"));
        assert_ne!(message.message_id(), "unknown");
    }

    #[test]
    fn test_untyped_envelope() {
        let message = InboundMessage::untyped(Bytes::new());
        assert_eq!(message.command_type(), None);
    }
}
