//! Command/non-command classification of message types.
//!
//! The [`MessageCatalog`] is built once at startup from the message types the
//! host registers. The [`TypeClassifier`] memoizes a verdict per type id the
//! first time the interceptor sees it; verdicts are never evicted, so the
//! catalog is consulted once per distinct type per process.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;

use super::protocol::ProtocolMessage;
use crate::constants::{
    CLAIM_MESSAGE_TYPE, DOMAIN_ALIVE_MESSAGE_TYPE, DOMAIN_DEAD_MESSAGE_TYPE,
    SURRENDER_MESSAGE_TYPE,
};
use crate::types::CommandTypeId;

/// Capability of a registered message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Carries the command marker; subject to conflict tracking.
    Command,
    /// Published event.
    Event,
    /// Any other message (replies, protocol messages, ...).
    Message,
}

/// Verdict cached per type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not a command. Passed through untouched forever.
    Ignored,
    /// A command whose conflicts are counted.
    Watched,
}

impl Classification {
    pub fn is_watched(self) -> bool {
        matches!(self, Classification::Watched)
    }
}

/// Startup-time capability table of known message types.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    kinds: HashMap<CommandTypeId, MessageKind>,
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageCatalog {
    /// Create a catalog that knows only the claim protocol's own messages.
    pub fn new() -> Self {
        let mut catalog = Self {
            kinds: HashMap::new(),
        };
        for protocol_type in [
            CLAIM_MESSAGE_TYPE,
            SURRENDER_MESSAGE_TYPE,
            DOMAIN_ALIVE_MESSAGE_TYPE,
            DOMAIN_DEAD_MESSAGE_TYPE,
        ] {
            catalog
                .kinds
                .insert(CommandTypeId::from(protocol_type), MessageKind::Message);
        }
        catalog
    }

    /// Register a command type.
    pub fn register_command(mut self, type_id: impl Into<CommandTypeId>) -> Self {
        self.insert(type_id.into(), MessageKind::Command);
        self
    }

    /// Register an event type.
    pub fn register_event(mut self, type_id: impl Into<CommandTypeId>) -> Self {
        self.insert(type_id.into(), MessageKind::Event);
        self
    }

    /// Register a plain message type.
    pub fn register_message(mut self, type_id: impl Into<CommandTypeId>) -> Self {
        self.insert(type_id.into(), MessageKind::Message);
        self
    }

    /// Register many command types at once.
    pub fn with_commands<I, T>(mut self, type_ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<CommandTypeId>,
    {
        for type_id in type_ids {
            self.insert(type_id.into(), MessageKind::Command);
        }
        self
    }

    fn insert(&mut self, type_id: CommandTypeId, kind: MessageKind) {
        // Protocol messages can never be re-registered as commands: claiming
        // the Claim message would loop forever.
        if kind == MessageKind::Command && ProtocolMessage::is_protocol_type(type_id.as_str()) {
            return;
        }
        self.kinds.insert(type_id, kind);
    }

    /// Look up a type's capability.
    pub fn kind_of(&self, type_id: &str) -> Option<MessageKind> {
        self.kinds.get(type_id).copied()
    }

    pub fn is_command(&self, type_id: &str) -> bool {
        self.kind_of(type_id) == Some(MessageKind::Command)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Memoizing classifier in front of a [`MessageCatalog`].
#[derive(Debug)]
pub struct TypeClassifier {
    catalog: MessageCatalog,
    cache: DashMap<CommandTypeId, Classification>,
}

impl TypeClassifier {
    pub fn new(catalog: MessageCatalog) -> Self {
        Self {
            catalog,
            cache: DashMap::new(),
        }
    }

    /// Cached verdict, if the type has been seen before.
    pub fn cached(&self, type_id: &str) -> Option<Classification> {
        self.cache.get(type_id).map(|entry| *entry.value())
    }

    /// Classify a type, resolving and caching the verdict on first sight.
    ///
    /// Types missing from the catalog are ignored, same as any other
    /// non-command.
    pub fn classify(&self, type_id: &CommandTypeId) -> Classification {
        if let Some(verdict) = self.cached(type_id.as_str()) {
            return verdict;
        }

        *self
            .cache
            .entry(type_id.clone())
            .or_insert_with(|| {
                if self.catalog.is_command(type_id.as_str()) {
                    debug!(
                        command_type = %type_id,
                        "Message type detected as a command - watching for conflicts"
                    );
                    Classification::Watched
                } else {
                    debug!(
                        command_type = %type_id,
                        "Message type is not a command - ignoring conflicts"
                    );
                    Classification::Ignored
                }
            })
            .value()
    }

    /// Number of distinct types classified so far.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }
}
