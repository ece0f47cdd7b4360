//! Centralized protocol and configuration constants.
//!
//! This module consolidates the header names, protocol type identifiers and
//! default tuning values used throughout Commandeer. Keeping them in one place
//! makes it easier to:
//!
//! - Keep every node of a cluster speaking the same identifiers
//! - Update defaults consistently
//! - Document the meaning of each value
//!
//! # Categories
//!
//! - **Envelope Constants**: transport header names
//! - **Protocol Constants**: type identifiers of the claim protocol messages
//! - **Claim Tuning Defaults**: thresholds and lifetimes

// =============================================================================
// Envelope Constants
// =============================================================================

/// Header carrying the enclosed message type(s) of a transport envelope.
///
/// The value is a `;` separated list of type names. Each entry may be
/// qualified with `,` separated suffixes (assembly, version, ...); only the
/// part before the first `,` of the first entry identifies the type.
pub const ENCLOSED_MESSAGE_TYPES_HEADER: &str = "x-enclosed-message-types";

/// Header carrying the transport-level message id.
pub const MESSAGE_ID_HEADER: &str = "x-message-id";

/// Separator between enclosed message types.
pub const ENCLOSED_TYPE_SEPARATOR: char = ';';

/// Separator between a type name and its qualifiers.
pub const TYPE_QUALIFIER_SEPARATOR: char = ',';

// =============================================================================
// Protocol Constants
// =============================================================================

/// Type identifier of the Claim protocol message.
pub const CLAIM_MESSAGE_TYPE: &str = "commandeer.protocol.Claim";

/// Type identifier of the Surrender protocol message.
pub const SURRENDER_MESSAGE_TYPE: &str = "commandeer.protocol.Surrender";

/// Type identifier of the liveness-alive protocol message.
pub const DOMAIN_ALIVE_MESSAGE_TYPE: &str = "commandeer.protocol.DomainAlive";

/// Type identifier of the liveness-dead protocol message.
pub const DOMAIN_DEAD_MESSAGE_TYPE: &str = "commandeer.protocol.DomainDead";

// =============================================================================
// Claim Tuning Defaults
// =============================================================================

/// Number of conflicts within the window required before claiming a type.
pub const DEFAULT_CLAIM_THRESHOLD: u32 = 5;

/// Age after which a recorded conflict stops counting toward the threshold.
pub const DEFAULT_EXPIRE_CONFLICT_MS: u64 = 30_000;

/// Lifetime of a local claim before it is lazily surrendered.
///
/// Expiry is only checked when this node issues its next claim, so a claim
/// may outlive this value by an arbitrary amount on a quiet node.
pub const DEFAULT_CLAIM_LENGTH_MS: u64 = 60_000;

/// Reserved commonality ratio. Validated but not consulted by any heuristic yet.
pub const DEFAULT_COMMONALITY_REQUIRED: f64 = 0.9;

/// Logical endpoint name used when none is configured.
pub const DEFAULT_ENDPOINT_NAME: &str = "commandeer";

/// Upper bound accepted for `claim_threshold` by config validation.
pub const MAX_CLAIM_THRESHOLD: u32 = 10_000;
