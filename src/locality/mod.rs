//! Command-locality claims.
//!
//! Nodes of a horizontally scaled command-processing service compete on
//! optimistic-concurrency writes. When one node keeps losing those races for a
//! command type, it claims the type and every peer starts forwarding that
//! type's messages to the claimant's instance-specific queue. The claim is
//! surrendered lazily once it has lived for the configured claim length.
//!
//! # Architecture
//!
//! ```text
//!      inbound message
//!             │
//!             ▼
//!   ┌───────────────────┐  forward   ┌──────────────┐
//!   │ ClaimInterceptor  │──────────► │ claimant node│
//!   └─────────┬─────────┘            └──────────────┘
//!             │ downstream
//!             ▼
//!      business handler ── conflict ──► ConflictWindows ──► ClaimRegistry
//!                                                              │
//!                                         Claim / Surrender    ▼
//!   ┌──────────────────────┐ ◄──────────────────────── every member
//!   │ ClaimProtocolHandler │ ──► RedirectTable, MembershipTracker
//!   └──────────────────────┘
//! ```
//!
//! No component coordinates globally: claims are advisory, and two nodes
//! claiming the same type at once leave peers forwarding to whichever claim
//! reached them first.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use commandeer::locality::{
//!     ClaimConfig, ClaimCoordinator, ClaimInterceptor, ClaimProtocolHandler, MessageCatalog,
//!     NodeLifecycle, Transport,
//! };
//!
//! # async fn run(transport: Arc<dyn Transport>) -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = MessageCatalog::new().register_command("Shop.PlaceOrder");
//! let coordinator = Arc::new(ClaimCoordinator::new(
//!     ClaimConfig::from_env()?,
//!     catalog,
//!     transport,
//! )?);
//!
//! let interceptor = ClaimInterceptor::new(coordinator.clone());
//! let protocol = ClaimProtocolHandler::new(coordinator.clone());
//! let lifecycle = NodeLifecycle::new(coordinator);
//! lifecycle.start().await;
//! # let _ = (interceptor, protocol);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod clock;
mod config;
mod conflict_window;
mod coordinator;
mod error;
mod handler;
mod interceptor;
mod lifecycle;
mod membership;
pub mod metrics;
pub mod protocol;
mod redirect;
mod registry;
mod transport;

#[cfg(any(test, feature = "test-utilities"))]
pub mod local_network;

pub use classifier::{Classification, MessageCatalog, MessageKind, TypeClassifier};
pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use config::ClaimConfig;
pub use conflict_window::{ConflictRecord, ConflictWindows};
pub use coordinator::{BroadcastReport, ClaimCoordinator, LocalNode};
pub use error::{
    BoxError, ClaimError, ClaimResult, ConflictSignal, DispatchError, TransportError,
};
pub use handler::ClaimProtocolHandler;
pub use interceptor::{ClaimInterceptor, Disposition};
pub use lifecycle::NodeLifecycle;
#[cfg(any(test, feature = "test-utilities"))]
pub use local_network::{Delivery, LocalNetwork, SentEnvelope};
pub use membership::MembershipTracker;
pub use protocol::{LivenessNotice, OwnershipNotice, ProtocolMessage};
pub use redirect::{RedirectEntry, RedirectTable};
pub use registry::{Claim, ClaimRegistry};
pub use transport::{InboundMessage, Transport, TransportResult, parse_enclosed_type};
