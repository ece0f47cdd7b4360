//! # Commandeer
//! Decentralized command-locality claims for clusters of command processors.
//!
//! Horizontally scaled command handlers that write through optimistic
//! concurrency waste work when several nodes keep racing on the same
//! aggregates. Commandeer watches those conflicts per command type; once a
//! node sees too many of them in a short window it *claims* the type, and
//! every peer forwards that type's messages to the claimant until the claim is
//! surrendered. There is no central coordinator and no consensus: claims are
//! advisory and converge through direct peer-to-peer messages.
//!
//! ## Getting started
//! Plug the claim layer between your transport and your handlers:
//!
//! - build a [`MessageCatalog`](locality::MessageCatalog) of the message
//!   types your node handles, marking the commands;
//! - implement [`Transport`](locality::Transport) over your message bus;
//! - run every inbound message through
//!   [`ClaimInterceptor::intercept`](locality::ClaimInterceptor::intercept) and
//!   hand protocol envelopes to
//!   [`ClaimProtocolHandler::handle_inbound`](locality::ClaimProtocolHandler::handle_inbound);
//! - call [`NodeLifecycle::start`](locality::NodeLifecycle::start) and
//!   [`NodeLifecycle::stop`](locality::NodeLifecycle::stop) from your host.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use commandeer::prelude::*;
//!
//! async fn dispatch(_message: &InboundMessage) -> std::result::Result<(), DispatchError> {
//!     // Apply the command; map the store's version conflict to ConflictSignal.
//!     Err(ConflictSignal::new("order-42", 7, 8).into())
//! }
//!
//! # async fn run(transport: Arc<dyn Transport>, message: InboundMessage)
//! # -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let coordinator = Arc::new(ClaimCoordinator::new(
//!     ClaimConfig::new("orders", "orders-node-a"),
//!     MessageCatalog::new().register_command("Shop.PlaceOrder"),
//!     transport,
//! )?);
//! let interceptor = ClaimInterceptor::new(coordinator.clone());
//!
//! match interceptor.intercept(&message, || dispatch(&message)).await {
//!     Ok(Disposition::Forwarded { destination }) => println!("sent to {destination}"),
//!     Ok(_) => {}
//!     Err(e) if e.is_conflict() => println!("retry later: {e}"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod types;

pub mod constants;
pub mod locality;
pub mod telemetry;

pub mod prelude {
    //! Main export of the claim layer.
    //!
    //! ```rust
    //! use commandeer::prelude::*;
    //!
    //! let config = ClaimConfig::new("orders", "orders-node-a");
    //! assert!(config.validate().is_ok());
    //! ```
    pub use crate::error::{Error, Result};
    pub use crate::locality::{
        ClaimConfig, ClaimCoordinator, ClaimError, ClaimInterceptor, ClaimProtocolHandler,
        ClaimResult, ConflictSignal, DispatchError, Disposition, InboundMessage, MessageCatalog,
        NodeLifecycle, ProtocolMessage, Transport, TransportError,
    };
    pub use crate::types::{CommandTypeId, InstanceId, QueueAddress};

    pub use bytes;
}
