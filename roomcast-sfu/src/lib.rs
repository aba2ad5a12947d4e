//! Roomcast SFU signaling core
//!
//! This crate implements the session-coordination layer of a selective
//! forwarding unit: the in-memory registry of connected peers, their
//! transports, published streams (producers) and subscriptions
//! (consumers), plus the event protocol that keeps every peer's view of
//! "who is publishing what" consistent in real time. Actual media
//! routing (ICE/DTLS, RTP, codec negotiation) is delegated to an
//! external engine behind the [`MediaEngine`] trait.
//!
//! ## Architecture
//!
//! - **[`SfuHub`]**: shared coordinator owning the peer registry, the
//!   stream directory and the engine handle
//! - **[`Session`]**: per-connection protocol handler
//! - **[`PeerRegistry`]** / **[`StreamDirectory`]**: the shared state,
//!   mutated only under the hub's coordination lock
//! - **[`protocol`]**: the wire messages exchanged with clients
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roomcast_sfu::{PeerId, SfuConfig, SfuHub};
//!
//! let hub = SfuHub::new(engine, SfuConfig::default());
//!
//! // per accepted connection:
//! let session = hub.connect(PeerId::random())?;
//! let mut events = session.take_event_receiver().unwrap();
//! // feed decoded requests to session.handle(..), forward events from
//! // the receiver, and call session.disconnect() when the connection
//! // drops
//! ```

mod config;
mod directory;
mod engine;
mod error;
mod hub;
mod peer;
pub mod protocol;
mod registry;
mod session;
mod types;

#[cfg(test)]
pub mod test_helpers;

pub use config::SfuConfig;
pub use directory::StreamDirectory;
pub use engine::{ConsumerDescriptor, EngineError, MediaEngine, TransportDescriptor};
pub use error::{Error, Result};
pub use hub::{HubStats, SfuHub};
pub use peer::{Consumer, Peer, Producer, Transport, TransportState};
pub use registry::PeerRegistry;
pub use session::Session;
pub use types::{
    Capabilities, ConnectionParams, ConsumerId, MediaKind, MediaParams, NegotiationParams,
    PeerId, ProducerId, TransportDirection, TransportId,
};
