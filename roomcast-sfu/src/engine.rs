//! Media engine adapter boundary
//!
//! The actual media routing lives in an external engine: ICE/DTLS
//! negotiation, RTP/RTCP processing, codec matching, congestion control.
//! This module defines the contract the coordination core drives it
//! through. The core calls the engine without holding any lock, reacts to
//! its results, and only mutates shared state after the engine reports
//! success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    Capabilities, ConnectionParams, ConsumerId, MediaKind, MediaParams, NegotiationParams,
    ProducerId, TransportDirection, TransportId,
};

/// Failure reported by the media engine
///
/// Opaque to the core: engines carry their own error taxonomies and the
/// core surfaces them verbatim to the requesting client.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result of a transport allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportDescriptor {
    /// Engine-assigned transport id
    pub id: TransportId,
    /// Connection parameters the client needs to complete negotiation
    pub connection: ConnectionParams,
}

/// Result of a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerDescriptor {
    /// Engine-assigned consumer id
    pub id: ConsumerId,
    /// Kind of the consumed stream
    pub kind: MediaKind,
    /// Media parameters the subscriber needs to receive the stream
    pub media: MediaParams,
}

/// Calling contract of the external media engine
///
/// Close operations are infallible at this boundary: the resource is being
/// discarded regardless, so engines log their own failures.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Negotiated capability set of the engine's router
    async fn capabilities(&self) -> Result<Capabilities, EngineError>;

    /// Allocate a transport for one peer
    async fn create_transport(
        &self,
        direction: TransportDirection,
    ) -> Result<TransportDescriptor, EngineError>;

    /// Complete transport negotiation with client-supplied parameters
    async fn connect_transport(
        &self,
        id: &TransportId,
        negotiation: NegotiationParams,
    ) -> Result<(), EngineError>;

    /// Publish a stream on a transport; returns the globally unique
    /// producer id
    async fn produce(
        &self,
        transport: &TransportId,
        kind: MediaKind,
        media: MediaParams,
    ) -> Result<ProducerId, EngineError>;

    /// Whether a subscriber with the given capabilities can consume the
    /// producer
    async fn can_consume(&self, producer: &ProducerId, capabilities: &Capabilities) -> bool;

    /// Subscribe to a producer over a transport; the subscription starts
    /// paused
    async fn consume(
        &self,
        transport: &TransportId,
        producer: &ProducerId,
        capabilities: Capabilities,
    ) -> Result<ConsumerDescriptor, EngineError>;

    /// Start packet flow on a paused subscription
    async fn resume_consumer(&self, id: &ConsumerId) -> Result<(), EngineError>;

    async fn close_transport(&self, id: &TransportId);

    async fn close_producer(&self, id: &ProducerId);

    async fn close_consumer(&self, id: &ConsumerId);
}
