//! Wire protocol messages
//!
//! One request yields exactly one response; server events are delivered
//! asynchronously on the peer's event channel, decoupled from request
//! completion. All messages are externally tagged with a kebab-case
//! `type` field.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{
    Capabilities, ConnectionParams, ConsumerId, MediaKind, MediaParams, NegotiationParams,
    PeerId, ProducerId, TransportDirection, TransportId,
};

/// Client-to-server requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientRequest {
    /// Query the engine's negotiated capability set
    GetCapabilities,
    /// Allocate a send or recv transport
    CreateTransport { direction: TransportDirection },
    /// Complete transport negotiation
    ConnectTransport {
        transport_id: TransportId,
        negotiation: NegotiationParams,
    },
    /// Publish a stream on a connected transport
    Produce {
        transport_id: TransportId,
        kind: MediaKind,
        media: MediaParams,
    },
    /// Subscribe to another peer's stream via a connected recv transport
    Consume {
        transport_id: TransportId,
        producer_id: ProducerId,
        capabilities: Capabilities,
    },
    /// Start packet flow on a paused subscription
    ResumeConsumer { consumer_id: ConsumerId },
    /// Stop publishing a stream without disconnecting
    CloseProducer { producer_id: ProducerId },
}

/// Server-to-client responses, one per request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerResponse {
    Capabilities {
        capabilities: Capabilities,
    },
    TransportCreated {
        transport_id: TransportId,
        connection: ConnectionParams,
    },
    TransportConnected {
        transport_id: TransportId,
    },
    Produced {
        producer_id: ProducerId,
    },
    Consumed {
        consumer_id: ConsumerId,
        producer_id: ProducerId,
        kind: MediaKind,
        media: MediaParams,
    },
    ConsumerResumed {
        consumer_id: ConsumerId,
    },
    ProducerClosed {
        producer_id: ProducerId,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerResponse {
    pub(crate) fn from_error(err: &Error) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Asynchronously delivered server-to-client events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Connection acknowledged; first event on every new connection
    Connected { peer_id: PeerId },
    /// Streams live at connection time, exactly once per connection
    ExistingStreams { producer_ids: Vec<ProducerId> },
    /// Another peer started publishing
    NewStream { producer_id: ProducerId },
    /// A stream is gone; subscribers should drop their consumers of it
    StreamWithdrawn { producer_id: ProducerId },
}
