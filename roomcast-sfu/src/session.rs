//! Per-connection protocol handling
//!
//! One [`Session`] exists per client connection. The connection layer
//! feeds it decoded [`ClientRequest`]s and writes back the returned
//! [`ServerResponse`]s; server events are read independently from the
//! receiver handed out by [`Session::take_event_receiver`], so broadcast
//! delivery never couples to request completion.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::engine::{ConsumerDescriptor, TransportDescriptor};
use crate::error::Result;
use crate::hub::SfuHub;
use crate::protocol::{ClientRequest, ServerEvent, ServerResponse};
use crate::types::{
    Capabilities, ConsumerId, MediaKind, MediaParams, NegotiationParams, PeerId, ProducerId,
    TransportDirection, TransportId,
};

/// Protocol handler for one connected peer
pub struct Session {
    hub: Arc<SfuHub>,
    peer_id: PeerId,
}

impl Session {
    pub(crate) fn new(hub: Arc<SfuHub>, peer_id: PeerId) -> Self {
        Self { hub, peer_id }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Take the server event receiver for this connection (once)
    pub fn take_event_receiver(&self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.hub.take_event_receiver(&self.peer_id)
    }

    /// Handle one decoded request, yielding exactly one response.
    /// Failures become error responses; they never terminate the session.
    pub async fn handle(&self, request: ClientRequest) -> ServerResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => ServerResponse::from_error(&err),
        }
    }

    async fn dispatch(&self, request: ClientRequest) -> Result<ServerResponse> {
        match request {
            ClientRequest::GetCapabilities => {
                let capabilities = self.capabilities().await?;
                Ok(ServerResponse::Capabilities { capabilities })
            }
            ClientRequest::CreateTransport { direction } => {
                let descriptor = self.create_transport(direction).await?;
                Ok(ServerResponse::TransportCreated {
                    transport_id: descriptor.id,
                    connection: descriptor.connection,
                })
            }
            ClientRequest::ConnectTransport {
                transport_id,
                negotiation,
            } => {
                self.connect_transport(&transport_id, negotiation).await?;
                Ok(ServerResponse::TransportConnected { transport_id })
            }
            ClientRequest::Produce {
                transport_id,
                kind,
                media,
            } => {
                let producer_id = self.produce(&transport_id, kind, media).await?;
                Ok(ServerResponse::Produced { producer_id })
            }
            ClientRequest::Consume {
                transport_id,
                producer_id,
                capabilities,
            } => {
                let descriptor = self
                    .consume(&transport_id, &producer_id, capabilities)
                    .await?;
                Ok(ServerResponse::Consumed {
                    consumer_id: descriptor.id,
                    producer_id,
                    kind: descriptor.kind,
                    media: descriptor.media,
                })
            }
            ClientRequest::ResumeConsumer { consumer_id } => {
                self.resume_consumer(&consumer_id).await?;
                Ok(ServerResponse::ConsumerResumed { consumer_id })
            }
            ClientRequest::CloseProducer { producer_id } => {
                self.close_producer(&producer_id).await?;
                Ok(ServerResponse::ProducerClosed { producer_id })
            }
        }
    }

    /// Negotiated engine capability set; no side effect
    pub async fn capabilities(&self) -> Result<Capabilities> {
        self.hub.capabilities().await
    }

    pub async fn create_transport(
        &self,
        direction: TransportDirection,
    ) -> Result<TransportDescriptor> {
        self.hub.create_transport(&self.peer_id, direction).await
    }

    pub async fn connect_transport(
        &self,
        transport_id: &TransportId,
        negotiation: NegotiationParams,
    ) -> Result<()> {
        self.hub
            .connect_transport(&self.peer_id, transport_id, negotiation)
            .await
    }

    pub async fn produce(
        &self,
        transport_id: &TransportId,
        kind: MediaKind,
        media: MediaParams,
    ) -> Result<ProducerId> {
        self.hub
            .produce(&self.peer_id, transport_id, kind, media)
            .await
    }

    pub async fn consume(
        &self,
        transport_id: &TransportId,
        producer_id: &ProducerId,
        capabilities: Capabilities,
    ) -> Result<ConsumerDescriptor> {
        self.hub
            .consume(&self.peer_id, transport_id, producer_id, capabilities)
            .await
    }

    pub async fn resume_consumer(&self, consumer_id: &ConsumerId) -> Result<()> {
        self.hub.resume_consumer(&self.peer_id, consumer_id).await
    }

    pub async fn close_producer(&self, producer_id: &ProducerId) -> Result<()> {
        self.hub.close_producer(&self.peer_id, producer_id).await
    }

    /// Tear down this connection's peer; idempotent
    pub async fn disconnect(&self) {
        self.hub.disconnect(&self.peer_id).await;
    }
}
