//! Top-level coordination for the signaling core
//!
//! The [`SfuHub`] owns the peer registry, the stream directory and the
//! media engine handle, and implements the operations the per-connection
//! sessions drive.
//!
//! ## Locking discipline
//!
//! The directory mutex doubles as the coordination lock. Every directory
//! mutation or snapshot, every registry membership change and every
//! fan-out enumeration happens while holding it, which linearizes
//! {advertise + announce}, {register + snapshot} and {withdraw +
//! retract}: a joining peer sees each producer in exactly one of its
//! initial snapshot or a later announce, never both, never neither.
//!
//! The lock is synchronous and is never held across an engine call or
//! any await point. Engine calls run lock-free, so a hung engine blocks
//! only the one connection driving it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SfuConfig;
use crate::directory::StreamDirectory;
use crate::engine::{ConsumerDescriptor, MediaEngine, TransportDescriptor};
use crate::error::{Error, Result};
use crate::peer::{Consumer, Peer, Producer, Transport, TransportState};
use crate::protocol::ServerEvent;
use crate::registry::PeerRegistry;
use crate::session::Session;
use crate::types::{
    Capabilities, ConsumerId, MediaKind, MediaParams, NegotiationParams, PeerId, ProducerId,
    TransportDirection, TransportId,
};

/// Aggregate counters over the hub
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HubStats {
    /// Connected peers
    pub peers: usize,
    /// Live producers in the directory
    pub producers: usize,
    /// Subscriptions across all peers
    pub consumers: usize,
    /// Notifications dropped because a peer's event channel was full
    pub events_dropped: u64,
}

/// Coordination hub shared by all connections
pub struct SfuHub {
    config: SfuConfig,
    engine: Arc<dyn MediaEngine>,
    registry: PeerRegistry,
    /// Coordination lock (see module docs)
    directory: Mutex<StreamDirectory>,
    events_dropped: AtomicU64,
}

impl SfuHub {
    pub fn new(engine: Arc<dyn MediaEngine>, config: SfuConfig) -> Arc<Self> {
        let hub = Arc::new(Self {
            config,
            engine,
            registry: PeerRegistry::new(),
            directory: Mutex::new(StreamDirectory::new()),
            events_dropped: AtomicU64::new(0),
        });
        info!(
            max_peers = hub.config.max_peers,
            event_channel_capacity = hub.config.event_channel_capacity,
            "signaling hub initialized"
        );
        hub
    }

    pub fn with_defaults(engine: Arc<dyn MediaEngine>) -> Arc<Self> {
        Self::new(engine, SfuConfig::default())
    }

    /// Register a new connection and hand back its session.
    ///
    /// The `connected` acknowledgement and the `existing-streams`
    /// snapshot are enqueued before the coordination lock drops, so no
    /// announce can be ordered ahead of them on this peer's channel.
    pub fn connect(self: &Arc<Self>, peer_id: PeerId) -> Result<Session> {
        let peer = Arc::new(Peer::new(
            peer_id.clone(),
            self.config.event_channel_capacity,
        ));
        {
            let dir = self.directory.lock();
            if self.config.max_peers > 0 && self.registry.len() >= self.config.max_peers {
                warn!(
                    peers = self.registry.len(),
                    max_peers = self.config.max_peers,
                    "peer limit reached"
                );
                return Err(Error::PeerLimitReached(self.config.max_peers));
            }
            self.registry.register(Arc::clone(&peer))?;
            peer.try_notify(ServerEvent::Connected {
                peer_id: peer_id.clone(),
            });
            peer.try_notify(ServerEvent::ExistingStreams {
                producer_ids: dir.snapshot(),
            });
        }
        info!(peer_id = %peer_id, peers = self.registry.len(), "peer connected");
        Ok(Session::new(Arc::clone(self), peer_id))
    }

    /// Tear down a connection; idempotent and safe to run concurrently
    /// with late-completing operations of the same peer.
    pub async fn disconnect(&self, peer_id: &PeerId) {
        let mut doomed_consumers: Vec<ConsumerId> = Vec::new();
        let peer = {
            let mut dir = self.directory.lock();
            let Some(peer) = self.registry.unregister(peer_id) else {
                debug!(peer_id = %peer_id, "disconnect for unknown peer");
                return;
            };
            // Withdraw every published stream and notify the remaining
            // peers before any engine-side teardown happens
            for producer_id in peer.producer_ids() {
                let _ = dir.withdraw(&producer_id);
                self.fan_out(
                    &ServerEvent::StreamWithdrawn {
                        producer_id: producer_id.clone(),
                    },
                    None,
                );
                for other in self.registry.snapshot_peers() {
                    doomed_consumers.extend(other.remove_consumers_of(&producer_id));
                }
            }
            peer
        };

        // Engine teardown is best-effort: the resources are being
        // discarded regardless, so failures stay in the engine's logs
        let (transports, producers, consumers) = peer.drain_resources();
        for id in &producers {
            self.engine.close_producer(id).await;
        }
        for id in &consumers {
            self.engine.close_consumer(id).await;
        }
        for id in &doomed_consumers {
            self.engine.close_consumer(id).await;
        }
        for id in &transports {
            self.engine.close_transport(id).await;
        }
        info!(
            peer_id = %peer_id,
            peers = self.registry.len(),
            withdrawn = producers.len(),
            "peer disconnected"
        );
    }

    pub(crate) async fn capabilities(&self) -> Result<Capabilities> {
        Ok(self.engine.capabilities().await?)
    }

    pub(crate) async fn create_transport(
        &self,
        peer_id: &PeerId,
        direction: TransportDirection,
    ) -> Result<TransportDescriptor> {
        let peer = self.peer(peer_id)?;
        let descriptor = self.engine.create_transport(direction).await?;
        let stored = {
            let _dir = self.directory.lock();
            if self.is_current(&peer) {
                peer.insert_transport(Transport {
                    id: descriptor.id.clone(),
                    direction,
                    state: TransportState::Created,
                    connection: descriptor.connection.clone(),
                });
                true
            } else {
                false
            }
        };
        if !stored {
            self.engine.close_transport(&descriptor.id).await;
            return Err(Error::PeerClosed);
        }
        debug!(
            peer_id = %peer_id,
            transport_id = %descriptor.id,
            direction = ?direction,
            "transport created"
        );
        Ok(descriptor)
    }

    pub(crate) async fn connect_transport(
        &self,
        peer_id: &PeerId,
        transport_id: &TransportId,
        negotiation: NegotiationParams,
    ) -> Result<()> {
        let peer = self.peer(peer_id)?;
        // Scoped to the calling peer: another peer's transport id is
        // reported as not found, never honored
        let transport = peer
            .transport(transport_id)
            .ok_or_else(|| Error::not_found("transport", transport_id))?;
        if transport.state == TransportState::Connected {
            debug!(peer_id = %peer_id, transport_id = %transport_id, "transport already connected");
            return Ok(());
        }
        peer.set_transport_state(transport_id, TransportState::Negotiating);
        match self.engine.connect_transport(transport_id, negotiation).await {
            Ok(()) => {
                peer.set_transport_state(transport_id, TransportState::Connected);
                info!(peer_id = %peer_id, transport_id = %transport_id, "transport connected");
                Ok(())
            }
            Err(err) => {
                // Back to created so the client can retry negotiation
                peer.set_transport_state(transport_id, TransportState::Created);
                Err(err.into())
            }
        }
    }

    pub(crate) async fn produce(
        &self,
        peer_id: &PeerId,
        transport_id: &TransportId,
        kind: MediaKind,
        media: MediaParams,
    ) -> Result<ProducerId> {
        let peer = self.peer(peer_id)?;
        let transport = peer
            .transport(transport_id)
            .ok_or_else(|| Error::not_found("transport", transport_id))?;
        if transport.state != TransportState::Connected {
            return Err(Error::TransportNotReady(transport_id.clone()));
        }

        let producer_id = self.engine.produce(transport_id, kind, media).await?;

        let stored = {
            let mut dir = self.directory.lock();
            if !self.is_current(&peer) {
                Err(Error::PeerClosed)
            } else {
                match dir.advertise(producer_id.clone(), peer_id.clone()) {
                    Ok(()) => {
                        peer.insert_producer(Producer {
                            id: producer_id.clone(),
                            kind,
                            transport_id: transport_id.clone(),
                        });
                        self.fan_out(
                            &ServerEvent::NewStream {
                                producer_id: producer_id.clone(),
                            },
                            Some(peer_id),
                        );
                        Ok(dir.len())
                    }
                    Err(err) => Err(err),
                }
            }
        };
        match stored {
            Ok(streams) => {
                info!(
                    peer_id = %peer_id,
                    producer_id = %producer_id,
                    kind = %kind,
                    streams,
                    "stream published"
                );
                Ok(producer_id)
            }
            Err(err) => {
                // Late completion or id collision: the engine-side
                // producer must not outlive its bookkeeping
                self.engine.close_producer(&producer_id).await;
                Err(err)
            }
        }
    }

    pub(crate) async fn consume(
        &self,
        peer_id: &PeerId,
        transport_id: &TransportId,
        producer_id: &ProducerId,
        capabilities: Capabilities,
    ) -> Result<ConsumerDescriptor> {
        let peer = self.peer(peer_id)?;
        let transport = peer
            .transport(transport_id)
            .ok_or_else(|| Error::not_found("transport", transport_id))?;
        if transport.state != TransportState::Connected {
            return Err(Error::TransportNotReady(transport_id.clone()));
        }
        if !self.directory.lock().contains(producer_id) {
            return Err(Error::not_found("producer", producer_id));
        }
        if !self.engine.can_consume(producer_id, &capabilities).await {
            return Err(Error::IncompatibleCapabilities(producer_id.clone()));
        }

        let descriptor = self.engine.consume(transport_id, producer_id, capabilities).await?;

        let stored = {
            let dir = self.directory.lock();
            if !self.is_current(&peer) {
                Err(Error::PeerClosed)
            } else if !dir.contains(producer_id) {
                // The producer vanished while the engine call was in flight
                Err(Error::not_found("producer", producer_id))
            } else {
                peer.insert_consumer(Consumer {
                    id: descriptor.id.clone(),
                    producer_id: producer_id.clone(),
                    kind: descriptor.kind,
                    paused: true,
                });
                Ok(())
            }
        };
        if let Err(err) = stored {
            self.engine.close_consumer(&descriptor.id).await;
            return Err(err);
        }
        debug!(
            peer_id = %peer_id,
            consumer_id = %descriptor.id,
            producer_id = %producer_id,
            "subscription created"
        );
        Ok(descriptor)
    }

    pub(crate) async fn resume_consumer(
        &self,
        peer_id: &PeerId,
        consumer_id: &ConsumerId,
    ) -> Result<()> {
        let peer = self.peer(peer_id)?;
        let consumer = peer
            .consumer(consumer_id)
            .ok_or_else(|| Error::not_found("consumer", consumer_id))?;
        if !consumer.paused {
            debug!(peer_id = %peer_id, consumer_id = %consumer_id, "consumer already resumed");
            return Ok(());
        }
        self.engine.resume_consumer(consumer_id).await?;
        peer.set_consumer_resumed(consumer_id);
        debug!(peer_id = %peer_id, consumer_id = %consumer_id, "consumer resumed");
        Ok(())
    }

    /// Stop publishing a stream without disconnecting the peer
    pub(crate) async fn close_producer(
        &self,
        peer_id: &PeerId,
        producer_id: &ProducerId,
    ) -> Result<()> {
        let peer = self.peer(peer_id)?;
        let mut doomed_consumers: Vec<ConsumerId> = Vec::new();
        {
            let mut dir = self.directory.lock();
            if peer.remove_producer(producer_id).is_none() {
                return Err(Error::not_found("producer", producer_id));
            }
            let _ = dir.withdraw(producer_id);
            self.fan_out(
                &ServerEvent::StreamWithdrawn {
                    producer_id: producer_id.clone(),
                },
                Some(peer_id),
            );
            for other in self.registry.snapshot_peers() {
                doomed_consumers.extend(other.remove_consumers_of(producer_id));
            }
        }
        self.engine.close_producer(producer_id).await;
        for id in &doomed_consumers {
            self.engine.close_consumer(id).await;
        }
        info!(peer_id = %peer_id, producer_id = %producer_id, "producer closed");
        Ok(())
    }

    pub(crate) fn take_event_receiver(
        &self,
        peer_id: &PeerId,
    ) -> Option<tokio::sync::mpsc::Receiver<ServerEvent>> {
        self.registry
            .lookup(peer_id)
            .and_then(|peer| peer.take_event_receiver())
    }

    pub fn peer_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stream_count(&self) -> usize {
        self.directory.lock().len()
    }

    pub fn config(&self) -> &SfuConfig {
        &self.config
    }

    /// Aggregate counters at a single consistent point in time
    pub fn stats(&self) -> HubStats {
        let dir = self.directory.lock();
        let peers = self.registry.snapshot_peers();
        HubStats {
            peers: peers.len(),
            producers: dir.len(),
            consumers: peers.iter().map(|p| p.consumer_count()).sum(),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }

    fn peer(&self, id: &PeerId) -> Result<Arc<Peer>> {
        self.registry.lookup(id).ok_or(Error::PeerClosed)
    }

    /// Whether this exact peer object is still the one registered under
    /// its id (a reconnect may reuse the id after a disconnect)
    fn is_current(&self, peer: &Arc<Peer>) -> bool {
        self.registry
            .lookup(&peer.id)
            .is_some_and(|current| Arc::ptr_eq(&current, peer))
    }

    /// Enqueue an event to every registered peer except `exclude`.
    /// Call only while holding the coordination lock.
    fn fan_out(&self, event: &ServerEvent, exclude: Option<&PeerId>) {
        for peer in self.registry.snapshot_peers() {
            if exclude == Some(&peer.id) {
                continue;
            }
            if !peer.try_notify(event.clone()) {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(peer_id = %peer.id, "event channel full or closed, dropping notification");
            }
        }
    }
}
