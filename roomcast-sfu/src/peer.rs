//! Per-peer connection state
//!
//! A [`Peer`] owns everything scoped to one connection: its transports,
//! the streams it publishes, the subscriptions it holds, and the channel
//! its server events are delivered on. All of it is torn down together
//! when the connection closes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::ServerEvent;
use crate::types::{
    ConnectionParams, ConsumerId, MediaKind, PeerId, ProducerId, TransportDirection, TransportId,
};

/// Connection readiness of a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Created,
    Negotiating,
    Connected,
}

/// A negotiated media channel owned by one peer
#[derive(Debug, Clone)]
pub struct Transport {
    pub id: TransportId,
    pub direction: TransportDirection,
    pub state: TransportState,
    /// Connection parameters handed to the client at creation (opaque)
    pub connection: ConnectionParams,
}

/// A stream published by this peer
#[derive(Debug, Clone)]
pub struct Producer {
    pub id: ProducerId,
    pub kind: MediaKind,
    pub transport_id: TransportId,
}

/// This peer's subscription to another peer's stream
#[derive(Debug, Clone)]
pub struct Consumer {
    pub id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    /// Subscriptions start paused; packets flow only after an explicit
    /// resume.
    pub paused: bool,
}

/// One connected client
pub struct Peer {
    /// Connection identity
    pub id: PeerId,

    /// When the connection was established
    pub joined_at: DateTime<Utc>,

    transports: RwLock<HashMap<TransportId, Transport>>,
    producers: RwLock<HashMap<ProducerId, Producer>>,
    consumers: RwLock<HashMap<ConsumerId, Consumer>>,

    /// Sender for server events to this peer. Fan-out writes here; the
    /// connection's outbound task reads from the receiver.
    events: mpsc::Sender<ServerEvent>,

    /// Receiver for server events (taken once by the outbound task)
    event_rx: Mutex<Option<mpsc::Receiver<ServerEvent>>>,
}

impl Peer {
    pub(crate) fn new(id: PeerId, event_capacity: usize) -> Self {
        // Always leaves room for the two connection handshake events
        let (events, event_rx) = mpsc::channel(event_capacity.max(2));
        Self {
            id,
            joined_at: Utc::now(),
            transports: RwLock::new(HashMap::new()),
            producers: RwLock::new(HashMap::new()),
            consumers: RwLock::new(HashMap::new()),
            events,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Take the server event receiver (can only be called once)
    pub fn take_event_receiver(&self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.lock().take()
    }

    /// Try to enqueue a server event for this peer.
    /// Returns false if the channel is full (slow client) or closed.
    pub(crate) fn try_notify(&self, event: ServerEvent) -> bool {
        match self.events.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub(crate) fn insert_transport(&self, transport: Transport) {
        self.transports.write().insert(transport.id.clone(), transport);
    }

    pub(crate) fn transport(&self, id: &TransportId) -> Option<Transport> {
        self.transports.read().get(id).cloned()
    }

    /// Returns false if the transport is no longer owned by this peer
    pub(crate) fn set_transport_state(&self, id: &TransportId, state: TransportState) -> bool {
        match self.transports.write().get_mut(id) {
            Some(transport) => {
                transport.state = state;
                true
            }
            None => false,
        }
    }

    pub(crate) fn insert_producer(&self, producer: Producer) {
        self.producers.write().insert(producer.id.clone(), producer);
    }

    pub(crate) fn remove_producer(&self, id: &ProducerId) -> Option<Producer> {
        self.producers.write().remove(id)
    }

    pub(crate) fn insert_consumer(&self, consumer: Consumer) {
        self.consumers.write().insert(consumer.id.clone(), consumer);
    }

    pub(crate) fn consumer(&self, id: &ConsumerId) -> Option<Consumer> {
        self.consumers.read().get(id).cloned()
    }

    /// Returns false if the consumer is no longer owned by this peer
    pub(crate) fn set_consumer_resumed(&self, id: &ConsumerId) -> bool {
        match self.consumers.write().get_mut(id) {
            Some(consumer) => {
                consumer.paused = false;
                true
            }
            None => false,
        }
    }

    /// Drop this peer's subscriptions to the given producer, returning
    /// their ids for engine-side teardown
    pub(crate) fn remove_consumers_of(&self, producer_id: &ProducerId) -> Vec<ConsumerId> {
        let mut consumers = self.consumers.write();
        let doomed: Vec<ConsumerId> = consumers
            .values()
            .filter(|c| c.producer_id == *producer_id)
            .map(|c| c.id.clone())
            .collect();
        for id in &doomed {
            consumers.remove(id);
        }
        doomed
    }

    /// Ids of all streams this peer currently publishes
    pub fn producer_ids(&self) -> Vec<ProducerId> {
        self.producers.read().keys().cloned().collect()
    }

    /// Empty all owned state for teardown, returning the ids to close on
    /// the engine
    pub(crate) fn drain_resources(&self) -> (Vec<TransportId>, Vec<ProducerId>, Vec<ConsumerId>) {
        let transports = self.transports.write().drain().map(|(id, _)| id).collect();
        let producers = self.producers.write().drain().map(|(id, _)| id).collect();
        let consumers = self.consumers.write().drain().map(|(id, _)| id).collect();
        (transports, producers, consumers)
    }

    pub fn transport_count(&self) -> usize {
        self.transports.read().len()
    }

    pub fn producer_count(&self) -> usize {
        self.producers.read().len()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        debug!(peer_id = %self.id, "peer dropped");
        // Dropping the event sender closes the channel and stops the
        // connection's outbound task.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_peer() -> Peer {
        Peer::new(PeerId::from("peer1"), 8)
    }

    fn test_transport(id: &str) -> Transport {
        Transport {
            id: TransportId::from(id),
            direction: TransportDirection::Send,
            state: TransportState::Created,
            connection: ConnectionParams::default(),
        }
    }

    #[test]
    fn test_transport_state_transitions() {
        let peer = test_peer();
        peer.insert_transport(test_transport("t1"));

        assert!(peer.set_transport_state(&TransportId::from("t1"), TransportState::Connected));
        assert_eq!(
            peer.transport(&TransportId::from("t1")).unwrap().state,
            TransportState::Connected
        );

        // Unknown transport is reported, not created
        assert!(!peer.set_transport_state(&TransportId::from("t9"), TransportState::Connected));
    }

    #[test]
    fn test_event_receiver_taken_once() {
        let peer = test_peer();
        assert!(peer.take_event_receiver().is_some());
        assert!(peer.take_event_receiver().is_none());
    }

    #[test]
    fn test_notify_full_channel() {
        // Requested capacity of one clamps to two for the handshake events
        let peer = Peer::new(PeerId::from("peer1"), 1);
        let event = ServerEvent::NewStream {
            producer_id: ProducerId::from("p1"),
        };
        assert!(peer.try_notify(event.clone()));
        assert!(peer.try_notify(event.clone()));
        // Capacity exhausted: delivery is refused, not blocked
        assert!(!peer.try_notify(event));
    }

    #[test]
    fn test_remove_consumers_of() {
        let peer = test_peer();
        peer.insert_consumer(Consumer {
            id: ConsumerId::from("c1"),
            producer_id: ProducerId::from("p1"),
            kind: MediaKind::Video,
            paused: true,
        });
        peer.insert_consumer(Consumer {
            id: ConsumerId::from("c2"),
            producer_id: ProducerId::from("p2"),
            kind: MediaKind::Audio,
            paused: true,
        });

        let doomed = peer.remove_consumers_of(&ProducerId::from("p1"));
        assert_eq!(doomed, vec![ConsumerId::from("c1")]);
        assert_eq!(peer.consumer_count(), 1);
        assert!(peer.consumer(&ConsumerId::from("c2")).is_some());
    }

    #[test]
    fn test_drain_resources() {
        let peer = test_peer();
        peer.insert_transport(test_transport("t1"));
        peer.insert_producer(Producer {
            id: ProducerId::from("p1"),
            kind: MediaKind::Video,
            transport_id: TransportId::from("t1"),
        });

        let (transports, producers, consumers) = peer.drain_resources();
        assert_eq!(transports.len(), 1);
        assert_eq!(producers.len(), 1);
        assert!(consumers.is_empty());
        assert_eq!(peer.transport_count(), 0);
        assert_eq!(peer.producer_count(), 0);
    }
}
