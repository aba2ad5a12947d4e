//! Test helpers and fixtures
//!
//! Provides an in-memory [`FakeEngine`] standing in for the external
//! media engine, plus setup helpers shared by the async tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use crate::engine::{ConsumerDescriptor, EngineError, MediaEngine, TransportDescriptor};
use crate::hub::SfuHub;
use crate::session::Session;
use crate::types::{
    Capabilities, ConnectionParams, ConsumerId, MediaKind, MediaParams, NegotiationParams,
    PeerId, ProducerId, TransportDirection, TransportId,
};
use crate::SfuConfig;

#[derive(Default)]
struct FakeEngineState {
    transports: HashSet<TransportId>,
    producers: HashMap<ProducerId, MediaKind>,
    consumers: HashSet<ConsumerId>,
    resumed: Vec<ConsumerId>,
    closed_transports: Vec<TransportId>,
    closed_producers: Vec<ProducerId>,
    closed_consumers: Vec<ConsumerId>,
}

/// Scripted media engine for tests
///
/// Tracks the resources the core asks it to create and close, and can be
/// told to fail individual operations. Capabilities containing
/// `"incompatible": true` fail the consume compatibility check.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<FakeEngineState>,
    pub fail_create_transport: AtomicBool,
    pub fail_connect_transport: AtomicBool,
    pub fail_produce: AtomicBool,
    pub fail_consume: AtomicBool,
    pub fail_resume: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn closed_transports(&self) -> Vec<TransportId> {
        self.state.lock().closed_transports.clone()
    }

    pub fn closed_producers(&self) -> Vec<ProducerId> {
        self.state.lock().closed_producers.clone()
    }

    pub fn closed_consumers(&self) -> Vec<ConsumerId> {
        self.state.lock().closed_consumers.clone()
    }

    pub fn live_producer_count(&self) -> usize {
        self.state.lock().producers.len()
    }

    pub fn resumed(&self) -> Vec<ConsumerId> {
        self.state.lock().resumed.clone()
    }

    fn fail(flag: &AtomicBool, op: &str) -> Result<(), EngineError> {
        if flag.load(Ordering::Relaxed) {
            Err(EngineError::new(format!("{op} failed")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn capabilities(&self) -> Result<Capabilities, EngineError> {
        Ok(Capabilities(json!({
            "codecs": [
                {"kind": "audio", "mime_type": "audio/opus", "clock_rate": 48000, "channels": 2},
                {"kind": "video", "mime_type": "video/VP8", "clock_rate": 90000},
            ],
        })))
    }

    async fn create_transport(
        &self,
        _direction: TransportDirection,
    ) -> Result<TransportDescriptor, EngineError> {
        Self::fail(&self.fail_create_transport, "create_transport")?;
        let id = TransportId::new(nanoid::nanoid!(12));
        self.state.lock().transports.insert(id.clone());
        Ok(TransportDescriptor {
            id,
            connection: ConnectionParams(json!({"candidates": ["127.0.0.1"]})),
        })
    }

    async fn connect_transport(
        &self,
        id: &TransportId,
        _negotiation: NegotiationParams,
    ) -> Result<(), EngineError> {
        Self::fail(&self.fail_connect_transport, "connect_transport")?;
        if !self.state.lock().transports.contains(id) {
            return Err(EngineError::new(format!("unknown transport {id}")));
        }
        Ok(())
    }

    async fn produce(
        &self,
        transport: &TransportId,
        kind: MediaKind,
        _media: MediaParams,
    ) -> Result<ProducerId, EngineError> {
        Self::fail(&self.fail_produce, "produce")?;
        let mut state = self.state.lock();
        if !state.transports.contains(transport) {
            return Err(EngineError::new(format!("unknown transport {transport}")));
        }
        let id = ProducerId::new(nanoid::nanoid!(12));
        state.producers.insert(id.clone(), kind);
        Ok(id)
    }

    async fn can_consume(&self, _producer: &ProducerId, capabilities: &Capabilities) -> bool {
        capabilities.0.get("incompatible") != Some(&json!(true))
    }

    async fn consume(
        &self,
        transport: &TransportId,
        producer: &ProducerId,
        _capabilities: Capabilities,
    ) -> Result<ConsumerDescriptor, EngineError> {
        Self::fail(&self.fail_consume, "consume")?;
        let mut state = self.state.lock();
        if !state.transports.contains(transport) {
            return Err(EngineError::new(format!("unknown transport {transport}")));
        }
        let Some(kind) = state.producers.get(producer).copied() else {
            return Err(EngineError::new(format!("unknown producer {producer}")));
        };
        let id = ConsumerId::new(nanoid::nanoid!(12));
        state.consumers.insert(id.clone());
        Ok(ConsumerDescriptor {
            id,
            kind,
            media: MediaParams(json!({"ssrc": 1234})),
        })
    }

    async fn resume_consumer(&self, id: &ConsumerId) -> Result<(), EngineError> {
        Self::fail(&self.fail_resume, "resume_consumer")?;
        let mut state = self.state.lock();
        if !state.consumers.contains(id) {
            return Err(EngineError::new(format!("unknown consumer {id}")));
        }
        state.resumed.push(id.clone());
        Ok(())
    }

    async fn close_transport(&self, id: &TransportId) {
        let mut state = self.state.lock();
        state.transports.remove(id);
        state.closed_transports.push(id.clone());
    }

    async fn close_producer(&self, id: &ProducerId) {
        let mut state = self.state.lock();
        state.producers.remove(id);
        state.closed_producers.push(id.clone());
    }

    async fn close_consumer(&self, id: &ConsumerId) {
        let mut state = self.state.lock();
        state.consumers.remove(id);
        state.closed_consumers.push(id.clone());
    }
}

/// Hub wired to a fresh fake engine
pub fn fake_hub() -> (Arc<SfuHub>, Arc<FakeEngine>) {
    fake_hub_with_config(SfuConfig::default())
}

pub fn fake_hub_with_config(config: SfuConfig) -> (Arc<SfuHub>, Arc<FakeEngine>) {
    let engine = Arc::new(FakeEngine::new());
    let hub = SfuHub::new(Arc::clone(&engine) as Arc<dyn MediaEngine>, config);
    (hub, engine)
}

/// Connect a peer and bring up one connected send and one connected
/// recv transport, the way a well-behaved client does
pub async fn ready_session(
    hub: &Arc<SfuHub>,
    peer_id: &str,
) -> (Session, TransportId, TransportId) {
    let session = hub.connect(PeerId::from(peer_id)).expect("connect");
    let send = session
        .create_transport(TransportDirection::Send)
        .await
        .expect("create send transport");
    let recv = session
        .create_transport(TransportDirection::Recv)
        .await
        .expect("create recv transport");
    session
        .connect_transport(&send.id, NegotiationParams::default())
        .await
        .expect("connect send transport");
    session
        .connect_transport(&recv.id, NegotiationParams::default())
        .await
        .expect("connect recv transport");
    (session, send.id, recv.id)
}
