//! Error types for the signaling core

use thiserror::Error;

use crate::engine::EngineError;
use crate::types::{PeerId, ProducerId, TransportId};

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned to the originating request
///
/// None of these terminate the connection or affect other peers; a
/// rejected operation leaves all shared state unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced id does not exist or does not belong to the caller.
    /// Ids owned by another peer are reported as not found, never honored.
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// The operation requires a connected transport; retry after connecting.
    #[error("transport not connected: {0}")]
    TransportNotReady(TransportId),

    /// The subscriber's capabilities cannot consume this producer.
    #[error("capabilities incompatible with producer {0}")]
    IncompatibleCapabilities(ProducerId),

    /// The media engine call failed. Shared state is untouched since
    /// mutations only happen after engine success.
    #[error("media engine failure: {0}")]
    Engine(#[from] EngineError),

    /// Invariant violation: the connection layer handed out a duplicate id.
    #[error("connection id already registered: {0}")]
    DuplicateConnection(PeerId),

    /// Invariant violation: the engine generated a colliding producer id.
    #[error("producer already advertised: {0}")]
    AlreadyAdvertised(ProducerId),

    /// The calling peer disconnected while the operation was in flight.
    #[error("peer disconnected")]
    PeerClosed,

    /// The configured peer limit was reached.
    #[error("peer limit reached ({0})")]
    PeerLimitReached(usize),
}

impl Error {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound(kind, id.to_string())
    }

    /// Stable machine-readable code carried in error responses
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(..) => "not-found",
            Self::TransportNotReady(_) => "transport-not-ready",
            Self::IncompatibleCapabilities(_) => "incompatible-capabilities",
            Self::Engine(_) => "engine-failure",
            Self::DuplicateConnection(_) => "duplicate-connection",
            Self::AlreadyAdvertised(_) => "already-advertised",
            Self::PeerClosed => "peer-closed",
            Self::PeerLimitReached(_) => "peer-limit-reached",
        }
    }
}
