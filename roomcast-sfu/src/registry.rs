//! Connected-peer registry
//!
//! Lookups on the request path are lock-free; membership changes
//! (register/unregister) must happen while holding the hub's coordination
//! lock so that fan-out enumeration and directory snapshots observe a
//! consistent peer set.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::error;

use crate::error::{Error, Result};
use crate::peer::Peer;
use crate::types::PeerId;

/// Registry of all currently connected peers
#[derive(Default)]
pub struct PeerRegistry {
    peers: DashMap<PeerId, Arc<Peer>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly connected peer.
    ///
    /// A duplicate id is an invariant violation by the connection layer,
    /// not a recoverable condition. Call only under the coordination lock.
    pub(crate) fn register(&self, peer: Arc<Peer>) -> Result<()> {
        match self.peers.entry(peer.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                error!(peer_id = %peer.id, "duplicate connection id");
                Err(Error::DuplicateConnection(peer.id.clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(peer);
                Ok(())
            }
        }
    }

    /// Look up a peer by connection id
    pub fn lookup(&self, id: &PeerId) -> Option<Arc<Peer>> {
        self.peers.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a peer; idempotent. Call only under the coordination lock.
    pub(crate) fn unregister(&self, id: &PeerId) -> Option<Arc<Peer>> {
        self.peers.remove(id).map(|(_, peer)| peer)
    }

    /// All registered peers, for fan-out enumeration.
    /// Call only under the coordination lock.
    pub(crate) fn snapshot_peers(&self) -> Vec<Arc<Peer>> {
        self.peers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
