//! Global index of live streams
//!
//! Maps every currently published producer to its owning peer, in
//! insertion order. The directory mirrors the union of all peers' live
//! producers at all times: entries appear when a produce succeeds and
//! vanish before any new subscription can observe the producer gone.
//!
//! The struct itself is plain data; the hub wraps it in its coordination
//! lock, which also serializes fan-out and registry membership changes
//! (see `hub.rs`).

use indexmap::IndexMap;
use tracing::error;

use crate::error::{Error, Result};
use crate::types::{PeerId, ProducerId};

/// Directory of all live producers across all peers
#[derive(Default)]
pub struct StreamDirectory {
    entries: IndexMap<ProducerId, PeerId>,
}

impl StreamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly published producer.
    ///
    /// Producer ids are engine-generated and globally unique; a collision
    /// is an invariant violation and is never silently ignored.
    pub(crate) fn advertise(&mut self, producer_id: ProducerId, owner: PeerId) -> Result<()> {
        if self.entries.contains_key(&producer_id) {
            error!(producer_id = %producer_id, "producer id collision");
            return Err(Error::AlreadyAdvertised(producer_id));
        }
        self.entries.insert(producer_id, owner);
        Ok(())
    }

    /// Remove a producer; no-op if absent, to tolerate concurrent
    /// disconnect/withdraw races. Returns the owner when removed.
    pub(crate) fn withdraw(&mut self, producer_id: &ProducerId) -> Option<PeerId> {
        self.entries.shift_remove(producer_id)
    }

    pub fn contains(&self, producer_id: &ProducerId) -> bool {
        self.entries.contains_key(producer_id)
    }

    pub fn owner(&self, producer_id: &ProducerId) -> Option<&PeerId> {
        self.entries.get(producer_id)
    }

    /// Every live producer id at a single consistent point in time, in
    /// publication order
    pub fn snapshot(&self) -> Vec<ProducerId> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
