//! Signaling core configuration

use serde::{Deserialize, Serialize};

/// SFU signaling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SfuConfig {
    /// Maximum number of concurrently connected peers (0 = unlimited)
    pub max_peers: usize,
    /// Capacity of each peer's server event channel
    ///
    /// Fan-out delivery is best-effort: events to a peer whose channel is
    /// full are dropped for that peer only.
    pub event_channel_capacity: usize,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            max_peers: 0,
            event_channel_capacity: 64,
        }
    }
}
