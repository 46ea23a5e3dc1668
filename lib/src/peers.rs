use serde::{Deserialize, Serialize};

use crate::{extract_peer_id, RELAY_PROTOCOL};

/// One protocol a peer supports, with its current connection state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerProtocol {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub connected: bool,
}

/// An entry of `/admin/v1/peers`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerRecord {
    #[serde(default)]
    pub multiaddr: String,
    #[serde(default)]
    pub protocols: Vec<PeerProtocol>,
}

impl PeerRecord {
    pub fn peer_id(&self) -> Option<&str> {
        extract_peer_id(&self.multiaddr)
    }

    /// True only when the relay protocol is listed and currently connected.
    pub fn is_relay_connected(&self) -> bool {
        self.protocols
            .iter()
            .any(|p| p.protocol == RELAY_PROTOCOL && p.connected)
    }

    /// Matches either a literal substring of the multiaddress or the exact
    /// extracted identifier. Both are accepted because some responses carry
    /// the identifier in a form extraction does not find.
    pub fn matches(&self, identifier: &str) -> bool {
        self.multiaddr.contains(identifier) || self.peer_id() == Some(identifier)
    }
}
