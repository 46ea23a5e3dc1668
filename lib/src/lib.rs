// Shared wire model for talking to relay nodes
pub mod descriptor;
pub mod messages;
pub mod peers;
pub mod schema;

pub use descriptor::{ParticipantDescriptor, RawDescriptor};
pub use messages::{encode_payload, Message, RawMessage};
pub use peers::{PeerProtocol, PeerRecord};
pub use schema::SchemaError;

/// Protocol identifier whose `connected` flag gates relay convergence.
pub const RELAY_PROTOCOL: &str = "/vac/waku/relay/2.0.0";

/// Scheme prefix every advertised identity URI carries.
pub const IDENTITY_URI_PREFIX: &str = "enr:";

/// Multiaddress segment that precedes the peer identifier.
pub const PEER_ID_DELIMITER: &str = "/p2p/";

// Extracts the peer identifier from a multiaddress such as
// `/ip4/172.18.0.2/tcp/60000/p2p/16Uiu2HAm...`.
// Returns the segment after the last delimiter, or None if there is none.
pub fn extract_peer_id(multiaddr: &str) -> Option<&str> {
    let (_, peer_id) = multiaddr.rsplit_once(PEER_ID_DELIMITER)?;
    if peer_id.is_empty() {
        None
    } else {
        Some(peer_id)
    }
}
