use serde::{Deserialize, Serialize};

use crate::schema::SchemaError;
use crate::{extract_peer_id, IDENTITY_URI_PREFIX};

/// Identity URIs of this length or shorter are rejected as truncated.
pub const MIN_IDENTITY_URI_LEN: usize = 10;

/// Unvalidated `/debug/v1/info` body, exactly as the node sends it.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawDescriptor {
    #[serde(default)]
    pub listen_addresses: Option<Vec<String>>,
    #[serde(default)]
    pub enr_uri: Option<String>,
}

/// The self-reported identity and addresses of a participant.
///
/// Only obtainable through [`TryFrom<RawDescriptor>`], so every value
/// has at least one listen address and a well-formed identity URI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "RawDescriptor", rename_all = "camelCase")]
pub struct ParticipantDescriptor {
    listen_addresses: Vec<String>,
    #[serde(rename = "enrUri")]
    identity_uri: String,
}

impl ParticipantDescriptor {
    /// Parses and validates a descriptor from a response body.
    pub fn from_json(body: &[u8]) -> Result<Self, SchemaError> {
        let raw: RawDescriptor = serde_json::from_slice(body)?;
        Self::try_from(raw)
    }

    pub fn listen_addresses(&self) -> &[String] {
        &self.listen_addresses
    }

    pub fn identity_uri(&self) -> &str {
        &self.identity_uri
    }

    /// Resolves the peer identifier from the first listen address that carries one.
    ///
    /// `None` is not an error; the caller decides whether to ask again later.
    pub fn resolve_peer_id(&self) -> Option<String> {
        self.listen_addresses
            .iter()
            .find_map(|addr| extract_peer_id(addr))
            .map(str::to_owned)
    }
}

impl TryFrom<RawDescriptor> for ParticipantDescriptor {
    type Error = SchemaError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let listen_addresses = raw
            .listen_addresses
            .ok_or(SchemaError::MissingField("listenAddresses"))?;
        if listen_addresses.is_empty() {
            return Err(SchemaError::EmptyListenAddresses);
        }

        let identity_uri = raw.enr_uri.ok_or(SchemaError::MissingField("enrUri"))?;
        if !identity_uri.starts_with(IDENTITY_URI_PREFIX)
            || identity_uri.len() <= MIN_IDENTITY_URI_LEN
        {
            return Err(SchemaError::InvalidIdentityUri {
                uri: identity_uri,
                prefix: IDENTITY_URI_PREFIX,
                min_len: MIN_IDENTITY_URI_LEN,
            });
        }

        Ok(Self {
            listen_addresses,
            identity_uri,
        })
    }
}
