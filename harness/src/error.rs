use hyper::StatusCode;
use relay_probe_lib::SchemaError;
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::polling::WaitTimeout;
use crate::substrate::SubstrateError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the participant HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("request to {url} timed out after {after:?}")]
    RequestTimeout { url: String, after: Duration },

    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("invalid response from participant: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid participant URL: {0}")]
    Url(String),

    #[error(transparent)]
    Timeout(#[from] WaitTimeout),
}

impl ClientError {
    /// Connection, timeout and status failures; the kind a poll may ride out.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. }
                | ClientError::RequestTimeout { .. }
                | ClientError::Status { .. }
        )
    }
}

/// Failures of environment and participant lifecycle operations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("substrate operation failed: {0}")]
    Substrate(#[from] SubstrateError),

    #[error("participant {0} has not been created")]
    UnknownParticipant(String),

    #[error("participant {0} is already running")]
    DuplicateParticipant(String),

    #[error("base port {0} leaves no room for the derived port set")]
    PortRange(u16),

    #[error("invalid subnet {0:?}")]
    InvalidSubnet(String),

    #[error("address {address} is not assignable in subnet {subnet}")]
    AddressOutsideSubnet { address: String, subnet: String },
}

/// Anything a scenario can fail with.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Timeout(#[from] WaitTimeout),
}
