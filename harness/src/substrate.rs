//! The process/network substrate the provisioner drives.
//!
//! Anything that can create a network, run a named participant on it and
//! report on that participant can stand in for Docker.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::error::ProvisionError;

/// Ports the node listens on inside its process/container.
pub const CONTAINER_REST_PORT: u16 = 21161;
pub const CONTAINER_TCP_PORT: u16 = 21162;
pub const CONTAINER_WEBSOCKET_PORT: u16 = 21163;
pub const CONTAINER_DISCOVERY_PORT: u16 = 21164;
pub const CONTAINER_AUX_PORT: u16 = 21165;

#[derive(Debug, Error)]
pub enum SubstrateError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to launch substrate command: {0}")]
    Io(#[from] std::io::Error),
}

/// An isolated address space shared by all participants of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEnvironment {
    name: String,
    subnet: String,
    base: Ipv4Addr,
    prefix_len: u8,
    gateway: Ipv4Addr,
}

impl NetworkEnvironment {
    pub fn new(name: &str, subnet: &str, gateway: Ipv4Addr) -> Result<Self, ProvisionError> {
        let invalid = || ProvisionError::InvalidSubnet(subnet.to_string());
        let (base, prefix_len) = subnet.split_once('/').ok_or_else(invalid)?;
        let base: Ipv4Addr = base.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix_len.parse().map_err(|_| invalid())?;
        if prefix_len > 32 {
            return Err(invalid());
        }

        let network = Self {
            name: name.to_string(),
            subnet: subnet.to_string(),
            base,
            prefix_len,
            gateway,
        };
        if !network.contains(gateway) {
            return Err(ProvisionError::AddressOutsideSubnet {
                address: gateway.to_string(),
                subnet: subnet.to_string(),
            });
        }
        Ok(network)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subnet(&self) -> &str {
        &self.subnet
    }

    pub fn gateway(&self) -> Ipv4Addr {
        self.gateway
    }

    fn mask(&self) -> u32 {
        match self.prefix_len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        }
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        let mask = self.mask();
        u32::from(address) & mask == u32::from(self.base) & mask
    }

    /// Whether `address` may be given to a participant: inside the subnet and
    /// not the gateway.
    pub fn is_assignable(&self, address: Ipv4Addr) -> bool {
        self.contains(address) && address != self.gateway
    }
}

/// Externally published ports, all derived from the base (REST) port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortSet {
    pub rest: u16,
    pub tcp: u16,
    pub websocket: u16,
    pub discovery: u16,
    pub aux: u16,
}

impl PortSet {
    pub fn from_base(base: u16) -> Result<Self, ProvisionError> {
        let offset = |n: u16| base.checked_add(n).ok_or(ProvisionError::PortRange(base));
        if base == 0 {
            return Err(ProvisionError::PortRange(base));
        }
        Ok(Self {
            rest: base,
            tcp: offset(1)?,
            websocket: offset(2)?,
            discovery: offset(3)?,
            aux: offset(4)?,
        })
    }
}

/// Everything the substrate needs to start one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub name: String,
    pub network: String,
    pub address: Ipv4Addr,
    pub ports: PortSet,
    /// Identity URI of a peer to dial during startup; `None` starts standalone.
    pub bootstrap: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Substrate: Send + Sync + 'static {
    /// Creates the network; an existing one yields `AlreadyExists`.
    async fn create_network(&self, network: &NetworkEnvironment) -> Result<(), SubstrateError>;

    /// Removes the network; a missing one yields `NotFound`.
    async fn remove_network(&self, name: &str) -> Result<(), SubstrateError>;

    /// Starts a participant and returns its process/container id.
    async fn run(&self, launch: &LaunchSpec) -> Result<String, SubstrateError>;

    /// Stops and removes a participant; a missing one yields `NotFound`.
    async fn stop(&self, name: &str) -> Result<(), SubstrateError>;

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SubstrateError>;

    async fn is_running(&self, name: &str) -> Result<bool, SubstrateError>;
}
