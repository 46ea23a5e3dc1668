use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::HarnessConfig;
use crate::error::ProvisionError;
use crate::substrate::{LaunchSpec, NetworkEnvironment, PortSet, Substrate, SubstrateError};

macro_rules! log_info {
    ($name:expr, $($arg:tt)*) => ({
        info!("[{}] {}", $name, format_args!($($arg)*));
    })
}

macro_rules! log_error {
    ($name:expr, $($arg:tt)*) => ({
        error!("[{}] {}", $name, format_args!($($arg)*));
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    Created,
    Running,
    Stopped,
}

/// A participant the provisioner launched, as last recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProcess {
    pub name: String,
    pub ports: PortSet,
    pub address: Ipv4Addr,
    pub bootstrap: Option<String>,
    pub state: ParticipantState,
    pub process_id: Option<String>,
    pub restarts: u32,
}

impl ParticipantProcess {
    pub fn base_port(&self) -> u16 {
        self.ports.rest
    }

    fn launch_spec(&self, network: &str) -> LaunchSpec {
        LaunchSpec {
            name: self.name.clone(),
            network: network.to_string(),
            address: self.address,
            ports: self.ports,
            bootstrap: self.bootstrap.clone(),
        }
    }
}

/// Owns the network environment and every participant process in it.
pub struct Provisioner<S: Substrate> {
    substrate: Arc<S>,
    network: NetworkEnvironment,
    participants: Arc<RwLock<BTreeMap<String, ParticipantProcess>>>,
}

impl<S: Substrate> Clone for Provisioner<S> {
    fn clone(&self) -> Self {
        Self {
            substrate: self.substrate.clone(),
            network: self.network.clone(),
            participants: self.participants.clone(),
        }
    }
}

impl<S: Substrate> Provisioner<S> {
    pub fn new(substrate: Arc<S>, network: NetworkEnvironment) -> Self {
        Self {
            substrate,
            network,
            participants: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn from_config(substrate: Arc<S>, config: &HarnessConfig) -> Result<Self, ProvisionError> {
        let network = NetworkEnvironment::new(
            &config.network.name,
            &config.network.subnet,
            config.network.gateway,
        )?;
        Ok(Self::new(substrate, network))
    }

    pub fn network(&self) -> &NetworkEnvironment {
        &self.network
    }

    pub fn substrate(&self) -> &Arc<S> {
        &self.substrate
    }

    /// Creates the network. An existing network with the same name is reused.
    pub async fn create_network(&self) -> Result<(), ProvisionError> {
        match self.substrate.create_network(&self.network).await {
            Ok(()) => {
                info!(
                    "Created network {} ({}, gateway {})",
                    self.network.name(),
                    self.network.subnet(),
                    self.network.gateway()
                );
                Ok(())
            }
            Err(SubstrateError::AlreadyExists(_)) => {
                info!("Network {} already exists", self.network.name());
                Ok(())
            }
            Err(e) => {
                error!("Failed to create network {}: {}", self.network.name(), e);
                Err(e.into())
            }
        }
    }

    /// Launches a participant and registers it under `name`.
    pub async fn create_participant(
        &self,
        name: &str,
        base_port: u16,
        address: Ipv4Addr,
        bootstrap: Option<&str>,
    ) -> Result<ParticipantProcess, ProvisionError> {
        let ports = PortSet::from_base(base_port)?;
        if !self.network.is_assignable(address) {
            return Err(ProvisionError::AddressOutsideSubnet {
                address: address.to_string(),
                subnet: self.network.subnet().to_string(),
            });
        }
        if let Some(existing) = self.participants.read().await.get(name) {
            if existing.state == ParticipantState::Running {
                return Err(ProvisionError::DuplicateParticipant(name.to_string()));
            }
        }

        let mut process = ParticipantProcess {
            name: name.to_string(),
            ports,
            address,
            bootstrap: bootstrap.map(str::to_string),
            state: ParticipantState::Created,
            process_id: None,
            restarts: 0,
        };
        match bootstrap {
            Some(target) => log_info!(
                name,
                "Starting at {} on port {}, bootstrapping from {}",
                address,
                base_port,
                target
            ),
            None => log_info!(name, "Starting at {} on port {}", address, base_port),
        }

        // Registered before launching; a failed launch stays Created.
        self.record(&process).await;
        self.launch(&mut process).await?;
        self.record(&process).await;
        Ok(process)
    }

    /// Stops a participant and relaunches it configured to bootstrap against `target`.
    pub async fn restart_with_bootstrap(
        &self,
        name: &str,
        target: &str,
    ) -> Result<ParticipantProcess, ProvisionError> {
        let mut process = self
            .participant(name)
            .await
            .ok_or_else(|| ProvisionError::UnknownParticipant(name.to_string()))?;

        log_info!(name, "Restarting with bootstrap target {}", target);
        self.halt(name).await?;
        process.state = ParticipantState::Stopped;
        process.process_id = None;
        process.bootstrap = Some(target.to_string());
        self.record(&process).await;

        self.launch(&mut process).await?;
        process.restarts += 1;
        self.record(&process).await;
        Ok(process)
    }

    /// Stops a registered participant. Stopping a stopped participant is a no-op.
    pub async fn stop_participant(&self, name: &str) -> Result<(), ProvisionError> {
        let mut process = self
            .participant(name)
            .await
            .ok_or_else(|| ProvisionError::UnknownParticipant(name.to_string()))?;

        self.halt(name).await?;
        process.state = ParticipantState::Stopped;
        process.process_id = None;
        self.record(&process).await;
        Ok(())
    }

    pub async fn participant(&self, name: &str) -> Option<ParticipantProcess> {
        self.participants.read().await.get(name).cloned()
    }

    pub async fn participants(&self) -> Vec<ParticipantProcess> {
        self.participants.read().await.values().cloned().collect()
    }

    /// The last `tail` lines a registered participant logged.
    pub async fn logs(&self, name: &str, tail: usize) -> Result<String, ProvisionError> {
        if self.participant(name).await.is_none() {
            return Err(ProvisionError::UnknownParticipant(name.to_string()));
        }
        Ok(self.substrate.logs(name, tail).await?)
    }

    /// Live running state of every registered participant.
    pub async fn status(&self) -> BTreeMap<String, bool> {
        let names: Vec<String> = self.participants.read().await.keys().cloned().collect();
        let mut status = BTreeMap::new();
        for name in names {
            let running = match self.substrate.is_running(&name).await {
                Ok(running) => running,
                Err(e) => {
                    warn!("[{}] Cannot determine running state: {}", name, e);
                    false
                }
            };
            status.insert(name, running);
        }
        status
    }

    /// Stops every participant, removes the network and forgets all state.
    ///
    /// Best effort: failures are logged and never returned.
    pub async fn teardown_all(&self) {
        let names: Vec<String> = self.participants.read().await.keys().cloned().collect();
        for name in &names {
            if let Err(e) = self.halt(name).await {
                log_error!(name, "Failed to stop during teardown: {}", e);
            }
        }

        match self.substrate.remove_network(self.network.name()).await {
            Ok(()) => info!("Removed network {}", self.network.name()),
            Err(SubstrateError::NotFound(_)) => {
                debug!("Network {} already gone", self.network.name())
            }
            Err(e) => error!("Failed to remove network {}: {}", self.network.name(), e),
        }

        self.participants.write().await.clear();
        info!("Teardown complete ({} participant(s))", names.len());
    }

    async fn launch(&self, process: &mut ParticipantProcess) -> Result<(), ProvisionError> {
        let launch = process.launch_spec(self.network.name());
        let process_id = self.substrate.run(&launch).await.map_err(|e| {
            log_error!(process.name, "Failed to start: {}", e);
            e
        })?;
        log_info!(process.name, "Running as {}", process_id);
        process.process_id = Some(process_id);
        process.state = ParticipantState::Running;
        Ok(())
    }

    // Stopping something that is already gone is not an error.
    async fn halt(&self, name: &str) -> Result<(), ProvisionError> {
        match self.substrate.stop(name).await {
            Ok(()) => {
                log_info!(name, "Stopped");
                Ok(())
            }
            Err(SubstrateError::NotFound(_)) => {
                debug!("[{}] Already stopped", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn record(&self, process: &ParticipantProcess) {
        self.participants
            .write()
            .await
            .insert(process.name.clone(), process.clone());
    }
}
