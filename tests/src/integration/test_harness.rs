use crate::integration::{NetworkSimulator, SimulatedSubstrate, SimulationOptions};
use relay_probe_harness::{
    HarnessConfig, HarnessError, NodeConfig, ParticipantClient, Provisioner, Session, Timings,
    WaitTiming,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Wires a provisioner to an in-process simulator with test-sized timings.
pub struct TestHarness {
    /// Simulated participants and network
    simulator: NetworkSimulator,
    /// Configuration with free local ports for both roles
    config: HarnessConfig,
    provisioner: Provisioner<SimulatedSubstrate>,
}

/// Installs the test logger once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Timings scaled to the simulator's sub-second delays.
pub fn fast_timings() -> Timings {
    Timings {
        readiness: WaitTiming::new(Duration::from_secs(5), Duration::from_millis(50)),
        peer_convergence: WaitTiming::new(Duration::from_secs(10), Duration::from_millis(100)),
        message_delivery: WaitTiming::new(Duration::from_secs(5), Duration::from_millis(50)),
    }
}

/// Distinct ports that were free a moment ago.
pub async fn free_ports(count: usize) -> Vec<u16> {
    let mut listeners = Vec::with_capacity(count);
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0").await.unwrap());
    }
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_options(SimulationOptions::default()).await
    }

    pub async fn with_options(options: SimulationOptions) -> Self {
        init_logging();

        let ports = free_ports(2).await;
        let mut config = HarnessConfig {
            timings: fast_timings(),
            ..HarnessConfig::default()
        };
        config.initial.port = ports[0];
        config.joining.port = ports[1];

        let simulator = NetworkSimulator::with_options(options);
        let provisioner = Provisioner::from_config(Arc::new(simulator.substrate()), &config)
            .expect("default network configuration is valid");

        Self {
            simulator,
            config,
            provisioner,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn simulator(&self) -> &NetworkSimulator {
        &self.simulator
    }

    pub fn provisioner(&self) -> &Provisioner<SimulatedSubstrate> {
        &self.provisioner
    }

    pub fn session(&self) -> Session<SimulatedSubstrate> {
        Session::new(self.provisioner.clone())
    }

    pub fn client(&self, node: &NodeConfig) -> ParticipantClient {
        ParticipantClient::new(&self.config.host, node.port).unwrap()
    }

    /// Launches a participant in the given role and waits until it is ready.
    pub async fn start_node(
        &self,
        node: &NodeConfig,
        bootstrap: Option<&str>,
    ) -> Result<ParticipantClient, HarnessError> {
        self.provisioner
            .create_participant(&node.name, node.port, node.ip, bootstrap)
            .await?;
        let client = ParticipantClient::new(&self.config.host, node.port)?;
        relay_probe_harness::verifier::wait_for_ready(&client, self.config.timings.readiness)
            .await?;
        Ok(client)
    }
}
