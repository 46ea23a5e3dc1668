use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use crate::config::HarnessConfig;
use crate::substrate::{
    LaunchSpec, NetworkEnvironment, Substrate, SubstrateError, CONTAINER_AUX_PORT,
    CONTAINER_DISCOVERY_PORT, CONTAINER_REST_PORT, CONTAINER_TCP_PORT, CONTAINER_WEBSOCKET_PORT,
};

/// Runs participants as containers through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerSubstrate {
    program: String,
    image: String,
    log_level: String,
}

impl DockerSubstrate {
    pub fn new(image: &str, log_level: &str) -> Self {
        Self {
            program: "docker".to_string(),
            image: image.to_string(),
            log_level: log_level.to_string(),
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(&config.image, &config.node_log_level)
    }

    /// Arguments of `docker run` for one participant.
    pub fn run_args(&self, launch: &LaunchSpec) -> Vec<String> {
        let ports = &launch.ports;
        let mut args = vec![
            "run".to_string(),
            "--name".to_string(),
            launch.name.clone(),
            "-d".to_string(),
            "--network".to_string(),
            launch.network.clone(),
            "--ip".to_string(),
            launch.address.to_string(),
        ];
        for mapping in [
            format!("{}:{}", ports.rest, CONTAINER_REST_PORT),
            format!("{}:{}", ports.tcp, CONTAINER_TCP_PORT),
            format!("{}:{}", ports.websocket, CONTAINER_WEBSOCKET_PORT),
            format!("{}:{}/udp", ports.discovery, CONTAINER_DISCOVERY_PORT),
            format!("{}:{}", ports.aux, CONTAINER_AUX_PORT),
        ] {
            args.push("-p".to_string());
            args.push(mapping);
        }

        args.push(self.image.clone());
        args.extend([
            "--listen-address=0.0.0.0".to_string(),
            "--rest=true".to_string(),
            "--rest-admin=true".to_string(),
            "--websocket-support=true".to_string(),
            format!("--log-level={}", self.log_level),
            "--rest-relay-cache-capacity=100".to_string(),
            format!("--websocket-port={}", CONTAINER_WEBSOCKET_PORT),
            format!("--rest-port={}", CONTAINER_REST_PORT),
            format!("--tcp-port={}", CONTAINER_TCP_PORT),
            format!("--discv5-udp-port={}", CONTAINER_DISCOVERY_PORT),
            "--rest-address=0.0.0.0".to_string(),
            format!("--nat=extip:{}", launch.address),
            "--peer-exchange=true".to_string(),
            "--discv5-discovery=true".to_string(),
            "--relay=true".to_string(),
        ]);
        if let Some(target) = &launch.bootstrap {
            args.push(format!("--discv5-bootstrap-node={}", target));
        }
        args
    }

    async fn docker<I, S>(&self, args: I) -> Result<String, SubstrateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Running {}", command);

        let output = Command::new(&self.program).args(&args).output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(classify(command, stderr))
        }
    }
}

// Maps the CLI's wording onto the substrate error kinds the provisioner
// treats specially.
fn classify(command: String, stderr: String) -> SubstrateError {
    let lower = stderr.to_lowercase();
    if lower.contains("already exists") || lower.contains("already in use") {
        SubstrateError::AlreadyExists(stderr)
    } else if lower.contains("no such") || lower.contains("not found") {
        SubstrateError::NotFound(stderr)
    } else {
        SubstrateError::Command { command, stderr }
    }
}

#[async_trait]
impl Substrate for DockerSubstrate {
    async fn create_network(&self, network: &NetworkEnvironment) -> Result<(), SubstrateError> {
        let gateway = network.gateway().to_string();
        self.docker([
            "network",
            "create",
            "--driver",
            "bridge",
            "--subnet",
            network.subnet(),
            "--gateway",
            gateway.as_str(),
            network.name(),
        ])
        .await?;
        info!("Created Docker network {}", network.name());
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), SubstrateError> {
        self.docker(["network", "rm", name]).await?;
        info!("Removed Docker network {}", name);
        Ok(())
    }

    async fn run(&self, launch: &LaunchSpec) -> Result<String, SubstrateError> {
        let container_id = self.docker(self.run_args(launch)).await?.trim().to_string();
        info!("Started {} with container ID {}", launch.name, container_id);
        Ok(container_id)
    }

    async fn stop(&self, name: &str) -> Result<(), SubstrateError> {
        self.docker(["stop", name]).await?;
        self.docker(["rm", name]).await?;
        info!("Stopped and removed {}", name);
        Ok(())
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<String, SubstrateError> {
        let tail = tail.to_string();
        let args = ["logs", "--tail", tail.as_str(), name];
        let output = Command::new(&self.program).args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(classify(format!("{} {}", self.program, args.join(" ")), stderr));
        }
        // The node writes its log to both streams.
        let mut logs = String::from_utf8_lossy(&output.stdout).into_owned();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    async fn is_running(&self, name: &str) -> Result<bool, SubstrateError> {
        let filter = format!("name=^/{}$", name);
        let names = self
            .docker(["ps", "--filter", filter.as_str(), "--format", "{{.Names}}"])
            .await?;
        Ok(names.lines().any(|line| line.trim() == name))
    }
}
