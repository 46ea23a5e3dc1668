use futures::FutureExt;
use log::{error, info};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use crate::client::ParticipantClient;
use crate::config::HarnessConfig;
use crate::error::{HarnessError, ProvisionError};
use crate::provisioner::Provisioner;
use crate::substrate::Substrate;
use crate::verifier;

/// Scopes a scenario to a network environment.
///
/// The environment is torn down on every exit path, including panics, which
/// are resumed after teardown.
pub struct Session<S: Substrate> {
    provisioner: Provisioner<S>,
}

impl<S: Substrate> Session<S> {
    pub fn new(provisioner: Provisioner<S>) -> Self {
        Self { provisioner }
    }

    pub fn provisioner(&self) -> &Provisioner<S> {
        &self.provisioner
    }

    pub async fn run<T, E, F, Fut>(&self, scenario: F) -> Result<T, E>
    where
        F: FnOnce(Provisioner<S>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<ProvisionError> + std::fmt::Display,
    {
        let provisioner = self.provisioner.clone();
        let outcome = AssertUnwindSafe(async move {
            provisioner.create_network().await?;
            scenario(provisioner).await
        })
        .catch_unwind()
        .await;

        self.provisioner.teardown_all().await;

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Scenario failed: {}", e);
                Err(e)
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

/// The canonical two-node layout: an initial node and a node that joins it.
pub struct TwoNodeTopology {
    pub initial: ParticipantClient,
    pub joining: ParticipantClient,
    /// Identity URI the joining node bootstrapped from.
    pub bootstrap_uri: String,
}

impl TwoNodeTopology {
    /// Starts the initial node, waits for it, then starts the joining node
    /// against its identity URI and waits for the relay connection.
    pub async fn bring_up<S: Substrate>(
        provisioner: &Provisioner<S>,
        config: &HarnessConfig,
    ) -> Result<Self, HarnessError> {
        let timings = &config.timings;

        provisioner
            .create_participant(&config.initial.name, config.initial.port, config.initial.ip, None)
            .await?;
        let initial = ParticipantClient::new(&config.host, config.initial.port)?;
        verifier::wait_for_ready(&initial, timings.readiness).await?;

        let bootstrap_uri = initial.identity_uri().await?;
        info!("{} identity URI: {}", config.initial.name, bootstrap_uri);

        provisioner
            .create_participant(
                &config.joining.name,
                config.joining.port,
                config.joining.ip,
                Some(&bootstrap_uri),
            )
            .await?;
        let joining = ParticipantClient::new(&config.host, config.joining.port)?;
        verifier::wait_for_ready(&joining, timings.readiness).await?;

        verifier::wait_for_peer(
            &joining,
            &config.initial.ip.to_string(),
            timings.peer_convergence,
        )
        .await?;
        info!(
            "{} and {} are relay-connected",
            config.initial.name, config.joining.name
        );

        Ok(Self {
            initial,
            joining,
            bootstrap_uri,
        })
    }
}
