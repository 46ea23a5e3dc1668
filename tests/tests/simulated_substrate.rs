//! The simulated substrate honours the same contract as the Docker one
use relay_probe_harness::{LaunchSpec, NetworkEnvironment, PortSet, Substrate, SubstrateError};
use relay_probe_integration_tests::integration::{free_ports, init_logging, NetworkSimulator};
use std::net::Ipv4Addr;

fn network() -> NetworkEnvironment {
    NetworkEnvironment::new("waku", "172.18.0.0/16", Ipv4Addr::new(172, 18, 0, 1)).unwrap()
}

async fn launch_spec(name: &str, bootstrap: Option<String>) -> LaunchSpec {
    LaunchSpec {
        name: name.to_string(),
        network: "waku".to_string(),
        address: Ipv4Addr::new(172, 18, 0, 2),
        ports: PortSet::from_base(free_ports(1).await[0]).unwrap(),
        bootstrap,
    }
}

#[tokio::test]
async fn test_network_lifecycle() {
    init_logging();
    let substrate = NetworkSimulator::new().substrate();

    substrate.create_network(&network()).await.unwrap();
    assert!(matches!(
        substrate.create_network(&network()).await,
        Err(SubstrateError::AlreadyExists(_))
    ));
    substrate.remove_network("waku").await.unwrap();
    assert!(matches!(
        substrate.remove_network("waku").await,
        Err(SubstrateError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_run_requires_network() {
    init_logging();
    let substrate = NetworkSimulator::new().substrate();
    let result = substrate.run(&launch_spec("node1", None).await).await;
    assert!(matches!(result, Err(SubstrateError::NotFound(_))));
}

#[tokio::test]
async fn test_run_stop_and_logs() {
    init_logging();
    let simulator = NetworkSimulator::new();
    let substrate = simulator.substrate();
    substrate.create_network(&network()).await.unwrap();

    let spec = launch_spec("node1", None).await;
    let id = substrate.run(&spec).await.unwrap();
    assert_eq!(id, "sim-node1");
    assert!(substrate.is_running("node1").await.unwrap());
    assert!(matches!(
        substrate.run(&spec).await,
        Err(SubstrateError::AlreadyExists(_))
    ));

    let logs = substrate.logs("node1", 1).await.unwrap();
    assert_eq!(logs.lines().count(), 1);
    assert!(logs.contains("listening on /ip4/172.18.0.2/tcp/21162/p2p/"));

    substrate.stop("node1").await.unwrap();
    assert!(!substrate.is_running("node1").await.unwrap());
    assert!(matches!(
        substrate.stop("node1").await,
        Err(SubstrateError::NotFound(_))
    ));
    assert!(simulator.node_names().await.is_empty());
}

#[tokio::test]
async fn test_bootstrap_links_both_sides() {
    init_logging();
    let simulator = NetworkSimulator::new();
    let substrate = simulator.substrate();
    substrate.create_network(&network()).await.unwrap();

    substrate.run(&launch_spec("node1", None).await).await.unwrap();
    let identity = simulator.identity_of("node1").await.unwrap();
    substrate
        .run(&launch_spec("node2", Some(identity)).await)
        .await
        .unwrap();

    assert!(simulator.is_linked("node1", "node2").await);
    assert!(simulator.is_linked("node2", "node1").await);

    // An unknown bootstrap target leaves the node standalone.
    substrate
        .run(&launch_spec("node3", Some("enr:-nobody-home".to_string())).await)
        .await
        .unwrap();
    assert!(!simulator.is_linked("node3", "node1").await);

    substrate.stop("node2").await.unwrap();
    assert!(!simulator.is_linked("node1", "node2").await);
}
