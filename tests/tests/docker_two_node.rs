//! Two-node scenario against real containers
//!
//! Needs a Docker daemon and the node image; run with `--ignored`.
use relay_probe_harness::{
    verifier, DockerSubstrate, HarnessConfig, HarnessError, Provisioner, Session, TwoNodeTopology,
};
use relay_probe_integration_tests::integration::init_logging;
use std::sync::Arc;

#[tokio::test]
#[ignore] // Requires Docker
async fn test_docker_two_node_relay() {
    init_logging();
    let config = HarnessConfig::from_env().unwrap();
    let substrate = Arc::new(DockerSubstrate::from_config(&config));
    let provisioner = Provisioner::from_config(substrate, &config).unwrap();
    let config = &config;

    let received = Session::new(provisioner)
        .run(|provisioner| async move {
            let topology = TwoNodeTopology::bring_up(&provisioner, config).await?;
            let topic = config.content_topic.as_str();

            assert!(topology.joining.subscribe(topic).await?.is_acknowledged());
            assert!(topology.initial.publish(topic, "hello").await?.is_acknowledged());

            let message = verifier::wait_for_payload(
                &topology.joining,
                topic,
                "hello",
                config.timings.message_delivery,
            )
            .await?;
            Ok::<_, HarnessError>(message.decoded_payload()?)
        })
        .await
        .unwrap();

    assert_eq!(received, "hello");
}
