//! Single-node operations against a simulated participant
use relay_probe_harness::{verifier, ClientError, HarnessError, WaitTiming};
use relay_probe_integration_tests::integration::{SimulationOptions, TestHarness};
use relay_probe_lib::messages::{MAX_TIMESTAMP_NANOS, MIN_TIMESTAMP_NANOS};
use std::time::Duration;

#[tokio::test]
async fn test_node_info() {
    let harness = &TestHarness::new().await;
    let config = harness.config();

    harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            let descriptor = client.get_descriptor().await?;

            assert!(descriptor.identity_uri().starts_with("enr:"));
            assert!(descriptor.identity_uri().len() > 10);
            assert!(!descriptor.listen_addresses().is_empty());
            assert!(descriptor.listen_addresses()[0].contains(&config.initial.ip.to_string()));
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_peer_id_matches_advertised_address() {
    let harness = &TestHarness::new().await;
    let config = harness.config();

    harness
        .session()
        .run(|_| async move {
            let mut client = harness.start_node(&config.initial, None).await?;
            let expected = harness.simulator().peer_id_of(&config.initial.name).await;

            assert_eq!(client.cached_peer_id(), None);
            assert_eq!(client.peer_id().await?, expected);
            assert_eq!(client.cached_peer_id(), expected.as_deref());
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_reflects_startup() {
    let harness = &TestHarness::with_options(SimulationOptions {
        startup_delay: Duration::from_millis(600),
        ..SimulationOptions::default()
    })
    .await;
    let config = harness.config();

    harness
        .session()
        .run(|provisioner| async move {
            let node = &config.initial;
            provisioner
                .create_participant(&node.name, node.port, node.ip, None)
                .await?;
            let client = harness.client(node);

            assert!(!client.check_health().await);
            verifier::wait_for_ready(&client, config.timings.readiness).await?;
            assert!(client.check_health().await);
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_subscribe_returns_ok() {
    let harness = &TestHarness::new().await;
    let config = harness.config();

    harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            let reply = client.subscribe(&config.content_topic).await?;

            assert_eq!(reply.status, hyper::StatusCode::OK);
            assert_eq!(reply.body, "OK");
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_publish_and_confirm() {
    let harness = &TestHarness::new().await;
    let config = harness.config();
    let topic = config.content_topic.as_str();

    harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            assert!(client.subscribe(topic).await?.is_acknowledged());
            assert!(client.publish(topic, "hello").await?.is_acknowledged());

            let message =
                verifier::wait_for_payload(&client, topic, "hello", config.timings.message_delivery)
                    .await?;
            assert_eq!(message.content_topic, topic);
            assert_eq!(message.decoded_payload()?, "hello");
            assert!(message.timestamp_nanos >= MIN_TIMESTAMP_NANOS);
            assert!(message.timestamp_nanos <= MAX_TIMESTAMP_NANOS);
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_has_message_after_publish() {
    let harness = &TestHarness::new().await;
    let config = harness.config();
    let topic = config.content_topic.as_str();

    harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            client.subscribe(topic).await?;
            client.publish(topic, "ping").await?;

            assert!(client.has_message(topic, "ping").await?);
            // Fetching drains the node's buffer.
            assert!(client.fetch_messages(topic).await?.is_empty());
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_fetch_on_unsubscribed_topic_is_empty() {
    let harness = &TestHarness::new().await;
    let config = harness.config();

    harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            client.publish("never-subscribed", "lost").await?;
            assert!(client.fetch_messages("never-subscribed").await?.is_empty());
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unpublished_topic_times_out() {
    let harness = &TestHarness::new().await;
    let config = harness.config();

    let result = harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            client.subscribe("unpublished-topic").await?;
            verifier::wait_for_messages(
                &client,
                "unpublished-topic",
                1,
                WaitTiming::new(Duration::from_millis(400), Duration::from_millis(50)),
            )
            .await?;
            Ok::<_, HarnessError>(())
        })
        .await;

    match result {
        Err(HarnessError::Client(ClientError::Timeout(e))) => {
            assert!(e.description.contains("expected at least 1 message(s)"));
            assert_eq!(e.budget, Duration::from_millis(400));
        }
        other => panic!("expected a timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_topics_with_reserved_characters_round_trip() {
    let harness = &TestHarness::new().await;
    let config = harness.config();

    harness
        .session()
        .run(|_| async move {
            let client = harness.start_node(&config.initial, None).await?;
            for topic in ["/app/1/a+b/proto", "/app/1/a&b=c/proto", "/app/1/a%20b/proto"] {
                assert!(client.subscribe(topic).await?.is_acknowledged());
                assert!(client.publish(topic, "hello").await?.is_acknowledged());

                let messages = client.fetch_messages(topic).await?;
                assert_eq!(messages.len(), 1, "topic {}", topic);
                assert_eq!(messages[0].content_topic.as_deref(), Some(topic));
            }
            Ok::<_, HarnessError>(())
        })
        .await
        .unwrap();
}
