//! Subscription functionality integration tests
//!
//! Start, data, completion, sharing and teardown of operations against a
//! mock server speaking `graphql-transport-ws` unless noted otherwise.

mod common;

use common::{next_published, publish_channel, wait_for_event, MockGraphqlServer};
use gqlws_client::{ClientBuilder, ClientEvent, PublishMessage, SubscriptionClient};
use serde_json::json;
use std::time::Duration;

const QUERY: &str = "subscription { foo }";

async fn ready_client(builder: ClientBuilder, server: &mut MockGraphqlServer) -> SubscriptionClient {
    let client = builder.build().unwrap();
    let mut events = client.events();
    client.connect().await;
    wait_for_event(&mut events, ClientEvent::Ready).await;
    server.next_frame_of_type("connection_init").await;
    client
}

#[tokio::test]
async fn test_data_is_published_on_service_topic() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()).service_name("svc"), &mut server).await;

    let (publish, mut published) = publish_channel();
    let id = client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    assert_eq!(id, "1");

    assert_eq!(
        server.next_frame().await,
        json!({
            "id": "1",
            "type": "subscribe",
            "payload": {"query": QUERY, "variables": {}}
        })
    );

    server.send(json!({"id": "1", "type": "next", "payload": {"data": {"foo": "bar"}}}));

    assert_eq!(
        next_published(&mut published).await,
        PublishMessage {
            topic: "svc_1".to_string(),
            payload: Some(json!({"foo": "bar"})),
        }
    );
}

#[tokio::test]
async fn test_complete_publishes_null_and_removes_operation() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()).service_name("svc"), &mut server).await;

    let (publish, mut published) = publish_channel();
    let id = client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    server.next_frame_of_type("subscribe").await;

    server.send(json!({"id": id, "type": "complete"}));

    let message = next_published(&mut published).await;
    assert_eq!(message.topic, "svc_1");
    assert_eq!(message.payload, None);
    assert_eq!(serde_json::to_value(&message).unwrap(), json!({"topic": "svc_1", "payload": null}));
    assert_eq!(client.operation_count().await, 0);
}

#[tokio::test]
async fn test_identical_subscriptions_share_one_operation() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (first_publish, _first) = publish_channel();
    let (second_publish, _second) = publish_channel();
    let variables = json!({"sku": "A-1", "warehouse": 3});

    let first = client
        .create_subscription(QUERY, variables.clone(), first_publish, None)
        .await
        .unwrap();
    let second = client
        .create_subscription(QUERY, variables, second_publish, None)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(client.subscriber_count(&first).await, Some(2));
    assert_eq!(client.operation_count().await, 1);

    server.next_frame_of_type("subscribe").await;
    server.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_different_variables_get_separate_operations() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (first_publish, _first) = publish_channel();
    let (second_publish, _second) = publish_channel();

    let first = client
        .create_subscription(QUERY, json!({"sku": "A-1"}), first_publish, None)
        .await
        .unwrap();
    let second = client
        .create_subscription(QUERY, json!({"sku": "B-2"}), second_publish, None)
        .await
        .unwrap();

    assert_eq!(first, "1");
    assert_eq!(second, "2");
    assert_eq!(client.operation_ids().await, vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn test_unsubscribe_stops_after_last_subscriber() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (first_publish, _first) = publish_channel();
    let (second_publish, _second) = publish_channel();
    let id = client
        .create_subscription(QUERY, json!({}), first_publish, None)
        .await
        .unwrap();
    client
        .create_subscription(QUERY, json!({}), second_publish, None)
        .await
        .unwrap();
    server.next_frame_of_type("subscribe").await;

    client.unsubscribe(&id, false).await;
    assert_eq!(client.subscriber_count(&id).await, Some(1));
    server.expect_silence(Duration::from_millis(200)).await;

    client.unsubscribe(&id, false).await;
    assert_eq!(client.subscriber_count(&id).await, Some(0));
    assert_eq!(server.next_frame().await, json!({"id": "1", "type": "complete"}));

    client.unsubscribe(&id, false).await;
    server.expect_silence(Duration::from_millis(200)).await;

    // still registered until the server confirms
    assert_eq!(client.operation_ids().await, vec![id]);
}

#[tokio::test]
async fn test_forced_unsubscribe_ignores_subscriber_count() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    for _ in 0..3 {
        let (publish, _published) = publish_channel();
        client
            .create_subscription(QUERY, json!({}), publish, None)
            .await
            .unwrap();
    }
    server.next_frame_of_type("subscribe").await;

    client.unsubscribe("1", true).await;
    assert_eq!(server.next_frame().await, json!({"id": "1", "type": "complete"}));
    assert_eq!(client.subscriber_count("1").await, Some(0));
}

#[tokio::test]
async fn test_stopped_operation_is_not_reused() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (publish, _published) = publish_channel();
    let first = client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    client.unsubscribe(&first, false).await;

    let (publish, _published) = publish_channel();
    let second = client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_error_frame_terminates_operation_and_is_echoed() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()).service_name("svc"), &mut server).await;

    let (publish, mut published) = publish_channel();
    let id = client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    server.next_frame_of_type("subscribe").await;

    let errors = json!([{"message": "field foo is gone"}]);
    server.send(json!({"id": id, "type": "error", "payload": errors}));

    assert_eq!(next_published(&mut published).await.payload, None);
    assert_eq!(
        server.next_frame().await,
        json!({"id": "1", "type": "error", "payload": errors})
    );
    assert_eq!(client.operation_count().await, 0);
    assert!(client.is_ready().await);
}

#[tokio::test]
async fn test_frames_for_unknown_operations_are_ignored() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (publish, mut published) = publish_channel();
    client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    server.next_frame_of_type("subscribe").await;

    server.send(json!({"id": "99", "type": "next", "payload": {"data": {"foo": "ghost"}}}));
    server.send(json!({"id": "99", "type": "error", "payload": []}));
    server.send(json!({"id": "99", "type": "complete"}));
    server.send(json!({"id": "1", "type": "next", "payload": {"data": {"foo": "real"}}}));

    assert_eq!(
        next_published(&mut published).await.payload,
        Some(json!({"foo": "real"}))
    );
    assert_eq!(client.operation_count().await, 1);
    server.expect_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_data_without_payload_publishes_null_data() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (publish, mut published) = publish_channel();
    client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    server.next_frame_of_type("subscribe").await;

    server.send(json!({"id": "1", "type": "next"}));
    assert_eq!(
        next_published(&mut published).await.payload,
        Some(serde_json::Value::Null)
    );
    assert_eq!(client.operation_count().await, 1);
}

#[tokio::test]
async fn test_context_connection_init_becomes_extension() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (publish, _published) = publish_channel();
    let context = json!({"_connectionInit": {"authorization": "Bearer abc"}, "user": 7});
    client
        .create_subscription(QUERY, json!({}), publish, Some(context))
        .await
        .unwrap();

    let start = server.next_frame_of_type("subscribe").await;
    assert_eq!(
        start["extensions"],
        json!([{"type": "connectionInit", "payload": {"authorization": "Bearer abc"}}])
    );
}

#[tokio::test]
async fn test_rewrite_hook_shapes_extension() {
    let mut server = MockGraphqlServer::acking().await;
    let builder = ClientBuilder::new(server.url()).rewrite_connection_init_payload(
        |value, context| {
            let user = context.and_then(|context| context.get("user")).cloned();
            Some(json!({"original": value, "user": user}))
        },
    );
    let client = ready_client(builder, &mut server).await;

    let (publish, _published) = publish_channel();
    client
        .create_subscription(
            QUERY,
            json!({}),
            publish,
            Some(json!({"_connectionInit": {"token": "t"}, "user": 7})),
        )
        .await
        .unwrap();

    let start = server.next_frame_of_type("subscribe").await;
    assert_eq!(
        start["extensions"][0]["payload"],
        json!({"original": {"token": "t"}, "user": 7})
    );
}

#[tokio::test]
async fn test_no_extensions_without_connection_init() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    let (publish, _published) = publish_channel();
    client
        .create_subscription(QUERY, json!({}), publish, Some(json!({"user": 7})))
        .await
        .unwrap();

    let start = server.next_frame_of_type("subscribe").await;
    assert!(start.get("extensions").is_none());
}

#[tokio::test]
async fn test_legacy_protocol_frame_types() {
    let mut server = MockGraphqlServer::acking().await;
    let builder = ClientBuilder::new(server.url())
        .protocols(["graphql-ws"])
        .service_name("legacy");
    let client = ready_client(builder, &mut server).await;

    let (publish, mut published) = publish_channel();
    let id = client
        .create_subscription(QUERY, json!({"n": 1}), publish, None)
        .await
        .unwrap();

    assert_eq!(
        server.next_frame().await,
        json!({"id": "1", "type": "start", "payload": {"query": QUERY, "variables": {"n": 1}}})
    );

    server.send(json!({"id": "1", "type": "data", "payload": {"data": {"foo": 1}}}));
    assert_eq!(
        next_published(&mut published).await,
        PublishMessage {
            topic: "legacy_1".to_string(),
            payload: Some(json!({"foo": 1})),
        }
    );

    client.unsubscribe(&id, false).await;
    assert_eq!(server.next_frame().await, json!({"id": "1", "type": "stop"}));
}

#[tokio::test]
async fn test_user_close_stops_and_drops_operations() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()).service_name("svc"), &mut server).await;

    let (publish, mut published) = publish_channel();
    client
        .create_subscription(QUERY, json!({}), publish, None)
        .await
        .unwrap();
    server.next_frame_of_type("subscribe").await;

    client.close(false).await;

    assert_eq!(server.next_frame().await, json!({"id": "1", "type": "complete"}));
    assert_eq!(next_published(&mut published).await.payload, None);
    assert_eq!(client.operation_count().await, 0);
    assert_eq!(client.state().await, gqlws_client::ConnectionState::Closed);
}

#[tokio::test]
async fn test_unsubscribe_all_forces_every_operation() {
    let mut server = MockGraphqlServer::acking().await;
    let client = ready_client(ClientBuilder::new(server.url()), &mut server).await;

    for sku in ["A", "B"] {
        let (publish, _published) = publish_channel();
        client
            .create_subscription(QUERY, json!({"sku": sku}), publish, None)
            .await
            .unwrap();
        client
            .create_subscription(QUERY, json!({"sku": sku}), |_| async {}, None)
            .await
            .unwrap();
    }
    server.next_frame_of_type("subscribe").await;
    server.next_frame_of_type("subscribe").await;

    client.unsubscribe_all().await;

    assert_eq!(server.next_frame().await, json!({"id": "1", "type": "complete"}));
    assert_eq!(server.next_frame().await, json!({"id": "2", "type": "complete"}));
    assert_eq!(client.subscriber_count("1").await, Some(0));
    assert_eq!(client.subscriber_count("2").await, Some(0));
}
