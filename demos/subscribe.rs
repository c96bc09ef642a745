//! Subscription client example
//!
//! Subscribes to a GraphQL service and prints every result until Ctrl-C.
//!
//! Run with: cargo run --example subscribe -- ws://localhost:4000/graphql

use gqlws::{ClientBuilder, ClientEvent};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gqlws_client=debug".into()),
        )
        .init();

    let uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:4000/graphql".to_string());

    let client = ClientBuilder::new(uri)
        .service_name("demo")
        .reconnect(true)
        .max_reconnect_attempts(5)
        .keep_alive(Duration::from_secs(15))
        .connection_init_payload(json!({"authorization": "Bearer demo-token"}))
        .on_connected(|| async { println!("Connected") })
        .on_connection_failed(|payload| async move {
            println!("Connection rejected: {:?}", payload);
        })
        .on_reconnect_failed(|| async { println!("Giving up on reconnection") })
        .build()?;

    let mut events = client.events();
    client.connect().await;
    while events.recv().await? != ClientEvent::Ready {}

    let id = client
        .create_subscription(
            "subscription OnMessage($room: String!) { messageAdded(room: $room) { author text } }",
            json!({"room": "general"}),
            |message| async move {
                match message.payload {
                    Some(payload) => println!("[{}] {}", message.topic, payload),
                    None => println!("[{}] completed", message.topic),
                }
            },
            Some(json!({"_connectionInit": {"user": "demo"}})),
        )
        .await?;

    println!("Subscribed as operation {}", id);

    tokio::signal::ctrl_c().await?;

    client.unsubscribe(&id, false).await;
    client.close(false).await;
    Ok(())
}
