//! Common test utilities for gqlws-client integration tests
//!
//! This module provides a scriptable in-process GraphQL WebSocket server and
//! helpers for observing the client from the outside.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use gqlws_client::{ClientEvent, PublishMessage};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT: Duration = Duration::from_secs(5);

type Replies = Arc<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// Mock GraphQL WebSocket server
///
/// Every text frame the client sends is parsed, recorded and passed to a
/// reply function whose frames are sent straight back. Tests can also push
/// frames at any time or drop the live connection.
pub struct MockGraphqlServer {
    addr: SocketAddr,
    frames: mpsc::UnboundedReceiver<Value>,
    current: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
    connections: Arc<AtomicUsize>,
    protocols: Arc<Mutex<Vec<String>>>,
    accept_task: JoinHandle<()>,
}

impl MockGraphqlServer {
    /// Server that acknowledges every CONNECTION_INIT
    pub async fn acking() -> Self {
        Self::with_replies(ack_on_init).await
    }

    /// Server that never answers on its own
    pub async fn silent() -> Self {
        Self::with_replies(|_| Vec::new()).await
    }

    pub async fn with_replies<F>(replies: F) -> Self
    where
        F: Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let replies: Replies = Arc::new(replies);
        let (frames_tx, frames) = mpsc::unbounded_channel();
        let current = Arc::new(Mutex::new(None));
        let connections = Arc::new(AtomicUsize::new(0));
        let protocols = Arc::new(Mutex::new(Vec::new()));

        let accept_task = {
            let current = current.clone();
            let connections = connections.clone();
            let protocols = protocols.clone();

            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    let recorded = protocols.clone();
                    let callback = move |request: &Request,
                                         mut response: Response|
                          -> Result<Response, ErrorResponse> {
                        if let Some(header) = request.headers().get("Sec-WebSocket-Protocol") {
                            let requested = header.to_str().unwrap_or_default().to_string();
                            let selected = requested.split(',').next().unwrap_or_default().trim();
                            response.headers_mut().insert(
                                "Sec-WebSocket-Protocol",
                                HeaderValue::from_str(selected).unwrap(),
                            );
                            recorded.lock().unwrap().push(requested);
                        }
                        Ok(response)
                    };

                    let ws_stream = match accept_hdr_async(stream, callback).await {
                        Ok(ws_stream) => ws_stream,
                        Err(_) => continue,
                    };
                    connections.fetch_add(1, Ordering::SeqCst);

                    let (mut write, mut read) = ws_stream.split();
                    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
                    *current.lock().unwrap() = Some(tx.clone());

                    tokio::spawn(async move {
                        while let Some(message) = rx.recv().await {
                            let closing = matches!(message, Message::Close(_));
                            if write.send(message).await.is_err() || closing {
                                break;
                            }
                        }
                    });

                    let frames_tx = frames_tx.clone();
                    let replies = replies.clone();
                    tokio::spawn(async move {
                        while let Some(Ok(message)) = read.next().await {
                            let text = match message {
                                Message::Text(text) => text,
                                Message::Close(_) => break,
                                _ => continue,
                            };
                            let frame: Value = serde_json::from_str(&text).unwrap();
                            for reply in replies(&frame) {
                                let _ = tx.send(Message::Text(reply.to_string()));
                            }
                            let _ = frames_tx.send(frame);
                        }
                        // Completes the closing handshake and releases the writer
                        let _ = tx.send(Message::Close(None));
                    });
                }
            })
        };

        Self {
            addr,
            frames,
            current,
            connections,
            protocols,
            accept_task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/graphql", self.addr)
    }

    /// Next frame received from the client
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server stopped")
    }

    /// Next frame of the given type, skipping others
    pub async fn next_frame_of_type(&mut self, frame_type: &str) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["type"] == frame_type {
                return frame;
            }
        }
    }

    /// Assert that no frame arrives within `window`
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(frame)) = tokio::time::timeout(window, self.frames.recv()).await {
            panic!("Unexpected frame from client: {}", frame);
        }
    }

    /// Send a frame to the client on the live connection
    pub fn send(&self, frame: Value) {
        let current = self.current.lock().unwrap();
        let tx = current.as_ref().expect("no client connected");
        tx.send(Message::Text(frame.to_string())).unwrap();
    }

    /// Send raw text to the client on the live connection
    pub fn send_raw(&self, text: &str) {
        let current = self.current.lock().unwrap();
        let tx = current.as_ref().expect("no client connected");
        tx.send(Message::Text(text.to_string())).unwrap();
    }

    /// Close the live connection from the server side
    pub fn drop_connection(&self) {
        if let Some(tx) = self.current.lock().unwrap().take() {
            let _ = tx.send(Message::Close(None));
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// `Sec-WebSocket-Protocol` header of every accepted connection
    pub fn requested_protocols(&self) -> Vec<String> {
        self.protocols.lock().unwrap().clone()
    }
}

impl Drop for MockGraphqlServer {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Reply function acknowledging CONNECTION_INIT
pub fn ack_on_init(frame: &Value) -> Vec<Value> {
    if frame["type"] == "connection_init" {
        vec![json!({"type": "connection_ack"})]
    } else {
        Vec::new()
    }
}

/// Address nothing listens on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/graphql", addr)
}

/// Publish callback feeding a channel
pub fn publish_channel() -> (
    impl Fn(PublishMessage) -> futures::future::Ready<()> + Send + Sync + 'static,
    mpsc::UnboundedReceiver<PublishMessage>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let publish = move |message: PublishMessage| {
        let _ = tx.send(message);
        futures::future::ready(())
    };
    (publish, rx)
}

pub async fn next_published(rx: &mut mpsc::UnboundedReceiver<PublishMessage>) -> PublishMessage {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a publish")
        .expect("publisher dropped")
}

/// Wait until `event` is observed
pub async fn wait_for_event(events: &mut broadcast::Receiver<ClientEvent>, event: ClientEvent) {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(received) if received == event => return,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", event));
}
