//! GraphQL subscription client over WebSocket
//!
//! This module provides the main `SubscriptionClient` type, which owns the
//! connection lifecycle, multiplexes subscriptions over one socket and relays
//! their results to a publish callback.
//!
//! # Client Lifecycle
//!
//! 1. **Build**: [`ClientBuilder`](crate::ClientBuilder) validates the options
//! 2. **Connect**: open the socket and send CONNECTION_INIT
//! 3. **Ready**: CONNECTION_ACK starts every registered operation
//! 4. **Reconnect** (optional): an unplanned close schedules a retry with
//!    exponential backoff; operations are restarted after the next ack
//! 5. **Close**: stop every operation and tear the socket down
//!
//! # Concurrency
//!
//! All state lives behind one async mutex. Outbound frames are pushed into
//! the live connection's unbounded channel and written by a dedicated task,
//! so nothing awaits the network while the lock is held. Operation handlers
//! and lifecycle callbacks run after the lock is released.
//!
//! Each call to `connect` starts a new generation. Connection tasks and
//! reconnect timers carry the generation they belong to and do nothing once
//! it has been superseded.
//!
//! # Cloning
//!
//! `SubscriptionClient` is cheaply cloneable using `Arc` internally. All
//! clones share the same connection and operations.

use crate::client_builder::{ClientConfig, ConnectionInitPayload};
use crate::connection_state::{ConnectionManager, ConnectionState, ReconnectDecision};
use crate::events::{ClientEvent, EventBus};
use crate::keep_alive::KeepAlive;
use crate::metrics::ClientMetrics;
use crate::operation::{dedup_key, Operation, OperationHandler, OperationRegistry, Release};
use crate::reconnect::ReconnectionStrategy;
use futures::{FutureExt, SinkExt, StreamExt};
use gqlws_core::frame::{self, ConnectionInitExtension, Frame, StartPayload};
use gqlws_core::protocol::{MessageKind, ProtocolMessageTypes};
use gqlws_core::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

const SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";

/// Message handed to the publish callback of a subscription
///
/// `payload` is `None` once the operation has terminated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishMessage {
    /// `{service_name}_{operation_id}`
    pub topic: String,
    pub payload: Option<Value>,
}

/// Outbound side of one open socket
struct Connection {
    generation: u64,
    tx: mpsc::UnboundedSender<Message>,
}

impl Connection {
    fn close(self) {
        let _ = self.tx.send(Message::Close(None));
    }
}

/// Everything guarded by the client lock
struct ClientState {
    connection: ConnectionManager,
    operations: OperationRegistry,
    socket: Option<Connection>,
    keep_alive: Option<KeepAlive>,
    reconnect_task: Option<JoinHandle<()>>,
}

/// Work collected under the lock and performed after it is released
enum Deferred {
    Handler(OperationHandler, Option<Value>),
    Connected,
    ConnectionFailed(Option<Value>),
    ReconnectFailed,
}

/// GraphQL subscription client over WebSocket
#[derive(Clone)]
pub struct SubscriptionClient {
    state: Arc<Mutex<ClientState>>,
    config: Arc<ClientConfig>,
    events: EventBus,
    metrics: Option<Arc<ClientMetrics>>,
}

impl SubscriptionClient {
    pub(crate) fn new(
        config: ClientConfig,
        strategy: Box<dyn ReconnectionStrategy>,
        metrics: Option<Arc<ClientMetrics>>,
    ) -> Self {
        let state = ClientState {
            connection: ConnectionManager::new(strategy),
            operations: OperationRegistry::new(),
            socket: None,
            keep_alive: None,
            reconnect_task: None,
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            config: Arc::new(config),
            events: EventBus::new(),
            metrics,
        }
    }

    /// Listen for lifecycle events
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// The active protocol table
    pub fn protocol(&self) -> &'static ProtocolMessageTypes {
        self.config.protocol
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.connection.state()
    }

    /// The handshake of the current connection has been acknowledged
    pub async fn is_ready(&self) -> bool {
        self.state.lock().await.connection.is_ready()
    }

    /// Consecutive reconnects since the last acknowledged handshake
    pub async fn reconnect_attempts(&self) -> u32 {
        self.state.lock().await.connection.reconnect_attempts()
    }

    /// Registered operation ids in creation order
    pub async fn operation_ids(&self) -> Vec<String> {
        self.state.lock().await.operations.ids()
    }

    pub async fn operation_count(&self) -> usize {
        self.state.lock().await.operations.len()
    }

    /// Number of logical subscribers sharing an operation
    pub async fn subscriber_count(&self, operation_id: &str) -> Option<u32> {
        self.state.lock().await.operations.count(operation_id)
    }

    /// Open a new connection
    ///
    /// Returns as soon as the attempt is under way; progress is reported via
    /// [`events`](Self::events) and the configured callbacks. A socket that
    /// is still open is closed first.
    #[tracing::instrument(skip(self), fields(uri = %self.config.uri, protocol = self.config.protocol.name))]
    pub async fn connect(&self) {
        let mut state = self.state.lock().await;
        self.connecting_locked(&mut state);
    }

    /// Subscribe to `query` and forward its results to `publish`
    ///
    /// An identical `(query, variables)` pair that is still registered is
    /// shared: its subscriber count goes up, its id is returned and no frame
    /// is sent. The first subscriber's `publish` stays in charge.
    ///
    /// `context` may carry a `_connectionInit` value, attached to the start
    /// frame as a `connectionInit` extension after the optional rewrite hook.
    ///
    /// Fails with [`Error::ConnectionNotReady`] before the handshake is
    /// acknowledged; nothing is registered in that case.
    pub async fn create_subscription<F, Fut>(
        &self,
        query: impl Into<String>,
        variables: Value,
        publish: F,
        context: Option<Value>,
    ) -> Result<String>
    where
        F: Fn(PublishMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let query = query.into();
        let key = dedup_key(&query, &variables);
        let mut state = self.state.lock().await;

        if let Some(id) = state.operations.find_duplicate(&key) {
            let count = state.operations.retain(&id);
            tracing::debug!(operation_id = %id, subscribers = ?count, "Reusing subscription");
            return Ok(id);
        }

        let id = state.operations.next_id();
        let topic = format!("{}_{}", self.config.service_name, id);
        let publish = Arc::new(publish);
        let handler: OperationHandler = Arc::new(move |payload| {
            let message = PublishMessage {
                topic: topic.clone(),
                payload,
            };
            publish(message).boxed()
        });

        let extensions = self
            .connection_init_extension(context.as_ref())
            .map(|payload| json!([ConnectionInitExtension::new(payload)]));

        let operation = Operation::new(query, variables, handler).with_extensions(extensions);
        state.operations.insert(id.clone(), operation, key);
        if let Some(ref m) = self.metrics {
            m.operation_added();
        }

        if let Err(e) = self.start_operation_locked(&mut state, &id) {
            state.operations.remove(&id);
            if let Some(ref m) = self.metrics {
                m.operation_removed();
                m.record_error(e.kind());
            }
            tracing::warn!(operation_id = %id, error = %e, "Failed to start subscription");
            return Err(e);
        }

        tracing::info!(operation_id = %id, "Subscription created");
        Ok(id)
    }

    /// Send the start frame of a registered operation if not sent yet
    pub async fn start_operation(&self, operation_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.start_operation_locked(&mut state, operation_id)
    }

    /// Drop one subscriber of an operation
    ///
    /// The stop frame is sent when the last subscriber leaves, or right away
    /// with `force`. The operation stays registered until the peer confirms
    /// with COMPLETE or ERROR, or until the connection is replaced; it is
    /// never restarted.
    pub async fn unsubscribe(&self, operation_id: &str, force: bool) {
        let mut state = self.state.lock().await;
        self.unsubscribe_locked(&mut state, operation_id, force);
    }

    /// Force-unsubscribe every registered operation
    pub async fn unsubscribe_all(&self) {
        let mut state = self.state.lock().await;
        for id in state.operations.ids() {
            self.unsubscribe_locked(&mut state, &id, true);
        }
    }

    /// Close the connection on behalf of the caller
    ///
    /// Every operation is stopped first. With `try_reconnect` the
    /// operations that still have subscribers are kept and restarted after
    /// the next acknowledged handshake. Every other operation is dropped and
    /// its handler receives a final `None`.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self, try_reconnect: bool) {
        let deferred = {
            let mut state = self.state.lock().await;
            self.close_locked(&mut state, try_reconnect, true)
        };
        self.run_deferred(deferred).await;
    }

    fn connecting_locked(&self, state: &mut ClientState) -> u64 {
        if let Some(previous) = state.socket.take() {
            tracing::debug!(generation = previous.generation, "Replacing open connection");
            previous.close();
        }
        state.keep_alive = None;

        let generation = state.connection.connecting();
        self.record_state(state);
        tracing::info!(generation, "Connecting");

        tokio::spawn(self.clone().run_connection(generation));
        generation
    }

    /// Drive one socket from open to close
    async fn run_connection(self, generation: u64) {
        let request = match self.handshake_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(error = %e, "Invalid connection request");
                self.connection_failed(generation, &e).await;
                return;
            }
        };

        let ws_stream = match connect_async(request).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                self.connection_failed(generation, &Error::WebSocket(e.to_string()))
                    .await;
                return;
            }
        };

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let installed = {
            let mut state = self.state.lock().await;
            if state.connection.is_current(generation) && state.connection.is_live() {
                state.socket = Some(Connection { generation, tx });
                state.connection.handshaking();
                self.record_state(&state);
                true
            } else {
                false
            }
        };

        if !installed {
            tracing::debug!(generation, "Connection superseded before it opened");
            let _ = sink.close().await;
            return;
        }

        tracing::info!(generation, "Connection opened");
        self.events.emit(ClientEvent::SocketOpen);

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    tracing::debug!(error = %e, "Failed to write frame");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        self.send_connection_init(generation).await;

        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => self.handle_text(generation, &text).await,
                Ok(Message::Close(frame)) => {
                    tracing::info!(generation, close_frame = ?frame, "Connection closed by server");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(generation, error = %e, "WebSocket error");
                    self.record_error("websocket");
                    self.events.emit(ClientEvent::SocketError);
                    break;
                }
            }
        }

        self.transport_closed(generation).await;
        self.events.emit(ClientEvent::SocketClose);
    }

    async fn connection_failed(&self, generation: u64, error: &Error) {
        tracing::warn!(generation, error = %error, "Failed to open connection");
        self.record_error(error.kind());
        self.events.emit(ClientEvent::SocketError);
        self.transport_closed(generation).await;
        self.events.emit(ClientEvent::SocketClose);
    }

    fn handshake_request(&self) -> Result<Request> {
        let mut request = self
            .config
            .uri
            .as_str()
            .into_client_request()
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let protocols = HeaderValue::from_str(&self.config.protocols.join(", "))
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        request
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, protocols);

        Ok(request)
    }

    async fn send_connection_init(&self, generation: u64) {
        let payload = match &self.config.connection_init_payload {
            None => Ok(json!({})),
            Some(ConnectionInitPayload::Literal(payload)) => Ok(payload.clone()),
            Some(ConnectionInitPayload::Provider(provider)) => provider().await,
        };

        let deferred = {
            let mut state = self.state.lock().await;
            if !self.owns_socket(&state, generation) {
                return;
            }

            match payload {
                Ok(payload) => {
                    let init = Frame::new(self.config.protocol.connection_init).with_payload(payload);
                    if let Err(e) = self.send_frame(&state, init) {
                        tracing::warn!(error = %e, "Failed to send connection init");
                    }
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connection init payload unavailable");
                    self.record_error(e.kind());
                    self.close_locked(&mut state, self.config.reconnect, false)
                }
            }
        };
        self.run_deferred(deferred).await;
    }

    /// The socket closed or never opened
    async fn transport_closed(&self, generation: u64) {
        let deferred = {
            let mut state = self.state.lock().await;
            if !state.connection.is_current(generation)
                || !state.connection.is_live()
                || state.connection.closed_by_user()
            {
                return;
            }
            tracing::info!(generation, "Connection lost");
            self.close_locked(&mut state, self.config.reconnect, false)
        };
        self.run_deferred(deferred).await;
    }

    async fn handle_text(&self, generation: u64, text: &str) {
        let deferred = {
            let mut state = self.state.lock().await;
            if !self.owns_socket(&state, generation) {
                tracing::trace!(generation, "Dropping frame from stale connection");
                return;
            }

            match self.dispatch(&mut state, text) {
                Ok(deferred) => deferred,
                Err(e) => {
                    tracing::warn!(error = %e, "Closing connection after invalid frame");
                    self.record_error(e.kind());
                    self.close_locked(&mut state, self.config.reconnect, false)
                }
            }
        };
        self.run_deferred(deferred).await;
    }

    fn dispatch(&self, state: &mut ClientState, text: &str) -> Result<Vec<Deferred>> {
        let protocol = self.config.protocol;
        let frame = frame::decode(text)?;

        if let Some(ref m) = self.metrics {
            m.record_frame_received(&frame.frame_type);
        }
        tracing::debug!(frame_type = %frame.frame_type, operation_id = ?frame.id, "Frame received");

        let kind = protocol.classify(&frame.frame_type).ok_or_else(|| {
            Error::MessageInvalid(format!("Invalid message type \"{}\"", frame.frame_type))
        })?;

        let deferred = match kind {
            MessageKind::ConnectionAck => self.acknowledged_locked(state),
            MessageKind::Data => {
                let operation = frame.id.as_deref().and_then(|id| state.operations.get(id));
                match operation {
                    Some(operation) => vec![Deferred::Handler(
                        operation.handler.clone(),
                        Some(frame.data()),
                    )],
                    None => {
                        tracing::debug!(operation_id = ?frame.id, "Data for unknown operation");
                        Vec::new()
                    }
                }
            }
            MessageKind::Error => match self.remove_operation(state, frame.id.as_deref()) {
                Some((id, operation)) => {
                    tracing::warn!(operation_id = %id, payload = ?frame.payload, "Operation failed");
                    let mut echo = Frame::new(protocol.error).with_id(id);
                    if let Some(payload) = frame.payload {
                        echo = echo.with_payload(payload);
                    }
                    if let Err(e) = self.send_frame(state, echo) {
                        tracing::debug!(error = %e, "Failed to echo operation error");
                    }
                    vec![Deferred::Handler(operation.handler, None)]
                }
                None => Vec::new(),
            },
            MessageKind::Complete => match self.remove_operation(state, frame.id.as_deref()) {
                Some((id, operation)) => {
                    tracing::info!(operation_id = %id, "Operation completed");
                    vec![Deferred::Handler(operation.handler, None)]
                }
                None => Vec::new(),
            },
            MessageKind::ConnectionError => {
                tracing::warn!(payload = ?frame.payload, "Connection rejected");
                self.record_error("connection_error");
                let mut deferred = self.close_locked(state, self.config.reconnect, false);
                deferred.push(Deferred::ConnectionFailed(frame.payload));
                deferred
            }
            MessageKind::KeepAlive => {
                if let Some(ack) = protocol.keep_alive_ack {
                    self.send_frame(state, Frame::new(ack))?;
                }
                Vec::new()
            }
            MessageKind::KeepAliveAck => Vec::new(),
            MessageKind::ConnectionInit
            | MessageKind::ConnectionTerminate
            | MessageKind::Start
            | MessageKind::Stop => {
                return Err(Error::MessageInvalid(format!(
                    "Invalid message type \"{}\"",
                    frame.frame_type
                )));
            }
        };

        Ok(deferred)
    }

    fn acknowledged_locked(&self, state: &mut ClientState) -> Vec<Deferred> {
        // Unsubscribed while no socket was up; their stop frame never left
        let mut deferred = self.drop_released_locked(state);

        let reconnected = state.connection.reconnect_attempts() > 0;
        state.connection.acknowledged();
        self.record_state(state);
        if reconnected {
            if let Some(ref m) = self.metrics {
                m.record_reconnection_success();
            }
        }

        tracing::info!(
            generation = state.connection.generation(),
            operations = state.operations.len(),
            "Connection acknowledged"
        );

        for id in state.operations.ids() {
            if let Err(e) = self.start_operation_locked(state, &id) {
                tracing::warn!(operation_id = %id, error = %e, "Failed to restart operation");
            }
        }

        self.events.emit(ClientEvent::Ready);

        if let (Some(interval), Some(socket)) = (self.config.keep_alive, state.socket.as_ref()) {
            state.keep_alive = Some(KeepAlive::spawn(
                interval,
                self.config.protocol.keep_alive,
                socket.tx.clone(),
                self.metrics.clone(),
            ));
        }

        deferred.push(Deferred::Connected);
        deferred
    }

    fn start_operation_locked(&self, state: &mut ClientState, operation_id: &str) -> Result<()> {
        if state.operations.count(operation_id) == Some(0) {
            tracing::debug!(operation_id, "Not starting unsubscribed operation");
            return Ok(());
        }

        let operation = match state.operations.get(operation_id) {
            Some(operation) if !operation.started => operation,
            _ => return Ok(()),
        };

        if !state.connection.is_ready() {
            return Err(Error::ConnectionNotReady);
        }

        let payload = serde_json::to_value(StartPayload {
            query: operation.query.clone(),
            variables: operation.variables.clone(),
        })?;
        let mut start = Frame::new(self.config.protocol.start)
            .with_id(operation_id)
            .with_payload(payload);
        if let Some(extensions) = operation.extensions.clone() {
            start = start.with_extensions(extensions);
        }

        self.send_frame(state, start)?;
        if let Some(operation) = state.operations.get_mut(operation_id) {
            operation.started = true;
        }
        tracing::debug!(operation_id, "Operation started");
        Ok(())
    }

    fn unsubscribe_locked(&self, state: &mut ClientState, operation_id: &str, force: bool) {
        match state.operations.release(operation_id, force) {
            Release::Stop => self.send_stop(state, operation_id),
            Release::Retained(remaining) => {
                tracing::debug!(operation_id, remaining, "Subscriber released");
            }
            Release::Ignored => {
                tracing::debug!(operation_id, "Nothing to unsubscribe");
            }
        }
    }

    fn send_stop(&self, state: &ClientState, operation_id: &str) {
        let stop = Frame::new(self.config.protocol.stop).with_id(operation_id);
        match self.send_frame(state, stop) {
            Ok(()) => tracing::info!(operation_id, "Operation stopped"),
            Err(e) => tracing::debug!(operation_id, error = %e, "Stop frame not sent"),
        }
    }

    /// Remove every operation whose last subscriber has left
    ///
    /// The peer never confirms a stop on every protocol, so these would
    /// otherwise stay registered and be restarted by the next handshake.
    fn drop_released_locked(&self, state: &mut ClientState) -> Vec<Deferred> {
        let mut deferred = Vec::new();
        for id in state.operations.released_ids() {
            if let Some((id, operation)) = self.remove_operation(state, Some(&id)) {
                tracing::debug!(operation_id = %id, "Dropping unsubscribed operation");
                deferred.push(Deferred::Handler(operation.handler, None));
            }
        }
        deferred
    }

    /// Tear the current socket down
    ///
    /// `closed_by_user` stops every operation before the socket goes away.
    /// `try_reconnect` keeps operations that still have subscribers for the
    /// next connection, drops unsubscribed ones and consults the
    /// reconnection policy.
    fn close_locked(
        &self,
        state: &mut ClientState,
        try_reconnect: bool,
        closed_by_user: bool,
    ) -> Vec<Deferred> {
        let mut deferred = Vec::new();

        if try_reconnect {
            deferred.extend(self.drop_released_locked(state));
        }

        if closed_by_user {
            for id in state.operations.ids() {
                if try_reconnect {
                    // Subscribers stay attached for the next connection
                    self.send_stop(state, &id);
                } else {
                    self.unsubscribe_locked(state, &id, true);
                }
            }
            if let Some(task) = state.reconnect_task.take() {
                task.abort();
            }
        }

        state.keep_alive = None;
        if let Some(socket) = state.socket.take() {
            socket.close();
        }
        state.connection.closed(closed_by_user);
        self.record_state(state);

        tracing::info!(try_reconnect, closed_by_user, "Connection closed");

        if try_reconnect {
            state.operations.reset_started();
            deferred.extend(self.reconnect_locked(state));
        } else if closed_by_user {
            for id in state.operations.ids() {
                if let Some(operation) = state.operations.remove(&id) {
                    if let Some(ref m) = self.metrics {
                        m.operation_removed();
                    }
                    deferred.push(Deferred::Handler(operation.handler, None));
                }
            }
        }

        deferred
    }

    fn reconnect_locked(&self, state: &mut ClientState) -> Option<Deferred> {
        match state.connection.schedule_reconnect() {
            ReconnectDecision::Retry {
                attempt,
                delay,
                generation,
            } => {
                tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_attempt(attempt);
                }
                self.record_state(state);

                let client = self.clone();
                let task = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let mut state = client.state.lock().await;
                    if !state.connection.is_current(generation) {
                        tracing::debug!(attempt, "Reconnect superseded");
                        return;
                    }
                    state.reconnect_task = None;
                    client.connecting_locked(&mut state);
                });
                state.reconnect_task = Some(task);
                None
            }
            ReconnectDecision::AlreadyPending => {
                tracing::debug!("Reconnect already pending");
                None
            }
            ReconnectDecision::Exhausted => {
                tracing::error!(
                    attempts = state.connection.reconnect_attempts(),
                    "Reconnection abandoned (max attempts reached)"
                );
                self.record_state(state);
                if let Some(ref m) = self.metrics {
                    m.record_reconnection_exhausted();
                }
                Some(Deferred::ReconnectFailed)
            }
        }
    }

    fn remove_operation(
        &self,
        state: &mut ClientState,
        operation_id: Option<&str>,
    ) -> Option<(String, Operation)> {
        let id = operation_id?;
        let operation = state.operations.remove(id)?;
        if let Some(ref m) = self.metrics {
            m.operation_removed();
        }
        Some((id.to_string(), operation))
    }

    fn connection_init_extension(&self, context: Option<&Value>) -> Option<Value> {
        let value = context
            .and_then(|context| context.get("_connectionInit"))
            .cloned();

        let value = match &self.config.rewrite_connection_init_payload {
            Some(rewrite) => rewrite(value, context),
            None => value,
        };

        value.filter(|value| !value.is_null())
    }

    fn owns_socket(&self, state: &ClientState, generation: u64) -> bool {
        state.connection.is_current(generation)
            && state.connection.is_live()
            && matches!(state.socket, Some(ref socket) if socket.generation == generation)
    }

    fn send_frame(&self, state: &ClientState, frame: Frame) -> Result<()> {
        let socket = state.socket.as_ref().ok_or(Error::ConnectionClosed)?;
        let text = frame::encode(&frame)?;
        socket
            .tx
            .send(Message::Text(text))
            .map_err(|_| Error::ConnectionClosed)?;

        if let Some(ref m) = self.metrics {
            m.record_frame_sent(&frame.frame_type);
        }
        tracing::debug!(frame_type = %frame.frame_type, operation_id = ?frame.id, "Frame sent");
        Ok(())
    }

    async fn run_deferred(&self, deferred: Vec<Deferred>) {
        for item in deferred {
            match item {
                Deferred::Handler(handler, payload) => handler(payload).await,
                Deferred::Connected => {
                    if let Some(ref callback) = self.config.on_connected {
                        tokio::spawn(callback());
                    }
                }
                Deferred::ConnectionFailed(payload) => {
                    if let Some(ref callback) = self.config.on_connection_failed {
                        tokio::spawn(callback(payload));
                    }
                }
                Deferred::ReconnectFailed => {
                    if let Some(ref callback) = self.config.on_reconnect_failed {
                        tokio::spawn(callback());
                    }
                }
            }
        }
    }

    fn record_state(&self, state: &ClientState) {
        if let Some(ref m) = self.metrics {
            m.update_connection_state(state.connection.state());
        }
    }

    fn record_error(&self, kind: &str) {
        if let Some(ref m) = self.metrics {
            m.record_error(kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ClientBuilder;
    use gqlws_core::Error;
    use serde_json::json;

    #[tokio::test]
    async fn test_new_client_is_disconnected() {
        let client = ClientBuilder::new("ws://localhost:4000").build().unwrap();

        assert_eq!(client.state().await, crate::ConnectionState::Disconnected);
        assert!(!client.is_ready().await);
        assert_eq!(client.operation_count().await, 0);
        assert_eq!(client.service_name(), "gqlws");
    }

    #[tokio::test]
    async fn test_subscription_before_ready_is_rejected() {
        let client = ClientBuilder::new("ws://localhost:4000").build().unwrap();

        let result = client
            .create_subscription("subscription { ticks }", json!({}), |_| async {}, None)
            .await;

        assert_eq!(result, Err(Error::ConnectionNotReady));
        assert_eq!(client.operation_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_init_extension_from_context() {
        let client = ClientBuilder::new("ws://localhost:4000").build().unwrap();
        let context = json!({"_connectionInit": {"token": "t"}, "other": 1});

        assert_eq!(
            client.connection_init_extension(Some(&context)),
            Some(json!({"token": "t"}))
        );
        assert_eq!(client.connection_init_extension(Some(&json!({}))), None);
        assert_eq!(client.connection_init_extension(None), None);
    }

    #[tokio::test]
    async fn test_rewrite_hook_runs_without_context() {
        let client = ClientBuilder::new("ws://localhost:4000")
            .rewrite_connection_init_payload(|value, context| {
                assert!(context.is_none());
                assert!(value.is_none());
                Some(json!({"rewritten": true}))
            })
            .build()
            .unwrap();

        assert_eq!(
            client.connection_init_extension(None),
            Some(json!({"rewritten": true}))
        );
    }

    #[tokio::test]
    async fn test_handshake_request_advertises_protocols() {
        let client = ClientBuilder::new("ws://localhost:4000/graphql")
            .protocols(["graphql-ws", "graphql-transport-ws"])
            .build()
            .unwrap();

        let request = client.handshake_request().unwrap();
        assert_eq!(
            request.headers().get("Sec-WebSocket-Protocol").unwrap(),
            "graphql-ws, graphql-transport-ws"
        );
    }

    #[tokio::test]
    async fn test_close_before_connect() {
        let client = ClientBuilder::new("ws://localhost:4000").build().unwrap();
        client.close(false).await;
        assert_eq!(client.state().await, crate::ConnectionState::Closed);
    }
}
