//! Observer connections: initial snapshot, then live updates.
//!
//! Each connection moves through `Connecting -> Active -> Closed`. On
//! activation it sends one `initial` message with recent history, then one
//! `update` message per inserted record until it closes. Closing always
//! deregisters the subscriber. A closed connection is never reopened.
//!
//! The byte-level channel to the peer is abstracted by [`Transport`], so the
//! same lifecycle drives a WebSocket, a TCP stream, or an in-process queue.

use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::subscriptions::{ServerMessage, SubscriptionConfig, SubscriptionHandle, SubscriptionId};
use crate::types::{LogRecord, Timestamp};
use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lifecycle of one observer connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Closed,
}

/// One message on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// How server messages are encoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// JSON text frames.
    #[default]
    Json,
    /// MessagePack binary frames (field names preserved).
    MessagePack,
}

impl WireFormat {
    pub fn encode(&self, message: &ServerMessage) -> Result<Frame> {
        match self {
            WireFormat::Json => Ok(Frame::Text(serde_json::to_string(message)?)),
            WireFormat::MessagePack => Ok(Frame::Binary(rmp_serde::to_vec_named(message)?)),
        }
    }

    pub fn decode(&self, frame: &Frame) -> Result<ServerMessage> {
        decode_frame(frame)
    }
}

fn decode_frame<T: serde::de::DeserializeOwned>(frame: &Frame) -> Result<T> {
    match frame {
        Frame::Text(text) => serde_json::from_str(text)
            .map_err(|e| StoreError::MalformedMessage(e.to_string())),
        Frame::Binary(bytes) => Ok(rmp_serde::from_slice(bytes)?),
    }
}

/// Messages a peer may send us.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Peer is going away.
    Close,
}

/// Sending half of an observer's channel.
pub trait Transport: Send + 'static {
    /// Deliver one frame to the peer.
    fn send(&mut self, frame: Frame) -> io::Result<()>;

    /// Release the underlying channel. Called once, after the last send.
    fn close(&mut self) {}
}

/// In-process transport backed by a crossbeam channel.
pub struct ChannelTransport {
    sender: Sender<Frame>,
}

impl ChannelTransport {
    pub fn new(sender: Sender<Frame>) -> Self {
        Self { sender }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: Frame) -> io::Result<()> {
        self.sender
            .send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer receiver dropped"))
    }
}

/// Connection configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// History window sent in the `initial` message, in seconds.
    pub initial_window_secs: u64,

    /// Encoding of outbound messages.
    pub wire_format: WireFormat,

    /// Queue settings for the connection's subscriber.
    pub subscription: SubscriptionConfig,
}

impl ConnectionConfig {
    pub fn initial_window(&self) -> Duration {
        Duration::from_secs(self.initial_window_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.subscription.validate()
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            initial_window_secs: crate::query::DEFAULT_WINDOW.as_secs(),
            wire_format: WireFormat::Json,
            subscription: SubscriptionConfig::default(),
        }
    }
}

/// State shared between a connection's pump and its handles.
struct ConnectionShared {
    id: u64,
    store: Arc<Store>,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
    subscription: Mutex<Option<SubscriptionId>>,
    updates_sent: AtomicU64,
}

impl ConnectionShared {
    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Closed {
            return;
        }
        debug!(connection = self.id, from = ?*state, to = ?next, "connection state change");
        *state = next;
        self.state_changed.notify_all();
    }

    /// Move to `Closed` and deregister. Returns false if already closed.
    fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return false;
            }
            debug!(connection = self.id, from = ?*state, "connection closed");
            *state = ConnectionState::Closed;
        }

        if let Some(id) = self.subscription.lock().take() {
            self.store.unsubscribe(id);
        }

        self.state_changed.notify_all();
        true
    }
}

/// Control handle for a connection, usable from any thread.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<ConnectionShared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Subscriber backing this connection, while it is active.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        *self.shared.subscription.lock()
    }

    /// Number of `update` messages written so far.
    pub fn updates_sent(&self) -> u64 {
        self.shared.updates_sent.load(Ordering::Relaxed)
    }

    /// Explicit disconnect. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Process one frame received from the peer.
    ///
    /// A close request closes the connection. Anything unparseable also
    /// closes it and is reported as `MalformedMessage`.
    pub fn handle_inbound(&self, frame: &Frame) -> Result<()> {
        match decode_frame::<ClientMessage>(frame) {
            Ok(ClientMessage::Close) => {
                self.close();
                Ok(())
            }
            Err(err) => {
                warn!(connection = self.shared.id, error = %err, "malformed inbound message");
                self.close();
                Err(err)
            }
        }
    }

    /// Block until the connection is closed or `timeout` elapses.
    pub fn wait_closed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        while *state != ConnectionState::Closed {
            if self
                .shared
                .state_changed
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return *state == ConnectionState::Closed;
            }
        }
        true
    }
}

/// One observer connection.
///
/// `open` performs the handshake on the caller's thread; `run` then pushes
/// updates until the connection closes. `ConnectionManager` runs `run` on a
/// dedicated thread; hosts with their own scheduling can call it directly.
pub struct Connection<T: Transport> {
    shared: Arc<ConnectionShared>,
    transport: T,
    handle: SubscriptionHandle,
    format: WireFormat,
}

impl<T: Transport> Connection<T> {
    /// Activate a connection: send the initial snapshot and register for
    /// live updates.
    pub fn open(
        id: u64,
        store: Arc<Store>,
        mut transport: T,
        config: &ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(ConnectionShared {
            id,
            store: Arc::clone(&store),
            state: Mutex::new(ConnectionState::Connecting),
            state_changed: Condvar::new(),
            subscription: Mutex::new(None),
            updates_sent: AtomicU64::new(0),
        });

        let now = Timestamp::now();
        let start = now.saturating_sub(config.initial_window());
        let (snapshot, handle) =
            store.subscribe_with_snapshot(start, Timestamp::MAX, config.subscription.clone());
        *shared.subscription.lock() = Some(handle.id);

        let sent = config
            .wire_format
            .encode(&ServerMessage::Initial(snapshot))
            .and_then(|frame| transport.send(frame).map_err(StoreError::from));
        if let Err(err) = sent {
            warn!(connection = id, error = %err, "failed to send initial snapshot");
            shared.close();
            transport.close();
            return Err(err);
        }

        shared.set_state(ConnectionState::Active);

        Ok(Self {
            shared,
            transport,
            handle,
            format: config.wire_format,
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Push live updates until closed, the subscriber is dropped, or a
    /// write fails. Always leaves the connection `Closed`.
    pub fn run(mut self) {
        while let Ok(record) = self.handle.recv() {
            if self.shared.state() == ConnectionState::Closed {
                break;
            }
            if let Err(err) = self.send_update(&record) {
                warn!(connection = self.shared.id, error = %err, "update write failed");
                break;
            }
        }

        self.shared.close();
        self.transport.close();
    }

    fn send_update(&mut self, record: &LogRecord) -> Result<()> {
        let frame = self.format.encode(&ServerMessage::Update(record.clone()))?;
        self.transport.send(frame)?;
        self.shared.updates_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Accepts and retires observer connections.
pub struct ConnectionManager {
    store: Arc<Store>,
    config: ConnectionConfig,
    connections: Arc<Mutex<HashMap<u64, ConnectionHandle>>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self::with_config(store, ConnectionConfig::default())
    }

    pub fn with_config(store: Arc<Store>, config: ConnectionConfig) -> Self {
        Self {
            store,
            config,
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Open a connection over `transport` and start streaming updates on a
    /// dedicated thread.
    pub fn accept<T: Transport>(&self, transport: T) -> Result<ConnectionHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let connection = Connection::open(id, Arc::clone(&self.store), transport, &self.config)?;
        let handle = connection.handle();

        self.connections.lock().insert(id, handle.clone());

        let connections = Arc::clone(&self.connections);
        let spawned = thread::Builder::new()
            .name(format!("logcast-conn-{}", id))
            .spawn(move || {
                connection.run();
                connections.lock().remove(&id);
            });

        if let Err(err) = spawned {
            // The closure (and with it the connection) was dropped; make sure
            // the subscriber goes too.
            handle.close();
            self.connections.lock().remove(&id);
            return Err(StoreError::Internal(format!(
                "failed to spawn connection thread: {}",
                err
            )));
        }

        debug!(connection = id, "connection accepted");
        Ok(handle)
    }

    /// Number of connections not yet retired.
    pub fn active_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Close every open connection.
    pub fn close_all(&self) {
        let handles: Vec<_> = self.connections.lock().values().cloned().collect();
        for handle in handles {
            handle.close();
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Drop for ConnectionManager {
    /// Pump threads hold the store and a subscriber; retire them with the manager.
    fn drop(&mut self) {
        self.close_all();
    }
}
