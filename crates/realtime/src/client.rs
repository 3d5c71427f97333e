use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex, Notify, RwLock};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::command::ClientCommand;
use crate::error::SyncError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone)]
pub struct SyncClientOptions {
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: Option<u32>,
    pub reconnect_interval: u64,
    pub reconnect_backoff_factor: f64,
    pub max_reconnect_interval: u64,
    pub heartbeat_interval: u64,
}

impl Default for SyncClientOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            max_reconnect_attempts: None,
            reconnect_interval: 1000,
            reconnect_backoff_factor: 1.5,
            max_reconnect_interval: 30_000,
            heartbeat_interval: 30_000,
        }
    }
}

/// Persistent, authenticated push channel.
///
/// Inbound frames are parsed JSON values handed to the consumer through
/// the receiver from [`SyncClient::events`]; the consumer turns them
/// into typed events and applies them to its store. Outbound commands
/// go through [`SyncClient::send_command`].
///
/// On reconnect the client re-joins every tracked room; the server then
/// replays missed notifications as a `pending_notifications` burst,
/// which reaches the consumer like any other event.
pub struct SyncClient {
    url: String,
    options: SyncClientOptions,
    access_token: Arc<RwLock<Option<String>>>,
    state: Arc<RwLock<ConnectionState>>,
    state_change: broadcast::Sender<ConnectionState>,
    is_manually_closed: Arc<AtomicBool>,
    close_signal: Arc<Notify>,
    outbound: Arc<RwLock<Option<mpsc::Sender<Message>>>>,
    joined_rooms: Arc<RwLock<HashSet<String>>>,
    events_tx: mpsc::Sender<serde_json::Value>,
    events_rx: Arc<Mutex<Option<mpsc::Receiver<serde_json::Value>>>>,
}

impl SyncClient {
    pub fn new(url: &str) -> Self {
        Self::new_with_options(url, SyncClientOptions::default())
    }

    pub fn new_with_options(url: &str, options: SyncClientOptions) -> Self {
        let (state_change_tx, _) = broadcast::channel(16);
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            url: url.to_string(),
            options,
            access_token: Arc::new(RwLock::new(None)),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            state_change: state_change_tx,
            is_manually_closed: Arc::new(AtomicBool::new(false)),
            close_signal: Arc::new(Notify::new()),
            outbound: Arc::new(RwLock::new(None)),
            joined_rooms: Arc::new(RwLock::new(HashSet::new())),
            events_tx,
            events_rx: Arc::new(Mutex::new(Some(events_rx))),
        }
    }

    /// Take the inbound event stream. Yields `None` after the first
    /// call; there is exactly one consumer.
    pub async fn events(&self) -> Option<mpsc::Receiver<serde_json::Value>> {
        self.events_rx.lock().await.take()
    }

    pub async fn set_auth(&self, token: Option<String>) {
        info!("setting channel auth token (present: {})", token.is_some());
        *self.access_token.write().await = token;
    }

    pub fn on_state_change(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_change.subscribe()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    async fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().await;
        if *current != state {
            info!("channel state {:?} -> {:?}", *current, state);
            *current = state;
            // No receivers is fine.
            let _ = self.state_change.send(state);
        }
    }

    /// Establish the channel. The first attempt happens inline so the
    /// caller sees an immediate failure; after that a background driver
    /// owns the session and the reconnect loop.
    pub async fn connect(&self) -> Result<(), SyncError> {
        self.is_manually_closed.store(false, Ordering::SeqCst);
        self.set_state(ConnectionState::Connecting).await;
        match self.dial().await {
            Ok(stream) => {
                self.spawn_driver(stream);
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected).await;
                Err(e)
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), SyncError> {
        info!("disconnect() called");
        self.is_manually_closed.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Disconnected).await;
        let _ = self.outbound.write().await.take();
        // Wake the session loop so it tears down without waiting for
        // the next heartbeat.
        self.close_signal.notify_one();
        Ok(())
    }

    /// Serialize a command and hand it to the socket writer.
    pub async fn send_command(&self, command: &ClientCommand) -> Result<(), SyncError> {
        let frame = serde_json::to_string(command)?;
        trace!("sending command frame: {frame}");
        let outbound = self.outbound.read().await;
        let sender = outbound.as_ref().ok_or(SyncError::NotConnected)?;
        sender.send(Message::Text(frame)).await?;
        Ok(())
    }

    /// Join a logical room. The room is tracked for automatic re-join
    /// after a reconnect; joining while offline defers the command to
    /// the next established session.
    pub async fn join_room(&self, room: &str) -> Result<(), SyncError> {
        self.joined_rooms.write().await.insert(room.to_string());
        match self.send_command(&ClientCommand::join(room)).await {
            Ok(()) => Ok(()),
            Err(SyncError::NotConnected) => {
                debug!("join of {room} deferred until the channel connects");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn leave_room(&self, room: &str) -> Result<(), SyncError> {
        self.joined_rooms.write().await.remove(room);
        match self.send_command(&ClientCommand::leave(room)).await {
            Ok(()) | Err(SyncError::NotConnected) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn dial(&self) -> Result<WsStream, SyncError> {
        let mut url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            "http" => {
                let _ = url.set_scheme("ws");
            }
            "https" => {
                let _ = url.set_scheme("wss");
            }
            s => {
                return Err(SyncError::Connection(format!(
                    "unsupported URL scheme: {s}"
                )))
            }
        }
        if let Some(token) = self.access_token.read().await.as_ref() {
            url.query_pairs_mut().append_pair("token", token);
        }
        debug!("dialing {url}");
        let (stream, response) = connect_async(url.as_str()).await?;
        debug!("websocket established, response status {}", response.status());
        Ok(stream)
    }

    /// Background task owning the session and the reconnect loop.
    fn spawn_driver(&self, first: WsStream) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut stream = Some(first);
            let mut attempts = 0u32;
            let mut interval = this.options.reconnect_interval;
            loop {
                if let Some(ws) = stream.take() {
                    attempts = 0;
                    interval = this.options.reconnect_interval;
                    this.run_session(ws).await;
                    this.outbound.write().await.take();
                }

                if this.is_manually_closed.load(Ordering::SeqCst) {
                    debug!("driver exiting after manual disconnect");
                    break;
                }
                if !this.options.auto_reconnect {
                    this.set_state(ConnectionState::Disconnected).await;
                    break;
                }
                if let Some(max) = this.options.max_reconnect_attempts {
                    if attempts >= max {
                        warn!("giving up after {max} reconnect attempts");
                        this.set_state(ConnectionState::Disconnected).await;
                        break;
                    }
                }

                attempts += 1;
                this.set_state(ConnectionState::Reconnecting).await;
                let jitter = rand::thread_rng().gen_range(0..=interval / 4);
                debug!("reconnect attempt #{attempts} in {}ms", interval + jitter);
                sleep(Duration::from_millis(interval + jitter)).await;
                interval = ((interval as f64 * this.options.reconnect_backoff_factor) as u64)
                    .min(this.options.max_reconnect_interval);

                match this.dial().await {
                    Ok(ws) => stream = Some(ws),
                    Err(e) => warn!("reconnect attempt #{attempts} failed: {e}"),
                }
            }
        });
    }

    async fn rejoin_rooms(&self) {
        let rooms: Vec<String> = self.joined_rooms.read().await.iter().cloned().collect();
        for room in rooms {
            if let Err(e) = self.send_command(&ClientCommand::join(&room)).await {
                warn!("failed to re-join room {room}: {e}");
            }
        }
    }

    /// Drive one established websocket session until it drops. The
    /// outbound sender must be installed and rooms re-joined before the
    /// Connected state becomes observable, so commands sent right after
    /// a state-change notification have a live socket.
    async fn run_session(&self, ws: WsStream) {
        let (mut write, mut read) = ws.split();
        let (tx, mut rx) = mpsc::channel::<Message>(64);
        *self.outbound.write().await = Some(tx.clone());

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = write.send(message).await {
                    error!("socket write failed: {e}");
                    break;
                }
            }
            debug!("writer task finished");
        });

        self.rejoin_rooms().await;
        self.set_state(ConnectionState::Connected).await;

        let heartbeat = Duration::from_millis(self.options.heartbeat_interval);
        loop {
            tokio::select! {
                biased;

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<serde_json::Value>(&text) {
                                Ok(value) => {
                                    if value.get("event").and_then(|e| e.as_str()) == Some("pong") {
                                        trace!("heartbeat acknowledged");
                                        continue;
                                    }
                                    if self.events_tx.send(value).await.is_err() {
                                        debug!("event consumer dropped, discarding frames");
                                    }
                                }
                                Err(e) => {
                                    warn!("discarding non-JSON frame: {e}");
                                }
                            }
                        }
                        Some(Ok(message)) if message.is_close() => {
                            debug!("server closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("socket read failed: {e}");
                            break;
                        }
                        None => {
                            debug!("socket stream ended");
                            break;
                        }
                    }
                }

                _ = self.close_signal.notified() => {
                    debug!("session closing on local disconnect");
                    break;
                }

                _ = sleep(heartbeat) => {
                    trace!("sending heartbeat");
                    let ping = match serde_json::to_string(&ClientCommand::Ping) {
                        Ok(frame) => frame,
                        Err(e) => {
                            error!("failed to encode heartbeat: {e}");
                            break;
                        }
                    };
                    if tx.send(Message::Text(ping)).await.is_err() {
                        break;
                    }
                }
            }
        }

        self.outbound.write().await.take();
        drop(tx);
        let _ = writer.await;
    }
}

impl Clone for SyncClient {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            options: self.options.clone(),
            access_token: self.access_token.clone(),
            state: self.state.clone(),
            state_change: self.state_change.clone(),
            is_manually_closed: self.is_manually_closed.clone(),
            close_signal: self.close_signal.clone(),
            outbound: self.outbound.clone(),
            joined_rooms: self.joined_rooms.clone(),
            events_tx: self.events_tx.clone(),
            events_rx: self.events_rx.clone(),
        }
    }
}
