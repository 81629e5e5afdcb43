//! WebSocket Edge Server
//!
//! Accepts participant connections, assigns each one a fresh `ParticipantId`
//! and relays between the socket and the match host. The edge never touches
//! match state; everything goes through the `MatchHandle` queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::core::clock::tick_duration;
use crate::core::ids::ParticipantId;
use crate::network::host::{HostError, MatchHandle};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Tick rate for the match host (Hz).
    pub tick_rate: u32,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 64,
            tick_rate: crate::TICK_RATE,
            version: crate::VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("PARTY_BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bind_addr),
            max_connections: std::env::var("PARTY_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            tick_rate: std::env::var("PARTY_TICK_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|rate: &u32| *rate > 0)
                .unwrap_or(defaults.tick_rate),
            version: defaults.version,
        }
    }

    /// Fixed tick length for the host loop.
    pub fn tick(&self) -> Duration {
        tick_duration(self.tick_rate)
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Match host error.
    #[error("Match host error: {0}")]
    Host(#[from] HostError),
}

/// The edge server.
pub struct GameServer {
    config: ServerConfig,
    handle: MatchHandle,
    next_participant: Arc<AtomicU64>,
    connections: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server relaying to the given match host.
    pub fn new(config: ServerConfig, handle: MatchHandle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            handle,
            next_participant: Arc::new(AtomicU64::new(1)),
            connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Shutdown receiver shared with the match host.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::Relaxed) >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(Self::reject_overloaded(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Tell a client the server is full, then close the socket.
    async fn reject_overloaded<S>(stream: S, addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut ws = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!("Handshake with rejected client {} failed: {}", addr, e);
                return;
            }
        };

        let msg = ServerMessage::Error(ServerError::new(
            ErrorCode::ServerOverloaded,
            "Connection limit reached",
        ));
        if let Ok(text) = msg.to_json() {
            let _ = ws.send(Message::Text(text)).await;
        }
        let _ = ws.close(None).await;
    }

    /// Allocate a participant id. Ids are never reused.
    fn next_participant_id(&self) -> ParticipantId {
        ParticipantId::new(self.next_participant.fetch_add(1, Ordering::Relaxed))
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let handle = self.handle.clone();
        let connections = self.connections.clone();
        let version = self.config.version.clone();
        let participant = self.next_participant_id();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        connections.fetch_add(1, Ordering::Relaxed);

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    connections.fetch_sub(1, Ordering::Relaxed);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut updates = handle.subscribe();
            if let Err(e) = handle.connect(participant).await {
                warn!(participant = %participant, error = %e, "Match host unavailable");
                let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                    ErrorCode::MatchUnavailable,
                    "Match host is not running",
                ))).await;
                drop(msg_tx);
                let _ = sender_task.await;
                connections.fetch_sub(1, Ordering::Relaxed);
                return;
            }

            let _ = msg_tx.send(ServerMessage::Welcome {
                participant_id: participant,
                server_version: version,
            }).await;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidMessage,
                                            "Invalid message format",
                                        ))).await;
                                        continue;
                                    }
                                };

                                if !Self::handle_client_message(participant, client_msg, &handle, &msg_tx).await {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                    ErrorCode::InvalidMessage,
                                    "Binary frames are not supported",
                                ))).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    update = updates.recv() => {
                        match update {
                            Ok(msg) => {
                                if msg_tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                // Next snapshot brings the client back in line
                                warn!(participant = %participant, skipped, "Client lagging behind updates");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                let _ = msg_tx.send(ServerMessage::Shutdown {
                                    reason: "Match closed".to_string(),
                                }).await;
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            if let Err(e) = handle.disconnect(participant).await {
                debug!(participant = %participant, error = %e, "Disconnect not delivered");
            }

            // Let queued messages flush before closing
            drop(msg_tx);
            let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;
            connections.fetch_sub(1, Ordering::Relaxed);

            info!("Client {} ({}) cleaned up", addr, participant);
        });
    }

    /// Handle a client message. Returns false when the client leaves.
    async fn handle_client_message(
        participant: ParticipantId,
        msg: ClientMessage,
        handle: &MatchHandle,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> bool {
        match msg {
            ClientMessage::SetReady { ready } => {
                if let Err(e) = handle.set_ready(participant, ready).await {
                    warn!(participant = %participant, error = %e, "Ready change not delivered");
                    let _ = sender.send(ServerMessage::Error(ServerError::new(
                        ErrorCode::MatchUnavailable,
                        "Match host is not running",
                    ))).await;
                }
                true
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64,
                }).await;
                true
            }
            ClientMessage::Leave => {
                debug!(participant = %participant, "Client left");
                false
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}
