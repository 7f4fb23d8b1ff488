//! WebSocket Game Server
//!
//! Async WebSocket server for dashboards and block devices.
//! Owns the single game instance, routes inbound messages through
//! `dispatch`, drives round boundaries on a fixed tick, and delivers queued
//! broadcasts.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::rng::random_seed;
use crate::game::client::ConnectionId;
use crate::game::state::Game;
use crate::game::tick::{tick, TickConfig};
use crate::network::dispatch;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Per-connection outbound queue depth.
const OUTBOUND_QUEUE: usize = 64;

/// How long a closing connection may spend flushing its queue.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How often round deadlines are checked.
    pub tick_interval: Duration,
    /// Round driver settings.
    pub tick: TickConfig,
    /// Seed for command selection; random when unset.
    pub seed: Option<u64>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 64,
            tick_interval: Duration::from_millis(50),
            tick: TickConfig::default(),
            seed: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup. Unset keys keep their defaults;
    /// unparsable or out-of-range values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let tick_ms = setting(&lookup, "BLOCK_PARTY_TICK_MS", defaults.tick_interval.as_millis() as u64);
        Self {
            bind_addr: setting(&lookup, "BLOCK_PARTY_BIND", defaults.bind_addr),
            max_connections: setting(&lookup, "BLOCK_PARTY_MAX_CONNECTIONS", defaults.max_connections),
            tick_interval: if tick_ms == 0 {
                warn!("Ignoring BLOCK_PARTY_TICK_MS=0: must be positive, using {:?}", defaults.tick_interval);
                defaults.tick_interval
            } else {
                Duration::from_millis(tick_ms)
            },
            tick: TickConfig {
                intermission_ms: setting(&lookup, "BLOCK_PARTY_INTERMISSION_MS", defaults.tick.intermission_ms),
            },
            seed: lookup("BLOCK_PARTY_SEED").and_then(|v| v.parse().ok()),
            version: defaults.version,
        }
    }
}

fn setting<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring {}={:?}: not valid, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind or inspect the listening socket.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// The game plus the delivery queues of every open connection.
///
/// Held behind one mutex: every mutation and the delivery of its broadcasts
/// happen under the same lock.
pub struct Hub {
    game: Game,
    outlets: BTreeMap<ConnectionId, mpsc::Sender<ServerMessage>>,
}

impl Hub {
    fn new(game: Game) -> Self {
        Self {
            game,
            outlets: BTreeMap::new(),
        }
    }

    /// The game.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Deliver everything the game queued.
    fn flush(&mut self) {
        for out in self.game.take_outbound() {
            let Some(outlet) = self.outlets.get(&out.to) else {
                continue;
            };
            if let Err(e) = outlet.try_send(out.message.into()) {
                warn!("Dropping message for connection {}: {}", out.to, e);
            }
        }
    }
}

/// Milliseconds since `epoch`.
fn elapsed_ms(epoch: Instant) -> u64 {
    epoch.elapsed().as_millis() as u64
}

/// A counted connection slot, held from accept until the connection task
/// ends, handshake included.
struct ConnectionSlot(Arc<AtomicUsize>);

impl ConnectionSlot {
    fn claim(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active.clone())
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Write queued messages to `sink` until every sender is gone, then close it.
async fn pump_outbound<S>(mut queue: mpsc::Receiver<ServerMessage>, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    while let Some(msg) = queue.recv().await {
        let text = match msg.to_json() {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to serialize message: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!("Outbound stream closed: {}", e);
            return;
        }
    }
    let _ = sink.close().await;
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Game state and delivery queues.
    hub: Arc<Mutex<Hub>>,
    /// Zero point of every timestamp sent to devices.
    epoch: Instant,
    /// Next connection identifier.
    next_connection: Arc<AtomicU32>,
    /// Open connections, counted from accept.
    active_connections: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let seed = config.seed.unwrap_or_else(random_seed);

        Self {
            config,
            hub: Arc::new(Mutex::new(Hub::new(Game::new(seed)))),
            epoch: Instant::now(),
            next_connection: Arc::new(AtomicU32::new(1)),
            active_connections: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run the server.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Block Party server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        let tick_handle = tokio::spawn(Self::run_tick_loop(
            self.hub.clone(),
            self.epoch,
            self.config.tick_interval,
            self.config.tick,
        ));

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count() >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
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

        tick_handle.abort();

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let hub = self.hub.clone();
        let epoch = self.epoch;
        let conn = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let slot = ConnectionSlot::claim(&self.active_connections);

        tokio::spawn(async move {
            let _slot = slot;
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, msg_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);

            // Register connection
            {
                let mut hub = hub.lock().await;
                hub.outlets.insert(conn, msg_tx.clone());
                dispatch::connect(&mut hub.game, conn);
            }

            let mut sender_task = tokio::spawn(pump_outbound(msg_rx, ws_sender));

            // Handle incoming messages
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

                                let mut hub = hub.lock().await;
                                let reply = dispatch::handle_client_message(
                                    &mut hub.game,
                                    conn,
                                    client_msg,
                                    elapsed_ms(epoch),
                                );
                                hub.flush();
                                if let Some(reply) = reply {
                                    let _ = msg_tx.try_send(reply);
                                }
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
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            {
                let mut hub = hub.lock().await;
                hub.outlets.remove(&conn);
                dispatch::disconnect(&mut hub.game, conn);
                hub.flush();
            }

            // Last sender gone: the writer drains what is queued and stops
            drop(msg_tx);
            if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut sender_task).await.is_err() {
                warn!("Connection {} did not flush in time", conn);
                sender_task.abort();
            }

            info!("Client {} (connection {}) cleaned up", addr, conn);
        });
    }

    /// Check round deadlines on a fixed interval.
    async fn run_tick_loop(
        hub: Arc<Mutex<Hub>>,
        epoch: Instant,
        tick_interval: Duration,
        config: TickConfig,
    ) {
        let mut ticker = interval(tick_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let mut hub = hub.lock().await;
            let result = tick(&mut hub.game, elapsed_ms(epoch), &config);
            hub.flush();

            if let Some(eliminated) = &result.round_ended {
                info!(
                    "Round {} over: {} eliminated, {} left",
                    hub.game.round(),
                    eliminated.len(),
                    hub.game.alive_count()
                );
            }
            if let Some(round) = result.round_started {
                info!("Round {} started: {}", round, hub.game.current_cmd().as_str());
            }
            if result.paused {
                info!("Game paused after round {}", hub.game.round());
            }
            if result.game_over {
                info!("Game over after round {}", hub.game.round());
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Open connections, including those still in the handshake.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Shared game state.
    pub fn hub(&self) -> Arc<Mutex<Hub>> {
        self.hub.clone()
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
