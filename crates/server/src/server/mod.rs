//! Game room server implementation.

use crate::catalog::FishCatalog;
use crate::config::Config;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};

pub mod player;
pub mod room;

pub use room::{run_room_loop, PendingBroadcasts, Rejection, Room};

use protocol::messages::{ClientMessage, ServerMessage};
use protocol::{ProtocolError, SessionId};

/// One encoded state frame, shared by every connection.
#[derive(Debug, Clone)]
pub struct StateBroadcast {
    /// The JSON `state` message, encoded once per tick.
    pub frame: String,
}

/// A message addressed to a single session.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetedEvent {
    /// Target session.
    pub session_id: SessionId,
    /// The message to deliver.
    pub message: ServerMessage,
}

/// Connection tracking state (shared across connection handlers).
struct ConnectionState {
    /// Number of connections per IP address.
    ip_connections: HashMap<IpAddr, usize>,
    /// Total number of connections.
    total_connections: usize,
}

impl ConnectionState {
    fn new() -> Self {
        Self {
            ip_connections: HashMap::new(),
            total_connections: 0,
        }
    }

    /// Try to add a connection, returns true if allowed.
    fn try_add_connection(&mut self, ip: IpAddr, max_total: usize, max_per_ip: usize) -> bool {
        // Check total connections
        if self.total_connections >= max_total {
            return false;
        }

        // Check per-IP limit
        let current = self.ip_connections.get(&ip).copied().unwrap_or(0);
        if current >= max_per_ip {
            return false;
        }

        // Add the connection
        *self.ip_connections.entry(ip).or_insert(0) += 1;
        self.total_connections += 1;
        true
    }

    /// Remove a connection.
    fn remove_connection(&mut self, ip: IpAddr) {
        if let Some(count) = self.ip_connections.get_mut(&ip) {
            if *count > 0 {
                *count -= 1;
                self.total_connections = self.total_connections.saturating_sub(1);
            }
            if *count == 0 {
                self.ip_connections.remove(&ip);
            }
        }
    }
}

/// Run the room server.
pub async fn run(config: Config, catalog: Arc<FishCatalog>) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on ws://{}", addr);

    // Connection tracking state
    let conn_state = Arc::new(RwLock::new(ConnectionState::new()));

    // Broadcast channels for state frames and addressed events
    let (state_tx, _state_rx) = broadcast::channel::<StateBroadcast>(8);
    let (event_tx, _event_rx) = broadcast::channel::<TargetedEvent>(100);

    // Shared room state
    let room = Arc::new(RwLock::new(Room::new(
        catalog,
        state_tx.clone(),
        event_tx.clone(),
    )?));

    // Start the simulation loop
    let loop_room = Arc::clone(&room);
    let tick_interval = config.server.tick_interval_ms;
    tokio::spawn(async move {
        room::run_room_loop(loop_room, tick_interval).await;
    });

    // Connection limits
    let max_clients = config.server.max_clients;
    let ip_limit = config.server.ip_limit;

    loop {
        let (stream, addr) = listener.accept().await?;
        let ip = addr.ip();

        // Check connection limits
        {
            let mut state = conn_state.write().await;
            if !state.try_add_connection(ip, max_clients, ip_limit) {
                warn!("Connection rejected (limit reached): {}", addr);
                continue;
            }
        }

        let room = Arc::clone(&room);
        let conn_state = Arc::clone(&conn_state);
        let state_rx = state_tx.subscribe();
        let event_rx = event_tx.subscribe();

        tokio::spawn(async move {
            let result = handle_connection(stream, addr, room, state_rx, event_rx).await;

            // Always remove from connection tracking when done
            {
                let mut state = conn_state.write().await;
                state.remove_connection(addr.ip());
            }

            if let Err(e) = result {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    room: Arc<RwLock<Room>>,
    mut state_rx: broadcast::Receiver<StateBroadcast>,
    mut event_rx: broadcast::Receiver<TargetedEvent>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New connection from {}", addr);

    let (mut write, mut read) = ws_stream.split();

    // Create the session
    let session_id = {
        let mut room = room.write().await;
        room.add_player(addr)
    };

    // Tell the client its own id before the first state frame arrives.
    // A send failure here is left to the read loop to notice.
    let welcome = ServerMessage::Welcome {
        id: session_id.clone(),
    };
    match welcome.encode() {
        Ok(frame) => {
            if let Err(e) = write.send(Message::Text(frame.into())).await {
                warn!("Failed to send welcome to {}: {}", addr, e);
            }
        }
        Err(e) => warn!("Failed to encode welcome for {}: {}", addr, e),
    }

    // Message loop - handle both incoming intents and broadcasts
    loop {
        tokio::select! {
            // Handle incoming WebSocket messages
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match ClientMessage::decode(&text) {
                            Ok(message) => {
                                let mut room = room.write().await;
                                room.handle_message(&session_id, message);
                            }
                            Err(e) => {
                                warn!("Bad message from {}: {}", addr, e);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Bad message from {}: {}", addr, ProtocolError::BinaryFrame);
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => {
                        break;
                    }
                    _ => {}
                }
            }
            // Forward the shared state frame
            state = state_rx.recv() => {
                if let Ok(state) = state {
                    if let Err(e) = write.send(Message::Text(state.frame.into())).await {
                        warn!("Failed to send state to {}: {}", addr, e);
                        break;
                    }
                }
            }
            // Forward addressed events
            event = event_rx.recv() => {
                if let Ok(event) = event {
                    // Only deliver events addressed to this session
                    if event.session_id != session_id {
                        continue;
                    }
                    match event.message.encode() {
                        Ok(frame) => {
                            if let Err(e) = write.send(Message::Text(frame.into())).await {
                                warn!("Failed to send event to {}: {}", addr, e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to encode event for {}: {}", addr, e),
                    }
                }
            }
        }
    }

    // Remove the session
    {
        let mut room = room.write().await;
        room.remove_player(&session_id);
    }

    Ok(())
}
