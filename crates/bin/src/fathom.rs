//! Fathom - Unified game room server with catalog hosting.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use protocol::messages::{ClientMessage, ServerMessage};
use protocol::ProtocolError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    room: Arc<RwLock<server::Room>>,
    state_tx: broadcast::Sender<server::StateBroadcast>,
    event_tx: broadcast::Sender<server::TargetedEvent>,
    catalog: Arc<server::FishCatalog>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,server=debug")),
        )
        .init();

    info!("Fathom Server v{}", env!("CARGO_PKG_VERSION"));

    // Load server configuration
    let config = server::Config::load()?;
    info!("Loaded configuration");
    info!("  Name: {}", config.server.name);
    info!("  Port: {}", config.server.port);
    info!("  Tick interval: {}ms", config.server.tick_interval_ms);
    info!("  Catalog: {}", config.catalog.path);

    // Load the fish catalog; failure is fatal before any join
    let catalog = Arc::new(server::FishCatalog::load(&config.catalog.path)?);

    // Create broadcast channels
    let (state_tx, _) = broadcast::channel::<server::StateBroadcast>(8);
    let (event_tx, _) = broadcast::channel::<server::TargetedEvent>(100);

    // Create the shared room
    let room = Arc::new(RwLock::new(server::Room::new(
        Arc::clone(&catalog),
        state_tx.clone(),
        event_tx.clone(),
    )?));

    // Start the simulation loop
    let loop_room = Arc::clone(&room);
    let tick_interval = config.server.tick_interval_ms;
    tokio::spawn(async move {
        server::run_room_loop(loop_room, tick_interval).await;
    });

    // Create app state
    let state = AppState {
        room,
        state_tx,
        event_tx,
        catalog,
    };

    // Build the axum router
    let app = Router::new()
        // WebSocket game endpoint
        .route("/game", get(websocket_handler))
        // Catalog document, served exactly as loaded
        .route("/fishData.json", get(serve_fish_data))
        // Client assets (models, textures) from a local public/ directory
        .fallback_service(ServeDir::new("public"))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Game WebSocket endpoint: ws://{}/game", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Handle WebSocket connections for the game
async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("WebSocket connection from {}", addr);

    ws.on_upgrade(move |socket| handle_websocket(socket, addr, state))
}

/// Handle individual WebSocket connections
async fn handle_websocket(socket: WebSocket, addr: SocketAddr, state: AppState) {
    info!("New game connection from {}", addr);

    // Subscribe to broadcast channels
    let state_rx = state.state_tx.subscribe();
    let event_rx = state.event_tx.subscribe();

    // Handle the connection using server logic
    if let Err(e) = handle_game_connection(socket, addr, state.room, state_rx, event_rx).await {
        error!("Connection error from {}: {}", addr, e);
    }
}

/// Adapt the axum WebSocket to the room's connection contract
async fn handle_game_connection(
    socket: WebSocket,
    addr: SocketAddr,
    room: Arc<RwLock<server::Room>>,
    mut state_rx: broadcast::Receiver<server::StateBroadcast>,
    mut event_rx: broadcast::Receiver<server::TargetedEvent>,
) -> anyhow::Result<()> {
    let (mut write, mut read) = socket.split();

    // Create the session
    let session_id = {
        let mut room = room.write().await;
        room.add_player(addr)
    };

    // Tell the client its own id before the first state frame arrives
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

/// Serve the catalog document from memory
async fn serve_fish_data(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        state.catalog.raw_document().to_string(),
    )
}
