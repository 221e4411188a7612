//! Axum WebSocket server for Zing.
//!
//! # Routes
//!
//! | Method | Path            | Description                             |
//! |--------|-----------------|-----------------------------------------|
//! | `GET`  | `/ws`           | WebSocket upgrade for game connections  |
//! | `GET`  | `/api/rooms`    | List active room IDs (JSON, debug)      |
//!
//! Configuration is read from `ZING_*` environment variables, see
//! [`config::Config::from_env`].

mod config;
mod connection;
mod error;
mod invites;
mod matchmaking;
mod registry;
mod repository;
mod room;
mod ws_handler;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use config::Config;
use connection::ConnectionRegistry;
use invites::InviteStore;
use matchmaking::MatchmakingQueues;
use registry::RoomRegistry;
use repository::NullRepository;
use room::Repo;

/// Shared application state available to every connection handler.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<RoomRegistry>,
    connections: Arc<ConnectionRegistry>,
    matchmaking: Arc<MatchmakingQueues>,
    invites: Arc<InviteStore>,
    config: Config,
    repo: Repo,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();

    let state = AppState {
        registry: Arc::new(RoomRegistry::new()),
        connections: Arc::new(ConnectionRegistry::new()),
        matchmaking: Arc::new(MatchmakingQueues::new()),
        invites: Arc::new(InviteStore::new()),
        config,
        repo: Arc::new(NullRepository),
    };

    let app = Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/api/rooms", get(rooms_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Zing server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

/// `GET /ws` — upgrade to WebSocket and hand off to [`ws_handler::handle_socket`].
async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_handler::handle_socket(socket, state))
}

/// `GET /api/rooms` — debug listing of active room ids.
async fn rooms_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.list_room_ids().await.into_iter().map(|id| id.0).collect())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl_c handler");
    tracing::info!("shutdown signal received");
}
