//! Walkie-talkie audio relay server.

mod config;
mod error;
mod handlers;
mod protocol;
mod state;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{Html, IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use futures::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/rooms", get(rooms_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Walkie-Talkie relay server started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html("<h1>Walkie-Talkie Relay Server</h1><p>WebSocket endpoint: /ws</p>")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "walkie-relay-rs",
        "timestamp": state::epoch_ms() / 1000
    }))
}

/// Diagnostic room listing; read-only.
async fn rooms_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let rooms = handlers::room_list(&state).await;
    Json(serde_json::json!({
        "totalRooms": rooms.len(),
        "rooms": rooms,
        "timestamp": state::epoch_ms()
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = handlers::handle_connection(state.clone(), tx.clone()).await;

    // Writer task: drains the per-connection channel onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Ok(msg) = serde_json::from_str::<ClientMessage>(&text) {
                    handle_client_message(&state, &conn_id, &tx, msg).await;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    handlers::handle_disconnect(state, &conn_id).await;
    send_task.abort();
}

async fn handle_client_message(
    state: &Arc<AppState>,
    conn_id: &str,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
        }
        ClientMessage::CreateRoom { room_name, pin } => {
            handlers::handle_create_room(state.clone(), conn_id, &room_name, &pin).await;
        }
        ClientMessage::JoinRoom {
            room_name,
            pin,
            username,
        } => {
            handlers::handle_join_room(state.clone(), conn_id, &room_name, &pin, username).await;
        }
        ClientMessage::LeaveRoom => {
            handlers::handle_leave_room(state.clone(), conn_id).await;
        }
        ClientMessage::GetParticipants => {
            handlers::handle_get_participants(state.clone(), conn_id).await;
        }
        ClientMessage::AudioData { audio } => {
            handlers::handle_audio_data(state.clone(), conn_id, audio).await;
        }
        ClientMessage::TalkingStatus { is_talking } => {
            handlers::handle_talking_status(state.clone(), conn_id, is_talking).await;
        }
    }
}
