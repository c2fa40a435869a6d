use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::{json, Value};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, warn};

use spoofbar_core::message::CommandResult;
use spoofbar_core::{CommandResponse, StatusResponse, SupervisorError};
use spoofbar_supervisor::SupervisorHandle;

/// Shared application state for API handlers.
pub struct AppState {
    pub supervisor: SupervisorHandle,
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/start", post(start_proxy))
        .route("/api/stop", post(stop_proxy))
        .route("/api/events", get(ws_handler))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "spoofbar",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Current proxy state.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    match state.supervisor.status().await {
        Ok(status) => Ok(Json(StatusResponse::from(&status))),
        Err(e) => {
            error!(error = %e, "Failed to read supervisor status");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Start the proxy. The supervisor announces it on `/api/events`.
pub async fn start_proxy(State(state): State<Arc<AppState>>) -> (StatusCode, Json<CommandResponse>) {
    respond(state.supervisor.start().await)
}

pub async fn stop_proxy(State(state): State<Arc<AppState>>) -> (StatusCode, Json<CommandResponse>) {
    respond(state.supervisor.stop().await)
}

fn respond(result: CommandResult) -> (StatusCode, Json<CommandResponse>) {
    let code = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) if e.is_rejection() => StatusCode::CONFLICT,
        Err(SupervisorError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(CommandResponse::from(result)))
}

/// WebSocket feed of `status-changed` notifications.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut stream = BroadcastStream::new(state.supervisor.subscribe());

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(Ok(event)) => {
                    let Ok(text) = serde_json::to_string(&event) else { continue };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(skipped, "Status listener lagged");
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Status listener disconnected");
}
