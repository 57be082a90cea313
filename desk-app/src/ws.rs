//! WebSocket endpoints: one socket per customer session, one shared feed
//! for all admins. Each socket gets an outbound pump task fed by the
//! connection registry; the read loop pushes frames through the router.

use crate::server::AppState;
use axum::Extension;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use desk_core::SessionId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Deserialize)]
struct CustomerFrame {
    content: String,
    #[serde(default)]
    image_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AdminFrame {
    session_id: SessionId,
    content: String,
    #[serde(default)]
    image_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminParams {
    #[serde(default)]
    name: Option<String>,
}

pub async fn customer_ws(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
    upgrade: WebSocketUpgrade,
) -> Response {
    // Reject unknown sessions before paying for the upgrade.
    if state.sessions.get(session_id).await.is_err() {
        return StatusCode::NOT_FOUND.into_response();
    }
    upgrade
        .on_upgrade(move |socket| handle_customer_socket(state, session_id, socket))
        .into_response()
}

#[tracing::instrument(level = "info", skip_all, fields(session_id = session_id))]
async fn handle_customer_socket(state: Arc<AppState>, session_id: SessionId, socket: WebSocket) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.registry.connect_customer(session_id, outbound_tx.clone());

    let hello = serde_json::json!({ "type": "hello", "session_id": session_id });
    let _ = outbound_tx.send(hello.to_string());
    let pump = spawn_outbound_pump(ws_sender, outbound_rx);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let frame: CustomerFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%e, session_id, "customer sent an invalid frame");
                continue;
            }
        };
        // Delivery problems are contained below the router; an error here
        // means the message never became durable.
        if let Err(e) = state
            .router
            .ingest_customer_message(session_id, &frame.content, frame.image_urls)
            .await
        {
            tracing::warn!(%e, session_id, "customer message ingest failed");
        }
    }

    pump.abort();
    state.registry.disconnect_customer(session_id, conn_id);
}

pub async fn admin_ws(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<AdminParams>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let admin = params.name.unwrap_or_else(|| "admin".to_string());
    upgrade
        .on_upgrade(move |socket| handle_admin_socket(state, admin, socket))
        .into_response()
}

#[tracing::instrument(level = "info", skip_all, fields(admin = %admin))]
async fn handle_admin_socket(state: Arc<AppState>, admin: String, socket: WebSocket) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
    let conn_id = state.registry.connect_admin(outbound_tx.clone());

    let hello = serde_json::json!({ "type": "hello", "admin": admin });
    let _ = outbound_tx.send(hello.to_string());
    let pump = spawn_outbound_pump(ws_sender, outbound_rx);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let frame: AdminFrame = match serde_json::from_str(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%e, admin, "admin sent an invalid frame");
                continue;
            }
        };
        if let Err(e) = state
            .router
            .ingest_admin_message(frame.session_id, &admin, &frame.content, frame.image_urls)
            .await
        {
            tracing::warn!(%e, admin, session_id = frame.session_id, "admin message ingest failed");
        }
    }

    pump.abort();
    state.registry.disconnect_admin(conn_id);
}

/// Pump registry frames onto the wire. When the registry drops the sender
/// (this connection was replaced), close the socket so the stale peer does
/// not keep reading.
fn spawn_outbound_pump(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.send(Message::Close(None)).await;
    })
}
