use crate::routes::error_response;
use crate::server::AppState;
use axum::routing::post;
use axum::{Extension, Json};
use desk_channels::{AdapterError, InboundEvent, parse_facebook, parse_telegram, parse_zalo};
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/webhook/telegram", post(telegram))
        .route("/webhook/facebook", post(facebook))
        .route("/webhook/zalo", post(zalo))
}

#[tracing::instrument(level = "info", skip_all)]
async fn telegram(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    ingest(&state, parse_telegram(&body)).await
}

#[tracing::instrument(level = "info", skip_all)]
async fn facebook(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    ingest(&state, parse_facebook(&body)).await
}

#[tracing::instrument(level = "info", skip_all)]
async fn zalo(
    Extension(state): Extension<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Json<serde_json::Value> {
    ingest(&state, parse_zalo(&body)).await
}

/// Platforms retry aggressively on non-2xx responses, so a payload we cannot
/// normalize is acknowledged as ignored rather than rejected.
async fn ingest(
    state: &AppState,
    parsed: Result<InboundEvent, AdapterError>,
) -> Json<serde_json::Value> {
    let event = match parsed {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(%e, "webhook payload not ingestible; ignoring");
            return Json(serde_json::json!({ "status": "ignored" }));
        }
    };
    let channel = event.channel;
    match state.router.ingest_event(event).await {
        Ok(message) => Json(serde_json::json!({
            "status": "ok",
            "session_id": message.session_id,
            "message_id": message.id,
        })),
        Err(e) => {
            tracing::error!(%e, %channel, "webhook ingest failed");
            error_response(&e)
        }
    }
}
