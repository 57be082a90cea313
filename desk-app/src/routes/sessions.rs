use crate::routes::error_response;
use crate::server::AppState;
use axum::extract::{Path, Query};
use axum::routing::{delete, get, post, put};
use axum::{Extension, Json};
use desk_channels::Channel;
use desk_core::{MessageId, SessionId, Store};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    tag_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    admin: String,
}

#[derive(Debug, Deserialize)]
struct TagsRequest {
    tag_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct IdsRequest {
    ids: Vec<i64>,
}

pub fn router() -> axum::Router {
    axum::Router::new()
        .route(
            "/api/v1/sessions",
            post(create_session)
                .get(list_sessions)
                .delete(bulk_delete_sessions),
        )
        .route("/api/v1/sessions/{id}/history", get(history))
        .route("/api/v1/sessions/{id}/claim", post(claim_session))
        .route("/api/v1/sessions/{id}/close", post(close_session))
        .route("/api/v1/sessions/{id}/alert/clear", post(clear_alert))
        .route("/api/v1/sessions/{id}/tags", put(update_tags))
        .route("/api/v1/sessions/{id}/messages", delete(delete_messages))
}

#[tracing::instrument(level = "info", skip_all)]
async fn create_session(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.sessions.create_web().await {
        Ok(session) => Json(serde_json::json!({
            "status": "ok",
            "id": session.id,
            "external_id": session.external_id,
        })),
        Err(e) => error_response(&e),
    }
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list_sessions(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<serde_json::Value> {
    let channel = match params.channel.as_deref() {
        Some(raw) => match Channel::parse(raw) {
            Some(channel) => Some(channel),
            None => {
                return Json(serde_json::json!({
                    "status": "error",
                    "error": format!("unknown channel: {raw}"),
                }));
            }
        },
        None => None,
    };
    match state.store.list_sessions(channel, params.tag_id).await {
        Ok(sessions) => Json(serde_json::json!({ "status": "ok", "sessions": sessions })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}

#[tracing::instrument(level = "debug", skip_all)]
async fn history(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Query(params): Query<HistoryParams>,
) -> Json<serde_json::Value> {
    match state.store.history(id, params.page, params.limit).await {
        Ok(messages) => Json(serde_json::json!({ "status": "ok", "messages": messages })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn claim_session(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<ClaimRequest>,
) -> Json<serde_json::Value> {
    match state.router.claim_session(id, &req.admin).await {
        Ok(view) => Json(serde_json::json!({ "status": "ok", "session": view })),
        Err(e) => error_response(&e),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn close_session(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Json<serde_json::Value> {
    match state.router.close_session(id).await {
        Ok(view) => Json(serde_json::json!({ "status": "ok", "session": view })),
        Err(e) => error_response(&e),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn clear_alert(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<SessionId>,
) -> Json<serde_json::Value> {
    match state.sessions.clear_alert(id).await {
        Ok(view) => {
            state
                .registry
                .broadcast_to_admins(&desk_core::WsEvent::SessionUpdate {
                    session: view.clone(),
                });
            Json(serde_json::json!({ "status": "ok", "session": view }))
        }
        Err(e) => error_response(&e),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn update_tags(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<TagsRequest>,
) -> Json<serde_json::Value> {
    match state.router.update_session_tags(id, &req.tag_ids).await {
        Ok(view) => Json(serde_json::json!({ "status": "ok", "session": view })),
        Err(e) => error_response(&e),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn bulk_delete_sessions(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<IdsRequest>,
) -> Json<serde_json::Value> {
    match state.router.bulk_delete_sessions(&req.ids).await {
        Ok(deleted) => Json(serde_json::json!({
            "status": "ok",
            "deleted": deleted,
            "ids": req.ids,
        })),
        Err(e) => error_response(&e),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn delete_messages(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<SessionId>,
    Json(req): Json<IdsRequest>,
) -> Json<serde_json::Value> {
    let ids: Vec<MessageId> = req.ids.clone();
    match state.router.bulk_delete_messages(id, &ids).await {
        Ok(deleted) => Json(serde_json::json!({
            "status": "ok",
            "deleted": deleted,
            "ids": req.ids,
        })),
        Err(e) => error_response(&e),
    }
}
