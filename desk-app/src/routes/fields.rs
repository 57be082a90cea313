use crate::server::AppState;
use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Extension, Json};
use desk_core::NewFieldConfig;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new()
        .route("/api/v1/field-configs", get(list).post(create))
        .route("/api/v1/field-configs/{id}", put(update).delete(remove))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn list(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.fields.all().await {
        Ok(configs) => Json(serde_json::json!({ "status": "ok", "field_configs": configs })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn create(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<NewFieldConfig>,
) -> Json<serde_json::Value> {
    match state.fields.create(req).await {
        Ok(config) => Json(serde_json::json!({ "status": "ok", "field_config": config })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn update(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<NewFieldConfig>,
) -> Json<serde_json::Value> {
    match state.fields.update(id, req).await {
        Ok(Some(config)) => Json(serde_json::json!({ "status": "ok", "field_config": config })),
        Ok(None) => Json(serde_json::json!({ "status": "not_found" })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}

#[tracing::instrument(level = "info", skip_all)]
async fn remove(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Json<serde_json::Value> {
    match state.fields.delete(id).await {
        Ok(true) => Json(serde_json::json!({ "status": "ok" })),
        Ok(false) => Json(serde_json::json!({ "status": "not_found" })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}
