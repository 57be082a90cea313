use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json};
use desk_core::Store;
use std::sync::Arc;

pub fn router() -> axum::Router {
    axum::Router::new().route("/api/v1/dashboard/summary", get(summary))
}

#[tracing::instrument(level = "debug", skip_all)]
async fn summary(Extension(state): Extension<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.store.dashboard_summary().await {
        Ok(summary) => Json(serde_json::json!({ "status": "ok", "summary": summary })),
        Err(e) => Json(serde_json::json!({ "status": "error", "error": e.to_string() })),
    }
}
