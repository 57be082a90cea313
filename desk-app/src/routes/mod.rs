pub mod dashboard;
pub mod fields;
pub mod health;
pub mod sessions;
pub mod webhooks;

use crate::server::AppState;
use axum::routing::get;
use axum::{Extension, Json, Router};
use desk_core::RoutingError;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(dashboard::router())
        .merge(sessions::router())
        .merge(fields::router())
        .merge(webhooks::router())
        .route("/ws/chat/{session_id}", get(crate::ws::customer_ws))
        .route("/ws/admin", get(crate::ws::admin_ws))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(GlobalConcurrencyLimitLayer::new(512))
        .layer(CorsLayer::permissive())
}

/// Uniform JSON envelope for core failures; not-found stays distinguishable
/// without leaking internals.
pub(crate) fn error_response(e: &RoutingError) -> Json<serde_json::Value> {
    match e {
        RoutingError::NotFound(what) => {
            Json(serde_json::json!({ "status": "not_found", "error": what }))
        }
        other => Json(serde_json::json!({ "status": "error", "error": other.to_string() })),
    }
}
