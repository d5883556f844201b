use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Health check with cache occupancy. Does not touch the object store.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "cachedDays": state.articles().cache().len().await,
    }))
}

/// Lightweight ping.
async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
