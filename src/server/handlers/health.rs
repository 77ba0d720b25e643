use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let provider_ok = state.llm.health_check().await.unwrap_or(false);
    let chunk_count = state.store.count().await.unwrap_or(0);

    Json(json!({
        "status": "ok",
        "llm_backend": state.llm.name(),
        "llm_reachable": provider_ok,
        "indexed_chunks": chunk_count,
        "started_at": state.started_at.to_rfc3339(),
    }))
}
