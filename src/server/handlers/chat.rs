//! Chat endpoint — the caller boundary for one question-answer turn.
//!
//! The handler owns what the core does not: timing the call and folding the
//! turn into the running session metrics. The response body is shaped so a
//! role-tagged chat export can be assembled from it directly.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::rag::types::{AnswerResult, ConversationTurn, SessionMetrics};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub question: String,
    /// Prior turns, oldest first. The current question is not part of it.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponseBody {
    #[serde(flatten)]
    pub result: AnswerResult,
    /// Seconds spent on this turn, measured here at the boundary.
    pub latency: f64,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequestBody>,
) -> Json<ChatResponseBody> {
    let started = Instant::now();
    let result = state.chain.get_response(&body.question, &body.history).await;
    let latency = started.elapsed();

    if let Ok(mut metrics) = state.metrics.lock() {
        *metrics = metrics.record(&result, latency);
    }

    Json(ChatResponseBody {
        result,
        latency: latency.as_secs_f64(),
    })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<SessionMetrics> {
    let metrics = state
        .metrics
        .lock()
        .map(|metrics| metrics.clone())
        .unwrap_or_default();
    Json(metrics)
}
