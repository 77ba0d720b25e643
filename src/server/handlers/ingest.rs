use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::ingest::IngestReport;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct IngestRequestBody {
    /// Directory to ingest; defaults to the configured docs directory.
    pub docs_dir: Option<PathBuf>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    body: Option<Json<IngestRequestBody>>,
) -> Result<Json<IngestReport>, ApiError> {
    let docs_dir = body
        .and_then(|Json(body)| body.docs_dir)
        .unwrap_or_else(|| state.paths.docs_dir.clone());

    let report = state.ingestor.ingest_dir(&docs_dir).await?;
    Ok(Json(report))
}
