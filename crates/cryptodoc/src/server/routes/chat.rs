//! Chat and re-analysis endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::service::Answer;
use crate::types::DocumentRecord;

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

/// POST /api/documents/:id/chat - Ask a question about one document
pub async fn chat_with_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<Answer>> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(Error::BadRequest("Question must not be empty".to_string()));
    }

    tracing::info!("Chat on {}: {}", id, question);

    Ok(Json(state.service().ask(&id, question).await?))
}

/// POST /api/documents/:id/regenerate-summary - Re-run the AI analysis
pub async fn regenerate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentRecord>> {
    Ok(Json(state.service().reanalyze(&id).await?))
}
