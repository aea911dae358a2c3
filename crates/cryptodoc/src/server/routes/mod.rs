//! API routes for the document server

pub mod chat;
pub mod documents;
pub mod objects;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;
use crate::service::DocumentStats;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload - with larger body limit for file uploads
        .route(
            "/documents/upload",
            post(documents::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Document management
        .route("/documents", get(documents::list_documents))
        .route("/documents/search", get(documents::search_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/preview", get(documents::preview_document))
        .route("/documents/:id/verify", get(documents::verify_document))
        // AI
        .route("/documents/:id/chat", post(chat::chat_with_document))
        .route(
            "/documents/:id/regenerate-summary",
            post(chat::regenerate_summary),
        )
        // Stats and info
        .route("/stats", get(stats))
        .route("/info", get(info))
}

/// GET /api/stats - Document counts
async fn stats(State(state): State<AppState>) -> Json<DocumentStats> {
    Json(state.service().stats())
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let context = state.service().context();
    Json(serde_json::json!({
        "name": "cryptodoc",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document registry with ledger anchoring and AI analysis",
        "providers": {
            "object_store": context.object_store.name(),
            "ledger": context.ledger.as_ref().map(|l| l.name()),
            "llm": context.llm.name(),
            "model": context.llm.model(),
        },
        "endpoints": {
            "POST /api/documents/upload": "Upload a document (multipart: file, tag)",
            "GET /api/documents": "List documents, newest first",
            "GET /api/documents/search?name=": "Find documents by filename",
            "GET /api/documents/:id": "Get document details",
            "DELETE /api/documents/:id": "Delete a document",
            "GET /api/documents/:id/preview": "Presigned link to the original file",
            "GET /api/documents/:id/verify": "Check the document hash against the ledger",
            "POST /api/documents/:id/chat": "Ask a question about a document",
            "POST /api/documents/:id/regenerate-summary": "Re-run the AI analysis",
            "GET /api/stats": "Document statistics"
        },
        "rate_limit_period_secs": context.rate_limiter.period().as_secs(),
    }))
}
