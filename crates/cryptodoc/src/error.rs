//! Error types for the document service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, Error>;

/// Document service errors
///
/// `Storage` and `Persist` are the two fatal ingestion stages. `Ledger`, `Llm`,
/// `Extraction` and `Timeout` come from degraded stages: the pipeline logs them
/// and records the outcome in the document's status fields instead of
/// returning them.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object storage write or read failed
    #[error("Object storage error: {0}")]
    Storage(String),

    /// Metadata registry could not be written
    #[error("Failed to persist metadata: {0}")]
    Persist(String),

    /// Ledger call failed
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Generative-text provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Text extraction failed or produced nothing
    #[error("Text extraction failed: {0}")]
    Extraction(String),

    /// An external call exceeded its time budget
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// No cached text for a document
    #[error("No cached text for document {0}")]
    CacheMiss(String),

    /// No full text could be recovered for a document
    #[error("Text unavailable for document {0}")]
    TextUnavailable(String),

    /// Registry file exists but cannot be decoded
    #[error("Metadata store at {path} is corrupt: {message}")]
    CorruptStore { path: PathBuf, message: String },

    /// Document id is not usable as a storage key
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    /// Malformed client request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a ledger error
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an extraction error
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, limit: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs: limit.as_secs(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for the expected "not cached yet" branch
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Self::CacheMiss(_))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Storage(_) => (StatusCode::BAD_GATEWAY, "storage_error"),
            Error::Persist(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persist_error"),
            Error::Ledger(_) => (StatusCode::BAD_GATEWAY, "ledger_error"),
            Error::Llm(_) => (StatusCode::BAD_GATEWAY, "llm_error"),
            Error::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error"),
            Error::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            Error::DocumentNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::CacheMiss(_) => (StatusCode::NOT_FOUND, "cache_miss"),
            Error::TextUnavailable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "text_unavailable"),
            Error::CorruptStore { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_store"),
            Error::InvalidDocumentId(_) => (StatusCode::BAD_REQUEST, "invalid_id"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Http(_) => (StatusCode::BAD_GATEWAY, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
