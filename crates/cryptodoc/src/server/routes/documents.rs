//! Document upload, listing and management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ingestion::IngestRequest;
use crate::server::state::AppState;
use crate::service::Verification;
use crate::types::DocumentRecord;

/// Response for a successful upload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub document: DocumentRecord,
    /// Ledger transaction reference, absent when registration was skipped or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
}

/// Response for document listings
#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentRecord>,
    pub total: usize,
}

impl From<Vec<DocumentRecord>> for DocumentListResponse {
    fn from(documents: Vec<DocumentRecord>) -> Self {
        Self {
            total: documents.len(),
            documents,
        }
    }
}

/// Query parameters for name search
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: String,
}

/// Response carrying a preview link
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub id: String,
    pub url: String,
}

/// POST /api/documents/upload - Upload and ingest one file
///
/// Multipart fields: `file` (required) and `tag` (optional).
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;
    let mut tag = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| Error::BadRequest("File field has no filename".to_string()))?;
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&filename)
                            .first_or_octet_stream()
                            .to_string()
                    });
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::BadRequest(format!("Failed to read file: {}", e)))?;
                upload = Some((filename, content_type, data.to_vec()));
            }
            "tag" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::BadRequest(format!("Failed to read tag: {}", e)))?;
                tag = Some(value);
            }
            other => {
                tracing::debug!("Ignoring multipart field {}", other);
            }
        }
    }

    let (filename, content_type, bytes) =
        upload.ok_or_else(|| Error::BadRequest("Missing file field".to_string()))?;

    tracing::info!("Upload received: {} ({} bytes)", filename, bytes.len());

    let outcome = state
        .service()
        .ingest(IngestRequest {
            bytes,
            filename,
            content_type,
            tag,
        })
        .await?;

    Ok(Json(UploadResponse {
        document: outcome.record,
        tx_ref: outcome.tx_ref,
    }))
}

/// GET /api/documents - List live documents, newest first
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    Json(state.service().list_documents().await.into())
}

/// GET /api/documents/search?name= - Find documents by filename
pub async fn search_documents(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<DocumentListResponse> {
    Json(state.service().search_by_name(&query.name).await.into())
}

/// GET /api/documents/:id - Get document details
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentRecord>> {
    Ok(Json(state.service().get_document(&id).await?))
}

/// DELETE /api/documents/:id - Soft-delete a document
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.service().delete(&id).await?;

    Ok(Json(serde_json::json!({
        "deleted": true,
        "id": id,
    })))
}

/// GET /api/documents/:id/preview - Presigned link to the stored bytes
pub async fn preview_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>> {
    let url = state.service().preview_url(&id).await?;
    Ok(Json(PreviewResponse { id, url }))
}

/// GET /api/documents/:id/verify - Check the document hash against the ledger
pub async fn verify_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Verification>> {
    Ok(Json(state.service().verify(&id).await?))
}
