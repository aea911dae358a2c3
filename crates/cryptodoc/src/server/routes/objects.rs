//! Serves stored objects behind presigned links

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;

use crate::providers::ObjectStore;
use crate::server::state::AppState;

/// Signature parameters of a presigned link
#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

/// GET /objects/*key - Fetch object bytes with a valid presigned signature
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Response {
    let objects = state.objects();
    if !objects.verify_signature(&key, query.expires, &query.signature) {
        tracing::debug!("Rejected object request for {}", key);
        return (StatusCode::FORBIDDEN, "Invalid or expired link").into_response();
    }

    match objects.get(&key).await {
        Ok(data) => {
            let content_type = mime_guess::from_path(&key).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, content_type.to_string())],
                Body::from(Bytes::from(data)),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Object {} unavailable: {}", key, e);
            (StatusCode::NOT_FOUND, "Object not found").into_response()
        }
    }
}
