//! Ingestion pipeline orchestration
//!
//! store bytes → hash → ledger (best-effort) → extract → analyze (with a
//! plain-summary fallback) → cache text → persist record.
//!
//! Only the object-storage write and the final metadata write are fatal.
//! Every other stage degrades: its failure is logged and reflected in the
//! record's status fields.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::context::{PendingRegistration, ServiceContext};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::processing::{run_blocking, with_timeout};
use crate::types::{AiStatus, DocumentRecord, VerificationStatus};

/// An upload to ingest
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
    /// User tag; the configured default tag is used when absent or blank
    pub tag: Option<String>,
}

/// Result of a successful ingestion
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The record as persisted
    pub record: DocumentRecord,
    /// Ledger transaction reference, if registration succeeded
    pub tx_ref: Option<String>,
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    context: ServiceContext,
    config: PipelineConfig,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(context: ServiceContext, config: PipelineConfig) -> Self {
        Self { context, config }
    }

    /// Ingest one document
    ///
    /// Fails only when the bytes cannot be stored (`Storage`) or the finished
    /// record cannot be persisted (`Persist`). Dropping the future before it
    /// completes never leaves a partial record behind.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let start = Instant::now();
        let IngestRequest {
            bytes,
            filename,
            content_type,
            tag,
        } = request;
        let tag = tag
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.config.default_tag.clone());

        tracing::info!("Ingesting {} ({} bytes, tag {})", filename, bytes.len(), tag);

        // Raw bytes first; nothing else happens if this fails
        let storage_key = storage_key_for(&filename);
        with_timeout(
            "object storage upload",
            self.config.storage_timeout(),
            self.context.object_store.put(&storage_key, &bytes, &content_type),
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to store {}: {}", filename, e);
            if matches!(e, Error::Storage(_)) {
                e
            } else {
                Error::storage(e.to_string())
            }
        })?;

        let hash = content_hash(&bytes);

        // Local id; the ledger's numbering goes to `ledger_id`
        let id = Uuid::new_v4().to_string();
        let mut record = DocumentRecord::new(
            id,
            storage_key,
            filename,
            hash,
            bytes.len() as u64,
            tag,
        );

        // Held until the record is persisted so a ledger backfill skips it
        let (tx_ref, _pending) = self.register_on_ledger(&mut record).await.unzip();

        let text = match self.extract(&record.name, bytes).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("Text extraction failed for {}: {}", record.name, e);
                record.ai_status = AiStatus::Failed;
                None
            }
        };

        if let Some(text) = &text {
            self.analyze(&mut record, text).await;

            // Cached whether or not analysis succeeded
            if let Err(e) = self.context.text_cache.save(&record.id, text).await {
                tracing::warn!("Failed to cache text for {}: {}", record.id, e);
            }
        }

        let metadata = Arc::clone(&self.context.metadata);
        let persisted = record.clone();
        run_blocking(move || metadata.add_or_update(persisted))
            .await
            .map_err(|e| {
                tracing::error!("Failed to persist record {}: {}", record.id, e);
                if matches!(e, Error::Persist(_)) {
                    e
                } else {
                    Error::Persist(e.to_string())
                }
            })?;

        tracing::info!(
            "Ingested {} as {} ({:?}, {:?}) in {:.1}s",
            record.name,
            record.id,
            record.ai_status,
            record.verification_status,
            start.elapsed().as_secs_f64()
        );

        Ok(IngestOutcome { record, tx_ref })
    }

    async fn register_on_ledger(
        &self,
        record: &mut DocumentRecord,
    ) -> Option<(String, PendingRegistration)> {
        let (ledger, signer_key) = match self.context.ledger_signer() {
            Some(pair) => pair,
            None => {
                tracing::debug!("Ledger not configured, skipping registration of {}", record.name);
                return None;
            }
        };

        let gate = self.context.registrations.register_gate().await;
        let registered = with_timeout(
            "ledger registration",
            self.config.ledger_timeout(),
            ledger.register_document(
                signer_key,
                &record.name,
                &record.hash,
                &record.storage_key,
                &record.tag,
            ),
        )
        .await;

        let receipt = match registered {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!("Ledger registration failed for {}: {}", record.name, e);
                return None;
            }
        };
        let pending = self.context.registrations.track(receipt.document_id);
        drop(gate);

        record.tx_ref = Some(receipt.tx_ref.clone());
        record.ledger_id = Some(receipt.document_id.to_string());
        record.verification_status = VerificationStatus::Verified;

        Some((receipt.tx_ref, pending))
    }

    async fn extract(&self, filename: &str, bytes: Vec<u8>) -> Result<String> {
        extract_text(&self.context, &self.config, filename, bytes).await
    }

    /// Structured analysis, falling back to a plain summary
    async fn analyze(&self, record: &mut DocumentRecord, text: &str) {
        let input = truncate_chars(text, self.config.analysis_char_limit);

        self.context.rate_limiter.acquire().await;
        let analysis = with_timeout(
            "document analysis",
            self.config.llm_timeout(),
            self.context.llm.analyze(input),
        )
        .await;

        let e = match analysis {
            Ok(analysis) => {
                record.apply_analysis(&analysis);
                return;
            }
            Err(e) => e,
        };
        tracing::warn!("Analysis failed for {}: {}, trying plain summary", record.id, e);

        self.context.rate_limiter.acquire().await;
        let summary = with_timeout(
            "summary generation",
            self.config.llm_timeout(),
            self.context.llm.complete(&PromptBuilder::build_summary_prompt(input)),
        )
        .await;

        match summary {
            Ok(summary) if !summary.trim().is_empty() => {
                record.summary = summary.trim().to_string();
                record.ai_status = AiStatus::Processed;
            }
            Ok(_) => {
                tracing::warn!("Summary generation returned nothing for {}", record.id);
                record.ai_status = AiStatus::Failed;
            }
            Err(e) => {
                tracing::warn!("Summary generation failed for {}: {}", record.id, e);
                record.ai_status = AiStatus::Failed;
            }
        }
    }
}

/// Extract text on the blocking pool under the configured time budget
///
/// Whitespace-only output counts as a failure.
pub(crate) async fn extract_text(
    context: &ServiceContext,
    config: &PipelineConfig,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<String> {
    let extractor = Arc::clone(&context.extractor);
    let name = filename.to_string();
    let text = with_timeout(
        "text extraction",
        config.extraction_timeout(),
        run_blocking(move || extractor.extract(&name, &bytes)),
    )
    .await?;

    if text.trim().is_empty() {
        return Err(Error::extraction(format!("{} contains no text", filename)));
    }
    Ok(text)
}

/// Hex-encoded SHA-256 of `bytes`
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Object-storage key for an upload: `docs/<unix-millis>-<sanitized name>`
pub fn storage_key_for(filename: &str) -> String {
    format!(
        "docs/{}-{}",
        chrono::Utc::now().timestamp_millis(),
        sanitize_filename(filename)
    )
}

fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "document".to_string()
    } else {
        sanitized.to_string()
    }
}

/// Longest prefix of `text` with at most `limit` characters
pub(crate) fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
