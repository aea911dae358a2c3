//! Tiered resolution of a document's full text
//!
//! Tiers, first success wins: cached text, re-download plus re-extraction
//! (written back to the cache), and for question answering only, the stored
//! summary.

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::ingestion::extract_text;
use crate::processing::with_timeout;
use crate::types::DocumentRecord;

/// Which tier produced a resolved text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    Cache,
    Reextracted,
    Summary,
}

/// Document text together with the tier that produced it
#[derive(Debug, Clone)]
pub struct ResolvedText {
    pub text: String,
    pub source: TextSource,
}

/// Resolves document text through cache, object storage and summary tiers
pub struct FallbackChain {
    context: ServiceContext,
    config: PipelineConfig,
}

impl FallbackChain {
    pub fn new(context: ServiceContext, config: PipelineConfig) -> Self {
        Self { context, config }
    }

    /// Text for answering a question about `id`
    ///
    /// Fails only when the record does not exist; when no full text can be
    /// recovered the stored summary is returned.
    pub async fn resolve_for_question_answering(&self, id: &str) -> Result<ResolvedText> {
        let record = self.record(id)?;

        if let Some(resolved) = self.resolve_full_text(&record).await {
            return Ok(resolved);
        }

        tracing::warn!("No full text for {}, answering from its summary", id);
        Ok(ResolvedText {
            text: record.summary,
            source: TextSource::Summary,
        })
    }

    /// Text for re-running analysis on `id`; a summary is never enough here
    pub async fn resolve_for_reanalysis(&self, id: &str) -> Result<ResolvedText> {
        let record = self.record(id)?;

        self.resolve_full_text(&record)
            .await
            .ok_or_else(|| Error::TextUnavailable(id.to_string()))
    }

    fn record(&self, id: &str) -> Result<DocumentRecord> {
        self.context
            .metadata
            .get(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    async fn resolve_full_text(&self, record: &DocumentRecord) -> Option<ResolvedText> {
        match self.context.text_cache.get(&record.id).await {
            Ok(text) => {
                return Some(ResolvedText {
                    text,
                    source: TextSource::Cache,
                })
            }
            Err(e) if e.is_cache_miss() => {
                tracing::debug!("Text cache miss for {}", record.id);
            }
            Err(e) => {
                tracing::warn!("Text cache read failed for {}: {}", record.id, e);
            }
        }

        let text = match self.reextract(record).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Re-extraction failed for {}: {}", record.id, e);
                return None;
            }
        };

        if let Err(e) = self.context.text_cache.save(&record.id, &text).await {
            tracing::warn!("Failed to cache re-extracted text for {}: {}", record.id, e);
        }

        Some(ResolvedText {
            text,
            source: TextSource::Reextracted,
        })
    }

    async fn reextract(&self, record: &DocumentRecord) -> Result<String> {
        let bytes = with_timeout(
            "object storage download",
            self.config.storage_timeout(),
            self.context.object_store.get(&record.storage_key),
        )
        .await?;

        extract_text(&self.context, &self.config, &record.name, bytes).await
    }
}
