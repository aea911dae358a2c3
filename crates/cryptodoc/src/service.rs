//! Document operations exposed over HTTP
//!
//! Wraps the ingest pipeline and the fallback chain, and adds the read-side
//! operations: listing, preview links, ledger verification, chat, re-analysis
//! and statistics.

use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::context::ServiceContext;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::ingestion::{truncate_chars, IngestOutcome, IngestPipeline, IngestRequest};
use crate::processing::{run_blocking, with_timeout};
use crate::providers::{LedgerClient, LedgerDocument};
use crate::retrieval::{FallbackChain, TextSource};
use crate::types::{
    format_date, AiStatus, DocumentRecord, VerificationStatus, NO_SUMMARY, SIZE_UNKNOWN,
};

/// Answer to a question about one document
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Tier the document text came from
    pub source: TextSource,
}

/// Outcome of checking a record against the ledger
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub id: String,
    pub ledger_id: Option<u64>,
    pub hash: String,
    pub matches: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Aggregate counts over live documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub total: usize,
    pub verified: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Document service
pub struct DocumentService {
    context: ServiceContext,
    config: PipelineConfig,
    pipeline: IngestPipeline,
    chain: FallbackChain,
    presign_ttl: Duration,
}

impl DocumentService {
    pub fn new(context: ServiceContext, config: PipelineConfig, presign_ttl: Duration) -> Self {
        Self {
            pipeline: IngestPipeline::new(context.clone(), config.clone()),
            chain: FallbackChain::new(context.clone(), config.clone()),
            context,
            config,
            presign_ttl,
        }
    }

    /// Shared stores and collaborators
    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Ingest an upload
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let mut outcome = self.pipeline.ingest(request).await?;
        self.attach_preview(&mut outcome.record).await;
        Ok(outcome)
    }

    /// Answer `question` from the document's text
    ///
    /// Waits for a rate-limiter permit before calling the model.
    pub async fn ask(&self, id: &str, question: &str) -> Result<Answer> {
        let resolved = self.chain.resolve_for_question_answering(id).await?;
        let context = truncate_chars(&resolved.text, self.config.analysis_char_limit);
        let prompt = PromptBuilder::build_chat_prompt(context, question);

        self.context.rate_limiter.acquire().await;
        let answer = with_timeout(
            "document chat",
            self.config.llm_timeout(),
            self.context.llm.complete(&prompt),
        )
        .await?;

        tracing::info!("Answered question on {} from {:?}", id, resolved.source);

        Ok(Answer {
            answer,
            source: resolved.source,
        })
    }

    /// Re-run structured analysis and persist the refreshed fields
    ///
    /// On analysis failure the stored record is left untouched.
    pub async fn reanalyze(&self, id: &str) -> Result<DocumentRecord> {
        let resolved = self.chain.resolve_for_reanalysis(id).await?;
        let input = truncate_chars(&resolved.text, self.config.analysis_char_limit);

        self.context.rate_limiter.acquire().await;
        let analysis = with_timeout(
            "document analysis",
            self.config.llm_timeout(),
            self.context.llm.analyze(input),
        )
        .await?;

        let mut record = self
            .context
            .metadata
            .get(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;
        record.apply_analysis(&analysis);
        self.persist(record.clone()).await?;

        tracing::info!("Re-analyzed {}", id);

        self.attach_preview(&mut record).await;
        Ok(record)
    }

    /// Check the record's hash against its ledger entry
    pub async fn verify(&self, id: &str) -> Result<Verification> {
        let record = self.get_record(id)?;
        let ledger = self
            .context
            .ledger
            .as_ref()
            .ok_or_else(|| Error::ledger("Ledger is not configured"))?;

        let ledger_id = match record.ledger_id.as_deref().and_then(|l| l.parse::<u64>().ok()) {
            Some(ledger_id) => ledger_id,
            None => {
                return Ok(Verification {
                    id: record.id,
                    ledger_id: None,
                    hash: record.hash,
                    matches: false,
                    reason: Some("Document was never registered on the ledger".to_string()),
                })
            }
        };

        let matches = with_timeout(
            "ledger verification",
            self.config.ledger_timeout(),
            ledger.verify_document(ledger_id, &record.hash),
        )
        .await?;

        if !matches {
            tracing::warn!("Hash mismatch for {} against ledger #{}", id, ledger_id);
        }

        Ok(Verification {
            id: record.id,
            ledger_id: Some(ledger_id),
            hash: record.hash,
            matches,
            reason: (!matches).then(|| "Hash differs from the ledger entry".to_string()),
        })
    }

    /// Live documents, newest first, each with a fresh preview URL
    ///
    /// Ledger entries without a local record are rebuilt from the ledger and
    /// persisted first. An unreachable ledger only skips that step.
    pub async fn list_documents(&self) -> Vec<DocumentRecord> {
        self.backfill_from_ledger().await;

        let mut records = self.context.metadata.get_all();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.with_previews(records).await
    }

    /// A record by id, including soft-deleted ones
    pub async fn get_document(&self, id: &str) -> Result<DocumentRecord> {
        let mut record = self.get_record(id)?;
        self.attach_preview(&mut record).await;
        Ok(record)
    }

    /// Presigned URL for the document's stored bytes
    pub async fn preview_url(&self, id: &str) -> Result<String> {
        let record = self.get_record(id)?;
        self.context
            .object_store
            .presigned_url(&record.storage_key, self.presign_ttl)
            .await
    }

    /// Soft-delete a document and drop its cached text
    pub async fn delete(&self, id: &str) -> Result<()> {
        let record = self.get_record(id)?;
        if record.deleted {
            return Ok(());
        }

        let metadata = Arc::clone(&self.context.metadata);
        let target = id.to_string();
        run_blocking(move || metadata.delete(&target)).await?;

        if let Err(e) = self.context.text_cache.delete(id).await {
            tracing::warn!("Failed to remove cached text for {}: {}", id, e);
        }

        tracing::info!("Deleted document {}", id);
        Ok(())
    }

    /// Counts over live documents
    pub fn stats(&self) -> DocumentStats {
        self.context
            .metadata
            .get_all()
            .iter()
            .fold(DocumentStats::default(), |mut stats, record| {
                stats.total += 1;
                if record.is_verified() {
                    stats.verified += 1;
                }
                match record.ai_status {
                    AiStatus::Processed => stats.processed += 1,
                    AiStatus::Failed => stats.failed += 1,
                    AiStatus::Queued => {}
                }
                stats
            })
    }

    /// Live documents whose name, or whose ledger entry's filename, matches
    /// case-insensitively
    pub async fn search_by_name(&self, name: &str) -> Vec<DocumentRecord> {
        let entries = self.backfill_from_ledger().await;

        let needle = name.to_lowercase();
        let ledger_ids: HashSet<String> = entries
            .iter()
            .filter(|entry| entry.filename.to_lowercase() == needle)
            .map(|entry| entry.id.to_string())
            .collect();

        let mut records = self.context.metadata.find_by_name(name);
        let seen: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
        records.extend(
            self.context
                .metadata
                .find_by_ledger_ids(&ledger_ids)
                .into_iter()
                .filter(|r| !seen.contains(&r.id)),
        );
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.with_previews(records).await
    }

    /// Rebuild records for ledger entries no local record refers to
    ///
    /// Returns every ledger entry that could be read.
    async fn backfill_from_ledger(&self) -> Vec<LedgerDocument> {
        let Some(ledger) = self.context.ledger.as_ref() else {
            return Vec::new();
        };

        // Also serializes backfills, so an entry is rebuilt at most once
        let _gate = self.context.registrations.backfill_gate().await;
        let entries = self.ledger_entries(ledger.as_ref()).await;

        let known = self.context.metadata.ledger_ids();
        let missing = entries.iter().filter(|e| {
            !known.contains(&e.id.to_string()) && !self.context.registrations.is_in_flight(e.id)
        });
        for entry in missing {
            let record = record_from_ledger(entry);
            tracing::info!(
                "Backfilling {} from ledger #{} as {}",
                entry.filename,
                entry.id,
                record.id
            );
            if let Err(e) = self.persist(record).await {
                tracing::warn!("Failed to backfill ledger #{}: {}", entry.id, e);
            }
        }

        entries
    }

    async fn ledger_entries(&self, ledger: &dyn LedgerClient) -> Vec<LedgerDocument> {
        let timeout = self.config.ledger_timeout();
        let count = match with_timeout("ledger document count", timeout, ledger.document_count())
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Could not read ledger document count: {}", e);
                return Vec::new();
            }
        };

        let fetched = join_all(
            (1..=count).map(|id| with_timeout("ledger lookup", timeout, ledger.get_document(id))),
        )
        .await;

        fetched
            .into_iter()
            .filter_map(|result| match result {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable ledger entry: {}", e);
                    None
                }
            })
            .collect()
    }

    fn get_record(&self, id: &str) -> Result<DocumentRecord> {
        self.context
            .metadata
            .get(id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    async fn persist(&self, record: DocumentRecord) -> Result<()> {
        let metadata = Arc::clone(&self.context.metadata);
        run_blocking(move || metadata.add_or_update(record)).await
    }

    async fn attach_preview(&self, record: &mut DocumentRecord) {
        match self
            .context
            .object_store
            .presigned_url(&record.storage_key, self.presign_ttl)
            .await
        {
            Ok(url) => record.preview_url = Some(url),
            Err(e) => tracing::warn!("Failed to presign preview for {}: {}", record.id, e),
        }
    }

    async fn with_previews(&self, mut records: Vec<DocumentRecord>) -> Vec<DocumentRecord> {
        join_all(records.iter_mut().map(|record| self.attach_preview(record))).await;
        records
    }
}

/// A record for a ledger entry that has no local counterpart
fn record_from_ledger(entry: &LedgerDocument) -> DocumentRecord {
    let mut record = DocumentRecord::new(
        Uuid::new_v4().to_string(),
        entry.storage_key.clone(),
        entry.filename.clone(),
        entry.hash.clone(),
        0,
        entry.tag.clone(),
    );
    record.size_label = SIZE_UNKNOWN.to_string();
    record.date_label = format_date(&entry.timestamp);
    record.created_at = entry.timestamp;
    record.summary = NO_SUMMARY.to_string();
    record.ledger_id = Some(entry.id.to_string());
    record.verification_status = VerificationStatus::Verified;
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::LocalLedger;
    use crate::testing::Fixture;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn service(fixture: &Fixture) -> DocumentService {
        DocumentService::new(
            fixture.context.clone(),
            PipelineConfig::default(),
            Duration::from_secs(600),
        )
    }

    async fn upload(service: &DocumentService, filename: &str, body: &str) -> DocumentRecord {
        service
            .ingest(IngestRequest {
                bytes: body.as_bytes().to_vec(),
                filename: filename.to_string(),
                content_type: "text/plain".to_string(),
                tag: Some("Legal".to_string()),
            })
            .await
            .unwrap()
            .record
    }

    #[tokio::test]
    async fn test_ingest_attaches_preview_but_store_does_not() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);

        let record = upload(&service, "a.txt", "alpha").await;

        assert_eq!(
            record.preview_url,
            Some(format!("memory://{}?ttl=600", record.storage_key))
        );
        assert!(fixture.context.metadata.get(&record.id).unwrap().preview_url.is_none());
    }

    #[tokio::test]
    async fn test_ask_uses_document_text() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);
        let record = upload(&service, "a.txt", "The rent is 900 per month").await;

        let answer = service.ask(&record.id, "How much is the rent?").await.unwrap();

        assert_eq!(answer.answer, "Generated text");
        assert_eq!(answer.source, TextSource::Cache);
        let prompt = fixture.llm.last_prompt.lock().clone();
        assert!(prompt.contains("The rent is 900 per month"));
        assert!(prompt.contains("How much is the rent?"));
    }

    #[tokio::test]
    async fn test_ask_surfaces_model_failure() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);
        let record = upload(&service, "a.txt", "text").await;
        fixture.llm.fail_complete.store(true, Ordering::SeqCst);

        let result = service.ask(&record.id, "question").await;
        assert!(matches!(result, Err(Error::Llm(_))));
    }

    #[tokio::test]
    async fn test_reanalyze_updates_record() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        fixture.llm.fail_analyze.store(true, Ordering::SeqCst);
        fixture.llm.fail_complete.store(true, Ordering::SeqCst);
        let service = service(&fixture);
        let record = upload(&service, "a.txt", "lease text").await;
        assert_eq!(record.ai_status, AiStatus::Failed);

        fixture.llm.fail_analyze.store(false, Ordering::SeqCst);
        let refreshed = service.reanalyze(&record.id).await.unwrap();

        assert_eq!(refreshed.ai_status, AiStatus::Processed);
        assert_eq!(refreshed.summary, "Residential lease between two parties");
        let stored = fixture.context.metadata.get(&record.id).unwrap();
        assert_eq!(stored.summary, refreshed.summary);
        assert_eq!(stored.key_points.as_deref(), Some("monthly rent; five year term"));
    }

    #[tokio::test]
    async fn test_reanalyze_failure_leaves_record_untouched() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);
        let record = upload(&service, "a.txt", "lease text").await;
        fixture.llm.fail_analyze.store(true, Ordering::SeqCst);

        let result = service.reanalyze(&record.id).await;

        assert!(matches!(result, Err(Error::Llm(_))));
        let mut stored = fixture.context.metadata.get(&record.id).unwrap();
        stored.preview_url = record.preview_url.clone();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_verify_against_ledger() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);
        let record = upload(&service, "a.txt", "alpha").await;
        assert_eq!(record.verification_status, VerificationStatus::Verified);

        let verification = service.verify(&record.id).await.unwrap();
        assert!(verification.matches);
        assert_eq!(verification.ledger_id, Some(1));

        let mut tampered = fixture.context.metadata.get(&record.id).unwrap();
        tampered.hash = "0".repeat(64);
        fixture.context.metadata.add_or_update(tampered).unwrap();

        let verification = service.verify(&record.id).await.unwrap();
        assert!(!verification.matches);
        assert!(verification.reason.is_some());
    }

    #[tokio::test]
    async fn test_verify_unregistered_document() {
        let dir = tempdir().unwrap();
        let mut fixture = Fixture::new(dir.path());
        fixture.context.signer_key = None;
        let service = service(&fixture);
        let record = upload(&service, "a.txt", "alpha").await;

        let verification = service.verify(&record.id).await.unwrap();
        assert!(!verification.matches);
        assert!(verification.ledger_id.is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_newest_first_and_delete() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);

        let first = upload(&service, "first.txt", "one").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = upload(&service, "second.txt", "two").await;

        let listed = service.list_documents().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
        assert!(listed.iter().all(|r| r.preview_url.is_some()));

        service.delete(&first.id).await.unwrap();

        let listed = service.list_documents().await;
        assert_eq!(listed.len(), 1);
        assert!(service.get_document(&first.id).await.unwrap().deleted);
        assert!(fixture.context.text_cache.get(&first.id).await.is_err());
        assert!(matches!(
            service.delete("missing").await,
            Err(Error::DocumentNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_and_search() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);

        upload(&service, "Lease.txt", "one").await;
        upload(&service, "scan.png", "not text").await;

        let stats = service.stats();
        assert_eq!(
            stats,
            DocumentStats {
                total: 2,
                verified: 2,
                processed: 1,
                failed: 1,
            }
        );

        let found = service.search_by_name("lease.TXT").await;
        assert_eq!(found.len(), 1);
        assert!(found[0].preview_url.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingests_get_their_own_ledger_ids() {
        let dir = tempdir().unwrap();
        let mut fixture = Fixture::new(dir.path());
        let ledger = LocalLedger::open(dir.path().join("ledger.jsonl")).await.unwrap();
        fixture.context.ledger = Some(Arc::new(ledger));
        let service = Arc::new(service(&fixture));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    upload(&service, &format!("doc-{}.txt", i), &format!("contents {}", i)).await
                })
            })
            .collect();

        let mut records = Vec::new();
        for handle in handles {
            records.push(handle.await.unwrap());
        }

        let ledger_ids: HashSet<String> = records
            .iter()
            .map(|r| r.ledger_id.clone().unwrap())
            .collect();
        assert_eq!(ledger_ids.len(), 16);

        for record in &records {
            let verification = service.verify(&record.id).await.unwrap();
            assert!(verification.matches, "{} failed verification", record.name);
        }
    }

    #[tokio::test]
    async fn test_list_backfills_ledger_only_entries() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);

        fixture
            .ledger
            .register_document("k", "legacy.pdf", "abc", "docs/0-legacy.pdf", "Finance")
            .await
            .unwrap();
        let uploaded = upload(&service, "new.txt", "fresh").await;

        let listed = service.list_documents().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, uploaded.id);

        let legacy = &listed[1];
        assert_eq!(legacy.ledger_id.as_deref(), Some("1"));
        assert_ne!(legacy.id, "1");
        assert_eq!(legacy.name, "legacy.pdf");
        assert_eq!(legacy.hash, "abc");
        assert_eq!(legacy.category, "Finance");
        assert_eq!(legacy.summary, NO_SUMMARY);
        assert_eq!(legacy.size_label, SIZE_UNKNOWN);
        assert_eq!(legacy.ai_status, AiStatus::Queued);
        assert_eq!(legacy.verification_status, VerificationStatus::Verified);
        assert!(legacy.preview_url.is_some());
        assert!(fixture.context.metadata.get(&legacy.id).is_some());

        // Rebuilt once, and a deleted record is not brought back
        service.delete(&legacy.id).await.unwrap();
        let listed = service.list_documents().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(fixture.context.metadata.len(), 2);
    }

    #[tokio::test]
    async fn test_list_skips_backfill_when_ledger_unreachable() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);
        upload(&service, "a.txt", "alpha").await;

        fixture.ledger.unreachable.store(true, Ordering::SeqCst);

        assert_eq!(service.list_documents().await.len(), 1);
    }

    #[tokio::test]
    async fn test_search_matches_ledger_filenames() {
        let dir = tempdir().unwrap();
        let fixture = Fixture::new(dir.path());
        let service = service(&fixture);

        fixture
            .ledger
            .register_document("k", "Contract.pdf", "abc", "docs/0-Contract.pdf", "Legal")
            .await
            .unwrap();
        upload(&service, "other.txt", "unrelated").await;

        let found = service.search_by_name("contract.PDF").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].ledger_id.as_deref(), Some("1"));
        assert_eq!(found[0].name, "Contract.pdf");
        assert!(service.search_by_name("missing.pdf").await.is_empty());
    }
}
