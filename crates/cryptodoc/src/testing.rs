//! In-memory collaborators for unit tests

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::{LedgerRegistrations, ServiceContext};
use crate::error::{Error, Result};
use crate::ingestion::DocumentTextExtractor;
use crate::processing::RateLimiter;
use crate::providers::{
    GenerativeTextProvider, LedgerClient, LedgerDocument, LedgerReceipt, ObjectStore,
};
use crate::storage::{MetadataStore, TextCache};
use crate::types::DocumentAnalysis;

/// Object store keeping bytes in a map
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    pub fail_puts: AtomicBool,
    pub fail_gets: AtomicBool,
    pub gets: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().contains_key(key)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::storage("object store unreachable"));
        }
        self.objects.lock().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Error::storage("object store unreachable"));
        }
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::storage(format!("no object {}", key)))
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        Ok(format!("memory://{}?ttl={}", key, ttl.as_secs()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Ledger keeping documents in a vector; can be switched off
#[derive(Default)]
pub struct MemoryLedger {
    documents: Mutex<Vec<LedgerDocument>>,
    pub unreachable: AtomicBool,
}

impl MemoryLedger {
    pub fn unreachable() -> Self {
        let ledger = Self::default();
        ledger.unreachable.store(true, Ordering::SeqCst);
        ledger
    }

    fn check(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::ledger("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn register_document(
        &self,
        _signer_key: &str,
        filename: &str,
        hash: &str,
        storage_key: &str,
        tag: &str,
    ) -> Result<LedgerReceipt> {
        self.check()?;
        let mut documents = self.documents.lock();
        let id = documents.len() as u64 + 1;
        documents.push(LedgerDocument {
            id,
            filename: filename.to_string(),
            hash: hash.to_string(),
            storage_key: storage_key.to_string(),
            tag: tag.to_string(),
            timestamp: Utc::now(),
        });
        Ok(LedgerReceipt {
            tx_ref: format!("0xtx{}", id),
            document_id: id,
        })
    }

    async fn document_count(&self) -> Result<u64> {
        self.check()?;
        Ok(self.documents.lock().len() as u64)
    }

    async fn get_document(&self, id: u64) -> Result<LedgerDocument> {
        self.check()?;
        let documents = self.documents.lock();
        id.checked_sub(1)
            .and_then(|index| documents.get(index as usize))
            .cloned()
            .ok_or_else(|| Error::ledger(format!("no document #{}", id)))
    }

    async fn verify_document(&self, id: u64, hash: &str) -> Result<bool> {
        Ok(self.get_document(id).await?.hash == hash)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Generative-text double with switchable failures and call counters
pub struct ScriptedLlm {
    pub analysis: DocumentAnalysis,
    pub completion: String,
    pub fail_analyze: AtomicBool,
    pub fail_complete: AtomicBool,
    pub analyze_calls: AtomicUsize,
    pub complete_calls: AtomicUsize,
    pub last_prompt: Mutex<String>,
    /// Added latency for `analyze`
    pub analyze_delay: Mutex<Duration>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self {
            analysis: DocumentAnalysis {
                category: "Legal".to_string(),
                summary: "Residential lease between two parties".to_string(),
                validity: "2030-01-31".to_string(),
                key_points: "monthly rent; five year term".to_string(),
                document_type: "Lease Agreement".to_string(),
            },
            completion: "Generated text".to_string(),
            fail_analyze: AtomicBool::new(false),
            fail_complete: AtomicBool::new(false),
            analyze_calls: AtomicUsize::new(0),
            complete_calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(String::new()),
            analyze_delay: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait]
impl GenerativeTextProvider for ScriptedLlm {
    async fn analyze(&self, text: &str) -> Result<DocumentAnalysis> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = text.to_string();
        let delay = *self.analyze_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_analyze.load(Ordering::SeqCst) {
            return Err(Error::llm("Malformed analysis response"));
        }
        Ok(self.analysis.clone())
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = prompt.to_string();
        if self.fail_complete.load(Ordering::SeqCst) {
            return Err(Error::llm("rate limit exceeded"));
        }
        Ok(self.completion.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// Test fixture wiring the doubles into a `ServiceContext`
pub struct Fixture {
    pub context: ServiceContext,
    pub objects: Arc<MemoryObjectStore>,
    pub ledger: Arc<MemoryLedger>,
    pub llm: Arc<ScriptedLlm>,
}

impl Fixture {
    /// Fixture with a reachable ledger and signer key
    pub fn new(dir: &Path) -> Self {
        Self::with_ledger(dir, MemoryLedger::default())
    }

    pub fn with_ledger(dir: &Path, ledger: MemoryLedger) -> Self {
        let objects = Arc::new(MemoryObjectStore::default());
        let ledger = Arc::new(ledger);
        let llm = Arc::new(ScriptedLlm::default());

        let metadata = MetadataStore::load(dir.join("metadata.json")).unwrap();
        let text_cache = TextCache::new(dir.join("text_cache")).unwrap();

        let context = ServiceContext {
            object_store: objects.clone(),
            ledger: Some(ledger.clone()),
            signer_key: Some("test-signer".to_string()),
            llm: llm.clone(),
            extractor: Arc::new(DocumentTextExtractor::new()),
            rate_limiter: RateLimiter::start(Duration::from_millis(5)),
            metadata: Arc::new(metadata),
            text_cache: Arc::new(text_cache),
            registrations: LedgerRegistrations::default(),
        };

        Self {
            context,
            objects,
            ledger,
            llm,
        }
    }
}
