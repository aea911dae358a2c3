//! Application state for the document server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::context::{LedgerRegistrations, ServiceContext};
use crate::error::Result;
use crate::ingestion::DocumentTextExtractor;
use crate::processing::RateLimiter;
use crate::providers::{LedgerClient, LocalLedger, LocalObjectStore, OpenAiClient};
use crate::service::DocumentService;
use crate::storage::{MetadataStore, TextCache};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: AppConfig,
    /// Document operations
    service: DocumentService,
    /// Object store, kept concrete to serve presigned links
    objects: Arc<LocalObjectStore>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state
    ///
    /// Fails when the metadata registry or the ledger journal on disk cannot
    /// be decoded.
    pub async fn new(config: AppConfig) -> Result<Self> {
        tracing::info!("Initializing document service state...");

        let metadata = Arc::new(MetadataStore::load(config.storage.metadata_path())?);
        tracing::info!(
            "Metadata store loaded from {} ({} records)",
            metadata.path().display(),
            metadata.len()
        );

        let text_cache = Arc::new(TextCache::new(config.storage.text_cache_dir())?);
        tracing::info!("Text cache at {}", text_cache.dir().display());

        let objects = Arc::new(LocalObjectStore::from_config(&config.object_store)?);
        tracing::info!("Object store at {}", config.object_store.root_dir.display());
        if config.object_store.uses_default_secret() {
            tracing::warn!(
                "Presigned URLs use the default signing secret, set object_store.signing_secret"
            );
        }

        let ledger: Option<Arc<dyn LedgerClient>> = if config.ledger.enabled {
            let ledger = LocalLedger::from_config(&config.ledger).await?;
            if config.ledger.signer_key.is_none() {
                tracing::warn!(
                    "Ledger enabled but no signer key set, documents will not be registered"
                );
            }
            Some(Arc::new(ledger))
        } else {
            tracing::info!("Ledger disabled");
            None
        };

        let rate_limiter = RateLimiter::start(config.pipeline.rate_limit_period());
        let llm = Arc::new(
            OpenAiClient::new(&config.llm)?.with_rate_limiter(rate_limiter.clone()),
        );
        if config.llm.api_key.is_none() {
            tracing::warn!("No LLM API key configured, analysis requests will likely fail");
        }
        tracing::info!("LLM client initialized ({} at {})", config.llm.model, config.llm.base_url);

        let context = ServiceContext {
            object_store: objects.clone(),
            ledger,
            signer_key: config.ledger.signer_key.clone(),
            llm,
            extractor: Arc::new(DocumentTextExtractor::new()),
            rate_limiter,
            metadata,
            text_cache,
            registrations: LedgerRegistrations::default(),
        };

        let service = DocumentService::new(
            context,
            config.pipeline.clone(),
            config.object_store.presign_ttl(),
        );

        tracing::info!("Document service ready");

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                service,
                objects,
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get the document service
    pub fn service(&self) -> &DocumentService {
        &self.inner.service
    }

    /// Get the local object store
    pub fn objects(&self) -> &Arc<LocalObjectStore> {
        &self.inner.objects
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
