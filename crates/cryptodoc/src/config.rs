//! Configuration for the document service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the generative-text API key
pub const LLM_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Environment variable holding the ledger signer key
pub const LEDGER_SIGNER_KEY_ENV: &str = "LEDGER_SIGNER_KEY";
/// Placeholder presign secret shipped in the defaults
pub const DEFAULT_SIGNING_SECRET: &str = "change-me";

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Local persistent state (metadata registry, text cache)
    #[serde(default)]
    pub storage: StorageConfig,
    /// Object storage for raw document bytes
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    /// Ledger configuration
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Generative-text provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Ingestion pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist. Secrets are overlaid from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                let config: AppConfig = toml::from_str(&raw).map_err(|e| {
                    Error::Config(format!("Invalid config file {}: {}", path.display(), e))
                })?;
                tracing::info!("Loaded configuration from {}", path.display());
                config
            }
            Some(path) => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                AppConfig::default()
            }
            None => AppConfig::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Overlay secrets from environment variables
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(LLM_API_KEY_ENV) {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var(LEDGER_SIGNER_KEY_ENV) {
            if !key.is_empty() {
                self.ledger.signer_key = Some(key);
            }
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Local persistent state configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the metadata registry and the text cache
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use absolute path so the service can be started from any directory
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")))
            .join("cryptodoc");
        Self { data_dir }
    }
}

impl StorageConfig {
    /// Path of the metadata registry file
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join("metadata.json")
    }

    /// Directory of cached extracted text
    pub fn text_cache_dir(&self) -> PathBuf {
        self.data_dir.join("text_cache")
    }
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    /// Root directory for stored objects
    pub root_dir: PathBuf,
    /// Public base URL under which objects are served
    pub public_base_url: String,
    /// Secret mixed into presigned URL signatures
    pub signing_secret: String,
    /// Lifetime of presigned URLs in seconds (default: 1 hour)
    pub presign_ttl_secs: u64,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            root_dir: StorageConfig::default().data_dir.join("objects"),
            public_base_url: "http://localhost:8080/objects".to_string(),
            signing_secret: DEFAULT_SIGNING_SECRET.to_string(),
            presign_ttl_secs: 3600,
        }
    }
}

impl ObjectStoreConfig {
    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }

    /// Whether presigned URLs are still signed with the placeholder secret
    pub fn uses_default_secret(&self) -> bool {
        self.signing_secret == DEFAULT_SIGNING_SECRET
    }
}

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Register documents on the ledger at all
    pub enabled: bool,
    /// Path of the append-only ledger journal
    pub journal_path: PathBuf,
    /// Key used to sign registrations (normally from `LEDGER_SIGNER_KEY`)
    #[serde(default, skip_serializing)]
    pub signer_key: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            journal_path: StorageConfig::default().data_dir.join("ledger.jsonl"),
            signer_key: None,
        }
    }
}

/// Generative-text provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// API key (normally from `OPENAI_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.2,
            timeout_secs: 90,
            max_retries: 2,
        }
    }
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds between rate-limiter refills (default: 4 = 15 calls/minute)
    pub rate_limit_period_secs: u64,
    /// Maximum characters of document text sent for analysis
    pub analysis_char_limit: usize,
    /// Tag used when the uploader gives none
    pub default_tag: String,
    /// Timeout for object storage calls
    pub storage_timeout_secs: u64,
    /// Timeout for ledger calls
    pub ledger_timeout_secs: u64,
    /// Timeout for text extraction
    pub extraction_timeout_secs: u64,
    /// Timeout for a single generative-text call (after the rate permit is granted)
    pub llm_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate_limit_period_secs: 4,
            analysis_char_limit: 12_000,
            default_tag: "General".to_string(),
            storage_timeout_secs: 30,
            ledger_timeout_secs: 60,
            extraction_timeout_secs: 60,
            llm_timeout_secs: 120,
        }
    }
}

impl PipelineConfig {
    pub fn rate_limit_period(&self) -> Duration {
        Duration::from_secs(self.rate_limit_period_secs.max(1))
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs)
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }
}
