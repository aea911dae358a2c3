//! cryptodoc: document registry with ledger anchoring and AI analysis
//!
//! Uploaded documents are stored in object storage, hashed and registered on
//! an append-only ledger, and analyzed by a generative-text service. A
//! durable metadata registry and a cache of extracted text back the query
//! side: chat, re-analysis, verification, listing and previews.
//!
//! The external collaborators are traits in [`providers`]; the local
//! filesystem implementations and an OpenAI-compatible client ship with the
//! crate so the [`server`] runs standalone.

pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::AppConfig;
pub use context::ServiceContext;
pub use error::{Error, Result};
pub use ingestion::{IngestOutcome, IngestPipeline, IngestRequest};
pub use retrieval::{FallbackChain, ResolvedText, TextSource};
pub use service::DocumentService;
pub use types::{AiStatus, DocumentAnalysis, DocumentRecord, VerificationStatus};
