//! Provider abstractions for object storage, the ledger, and generative text
//!
//! Trait-based seams so the pipeline can run against the local filesystem
//! backends, a hosted API, or in-memory doubles in tests.

pub mod ledger;
pub mod llm;
pub mod local;
pub mod object_store;
pub mod openai;

pub use ledger::{LedgerClient, LedgerDocument, LedgerReceipt};
pub use llm::GenerativeTextProvider;
pub use local::{LocalLedger, LocalObjectStore};
pub use object_store::ObjectStore;
pub use openai::OpenAiClient;
