//! Ledger provider trait for anchoring document hashes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A document as recorded on the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerDocument {
    /// Sequence number on the ledger, starting at 1
    pub id: u64,
    pub filename: String,
    pub hash: String,
    pub storage_key: String,
    pub tag: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a registration
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    /// Transaction reference
    pub tx_ref: String,
    /// Ledger id assigned to the new entry
    pub document_id: u64,
}

/// Trait for an append-only document ledger
///
/// Implementations:
/// - `LocalLedger`: hash-chained journal file
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Record a document
    ///
    /// The receipt carries the id assigned to this entry, which stays correct
    /// when registrations run concurrently.
    async fn register_document(
        &self,
        signer_key: &str,
        filename: &str,
        hash: &str,
        storage_key: &str,
        tag: &str,
    ) -> Result<LedgerReceipt>;

    /// Number of documents registered so far
    async fn document_count(&self) -> Result<u64>;

    /// Fetch a registered document by its ledger id
    async fn get_document(&self, id: u64) -> Result<LedgerDocument>;

    /// Whether the ledger entry `id` carries `hash`
    async fn verify_document(&self, id: u64, hash: &str) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
