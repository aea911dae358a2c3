//! Shared handles to the local stores and external collaborators

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ingestion::TextExtractor;
use crate::processing::RateLimiter;
use crate::providers::{GenerativeTextProvider, LedgerClient, ObjectStore};
use crate::storage::{MetadataStore, TextCache};

/// Everything the pipeline, the fallback chain and the service operate on
///
/// Cloning shares the same underlying stores, clients and rate limiter.
#[derive(Clone)]
pub struct ServiceContext {
    pub object_store: Arc<dyn ObjectStore>,
    pub ledger: Option<Arc<dyn LedgerClient>>,
    /// Key used to sign ledger registrations; registration is skipped without one
    pub signer_key: Option<String>,
    pub llm: Arc<dyn GenerativeTextProvider>,
    pub extractor: Arc<dyn TextExtractor>,
    pub rate_limiter: RateLimiter,
    pub metadata: Arc<MetadataStore>,
    pub text_cache: Arc<TextCache>,
    pub registrations: LedgerRegistrations,
}

impl ServiceContext {
    /// Ledger client and signer key, if both are configured
    pub fn ledger_signer(&self) -> Option<(&Arc<dyn LedgerClient>, &str)> {
        match (&self.ledger, self.signer_key.as_deref()) {
            (Some(ledger), Some(key)) if !key.trim().is_empty() => Some((ledger, key)),
            _ => None,
        }
    }
}

/// Ledger entries registered by ingests that have not persisted their record
///
/// Registrations hold the shared side of the gate until their entry is
/// tracked; a ledger backfill holds the exclusive side while it decides which
/// entries lack a record, so it never sees an untracked registration.
#[derive(Clone, Default)]
pub struct LedgerRegistrations {
    gate: Arc<RwLock<()>>,
    in_flight: Arc<Mutex<HashSet<u64>>>,
}

impl LedgerRegistrations {
    /// Held across a registration call and the matching [`track`](Self::track)
    pub async fn register_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    /// Held while a backfill reads the ledger and the store
    pub async fn backfill_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Mark `ledger_id` in flight until the returned handle is dropped
    pub fn track(&self, ledger_id: u64) -> PendingRegistration {
        self.in_flight.lock().insert(ledger_id);
        PendingRegistration {
            ledger_id,
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    pub fn is_in_flight(&self, ledger_id: u64) -> bool {
        self.in_flight.lock().contains(&ledger_id)
    }
}

/// An in-flight ledger registration; dropping it clears the mark
#[must_use]
pub struct PendingRegistration {
    ledger_id: u64,
    in_flight: Arc<Mutex<HashSet<u64>>>,
}

impl Drop for PendingRegistration {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.ledger_id);
    }
}
