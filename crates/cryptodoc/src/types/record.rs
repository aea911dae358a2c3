//! Document record types persisted by the metadata store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::DocumentAnalysis;

/// Summary placeholder used until AI analysis produces a real one
pub const PENDING_SUMMARY: &str = "Pending analysis...";
/// Validity value when none could be determined
pub const VALIDITY_NOT_AVAILABLE: &str = "N/A";
/// Summary of a record rebuilt from a ledger entry
pub const NO_SUMMARY: &str = "No summary available.";
/// Size label when the byte count is not known
pub const SIZE_UNKNOWN: &str = "Unknown";

/// Lifecycle of AI enrichment for a record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AiStatus {
    /// Not analyzed yet
    #[default]
    Queued,
    /// Analysis (or fallback summary) succeeded
    Processed,
    /// Extraction or analysis failed
    Failed,
}

/// Whether the record is backed by a ledger registration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VerificationStatus {
    Verified,
    #[default]
    Unverified,
}

/// Durable metadata describing one ingested document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    /// Stable identifier, never changes after creation
    pub id: String,
    /// Locator of the raw bytes in object storage
    pub storage_key: String,
    /// Original filename
    pub name: String,
    /// SHA-256 of the raw bytes (hex)
    pub hash: String,
    /// Human readable size, e.g. "1.5 KB"
    pub size_label: String,
    /// Human readable upload date, e.g. "Jan 02, 2006"
    pub date_label: String,
    /// AI enrichment status
    pub ai_status: AiStatus,
    /// Ledger backing status
    pub verification_status: VerificationStatus,
    /// Tag supplied by the uploader
    #[serde(default)]
    pub tag: String,
    /// Document type (AI detected, or derived from the extension)
    #[serde(default)]
    pub doc_type: String,
    /// Category (AI detected, or the uploader's tag)
    pub category: String,
    /// Summary of the content
    pub summary: String,
    /// Validity or expiry as reported by the analysis
    pub validity: String,
    /// Key points reported by the analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_points: Option<String>,
    /// Document number on the ledger, if registration succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<String>,
    /// Ledger transaction reference, if registration succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<String>,
    /// Presigned preview URL; recomputed per read and never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Soft-delete flag
    #[serde(default)]
    pub deleted: bool,
    /// Creation time, the sort key for recency
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// Create a record with analysis fields at their pre-analysis defaults
    pub fn new(
        id: String,
        storage_key: String,
        name: String,
        hash: String,
        size_bytes: u64,
        tag: String,
    ) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            doc_type: doc_type_from_name(&name),
            storage_key,
            name,
            hash,
            size_label: format_size(size_bytes),
            date_label: format_date(&created_at),
            ai_status: AiStatus::Queued,
            verification_status: VerificationStatus::Unverified,
            category: tag.clone(),
            tag,
            summary: PENDING_SUMMARY.to_string(),
            validity: VALIDITY_NOT_AVAILABLE.to_string(),
            key_points: None,
            ledger_id: None,
            tx_ref: None,
            preview_url: None,
            deleted: false,
            created_at,
        }
    }

    /// Whether the ledger registration for this record succeeded
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Copy a successful analysis onto the record and mark it processed
    ///
    /// Empty fields in the analysis leave the current value in place, except
    /// validity which falls back to "N/A".
    pub fn apply_analysis(&mut self, analysis: &DocumentAnalysis) {
        if !analysis.category.trim().is_empty() {
            self.category = analysis.category.trim().to_string();
        }
        self.summary = analysis.summary.trim().to_string();
        self.validity = match analysis.validity.trim() {
            "" => VALIDITY_NOT_AVAILABLE.to_string(),
            validity => validity.to_string(),
        };
        if !analysis.document_type.trim().is_empty() {
            self.doc_type = analysis.document_type.trim().to_string();
        }
        if !analysis.key_points.trim().is_empty() {
            self.key_points = Some(analysis.key_points.trim().to_string());
        }
        self.ai_status = AiStatus::Processed;
    }
}

/// Format a byte count as a short label ("512 B", "1.5 KB", "3.0 MB")
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT && exp < 5 {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}

/// Format a timestamp as an upload date label
pub fn format_date(at: &DateTime<Utc>) -> String {
    at.format("%b %d, %Y").to_string()
}

fn doc_type_from_name(name: &str) -> String {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}
