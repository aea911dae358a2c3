//! Core types for the document service

pub mod analysis;
pub mod record;

pub use analysis::DocumentAnalysis;
pub use record::{
    format_date, format_size, AiStatus, DocumentRecord, VerificationStatus, NO_SUMMARY,
    PENDING_SUMMARY, SIZE_UNKNOWN, VALIDITY_NOT_AVAILABLE,
};
