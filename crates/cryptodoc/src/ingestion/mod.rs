//! Document ingestion: text extraction and the ingest pipeline

mod extractor;
mod pipeline;

pub use extractor::{DocumentTextExtractor, TextExtractor};
pub(crate) use pipeline::{extract_text, truncate_chars};
pub use pipeline::{content_hash, storage_key_for, IngestOutcome, IngestPipeline, IngestRequest};
