//! Local persistent state: the document registry and the extracted-text cache

mod metadata_store;
mod text_cache;

pub use metadata_store::MetadataStore;
pub use text_cache::TextCache;
