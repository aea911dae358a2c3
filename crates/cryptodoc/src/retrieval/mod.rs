//! Document text resolution for query-style operations

mod fallback;

pub use fallback::{FallbackChain, ResolvedText, TextSource};
