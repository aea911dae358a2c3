//! Generative-text provider trait for document analysis and chat

use async_trait::async_trait;

use crate::error::Result;
use crate::types::DocumentAnalysis;

/// Trait for generative-text services
///
/// Callers are responsible for rate limiting; implementations issue the
/// request as soon as they are called.
///
/// Implementations:
/// - `OpenAiClient`: OpenAI-compatible chat completions API
#[async_trait]
pub trait GenerativeTextProvider: Send + Sync {
    /// Produce a structured analysis of a document's text
    async fn analyze(&self, text: &str) -> Result<DocumentAnalysis>;

    /// Complete a free-form prompt
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
