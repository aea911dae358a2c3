//! Structured AI analysis of a document

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Result of a structured document analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentAnalysis {
    /// Main category (Legal, Financial, Academic, ...)
    #[serde(default)]
    pub category: String,
    /// Summary of the content
    #[serde(default)]
    pub summary: String,
    /// Expiry date (YYYY-MM-DD), "Indefinite" or "N/A"
    #[serde(default)]
    pub validity: String,
    /// Key points separated by semicolons
    #[serde(default)]
    pub key_points: String,
    /// Specific document type (Invoice, Employment Contract, ...)
    #[serde(default)]
    pub document_type: String,
}

impl DocumentAnalysis {
    /// Parse a model completion into an analysis
    ///
    /// Accepts bare JSON or JSON wrapped in a markdown code fence. A completion
    /// without a summary is rejected so callers fall back to a plain summary.
    pub fn from_completion(completion: &str) -> Result<Self> {
        let json = strip_code_fence(completion);

        let analysis: DocumentAnalysis = serde_json::from_str(json)
            .map_err(|e| Error::llm(format!("Malformed analysis response: {}", e)))?;

        if analysis.summary.trim().is_empty() {
            return Err(Error::llm("Analysis response has no summary"));
        }

        Ok(analysis)
    }
}

fn strip_code_fence(completion: &str) -> &str {
    let trimmed = completion.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}
