//! Prompt templates for document analysis and chat

/// Builds prompts for the generative-text provider
pub struct PromptBuilder;

impl PromptBuilder {
    /// System message for structured analysis requests
    pub const ANALYSIS_SYSTEM: &'static str =
        "You are an expert document analyst. You answer with a single JSON object and nothing else.";

    /// Build the structured-analysis prompt
    ///
    /// The model is asked for a JSON object matching `DocumentAnalysis`.
    pub fn build_analysis_prompt(document: &str) -> String {
        format!(
            r#"Analyze the following document and provide a structured analysis.

DOCUMENT:
{document}

Respond in JSON with exactly this structure:
{{
  "category": "Main category of the document (e.g. Legal, Financial, Academic, Medical, Technical, Administrative, Identity, Contract)",
  "summary": "Detailed summary of the document (at most 500 characters)",
  "validity": "Expiry date in YYYY-MM-DD format. If it is an agreement with a duration (e.g. '5 years'), COMPUTE the end date by adding the duration to the document's start date. If no start date is found, use today's date as the base. If it never expires, use 'Indefinite'. If it does not apply, use 'N/A'.",
  "key_points": "3-5 key points of the document separated by semicolons",
  "document_type": "Specific document type (e.g. Invoice, Employment Contract, Medical Certificate)"
}}

IMPORTANT: Reply with the JSON only, with no text before or after it."#,
            document = document
        )
    }

    /// Build a plain summary prompt, used when structured analysis fails
    pub fn build_summary_prompt(document: &str) -> String {
        format!(
            r#"Analyze the following document and write a detailed summary.
The summary should be informative and highlight the key points, important dates and any other relevant information.
At most 500 characters.

DOCUMENT:
{document}

SUMMARY:"#,
            document = document
        )
    }

    /// Build the prompt for answering a question about one document
    pub fn build_chat_prompt(document: &str, question: &str) -> String {
        format!(
            r#"You are DocuAgent, an AI assistant specialized in document analysis.

DOCUMENT CONTEXT:
{document}

USER QUESTION: {question}

Give a helpful and accurate answer based on the content of the document. If the answer cannot be found in the document, say so clearly. Answer concisely and professionally.

ANSWER:"#,
            document = document,
            question = question
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_embeds_document_and_schema() {
        let prompt = PromptBuilder::build_analysis_prompt("LEASE AGREEMENT between A and B");
        assert!(prompt.contains("LEASE AGREEMENT between A and B"));
        assert!(prompt.contains("\"key_points\""));
        assert!(prompt.contains("\"document_type\""));
    }

    #[test]
    fn test_chat_prompt_embeds_question() {
        let prompt = PromptBuilder::build_chat_prompt("Invoice 42", "What is the total?");
        assert!(prompt.contains("Invoice 42"));
        assert!(prompt.contains("USER QUESTION: What is the total?"));
    }
}
