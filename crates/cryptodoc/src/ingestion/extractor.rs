//! Plain-text extraction from uploaded documents

use crate::error::{Error, Result};

/// Turns raw document bytes into plain text
///
/// Extraction is CPU-bound and synchronous; async callers run it on a
/// blocking thread.
pub trait TextExtractor: Send + Sync {
    /// Extract the text of `data`, using `filename` to pick the format
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String>;
}

/// Extractor for PDFs and UTF-8 text formats
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentTextExtractor;

impl DocumentTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Whether `filename` has an extension this extractor understands
    pub fn supports(filename: &str) -> bool {
        matches!(
            extension(filename).as_str(),
            "pdf" | "txt" | "text" | "md" | "markdown" | "csv" | "json" | "log"
        )
    }

    fn extract_pdf(data: &[u8]) -> Result<String> {
        let raw = match pdf_extract::extract_text_from_mem(data) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("pdf-extract returned no text, trying fallback");
                Self::extract_pdf_fallback(data)?
            }
            Err(e) => {
                tracing::warn!("pdf-extract failed: {}, trying fallback", e);
                Self::extract_pdf_fallback(data)?
            }
        };

        let content = cleanup_pdf_text(&raw)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if content.is_empty() {
            return Err(Error::extraction(
                "No text content could be extracted from PDF",
            ));
        }
        Ok(content)
    }

    /// Fallback PDF text extraction using lopdf directly
    fn extract_pdf_fallback(data: &[u8]) -> Result<String> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(format!("Failed to load PDF: {}", e)))?;

        let mut all_text = String::new();
        for (page_num, page_id) in doc.get_pages() {
            match doc.get_page_content(page_id) {
                Ok(content) => {
                    let text = extract_text_from_content(&content);
                    if !text.trim().is_empty() {
                        all_text.push_str(&text);
                        all_text.push('\n');
                    }
                }
                Err(e) => {
                    tracing::debug!("Could not get content for page {}: {}", page_num, e);
                }
            }
        }

        if all_text.trim().is_empty() {
            return Err(Error::extraction(
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        Ok(all_text)
    }
}

impl TextExtractor for DocumentTextExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
        let ext = extension(filename);
        let text = match ext.as_str() {
            "pdf" => Self::extract_pdf(data)?,
            "txt" | "text" | "md" | "markdown" | "csv" | "json" | "log" => {
                String::from_utf8_lossy(data).replace('\0', "")
            }
            _ => {
                return Err(Error::extraction(format!(
                    "Unsupported file type: {}",
                    if ext.is_empty() { "(none)" } else { ext.as_str() }
                )))
            }
        };

        if text.trim().is_empty() {
            return Err(Error::extraction(format!("{} contains no text", filename)));
        }
        Ok(text)
    }
}

fn extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

/// Normalize typographic characters and ligatures common in PDF text
fn cleanup_pdf_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\0' => {}
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{2014}' | '\u{2015}' => out.push_str("--"),
            '\u{2018}' | '\u{2019}' | '\u{201A}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => out.push('"'),
            '\u{2022}' => out.push_str("* "),
            '\u{2026}' => out.push_str("..."),
            '\u{00A0}' | '\u{2002}' | '\u{2003}' | '\u{2009}' => out.push(' '),
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            _ => out.push(c),
        }
    }
    out
}

/// Extract text shown between BT/ET operators of a PDF content stream
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current = String::new();

    for line in content_str.lines() {
        let line = line.trim();

        if line == "BT" {
            in_text_block = true;
            continue;
        }

        if line == "ET" {
            in_text_block = false;
            if !current.is_empty() {
                text.push_str(&current);
                text.push(' ');
                current.clear();
            }
            continue;
        }

        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                if start < end {
                    let decoded = line[start + 1..end]
                        .replace("\\n", "\n")
                        .replace("\\r", "\r")
                        .replace("\\t", "\t")
                        .replace("\\(", "(")
                        .replace("\\)", ")")
                        .replace("\\\\", "\\");
                    current.push_str(&decoded);
                }
            }
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_text() {
        let text = DocumentTextExtractor
            .extract("notes.TXT", b"Meeting notes\nAction items")
            .unwrap();
        assert_eq!(text, "Meeting notes\nAction items");
    }

    #[test]
    fn test_extract_lossy_utf8() {
        let text = DocumentTextExtractor
            .extract("data.csv", b"name,amount\n\xffbad,1")
            .unwrap();
        assert!(text.starts_with("name,amount"));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_whitespace_only_is_error() {
        let result = DocumentTextExtractor.extract("empty.md", b"  \n\t ");
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = DocumentTextExtractor.extract("photo.png", b"\x89PNG");
        assert!(matches!(result, Err(Error::Extraction(_))));
        assert!(!DocumentTextExtractor::supports("photo.png"));
        assert!(DocumentTextExtractor::supports("contract.PDF"));
    }

    #[test]
    fn test_invalid_pdf_is_error() {
        let result = DocumentTextExtractor.extract("broken.pdf", b"not a pdf at all");
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    #[test]
    fn test_content_stream_text() {
        let stream = b"BT\n/F1 12 Tf\n(Hello \\(world\\)) Tj\nET\nBT\n(Second) Tj\nET";
        assert_eq!(extract_text_from_content(stream), "Hello (world) Second ");
    }

    #[test]
    fn test_cleanup_ligatures_and_quotes() {
        let cleaned = cleanup_pdf_text("\u{FB01}nal \u{201C}of\u{FB03}ce\u{201D}\u{00A0}\u{2013} ok\0");
        assert_eq!(cleaned, "final \"office\" - ok");
    }
}
