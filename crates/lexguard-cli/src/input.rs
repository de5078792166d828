//! Loading annotated documents from disk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use lexguard_core::{classify_fetch_response, AnalysisPayload, AnnotatedDocument};
use serde_json::Value as JsonValue;

/// Load a document from `path`, optionally taking its text from `text_path`.
pub fn load(path: &Path, text_path: Option<&Path>) -> Result<AnnotatedDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: JsonValue = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;

    let text = match text_path {
        Some(p) => Some(
            std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read {}", p.display()))?,
        ),
        None => None,
    };

    from_value(value, text)
}

/// Accepts, in order: `{"text", "words"}`, a backend response wrapping a
/// risk payload, or the payload itself.
pub fn from_value(value: JsonValue, text: Option<String>) -> Result<AnnotatedDocument> {
    if value.get("text").is_some() && value.get("words").is_some() {
        let document: AnnotatedDocument =
            serde_json::from_value(value).context("Invalid annotated document")?;
        return Ok(match text {
            Some(text) => AnnotatedDocument::new(text, document.words().to_vec()),
            None => document,
        });
    }

    let payload = classify_fetch_response(&value)
        .outcome
        .payload()
        .cloned()
        .unwrap_or_else(|| AnalysisPayload::new(value));

    let words = payload
        .risky_words()
        .context("Invalid risky_words in analysis")?;

    let text = match (text, payload.document_text()) {
        (Some(text), _) => text,
        (None, Some(text)) => text.to_string(),
        (None, None) => bail!("Analysis has no document text; pass it with --text"),
    };

    Ok(AnnotatedDocument::new(text, words))
}
