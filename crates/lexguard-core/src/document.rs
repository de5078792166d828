//! Annotated documents: inspection and replace-and-recompute.
//!
//! An [`AnnotatedDocument`] pairs document text with the annotations
//! produced against it. It is never mutated; applying a replacement yields a
//! new document whose later annotations are re-based onto the new text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::highlight::{Highlighter, Highlighting};
use crate::outcome::AnalysisPayload;
use crate::patterns::humanize_category;
use crate::risk::{RiskyWord, SeverityTier, WordContext};
use crate::stats::RiskStatistics;

/// Errors from applying a replacement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("No annotation with id '{0}'")]
    UnknownAnnotation(String),

    #[error("Annotation '{id}' no longer matches the text at position {position}")]
    StaleAnnotation { id: String, position: usize },

    #[error("Annotation '{id}' has no alternative #{index} ({available} available)")]
    UnknownAlternative {
        id: String,
        index: usize,
        available: usize,
    },
}

/// Everything the inspection view shows for one annotation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection<'a> {
    pub annotation: &'a RiskyWord,
    pub tier: SeverityTier,
    pub category_label: String,
    pub context: Option<&'a WordContext>,
    pub alternatives: &'a [String],
}

impl<'a> Inspection<'a> {
    fn new(annotation: &'a RiskyWord) -> Self {
        Self {
            annotation,
            tier: annotation.severity.tier(),
            category_label: humanize_category(&annotation.category),
            context: annotation.context.as_ref(),
            alternatives: &annotation.alternatives,
        }
    }

    pub fn recommendation(&self) -> String {
        let impact = self
            .annotation
            .impact
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "contractual".to_string());
        format!(
            "Consider replacing \"{}\" with one of the suggested alternatives to reduce {} risk and improve contract terms.",
            self.annotation.word, impact
        )
    }
}

/// Document text plus the risk annotations computed against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotatedDocument {
    text: String,
    words: Vec<RiskyWord>,
}

impl AnnotatedDocument {
    pub fn new(text: impl Into<String>, words: Vec<RiskyWord>) -> Self {
        Self {
            text: text.into(),
            words,
        }
    }

    /// Build from a risk analysis payload that echoes the document text.
    pub fn from_payload(payload: &AnalysisPayload) -> Result<Option<Self>, serde_json::Error> {
        let Some(text) = payload.document_text() else {
            return Ok(None);
        };
        Ok(Some(Self::new(text, payload.risky_words()?)))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn words(&self) -> &[RiskyWord] {
        &self.words
    }

    pub fn annotation(&self, id: &str) -> Option<&RiskyWord> {
        self.words.iter().find(|w| w.id == id)
    }

    pub fn highlight(&self) -> Highlighting<'_> {
        Highlighter::new().highlight(&self.text, &self.words)
    }

    pub fn statistics(&self) -> RiskStatistics {
        RiskStatistics::compute(&self.text, &self.words)
    }

    /// Resolve a clicked annotation id to its inspection view.
    pub fn inspect(&self, id: &str) -> Option<Inspection<'_>> {
        self.annotation(id).map(Inspection::new)
    }

    /// Replace an annotation's word with one of its suggested alternatives.
    pub fn apply_alternative(&self, id: &str, index: usize) -> Result<Self, ReplaceError> {
        let annotation = self
            .annotation(id)
            .ok_or_else(|| ReplaceError::UnknownAnnotation(id.to_string()))?;

        let alternative =
            annotation
                .alternatives
                .get(index)
                .ok_or_else(|| ReplaceError::UnknownAlternative {
                    id: id.to_string(),
                    index,
                    available: annotation.alternatives.len(),
                })?;

        self.replace_word(id, alternative)
    }

    /// Splice `replacement` over an annotation's span and drop that annotation.
    ///
    /// Every remaining annotation starting at or after the end of the
    /// replaced span is shifted by the change in length, so the next
    /// highlight pass still lines up with the new text.
    pub fn replace_word(&self, id: &str, replacement: &str) -> Result<Self, ReplaceError> {
        let target = self
            .annotation(id)
            .ok_or_else(|| ReplaceError::UnknownAnnotation(id.to_string()))?;

        let (start, end) =
            byte_span(&self.text, target).ok_or_else(|| ReplaceError::StaleAnnotation {
                id: id.to_string(),
                position: target.position,
            })?;

        let mut text = String::with_capacity(self.text.len() + replacement.len());
        text.push_str(&self.text[..start]);
        text.push_str(replacement);
        text.push_str(&self.text[end..]);

        let old_end = target.end();
        let delta = replacement.chars().count() as isize - target.char_len() as isize;

        let words: Vec<RiskyWord> = self
            .words
            .iter()
            .filter(|w| w.id != id)
            .map(|w| {
                let mut w = w.clone();
                if w.position >= old_end {
                    w.position = w.position.saturating_add_signed(delta);
                }
                w
            })
            .collect();

        tracing::info!(
            annotation = %id,
            position = target.position,
            delta,
            remaining = words.len(),
            "Applied replacement"
        );

        Ok(Self { text, words })
    }
}

/// Byte span of an annotation, if it still matches the text.
fn byte_span(text: &str, word: &RiskyWord) -> Option<(usize, usize)> {
    if word.word.is_empty() {
        return None;
    }
    let mut indices = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .skip(word.position);
    let start = indices.next()?;
    let end = indices.nth(word.char_len() - 1)?;
    (text.get(start..end)? == word.word).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "The party shall indemnify and waive all claims.";

    fn document() -> AnnotatedDocument {
        AnnotatedDocument::new(
            TEXT,
            vec![
                RiskyWord::new("a", "indemnify", 16, "high")
                    .with_category("liability")
                    .with_impact("Financial")
                    .with_alternatives(["compensate", "reimburse"]),
                RiskyWord::new("b", "waive", 30, "medium")
                    .with_category("intellectual-property")
                    .with_alternatives(["reserve"]),
            ],
        )
    }

    #[test]
    fn test_replacement_shifts_later_annotations() {
        let doc = document();
        let updated = doc.apply_alternative("a", 0).unwrap();

        assert_eq!(updated.text(), "The party shall compensate and waive all claims.");
        assert_eq!(updated.words().len(), 1);
        assert_eq!(updated.words()[0].position, 31);

        let highlighting = updated.highlight();
        assert!(highlighting.excluded.is_empty());
        let spans: Vec<&str> = highlighting.highlighted().map(|s| s.text).collect();
        assert_eq!(spans, vec!["waive"]);
    }

    #[test]
    fn test_original_document_is_untouched() {
        let doc = document();
        let _ = doc.replace_word("a", "pay").unwrap();
        assert_eq!(doc.text(), TEXT);
        assert_eq!(doc.words().len(), 2);
    }

    #[test]
    fn test_shorter_replacement_shifts_left() {
        let updated = document().replace_word("a", "pay").unwrap();
        assert_eq!(updated.words()[0].position, 24);
        assert_eq!(updated.highlight().highlighted().count(), 1);
    }

    #[test]
    fn test_earlier_annotations_keep_their_offsets() {
        let updated = document().replace_word("b", "reserve").unwrap();
        assert_eq!(updated.words()[0].position, 16);
        assert_eq!(updated.text(), "The party shall indemnify and reserve all claims.");
        assert_eq!(updated.highlight().highlighted().count(), 1);
    }

    #[test]
    fn test_chained_replacements_stay_aligned() {
        let updated = document()
            .apply_alternative("b", 0)
            .and_then(|d| d.apply_alternative("a", 1))
            .unwrap();
        assert_eq!(updated.text(), "The party shall reimburse and reserve all claims.");
        assert!(updated.words().is_empty());
    }

    #[test]
    fn test_unknown_annotation() {
        assert_eq!(
            document().replace_word("zzz", "x"),
            Err(ReplaceError::UnknownAnnotation("zzz".to_string()))
        );
    }

    #[test]
    fn test_unknown_alternative() {
        let err = document().apply_alternative("b", 3).unwrap_err();
        assert_eq!(
            err,
            ReplaceError::UnknownAlternative {
                id: "b".to_string(),
                index: 3,
                available: 1
            }
        );
    }

    #[test]
    fn test_stale_annotation_is_not_spliced() {
        let doc = AnnotatedDocument::new(TEXT, vec![RiskyWord::new("a", "indemnify", 15, "high")]);
        assert!(matches!(
            doc.replace_word("a", "pay"),
            Err(ReplaceError::StaleAnnotation { position: 15, .. })
        ));
    }

    #[test]
    fn test_inspection() {
        let doc = document();
        let inspection = doc.inspect("b").unwrap();
        assert_eq!(inspection.tier, SeverityTier::Elevated);
        assert_eq!(inspection.category_label, "intellectual property");
        assert_eq!(inspection.alternatives, &["reserve".to_string()]);

        let recommendation = doc.inspect("a").unwrap().recommendation();
        assert!(recommendation.contains("\"indemnify\""));
        assert!(recommendation.contains("financial risk"));
        assert!(doc.inspect("missing").is_none());
    }

    #[test]
    fn test_from_payload() {
        let payload = AnalysisPayload::new(serde_json::json!({
            "extracted_text": TEXT,
            "risky_words": [
                {"id": "a", "word": "indemnify", "position": 16, "severity": "high"}
            ]
        }));
        let doc = AnnotatedDocument::from_payload(&payload).unwrap().unwrap();
        assert_eq!(doc.statistics().risky_words, 1);

        let without_text = AnalysisPayload::new(serde_json::json!({"summary": "x"}));
        assert!(AnnotatedDocument::from_payload(&without_text).unwrap().is_none());
    }

    #[test]
    fn test_byte_span_multibyte() {
        let word = RiskyWord::new("a", "à", 3, "low");
        assert_eq!(byte_span("ça à b", &word), Some((4, 6)));
    }
}
