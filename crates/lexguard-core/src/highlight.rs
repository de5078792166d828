//! Risk highlighting: split document text into plain and highlighted segments.
//!
//! # Algorithm
//!
//! 1. Order annotations by position, highest first. Work done at a position
//!    never disturbs the text before it, so every annotation is checked
//!    against text that is still in its original form up to its own offset.
//! 2. Verify each annotation against the text. Annotations whose offset no
//!    longer points at their word, that fall off the end of the text, or that
//!    run into an already accepted span are excluded and reported.
//! 3. Walk the accepted annotations in ascending order, interleaving plain
//!    gaps with highlighted spans.
//!
//! The result is always a lossless partition: concatenating every segment's
//! text reproduces the input exactly.

use serde::Serialize;
use std::cmp::Reverse;
use std::iter;

use crate::risk::{RiskyWord, SeverityTier};

/// A run of document text, optionally tied to the annotation that flagged it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub annotation: Option<&'a RiskyWord>,
}

impl<'a> Segment<'a> {
    pub fn plain(text: &'a str) -> Self {
        Self {
            text,
            annotation: None,
        }
    }

    pub fn highlighted(text: &'a str, annotation: &'a RiskyWord) -> Self {
        Self {
            text,
            annotation: Some(annotation),
        }
    }

    pub fn is_highlighted(&self) -> bool {
        self.annotation.is_some()
    }

    /// Id the click handler resolves back to the full annotation.
    pub fn annotation_id(&self) -> Option<&'a str> {
        self.annotation.map(|a| a.id.as_str())
    }

    pub fn tier(&self) -> Option<SeverityTier> {
        self.annotation.map(|a| a.severity.tier())
    }
}

/// Why an annotation was left out of the highlight set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The text at the annotation's offset is not its word
    Stale { expected: String, found: String },

    /// The span runs past the end of the text
    OutOfBounds { end: usize, text_len: usize },

    /// The span runs into a span accepted earlier
    Overlap { conflicts_with: String },

    /// The annotation has no word to highlight
    EmptyWord,
}

/// Diagnostic record for an excluded annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub id: String,
    pub position: usize,
    pub reason: ExclusionReason,
}

/// Output of one highlight pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Highlighting<'a> {
    /// Ordered, non-overlapping partition of the text
    pub segments: Vec<Segment<'a>>,

    /// Annotations that could not be placed
    pub excluded: Vec<Exclusion>,
}

impl<'a> Highlighting<'a> {
    /// Highlighted segments in document order.
    pub fn highlighted(&self) -> impl Iterator<Item = &Segment<'a>> {
        self.segments.iter().filter(|s| s.is_highlighted())
    }

    /// Concatenated segment text. Always equals the input text.
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text).collect()
    }

    /// Resolve a clicked annotation id to its annotation.
    pub fn annotation(&self, id: &str) -> Option<&'a RiskyWord> {
        self.segments
            .iter()
            .filter_map(|s| s.annotation)
            .find(|a| a.id == id)
    }

    pub fn has_stale(&self) -> bool {
        self.excluded
            .iter()
            .any(|e| matches!(e.reason, ExclusionReason::Stale { .. }))
    }
}

/// The highlight engine. Stateless, synchronous, and side-effect free.
pub struct Highlighter;

impl Highlighter {
    pub fn new() -> Self {
        Self
    }

    /// Segment `text` using `words`.
    pub fn highlight<'a>(&self, text: &'a str, words: &'a [RiskyWord]) -> Highlighting<'a> {
        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut ordered: Vec<&RiskyWord> = words.iter().collect();
        ordered.sort_by(|a, b| {
            (Reverse(a.position), a.id.as_str()).cmp(&(Reverse(b.position), b.id.as_str()))
        });

        let mut accepted: Vec<(&'a RiskyWord, usize, usize)> = Vec::new();
        let mut excluded = Vec::new();
        // Char offset where the lowest accepted span starts.
        let mut floor = char_len;

        for word in ordered {
            let reason = match Self::check(text, &boundaries, word, floor, &accepted) {
                Ok((start, end)) => {
                    accepted.push((word, start, end));
                    floor = word.position;
                    continue;
                }
                Err(reason) => reason,
            };

            tracing::debug!(
                annotation = %word.id,
                position = word.position,
                reason = ?reason,
                "Excluding annotation from highlight pass"
            );
            excluded.push(Exclusion {
                id: word.id.clone(),
                position: word.position,
                reason,
            });
        }

        let mut segments = Vec::with_capacity(accepted.len() * 2 + 1);
        let mut cursor = 0;
        for (word, start, end) in accepted.into_iter().rev() {
            if start > cursor {
                segments.push(Segment::plain(&text[cursor..start]));
            }
            segments.push(Segment::highlighted(&text[start..end], word));
            cursor = end;
        }
        if cursor < text.len() {
            segments.push(Segment::plain(&text[cursor..]));
        }

        Highlighting { segments, excluded }
    }

    /// Validate one annotation, returning its byte span.
    fn check(
        text: &str,
        boundaries: &[usize],
        word: &RiskyWord,
        floor: usize,
        accepted: &[(&RiskyWord, usize, usize)],
    ) -> Result<(usize, usize), ExclusionReason> {
        if word.word.is_empty() {
            return Err(ExclusionReason::EmptyWord);
        }

        let char_len = boundaries.len() - 1;
        let end = word.end();
        if end > char_len {
            return Err(ExclusionReason::OutOfBounds {
                end,
                text_len: char_len,
            });
        }

        let (start_byte, end_byte) = (boundaries[word.position], boundaries[end]);
        let found = &text[start_byte..end_byte];
        if found != word.word {
            return Err(ExclusionReason::Stale {
                expected: word.word.clone(),
                found: found.to_string(),
            });
        }

        if end > floor {
            let conflicts_with = accepted
                .last()
                .map(|(w, _, _)| w.id.clone())
                .unwrap_or_default();
            return Err(ExclusionReason::Overlap { conflicts_with });
        }

        Ok((start_byte, end_byte))
    }
}

impl Default for Highlighter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TEXT: &str = "The party shall indemnify and waive all claims.";

    fn scenario_words() -> Vec<RiskyWord> {
        vec![
            RiskyWord::new("a", "indemnify", 16, "high"),
            RiskyWord::new("b", "waive", 30, "medium"),
        ]
    }

    #[test]
    fn test_two_annotations_yield_five_segments() {
        let words = scenario_words();
        let result = Highlighter::new().highlight(TEXT, &words);

        let texts: Vec<&str> = result.segments.iter().map(|s| s.text).collect();
        assert_eq!(
            texts,
            vec!["The party shall ", "indemnify", " and ", "waive", " all claims."]
        );
        assert_eq!(result.segments[1].tier(), Some(SeverityTier::Severe));
        assert_eq!(result.segments[3].tier(), Some(SeverityTier::Elevated));
        assert!(result.excluded.is_empty());
        assert_eq!(result.text(), TEXT);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let mut words = scenario_words();
        let forward = Highlighter::new().highlight(TEXT, &words).segments.len();
        words.reverse();
        let reversed = Highlighter::new().highlight(TEXT, &words);
        assert_eq!(reversed.segments.len(), forward);
        assert_eq!(reversed.segments[1].annotation_id(), Some("a"));
    }

    #[test]
    fn test_no_annotations_is_single_plain_segment() {
        let result = Highlighter::new().highlight(TEXT, &[]);
        assert_eq!(result.segments, vec![Segment::plain(TEXT)]);
    }

    #[test]
    fn test_empty_text() {
        let words = vec![RiskyWord::new("a", "x", 0, "low")];
        let result = Highlighter::new().highlight("", &words);
        assert!(result.segments.is_empty());
        assert!(matches!(
            result.excluded[0].reason,
            ExclusionReason::OutOfBounds { .. }
        ));
    }

    #[test]
    fn test_stale_annotation_is_excluded() {
        let words = vec![
            RiskyWord::new("a", "indemnify", 16, "high"),
            RiskyWord::new("b", "waive", 29, "medium"),
        ];
        let result = Highlighter::new().highlight(TEXT, &words);

        assert_eq!(result.highlighted().count(), 1);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].id, "b");
        assert_eq!(
            result.excluded[0].reason,
            ExclusionReason::Stale {
                expected: "waive".to_string(),
                found: " waiv".to_string(),
            }
        );
        assert!(result.has_stale());
        assert_eq!(result.text(), TEXT);
    }

    #[test]
    fn test_overlap_keeps_later_span() {
        let text = "limitation of liability";
        let words = vec![
            RiskyWord::new("outer", "limitation of liability", 0, "critical"),
            RiskyWord::new("inner", "liability", 14, "low"),
        ];
        let result = Highlighter::new().highlight(text, &words);

        assert_eq!(result.highlighted().count(), 1);
        assert_eq!(result.annotation("inner").map(|a| a.id.as_str()), Some("inner"));
        assert_eq!(
            result.excluded[0].reason,
            ExclusionReason::Overlap {
                conflicts_with: "inner".to_string()
            }
        );
        assert_eq!(result.text(), text);
    }

    #[test]
    fn test_adjacent_spans_are_not_overlap() {
        let text = "nonrefundable";
        let words = vec![
            RiskyWord::new("a", "non", 0, "low"),
            RiskyWord::new("b", "refundable", 3, "low"),
        ];
        let result = Highlighter::new().highlight(text, &words);
        assert_eq!(result.segments.len(), 2);
        assert!(result.excluded.is_empty());
    }

    #[test]
    fn test_multibyte_text_uses_char_offsets() {
        let text = "Le bailleur «renonce» à tout recours.";
        let words = vec![RiskyWord::new("a", "renonce", 13, "high")];
        let result = Highlighter::new().highlight(text, &words);

        assert_eq!(result.highlighted().next().map(|s| s.text), Some("renonce"));
        assert_eq!(result.text(), text);
    }

    #[test]
    fn test_empty_word_is_excluded() {
        let words = vec![RiskyWord::new("a", "", 3, "low")];
        let result = Highlighter::new().highlight(TEXT, &words);
        assert_eq!(result.excluded[0].reason, ExclusionReason::EmptyWord);
    }

    fn arb_words(text_len: usize) -> impl Strategy<Value = Vec<RiskyWord>> {
        prop::collection::vec(
            (0..text_len + 3, "[a-z ]{0,5}", 0usize..5),
            0..8,
        )
        .prop_map(|items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (pos, word, sev))| {
                    let severity = ["low", "medium", "high", "critical", "odd"][sev];
                    RiskyWord::new(format!("w{}", i), word, pos, severity)
                })
                .collect()
        })
    }

    fn arb_input() -> impl Strategy<Value = (String, Vec<RiskyWord>)> {
        "[a-zé ]{0,40}".prop_flat_map(|text| {
            let len = text.chars().count();
            (Just(text), arb_words(len))
        })
    }

    /// Annotations taken from real substrings of the text, so most are valid.
    fn arb_anchored_input() -> impl Strategy<Value = (String, Vec<RiskyWord>)> {
        "[a-z ]{1,40}".prop_flat_map(|text| {
            let len = text.chars().count();
            let spans = prop::collection::vec((0..len, 1usize..6), 0..6);
            (Just(text), spans).prop_map(|(text, spans)| {
                let chars: Vec<char> = text.chars().collect();
                let words = spans
                    .into_iter()
                    .enumerate()
                    .map(|(i, (start, len))| {
                        let end = (start + len).min(chars.len());
                        let word: String = chars[start..end].iter().collect();
                        RiskyWord::new(format!("w{}", i), word, start, "high")
                    })
                    .collect();
                (text, words)
            })
        })
    }

    proptest! {
        #[test]
        fn prop_partition_is_lossless((text, words) in arb_input()) {
            let result = Highlighter::new().highlight(&text, &words);
            prop_assert_eq!(result.text(), text.as_str());
        }

        #[test]
        fn prop_highlight_is_idempotent((text, words) in arb_input()) {
            let engine = Highlighter::new();
            prop_assert_eq!(engine.highlight(&text, &words), engine.highlight(&text, &words));
        }

        #[test]
        fn prop_every_annotation_is_placed_or_reported((text, words) in arb_anchored_input()) {
            let result = Highlighter::new().highlight(&text, &words);
            prop_assert_eq!(result.highlighted().count() + result.excluded.len(), words.len());
            prop_assert_eq!(result.text(), text.as_str());
            for segment in result.highlighted() {
                let annotation = segment.annotation.unwrap();
                prop_assert_eq!(segment.text, annotation.word.as_str());
            }
        }
    }
}
