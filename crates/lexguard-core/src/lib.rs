//! # lexguard-core
//!
//! Deterministic risk highlighting for legal documents, plus the shared
//! vocabulary for per-agent document analysis.
//!
//! This crate answers, without ever touching the network:
//! - What state is an analysis response really in?
//! - Which spans of a document are risky, and how severe are they?
//! - What does the document look like after accepting a suggestion?
//!
//! ## Key Guarantees
//!
//! 1. **Lossless**: highlight segments always concatenate back to the input text
//! 2. **Deterministic**: same text and annotations always give the same segments
//! 3. **Defensive**: stale or overlapping annotations are reported, never spliced
//! 4. **Immutable**: replacements produce a new document with re-based offsets
//!
//! ## Example
//!
//! ```rust
//! use lexguard_core::{AnnotatedDocument, RiskyWord};
//!
//! let doc = AnnotatedDocument::new(
//!     "The party shall indemnify and waive all claims.",
//!     vec![
//!         RiskyWord::new("a", "indemnify", 16, "high").with_alternatives(["compensate"]),
//!         RiskyWord::new("b", "waive", 30, "medium"),
//!     ],
//! );
//!
//! assert_eq!(doc.highlight().segments.len(), 5);
//!
//! let updated = doc.apply_alternative("a", 0).unwrap();
//! assert_eq!(updated.words()[0].position, 31);
//! ```

pub mod document;
pub mod highlight;
pub mod outcome;
pub mod patterns;
pub mod risk;
pub mod stats;
pub mod types;

// Re-export main types at crate root
pub use document::{AnnotatedDocument, Inspection, ReplaceError};
pub use highlight::{Exclusion, ExclusionReason, Highlighter, Highlighting, Segment};
pub use outcome::{
    classify_fetch_response, classify_process_response, AnalysisMeta, AnalysisOutcome,
    AnalysisPayload, Classified,
};
pub use risk::{RiskyWord, Severity, SeverityTier, WordContext};
pub use stats::{RiskStatistics, SeverityDistribution};
pub use types::{AgentType, AnalysisKey, DocumentId, UnknownAgent};

/// Segment `text` with the given annotations.
///
/// Shorthand for [`Highlighter::highlight`].
pub fn highlight<'a>(text: &'a str, words: &'a [RiskyWord]) -> Highlighting<'a> {
    Highlighter::new().highlight(text, words)
}
