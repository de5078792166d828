//! Risk annotations produced by the analysis backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity assigned to a risky word.
///
/// Severities outside the known four are kept verbatim as `Other` so that a
/// backend introducing a new level never breaks deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    Other(String),
}

impl Severity {
    pub fn as_str(&self) -> &str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Other(s) => s.as_str(),
        }
    }

    /// Presentation tier for this severity. Total over every input.
    pub fn tier(&self) -> SeverityTier {
        match self {
            Severity::Critical | Severity::High => SeverityTier::Severe,
            Severity::Medium => SeverityTier::Elevated,
            Severity::Low => SeverityTier::Minor,
            Severity::Other(_) => SeverityTier::Neutral,
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Other(value),
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        Severity::from(value.to_string())
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        match value {
            Severity::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Visual tier a highlighted span is rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    /// Critical and high risk
    Severe,
    /// Medium risk
    Elevated,
    /// Low risk
    Minor,
    /// Unrecognised severity
    Neutral,
}

impl SeverityTier {
    pub const ALL: [SeverityTier; 4] = [
        SeverityTier::Severe,
        SeverityTier::Elevated,
        SeverityTier::Minor,
        SeverityTier::Neutral,
    ];

    /// Legend text shown next to the tier swatch.
    pub fn legend_label(&self) -> &'static str {
        match self {
            SeverityTier::Severe => "Critical/High Risk",
            SeverityTier::Elevated => "Medium Risk",
            SeverityTier::Minor => "Low Risk",
            SeverityTier::Neutral => "Unrated",
        }
    }
}

/// Surrounding text captured by the backend when it flagged a word.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WordContext {
    #[serde(default)]
    pub before: String,

    #[serde(default)]
    pub word: String,

    #[serde(default)]
    pub after: String,

    #[serde(default, alias = "fullContext", skip_serializing_if = "Option::is_none")]
    pub full_context: Option<String>,
}

/// A risky word flagged in the original document text.
///
/// `position` and the length of `word` are counted in chars. The annotation
/// is only guaranteed to match the text it was produced against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskyWord {
    pub id: String,

    pub word: String,

    pub position: usize,

    pub severity: Severity,

    #[serde(default)]
    pub category: String,

    /// Suggested replacements, best first
    #[serde(default)]
    pub alternatives: Vec<String>,

    /// Impact area such as "Financial" or "Legal"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<WordContext>,
}

impl RiskyWord {
    pub fn new(
        id: impl Into<String>,
        word: impl Into<String>,
        position: usize,
        severity: impl Into<Severity>,
    ) -> Self {
        Self {
            id: id.into(),
            word: word.into(),
            position,
            severity: severity.into(),
            category: String::new(),
            alternatives: Vec::new(),
            impact: None,
            context: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_alternatives<I, S>(mut self, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alternatives = alternatives.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self
    }

    pub fn with_context(mut self, context: WordContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Length of the flagged word in chars.
    pub fn char_len(&self) -> usize {
        self.word.chars().count()
    }

    /// Char offset one past the end of the flagged word.
    pub fn end(&self) -> usize {
        self.position.saturating_add(self.char_len())
    }
}
