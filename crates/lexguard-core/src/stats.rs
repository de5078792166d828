//! Derived risk statistics.
//!
//! Pure functions over the annotation list and document text. Empty inputs
//! are valid and produce zero results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::patterns::count_words;
use crate::risk::{RiskyWord, Severity};

/// Annotation counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityDistribution {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    /// Severities outside the known four
    pub other: usize,
}

impl SeverityDistribution {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.other
    }

    /// Known severities, most severe first.
    pub fn known(&self) -> [(Severity, usize); 4] {
        [
            (Severity::Critical, self.critical),
            (Severity::High, self.high),
            (Severity::Medium, self.medium),
            (Severity::Low, self.low),
        ]
    }
}

/// Summary statistics for one annotated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskStatistics {
    pub total_words: usize,
    pub risky_words: usize,
    /// Risky words per document word; 0 when the document has no words
    pub density: f64,
    pub severity: SeverityDistribution,
    pub categories: BTreeMap<String, usize>,
}

impl RiskStatistics {
    pub fn compute(text: &str, words: &[RiskyWord]) -> Self {
        Self {
            total_words: count_words(text),
            risky_words: words.len(),
            density: risk_density(text, words),
            severity: severity_distribution(words),
            categories: category_distribution(words),
        }
    }

    pub fn density_percent(&self) -> f64 {
        self.density * 100.0
    }
}

/// `count(words) / count(whitespace-delimited words in text)`.
pub fn risk_density(text: &str, words: &[RiskyWord]) -> f64 {
    match count_words(text) {
        0 => 0.0,
        total => words.len() as f64 / total as f64,
    }
}

pub fn severity_distribution(words: &[RiskyWord]) -> SeverityDistribution {
    words
        .iter()
        .fold(SeverityDistribution::default(), |mut dist, word| {
            match word.severity {
                Severity::Critical => dist.critical += 1,
                Severity::High => dist.high += 1,
                Severity::Medium => dist.medium += 1,
                Severity::Low => dist.low += 1,
                Severity::Other(_) => dist.other += 1,
            }
            dist
        })
}

pub fn category_distribution(words: &[RiskyWord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for word in words {
        *counts.entry(word.category.clone()).or_insert(0) += 1;
    }
    counts
}
