//! Shared text patterns.
//!
//! Word counting and category labels are used by both the statistics and
//! the inspection view, so the patterns live in one place.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// A whitespace-delimited word
    pub static ref WORD_PATTERN: Regex = Regex::new(r"\S+").unwrap();

    /// Separators used in backend category slugs ("intellectual-property")
    pub static ref CATEGORY_SEPARATOR: Regex = Regex::new(r"[-_]+").unwrap();
}

/// Count whitespace-delimited words.
pub fn count_words(text: &str) -> usize {
    WORD_PATTERN.find_iter(text).count()
}

/// Turn a category slug into a display label.
pub fn humanize_category(category: &str) -> String {
    CATEGORY_SEPARATOR
        .replace_all(category.trim(), " ")
        .into_owned()
}
