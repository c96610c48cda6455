use std::fmt;

/// A normalized search key
///
/// Terms are trimmed, lower-cased and have internal whitespace runs
/// collapsed to a single space. Two terms are the same search key exactly
/// when their normalized strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Term(String);

impl Term {
    /// Normalizes `raw` into a term; `None` when nothing is left
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize_term(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, the unit the derivation filter uses
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Term {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a raw search string
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Lowercase (Unicode-aware)
/// 3. Collapse internal whitespace runs into one ASCII space
///
/// # Examples
///
/// ```
/// use term_harvest::term::normalize_term;
///
/// assert_eq!(normalize_term("  High   School "), "high school");
/// assert_eq!(normalize_term("UNIVERSITÄT"), "universität");
/// ```
pub fn normalize_term(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
