use crate::config::CrawlerConfig;
use crate::term::normalize::Term;
use std::collections::HashSet;

/// Rules applied when turning an entity name into candidate terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationRules {
    /// Candidates must be strictly longer than this (in characters)
    pub min_len: usize,
    /// Candidates must be strictly shorter than this (in characters)
    pub max_len: usize,
    /// Longest contiguous word phrase to emit
    pub max_phrase_words: usize,
}

impl DerivationRules {
    pub fn admits(&self, term: &Term) -> bool {
        let len = term.char_len();
        len > self.min_len && len < self.max_len
    }
}

impl Default for DerivationRules {
    fn default() -> Self {
        Self {
            min_len: 2,
            max_len: 40,
            max_phrase_words: 1,
        }
    }
}

impl From<&CrawlerConfig> for DerivationRules {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            min_len: config.min_term_len,
            max_len: config.max_term_len,
            max_phrase_words: config.max_phrase_words,
        }
    }
}

/// Characters that separate words inside an entity name
fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '-' | '\u{2010}'
                | '\u{2013}'
                | '\u{2014}'
                | ','
                | '\u{3001}'
                | '\u{ff0c}'
                | ';'
                | ':'
                | '/'
                | '|'
                | '&'
                | '+'
                | '.'
                | '('
                | ')'
                | '['
                | ']'
                | '"'
        )
}

/// Splits an entity name into normalized words, dropping empty pieces
pub fn tokenize(entity_name: &str) -> Vec<String> {
    entity_name
        .split(is_separator)
        .filter(|piece| !piece.is_empty())
        .map(|piece| piece.to_lowercase())
        .collect()
}

/// Derives candidate search terms from an entity name
///
/// Single words that pass the length filter are always candidates. When
/// `max_phrase_words > 1`, contiguous phrases of the admitted words (up to
/// that many words) are candidates too, subject to the same filter.
/// Output order follows first appearance; duplicates are removed.
///
/// # Examples
///
/// ```
/// use term_harvest::term::{derive_terms, DerivationRules};
///
/// let terms = derive_terms("A B Institute of X", &DerivationRules::default());
/// let terms: Vec<_> = terms.iter().map(|t| t.as_str()).collect();
/// assert_eq!(terms, vec!["institute"]);
/// ```
pub fn derive_terms(entity_name: &str, rules: &DerivationRules) -> Vec<Term> {
    let words: Vec<Term> = tokenize(entity_name)
        .iter()
        .filter_map(|word| Term::new(word))
        .filter(|term| rules.admits(term))
        .collect();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for width in 1..=rules.max_phrase_words.max(1) {
        if width > words.len() {
            break;
        }
        for window in words.windows(width) {
            let phrase = window
                .iter()
                .map(Term::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            let Some(term) = Term::new(&phrase) else {
                continue;
            };
            if rules.admits(&term) && seen.insert(term.clone()) {
                out.push(term);
            }
        }
    }

    out
}
