//! Search result parsing
//!
//! This module turns a search response page into records:
//! - Elements carrying the entity-name attribute become records
//! - The domains attribute holds a bracketed, quoted list literal such as
//!   `[["acme.edu", "mail.acme.edu"]]`, read by a small recursive-descent
//!   parser instead of being evaluated

use crate::crawler::client::Record;
use crate::ConfigError;
use scraper::{Html, Selector};
use thiserror::Error;

/// Nesting limit for list literals
const MAX_NESTING: usize = 16;

/// Errors produced by the domain-list parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEnd(usize),

    #[error("unexpected character {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    #[error("lists nested too deeply at offset {0}")]
    TooDeep(usize),

    #[error("trailing input at offset {0}")]
    TrailingInput(usize),
}

/// Parses a domain-list literal into normalized domains
///
/// # Grammar
///
/// ```text
/// value  := list | string
/// list   := '[' ( value ( ',' value )* ','? )? ']'
/// string := '"' char* '"' | '\'' char* '\''
/// ```
///
/// Whitespace may appear between tokens and a backslash escapes the next
/// character inside strings. Nested lists are flattened in order; domains
/// are trimmed and lower-cased, empty strings dropped and duplicates removed.
/// HTML-escaped quotes (`&quot;`) are decoded first. Blank input is an
/// empty list.
///
/// # Examples
///
/// ```
/// use term_harvest::crawler::parse_domain_list;
///
/// let domains = parse_domain_list(r#"[["Acme.edu", "mail.acme.edu"]]"#).unwrap();
/// assert_eq!(domains, vec!["acme.edu", "mail.acme.edu"]);
/// ```
pub fn parse_domain_list(payload: &str) -> Result<Vec<String>, ParseError> {
    let decoded = decode_entities(payload);
    if decoded.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut parser = ListParser {
        input: &decoded,
        pos: 0,
    };
    let mut raw = Vec::new();
    parser.skip_whitespace();
    parser.parse_value(&mut raw, 0)?;
    parser.skip_whitespace();
    if parser.pos < parser.input.len() {
        return Err(ParseError::TrailingInput(parser.pos));
    }

    let mut domains: Vec<String> = Vec::with_capacity(raw.len());
    for domain in raw {
        let domain = domain.trim().to_lowercase();
        if !domain.is_empty() && !domains.contains(&domain) {
            domains.push(domain);
        }
    }
    Ok(domains)
}

fn decode_entities(payload: &str) -> String {
    payload
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

struct ListParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ListParser<'a> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn parse_value(&mut self, out: &mut Vec<String>, depth: usize) -> Result<(), ParseError> {
        match self.peek() {
            Some('[') => self.parse_list(out, depth + 1),
            Some(quote @ ('"' | '\'')) => {
                let value = self.parse_string(quote)?;
                out.push(value);
                Ok(())
            }
            Some(found) => Err(ParseError::Unexpected {
                found,
                offset: self.pos,
            }),
            None => Err(ParseError::UnexpectedEnd(self.pos)),
        }
    }

    fn parse_list(&mut self, out: &mut Vec<String>, depth: usize) -> Result<(), ParseError> {
        if depth > MAX_NESTING {
            return Err(ParseError::TooDeep(self.pos));
        }

        // opening bracket
        self.bump();
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(());
        }

        loop {
            self.parse_value(out, depth)?;
            self.skip_whitespace();
            match self.bump() {
                Some(',') => {
                    self.skip_whitespace();
                    if self.peek() == Some(']') {
                        self.bump();
                        return Ok(());
                    }
                }
                Some(']') => return Ok(()),
                Some(found) => {
                    return Err(ParseError::Unexpected {
                        found,
                        offset: self.pos - found.len_utf8(),
                    })
                }
                None => return Err(ParseError::UnexpectedEnd(self.pos)),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();

        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(ParseError::UnterminatedString(start)),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(ParseError::UnterminatedString(start)),
            }
        }
    }
}

/// Extracts records from search response pages
#[derive(Debug)]
pub struct RecordExtractor {
    selector: Selector,
    name_attribute: String,
    domains_attribute: String,
}

impl RecordExtractor {
    /// Builds an extractor for the given attribute names
    pub fn new(name_attribute: &str, domains_attribute: &str) -> Result<Self, ConfigError> {
        let selector = Selector::parse(&format!("[{}]", name_attribute)).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid name attribute '{}': {:?}",
                name_attribute, e
            ))
        })?;

        Ok(Self {
            selector,
            name_attribute: name_attribute.to_string(),
            domains_attribute: domains_attribute.to_string(),
        })
    }

    /// Extracts every record on the page
    ///
    /// A record whose domain payload fails to parse is kept with an empty
    /// domain list so its name still feeds term derivation.
    pub fn extract(&self, html: &str) -> Vec<Record> {
        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for element in document.select(&self.selector) {
            let Some(name) = element.value().attr(&self.name_attribute) else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }

            let domains = match element.value().attr(&self.domains_attribute) {
                Some(payload) => match parse_domain_list(payload) {
                    Ok(domains) => domains,
                    Err(e) => {
                        tracing::warn!("Unreadable domain list for {:?}: {}", name, e);
                        Vec::new()
                    }
                },
                None => {
                    tracing::debug!("No domain attribute on record {:?}", name);
                    Vec::new()
                }
            };

            records.push(Record {
                entity_name: name.to_string(),
                domains,
            });
        }

        records
    }
}
