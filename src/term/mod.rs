//! Term handling module for Term-Harvest
//!
//! This module provides search-term normalization and the derivation of new
//! candidate terms from discovered entity names.

mod derive;
mod normalize;

pub use derive::{derive_terms, tokenize, DerivationRules};
pub use normalize::{normalize_term, Term};
