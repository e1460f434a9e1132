//! Tokenizers for extracting search terms from text.
//!
//! The same tokenizer runs when the n-gram trees are built and when a search phrase is
//! processed, so both sides agree on the terms.

pub mod ngram;

use rangedb_format::FieldType;

pub use ngram::{DEFAULT_MAX_GRAM, DEFAULT_MIN_GRAM, MAX_GRAM, NgramTokenizer};

/// A search term together with the n-gram type of the tree it lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub field_type: FieldType,
}

/// Fisher-Yates shuffle of the probing order.
pub fn shuffle_tokens(tokens: &mut [Token], rng: &mut fastrand::Rng) {
    for i in (1..tokens.len()).rev() {
        let j = rng.usize(..=i);
        tokens.swap(i, j);
    }
}
