//! N-gram search over the index file.
//!
//! A text field indexed for search has one tree per gram size (unigram, bigram,
//! trigram) whose keys are the lower-cased n-grams of the field and whose entries point
//! at the records containing them, one entry per occurrence. A search phrase is
//! tokenized the same way; each token's run of entries yields its term frequencies, and
//! the documents are ranked with BM25.

pub mod bm25;
pub mod term_frequency;
pub mod tokenizers;

pub use bm25::{Bm25Scorer, DEFAULT_K1, bm25_idf, bm25_term_score};
pub use term_frequency::TermFrequencies;
pub use tokenizers::{NgramTokenizer, Token, shuffle_tokens};
