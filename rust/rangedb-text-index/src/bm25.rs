//! BM25 ranking over the n-gram trees.
//!
//! Document length normalization is not applied: the index does not record per-document
//! lengths, so a term's contribution depends only on its frequency in the document and
//! on how many documents contain it.

use ahash::AHashMap;
use rangedb_collections::PriorityTable;
use rangedb_common::Result;
use rangedb_format::{FieldType, MemoryPointer};
use rangedb_index::BPTree;

use crate::{TermFrequencies, Token};

/// Default term-frequency saturation parameter.
pub const DEFAULT_K1: f64 = 1.2;

/// Inverse document frequency of a term found in `containing` of `total` documents.
pub fn bm25_idf(total: u64, containing: u64) -> f64 {
    let total = total as f64;
    let containing = containing as f64;
    ((total - containing + 0.5) / (containing + 0.5)).ln()
}

/// Contribution of a term occurring `tf` times in a document.
pub fn bm25_term_score(idf: f64, tf: u32, k1: f64) -> f64 {
    let tf = tf as f64;
    idf * tf * (k1 + 1.0) / (tf + k1)
}

/// Scores documents against a list of search tokens.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Scorer {
    k1: f64,
}

impl Bm25Scorer {
    pub fn new(k1: f64) -> Bm25Scorer {
        Bm25Scorer { k1 }
    }

    pub fn k1(&self) -> f64 {
        self.k1
    }

    /// Accumulates per-document scores for every token in order, so a gram repeated in
    /// the phrase counts once per occurrence.
    ///
    /// `trees` maps each n-gram type to its tree; tokens of a type without a tree are
    /// skipped. Each distinct token is looked up once. `total_entries` is the number of
    /// documents in the dataset.
    pub async fn score(
        &self,
        tokens: &[Token],
        trees: &AHashMap<FieldType, BPTree>,
        total_entries: u64,
    ) -> Result<PriorityTable<MemoryPointer>> {
        let mut table = PriorityTable::new();
        let mut by_token: AHashMap<(FieldType, &str), TermFrequencies> = AHashMap::new();
        for token in tokens {
            let Some(tree) = trees.get(&token.field_type) else {
                log::warn!(
                    "no {} tree for search token '{}', skipping",
                    token.field_type,
                    token.value
                );
                continue;
            };
            let key = (token.field_type, token.value.as_str());
            if !by_token.contains_key(&key) {
                let frequencies = TermFrequencies::accumulate(tree, token.value.as_bytes()).await?;
                by_token.insert(key, frequencies);
            }
            let Some(frequencies) = by_token.get(&key) else {
                continue;
            };
            if frequencies.is_empty() {
                continue;
            }
            let idf = bm25_idf(total_entries, frequencies.document_count() as u64);
            for (document, tf) in frequencies.iter() {
                table.insert(document, bm25_term_score(idf, tf, self.k1));
            }
            log::trace!(
                "token '{}' found in {} document(s), idf {idf:.4}",
                token.value,
                frequencies.document_count()
            );
        }
        Ok(table)
    }
}

impl Default for Bm25Scorer {
    fn default() -> Self {
        Bm25Scorer::new(DEFAULT_K1)
    }
}
