use ahash::AHashMap;
use rangedb_common::Result;
use rangedb_format::{MemoryPointer, ReferencedValue};
use rangedb_index::BPTree;

/// Occurrences of one term per document, keyed by the document's data-file location.
#[derive(Debug, Clone, Default)]
pub struct TermFrequencies {
    counts: AHashMap<MemoryPointer, u32>,
}

impl TermFrequencies {
    /// Counts the leaf entries of `tree` whose key equals `term`.
    ///
    /// Every occurrence of a term in a document is a separate entry, so the entries for
    /// one term form a contiguous run; the scan starts at the run's lower sentinel and
    /// stops at the first different key.
    pub async fn accumulate(tree: &BPTree, term: &[u8]) -> Result<TermFrequencies> {
        let mut counts = AHashMap::new();
        let mut cursor = tree.iter(&ReferencedValue::lower_sentinel(term)).await?;
        while let Some((key, document)) = cursor.next().await? {
            if key.value != term {
                break;
            }
            *counts.entry(document).or_insert(0) += 1;
        }
        Ok(TermFrequencies { counts })
    }

    /// Number of documents containing the term.
    pub fn document_count(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Occurrences of the term in `document`.
    pub fn get(&self, document: &MemoryPointer) -> u32 {
        self.counts.get(document).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MemoryPointer, u32)> + '_ {
        self.counts.iter().map(|(&document, &count)| (document, count))
    }
}
