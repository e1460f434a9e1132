use std::hash::Hash;

use ahash::AHashMap;

/// Accumulates scores per key and ranks the keys by their total.
#[derive(Debug, Clone)]
pub struct PriorityTable<K> {
    scores: AHashMap<K, f64>,
}

impl<K: Hash + Eq + Clone> PriorityTable<K> {
    pub fn new() -> PriorityTable<K> {
        PriorityTable {
            scores: AHashMap::new(),
        }
    }

    /// Adds `score` to the running total of `key`.
    pub fn insert(&mut self, key: K, score: f64) {
        *self.scores.entry(key).or_insert(0.0) += score;
    }

    pub fn get(&self, key: &K) -> Option<f64> {
        self.scores.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// All entries sorted by descending score. The order of equal scores is unspecified.
    pub fn top(&self) -> Vec<(K, f64)> {
        let mut entries: Vec<(K, f64)> = self
            .scores
            .iter()
            .map(|(k, &score)| (k.clone(), score))
            .collect();
        entries.sort_unstable_by(|a, b| b.1.total_cmp(&a.1));
        entries
    }

    /// The `k` highest-scoring entries, in descending order.
    pub fn top_k(&self, k: usize) -> Vec<(K, f64)> {
        let mut entries = self.top();
        entries.truncate(k);
        entries
    }
}

impl<K: Hash + Eq + Clone> Default for PriorityTable<K> {
    fn default() -> Self {
        PriorityTable::new()
    }
}
