use std::cmp::Ordering;

/// Default number of levels of a [`SkipList`].
pub const DEFAULT_MAX_LEVEL: usize = 16;

const HEAD: usize = 0;

struct SkipNode<K, V> {
    /// `None` only for the head node.
    entry: Option<(K, V)>,
    forward: Vec<Option<usize>>,
}

/// An ordered map backed by a probabilistic skip list.
///
/// Nodes live in an arena (`Vec`) and link to each other by index. Every inserted node is
/// promoted to the next level with probability 1/2, up to `max_level` levels.
///
/// # Examples
///
/// ```
/// use rangedb_collections::SkipList;
///
/// let mut list = SkipList::new();
/// list.insert(("price".to_string(), 3u16), 4096u64);
/// list.insert(("name".to_string(), 0u16), 8192u64);
///
/// assert_eq!(list.get(&("name".to_string(), 0)), Some(&8192));
/// let keys: Vec<_> = list.iter().map(|(k, _)| k.0.as_str()).collect();
/// assert_eq!(keys, ["name", "price"]);
/// ```
pub struct SkipList<K, V> {
    nodes: Vec<SkipNode<K, V>>,
    level: usize,
    max_level: usize,
    rng: fastrand::Rng,
}

impl<K: Ord, V> SkipList<K, V> {
    pub fn new() -> SkipList<K, V> {
        SkipList::with_max_level(DEFAULT_MAX_LEVEL)
    }

    pub fn with_max_level(max_level: usize) -> SkipList<K, V> {
        SkipList::with_rng(max_level, fastrand::Rng::new())
    }

    /// Creates a list with a seeded level generator, for reproducible layouts.
    pub fn with_seed(max_level: usize, seed: u64) -> SkipList<K, V> {
        SkipList::with_rng(max_level, fastrand::Rng::with_seed(seed))
    }

    fn with_rng(max_level: usize, rng: fastrand::Rng) -> SkipList<K, V> {
        let max_level = max_level.max(1);
        SkipList {
            nodes: vec![SkipNode {
                entry: None,
                forward: vec![None; max_level],
            }],
            level: 1,
            max_level,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of levels currently in use.
    pub fn level(&self) -> usize {
        self.level
    }

    fn key_at(&self, node: usize) -> Option<&K> {
        self.nodes[node].entry.as_ref().map(|(k, _)| k)
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.bool() {
            level += 1;
        }
        level
    }

    /// Walks down the levels and returns, per level, the last node whose key compares
    /// less than the target according to `cmp`.
    fn predecessors<F>(&self, cmp: F) -> Vec<usize>
    where
        F: Fn(&K) -> Ordering,
    {
        let mut update = vec![HEAD; self.max_level];
        let mut current = HEAD;
        for level in (0..self.level).rev() {
            while let Some(next) = self.nodes[current].forward[level] {
                match self.key_at(next) {
                    Some(key) if cmp(key) == Ordering::Less => current = next,
                    _ => break,
                }
            }
            update[level] = current;
        }
        update
    }

    /// Inserts a key-value pair, returning the previous value stored under an equal key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let update = self.predecessors(|k| k.cmp(&key));
        if let Some(next) = self.nodes[update[0]].forward[0] {
            if let Some((existing, slot)) = self.nodes[next].entry.as_mut() {
                if *existing == key {
                    return Some(std::mem::replace(slot, value));
                }
            }
        }

        let level = self.random_level();
        if level > self.level {
            // Levels above the current height start at the head, which `update` already
            // points to.
            self.level = level;
        }
        let index = self.nodes.len();
        let forward = (0..level)
            .map(|l| self.nodes[update[l]].forward[l])
            .collect();
        self.nodes.push(SkipNode {
            entry: Some((key, value)),
            forward,
        });
        for (l, &prev) in update.iter().enumerate().take(level) {
            self.nodes[prev].forward[l] = Some(index);
        }
        None
    }

    /// Finds the entry whose key compares `Equal` under `cmp`.
    ///
    /// `cmp` receives a stored key and reports how it orders relative to the target; this
    /// allows borrowed lookups for composite keys.
    pub fn find_by<F>(&self, cmp: F) -> Option<(&K, &V)>
    where
        F: Fn(&K) -> Ordering,
    {
        let update = self.predecessors(&cmp);
        let next = self.nodes[update[0]].forward[0]?;
        let (key, value) = self.nodes[next].entry.as_ref()?;
        (cmp(key) == Ordering::Equal).then_some((key, value))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_by(|k| k.cmp(key)).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over the entries in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            next: self.nodes[HEAD].forward[0],
        }
    }
}

impl<K: Ord, V> Default for SkipList<K, V> {
    fn default() -> Self {
        SkipList::new()
    }
}

pub struct Iter<'a, K, V> {
    list: &'a SkipList<K, V>,
    next: Option<usize>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = &self.list.nodes[self.next?];
        self.next = node.forward[0];
        node.entry.as_ref().map(|(k, v)| (k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::SkipList;

    #[test]
    fn test_insert_and_get() {
        let mut list = SkipList::with_seed(16, 42);
        let mut rng = fastrand::Rng::with_seed(7);
        let mut keys: Vec<u32> = (0..1000).collect();
        rng.shuffle(&mut keys);
        for &k in &keys {
            assert_eq!(list.insert(k, k * 2), None);
        }
        assert_eq!(list.len(), 1000);
        for k in 0..1000u32 {
            assert_eq!(list.get(&k), Some(&(k * 2)));
        }
        assert_eq!(list.get(&1000), None);
        assert!(list.level() > 1 && list.level() <= 16);

        let ordered: Vec<u32> = list.iter().map(|(k, _)| *k).collect();
        assert_eq!(ordered, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_replace_existing() {
        let mut list = SkipList::with_seed(4, 1);
        assert_eq!(list.insert("a", 1), None);
        assert_eq!(list.insert("a", 2), Some(1));
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(&"a"), Some(&2));
    }

    #[test]
    fn test_find_by_composite_key() {
        let mut list = SkipList::with_seed(8, 9);
        list.insert(("age".to_string(), 3u16), "float");
        list.insert(("age".to_string(), 0u16), "string");
        list.insert(("name".to_string(), 0u16), "string");
        let hit = list.find_by(|(name, ty)| name.as_str().cmp("age").then(ty.cmp(&3)));
        assert_eq!(hit.map(|(_, v)| *v), Some("float"));
        let miss = list.find_by(|(name, ty)| name.as_str().cmp("zip").then(ty.cmp(&0)));
        assert!(miss.is_none());
    }

    #[test]
    fn test_single_level_list() {
        let mut list = SkipList::with_max_level(1);
        for k in [5, 1, 3] {
            list.insert(k, ());
        }
        assert_eq!(list.level(), 1);
        assert_eq!(list.iter().map(|(k, _)| *k).collect::<Vec<_>>(), [1, 3, 5]);
    }
}
