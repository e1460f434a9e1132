//! Builds index files in memory.
//!
//! The layout produced here is the simplest one the reader accepts: all meta slots packed
//! at the start of the file (the file meta first, then one slot per tree, chained in
//! order), followed by the node pages of each tree, leaves first. Trees are bulk loaded
//! from sorted entries, so every leaf but the last is full.

use anyhow::{Context, bail, ensure};
use rangedb_format::{
    EncodedKey, EncodedNode, FieldType, FileMeta, IndexMeta, META_MAX_METADATA_SIZE,
    META_SLOT_SIZE, MemoryPointer, NULL_PAGE_OFFSET, NodeKind, PAGE_SIZE, ReferencedValue,
};

/// One entry of a tree under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Data-file location of the key bytes. When set, the key is written out of line.
    pub key_location: Option<MemoryPointer>,
    /// Data-file location of the record.
    pub record: MemoryPointer,
}

impl EntrySpec {
    pub fn inline(key: impl Into<Vec<u8>>, record: MemoryPointer) -> EntrySpec {
        EntrySpec {
            key: key.into(),
            key_location: None,
            record,
        }
    }

    pub fn external(
        key: impl Into<Vec<u8>>,
        key_location: MemoryPointer,
        record: MemoryPointer,
    ) -> EntrySpec {
        EntrySpec {
            key: key.into(),
            key_location: Some(key_location),
            record,
        }
    }

    /// The key as the reader sees it.
    pub fn referenced_value(&self) -> ReferencedValue {
        ReferencedValue::new(self.key.clone(), self.key_location.unwrap_or_default())
    }

    fn encoded_key(&self) -> EncodedKey {
        match self.key_location {
            Some(location) => EncodedKey::External(location),
            None => EncodedKey::Inline(self.key.clone()),
        }
    }
}

struct TreeSpec {
    meta: IndexMeta,
    entries: Vec<EntrySpec>,
}

/// In-memory index file builder.
pub struct IndexWriter {
    file_meta: FileMeta,
    trees: Vec<TreeSpec>,
    max_keys_per_node: usize,
}

impl IndexWriter {
    pub fn new(file_meta: FileMeta) -> IndexWriter {
        IndexWriter {
            file_meta,
            trees: Vec::new(),
            max_keys_per_node: 64,
        }
    }

    /// Limits the number of keys per node. Small values produce deep trees from few
    /// entries. Must be at least 2.
    pub fn with_max_keys_per_node(mut self, max_keys_per_node: usize) -> IndexWriter {
        self.max_keys_per_node = max_keys_per_node;
        self
    }

    /// Adds a tree indexing `field_name` under `field_type`. Entries may come in any
    /// order; an empty list produces an empty tree.
    pub fn add_tree(
        &mut self,
        field_name: &str,
        field_type: FieldType,
        entries: Vec<EntrySpec>,
    ) -> &mut IndexWriter {
        let width = match field_type {
            FieldType::Float64 | FieldType::Int64 | FieldType::Uint64 => 8,
            FieldType::Boolean => 1,
            _ => 0,
        };
        let total_field_value_length = entries.iter().map(|e| e.key.len() as u64).sum();
        self.trees.push(TreeSpec {
            meta: IndexMeta {
                field_name: field_name.to_string(),
                field_type,
                width,
                total_field_value_length,
            },
            entries,
        });
        self
    }

    /// Serializes the index file.
    pub fn build(&self) -> anyhow::Result<Vec<u8>> {
        ensure!(
            self.max_keys_per_node >= 2,
            "at least two keys per node are required"
        );
        let slots = 1 + self.trees.len();
        let mut file = vec![0u8; (slots * META_SLOT_SIZE).div_ceil(PAGE_SIZE) * PAGE_SIZE];

        let mut roots = Vec::with_capacity(self.trees.len());
        for tree in &self.trees {
            let root = self
                .write_tree(&mut file, &tree.entries)
                .with_context(|| format!("writing tree of '{}'", tree.meta.field_name))?;
            roots.push(root);
        }

        let metadata = std::iter::once(self.file_meta.encode())
            .chain(self.trees.iter().map(|t| t.meta.encode()));
        let roots = std::iter::once(MemoryPointer::default()).chain(roots);
        for (slot, (metadata, root)) in metadata.zip(roots).enumerate() {
            let next = if slot + 1 < slots {
                ((slot + 1) * META_SLOT_SIZE) as u64
            } else {
                NULL_PAGE_OFFSET
            };
            let encoded = encode_slot(root, next, &metadata)?;
            let start = slot * META_SLOT_SIZE;
            file[start..start + META_SLOT_SIZE].copy_from_slice(&encoded);
        }
        Ok(file)
    }

    fn write_tree(&self, file: &mut Vec<u8>, entries: &[EntrySpec]) -> anyhow::Result<MemoryPointer> {
        if entries.is_empty() {
            return Ok(MemoryPointer::default());
        }
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| {
            a.referenced_value()
                .cmp(&b.referenced_value())
                .then(a.record.cmp(&b.record))
        });

        // (page offset, first entry of the subtree) per node of the current level.
        let mut level = Vec::new();
        for chunk in balanced_chunks(&sorted, self.max_keys_per_node) {
            let node = EncodedNode {
                keys: chunk.iter().map(EntrySpec::encoded_key).collect(),
                kind: NodeKind::Leaf {
                    pointers: chunk.iter().map(|e| e.record).collect(),
                },
            };
            level.push((write_page(file, &node)?, &chunk[0]));
        }
        while level.len() > 1 {
            let mut parents = Vec::new();
            for group in balanced_chunks(&level, self.max_keys_per_node + 1) {
                let node = EncodedNode {
                    keys: group[1..].iter().map(|(_, first)| first.encoded_key()).collect(),
                    kind: NodeKind::Internal {
                        children: group
                            .iter()
                            .map(|&(offset, _)| MemoryPointer::new(offset, PAGE_SIZE as u32))
                            .collect(),
                    },
                };
                parents.push((write_page(file, &node)?, group[0].1));
            }
            level = parents;
        }
        Ok(MemoryPointer::new(level[0].0, PAGE_SIZE as u32))
    }
}

/// Splits `items` into the fewest chunks of at most `max` items, with sizes differing by
/// at most one.
fn balanced_chunks<T>(items: &[T], max: usize) -> Vec<&[T]> {
    let count = items.len().div_ceil(max);
    let base = items.len() / count;
    let extra = items.len() % count;
    let mut chunks = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let len = base + usize::from(i < extra);
        chunks.push(&items[start..start + len]);
        start += len;
    }
    chunks
}

fn write_page(file: &mut Vec<u8>, node: &EncodedNode) -> anyhow::Result<u64> {
    let encoded = node.encode();
    if encoded.len() > PAGE_SIZE {
        bail!("node of {} bytes does not fit a page", encoded.len());
    }
    let offset = file.len() as u64;
    file.extend_from_slice(&encoded);
    file.resize(offset as usize + PAGE_SIZE, 0);
    Ok(offset)
}

/// Encodes a single meta slot.
pub fn encode_slot(root: MemoryPointer, next: u64, metadata: &[u8]) -> anyhow::Result<Vec<u8>> {
    ensure!(
        metadata.len() <= META_MAX_METADATA_SIZE,
        "metadata of {} bytes does not fit a slot",
        metadata.len()
    );
    let mut slot = Vec::with_capacity(META_SLOT_SIZE);
    root.encode(&mut slot);
    slot.extend_from_slice(&next.to_le_bytes());
    slot.extend_from_slice(&[0; 4]);
    slot.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
    slot.extend_from_slice(metadata);
    slot.resize(META_SLOT_SIZE, 0);
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::balanced_chunks;

    #[test]
    fn test_balanced_chunks() {
        let items: Vec<u32> = (0..7).collect();
        let sizes: Vec<usize> = balanced_chunks(&items, 3).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
        let sizes: Vec<usize> = balanced_chunks(&items, 8).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![7]);
    }
}
