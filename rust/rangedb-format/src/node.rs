//! B+Tree node codec.
//!
//! Node layout (little-endian):
//!
//! ```text
//! i32 count                       negative for a leaf, |count| keys
//! count x key                     u32 length + bytes, or u32::MAX + 12-byte MemoryPointer
//!                                 referencing the key bytes in the data file
//! leaf:     count x MemoryPointer      record locations
//! internal: (count + 1) x u64          child node offsets in the index file
//! ```
//!
//! A node is always contained within a single [`PAGE_SIZE`] page.

use std::cmp::Ordering;

use rangedb_common::{Result, error::Error, verify_node};

use crate::{MemoryPointer, PAGE_SIZE, ReferencedValue};

/// Length prefix marking an out-of-line key.
pub const EXTERNAL_KEY_MARKER: u32 = u32::MAX;

/// A key as stored in a node page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedKey {
    Inline(Vec<u8>),
    /// The key bytes live in the data file at this location.
    External(MemoryPointer),
}

/// Leaf and internal nodes differ in what follows the keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// One data-file pointer per key.
    Leaf { pointers: Vec<MemoryPointer> },
    /// `keys + 1` child pointers into the index file.
    Internal { children: Vec<MemoryPointer> },
}

/// A node decoded from its page, before out-of-line keys were fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedNode {
    pub keys: Vec<EncodedKey>,
    pub kind: NodeKind,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| {
                Error::malformed_node(format!(
                    "truncated node: {what} at offset {} needs {n} bytes, page has {}",
                    self.pos,
                    self.buf.len()
                ))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self, what: &str) -> Result<u64> {
        let b = self.take(8, what)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(b);
        Ok(u64::from_le_bytes(bytes))
    }

    fn pointer(&mut self, what: &str) -> Result<MemoryPointer> {
        MemoryPointer::decode(self.take(MemoryPointer::ENCODED_SIZE, what)?)
    }
}

/// Decodes a node from the start of `page`.
///
/// Only the first [`PAGE_SIZE`] bytes are considered. Returns the node and the number of
/// bytes consumed.
///
/// # Errors
///
/// Fails with a malformed-node error when the page is truncated, the key count is zero
/// or implausible for a page, or a length prefix runs past the page.
pub fn decode_node(page: &[u8]) -> Result<(EncodedNode, usize)> {
    let mut reader = Reader {
        buf: &page[..page.len().min(PAGE_SIZE)],
        pos: 0,
    };
    let count = reader.u32("key count")? as i32;
    verify_node!(count != 0);
    let leaf = count < 0;
    let len = count.unsigned_abs() as usize;
    // Every key takes at least its 4-byte length prefix.
    verify_node!(len <= PAGE_SIZE / 4);

    let mut keys = Vec::with_capacity(len);
    for _ in 0..len {
        let key_len = reader.u32("key length")?;
        if key_len == EXTERNAL_KEY_MARKER {
            keys.push(EncodedKey::External(reader.pointer("key pointer")?));
        } else {
            keys.push(EncodedKey::Inline(
                reader.take(key_len as usize, "key bytes")?.to_vec(),
            ));
        }
    }

    let kind = if leaf {
        let pointers = (0..len)
            .map(|_| reader.pointer("leaf pointer"))
            .collect::<Result<Vec<_>>>()?;
        NodeKind::Leaf { pointers }
    } else {
        let children = (0..=len)
            .map(|_| reader.u64("child offset").map(|offset| MemoryPointer::new(offset, 0)))
            .collect::<Result<Vec<_>>>()?;
        NodeKind::Internal { children }
    };
    Ok((EncodedNode { keys, kind }, reader.pos))
}

impl EncodedNode {
    /// Encodes the node into its page representation.
    pub fn encode(&self) -> Vec<u8> {
        let count = self.keys.len() as i32;
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        let signed = if self.is_leaf() { -count } else { count };
        buf.extend_from_slice(&signed.to_le_bytes());
        for key in &self.keys {
            match key {
                EncodedKey::Inline(bytes) => {
                    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                    buf.extend_from_slice(bytes);
                }
                EncodedKey::External(pointer) => {
                    buf.extend_from_slice(&EXTERNAL_KEY_MARKER.to_le_bytes());
                    pointer.encode(&mut buf);
                }
            }
        }
        match &self.kind {
            NodeKind::Leaf { pointers } => pointers.iter().for_each(|p| p.encode(&mut buf)),
            NodeKind::Internal { children } => children
                .iter()
                .for_each(|c| buf.extend_from_slice(&c.offset.to_le_bytes())),
        }
        buf
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Locations of the out-of-line keys, in key order.
    pub fn external_keys(&self) -> Vec<MemoryPointer> {
        self.keys
            .iter()
            .filter_map(|key| match key {
                EncodedKey::External(pointer) => Some(*pointer),
                EncodedKey::Inline(_) => None,
            })
            .collect()
    }

    /// Builds the decoded node, substituting `fetched` (one entry per
    /// [`external_keys`](Self::external_keys) pointer, same order) for the out-of-line keys.
    pub fn resolve<B: AsRef<[u8]>>(self, fetched: &[B]) -> Result<Node> {
        let mut fetched = fetched.iter();
        let keys = self
            .keys
            .into_iter()
            .map(|key| match key {
                EncodedKey::Inline(value) => Ok(ReferencedValue::inline(value)),
                EncodedKey::External(pointer) => {
                    let bytes = fetched.next().ok_or_else(|| {
                        Error::malformed_node(format!("missing bytes of external key {pointer}"))
                    })?;
                    let bytes = bytes.as_ref();
                    if bytes.len() != pointer.length as usize {
                        return Err(Error::malformed_node(format!(
                            "external key {pointer} resolved to {} bytes",
                            bytes.len()
                        )));
                    }
                    Ok(ReferencedValue::new(bytes.to_vec(), pointer))
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Node {
            keys,
            kind: self.kind,
        })
    }
}

/// A fully decoded B+Tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub keys: Vec<ReferencedValue>,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of pointers: one per key in a leaf, one more than the keys otherwise.
    pub fn num_pointers(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { pointers } => pointers.len(),
            NodeKind::Internal { children } => children.len(),
        }
    }

    pub fn key(&self, index: usize) -> Option<&ReferencedValue> {
        self.keys.get(index)
    }

    /// Record pointer of the `index`-th entry of a leaf.
    pub fn pointer(&self, index: usize) -> Option<MemoryPointer> {
        match &self.kind {
            NodeKind::Leaf { pointers } => pointers.get(index).copied(),
            NodeKind::Internal { .. } => None,
        }
    }

    /// The `index`-th child of an internal node.
    pub fn child(&self, index: usize) -> Option<MemoryPointer> {
        match &self.kind {
            NodeKind::Internal { children } => children.get(index).copied(),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Key and record pointer of the `index`-th leaf entry.
    pub fn entry(&self, index: usize) -> Option<(ReferencedValue, MemoryPointer)> {
        Some((self.key(index)?.clone(), self.pointer(index)?))
    }

    /// Binary search over the keys.
    ///
    /// Returns the index of a key equal to `key`, or the one's complement of the position
    /// where `key` would be inserted.
    pub fn bsearch(&self, key: &ReferencedValue) -> isize {
        match self.keys.binary_search(key) {
            Ok(index) => index as isize,
            Err(insertion_point) => !(insertion_point as isize),
        }
    }

    /// Number of keys strictly less than `key`.
    pub fn lower_bound(&self, key: &ReferencedValue) -> usize {
        self.keys.partition_point(|k| k.cmp(key) == Ordering::Less)
    }

    /// Number of keys less than or equal to `key`.
    pub fn upper_bound(&self, key: &ReferencedValue) -> usize {
        self.keys.partition_point(|k| k.cmp(key) != Ordering::Greater)
    }
}

#[cfg(test)]
mod tests {
    use super::{EncodedKey, EncodedNode, NodeKind, decode_node};
    use crate::{MemoryPointer, PAGE_SIZE, ReferencedValue};

    fn leaf(keys: &[&str]) -> EncodedNode {
        EncodedNode {
            keys: keys
                .iter()
                .map(|k| EncodedKey::Inline(k.as_bytes().to_vec()))
                .collect(),
            kind: NodeKind::Leaf {
                pointers: (0..keys.len() as u64)
                    .map(|i| MemoryPointer::new(i * 10, 10))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_leaf_layout() {
        let node = leaf(&["ab", "c"]);
        let page = node.encode();
        assert_eq!(&page[..4], &(-2i32).to_le_bytes());
        assert_eq!(&page[4..8], &2u32.to_le_bytes());
        assert_eq!(&page[8..10], b"ab");
        let (decoded, consumed) = decode_node(&page).expect("decode");
        assert_eq!(decoded, node);
        assert_eq!(consumed, 4 + 6 + 5 + 24);
    }

    #[test]
    fn test_internal_with_external_key() {
        let node = EncodedNode {
            keys: vec![
                EncodedKey::Inline(b"m".to_vec()),
                EncodedKey::External(MemoryPointer::new(500, 3)),
            ],
            kind: NodeKind::Internal {
                children: vec![
                    MemoryPointer::new(4096, 0),
                    MemoryPointer::new(8192, 0),
                    MemoryPointer::new(12288, 0),
                ],
            },
        };
        let mut page = node.encode();
        page.resize(PAGE_SIZE, 0);
        let (decoded, _) = decode_node(&page).expect("decode");
        assert_eq!(decoded.external_keys(), vec![MemoryPointer::new(500, 3)]);
        let resolved = decoded.resolve(&[b"xyz"]).expect("resolve");
        assert_eq!(
            resolved.key(1),
            Some(&ReferencedValue::new(b"xyz".to_vec(), MemoryPointer::new(500, 3)))
        );
        assert_eq!(resolved.num_pointers(), 3);
        assert_eq!(resolved.child(2), Some(MemoryPointer::new(12288, 0)));
        assert_eq!(resolved.pointer(0), None);
    }

    #[test]
    fn test_resolve_rejects_short_external_key() {
        let node = EncodedNode {
            keys: vec![EncodedKey::External(MemoryPointer::new(500, 3))],
            kind: NodeKind::Leaf {
                pointers: vec![MemoryPointer::new(0, 1)],
            },
        };
        assert!(node.clone().resolve(&[b"xy"]).is_err());
        assert!(node.resolve::<&[u8]>(&[]).is_err());
    }

    #[test]
    fn test_malformed_pages() {
        let page = leaf(&["abc", "def"]).encode();
        for cut in [0, 3, 9, page.len() - 1] {
            let err = decode_node(&page[..cut]).unwrap_err();
            assert!(err.to_string().starts_with("malformed B+Tree node"), "{err}");
        }
        assert!(decode_node(&[0, 0, 0, 0]).is_err());

        // A key length running past the page.
        let mut bogus = (-1i32).to_le_bytes().to_vec();
        bogus.extend_from_slice(&5000u32.to_le_bytes());
        bogus.resize(PAGE_SIZE + 2000, b'x');
        assert!(decode_node(&bogus).is_err());
    }

    #[test]
    fn test_bsearch() {
        let node = leaf(&["b", "d", "f"]).resolve::<&[u8]>(&[]).expect("resolve");
        let key = |s: &str| ReferencedValue::inline(s.as_bytes().to_vec());
        assert_eq!(node.bsearch(&key("d")), 1);
        assert_eq!(node.bsearch(&key("a")), !0);
        assert_eq!(node.bsearch(&key("c")), !1);
        assert_eq!(node.bsearch(&key("g")), !3);
        assert_eq!(node.lower_bound(&key("d")), 1);
        assert_eq!(node.upper_bound(&key("d")), 2);
    }
}
