use std::cmp::Ordering;

use crate::MemoryPointer;

/// Compares two byte strings lexicographically; on equal prefixes the shorter string
/// sorts first.
pub fn compare_bytes(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// A B+Tree key: the key bytes together with the location they were read from.
///
/// Inline keys carry a null `data_pointer`. Out-of-line keys remember the data-file span
/// holding their bytes, which gives duplicate values a stable total order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReferencedValue {
    pub value: Vec<u8>,
    pub data_pointer: MemoryPointer,
}

impl ReferencedValue {
    pub fn new(value: impl Into<Vec<u8>>, data_pointer: MemoryPointer) -> ReferencedValue {
        ReferencedValue {
            value: value.into(),
            data_pointer,
        }
    }

    pub fn inline(value: impl Into<Vec<u8>>) -> ReferencedValue {
        ReferencedValue::new(value, MemoryPointer::default())
    }

    /// The smallest key with the given value bytes.
    pub fn lower_sentinel(value: impl Into<Vec<u8>>) -> ReferencedValue {
        ReferencedValue::new(value, MemoryPointer::default())
    }

    /// The greatest key with the given value bytes.
    pub fn upper_sentinel(value: impl Into<Vec<u8>>) -> ReferencedValue {
        ReferencedValue::new(value, MemoryPointer::MAX)
    }
}

impl Ord for ReferencedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_bytes(&self.value, &other.value)
            .then(self.data_pointer.offset.cmp(&other.data_pointer.offset))
            .then(self.data_pointer.length.cmp(&other.data_pointer.length))
    }
}

impl PartialOrd for ReferencedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use super::{ReferencedValue, compare_bytes};
    use crate::MemoryPointer;

    #[test]
    fn test_compare_bytes() {
        assert_eq!(compare_bytes(b"ab", b"abc"), Ordering::Less);
        assert_eq!(compare_bytes(b"abc", b"ab"), Ordering::Greater);
        assert_eq!(compare_bytes(b"abc", b"abc"), Ordering::Equal);
        assert_eq!(compare_bytes(b"", b"a"), Ordering::Less);

        let mut rng = fastrand::Rng::with_seed(3);
        for _ in 0..500 {
            let a: Vec<u8> = (0..rng.usize(0..4)).map(|_| rng.u8(0..3)).collect();
            let b: Vec<u8> = (0..rng.usize(0..4)).map(|_| rng.u8(0..3)).collect();
            assert_eq!(compare_bytes(&a, &b), compare_bytes(&b, &a).reverse());
            assert_eq!(compare_bytes(&a, &a), Ordering::Equal);
        }
    }

    #[test]
    fn test_pointer_breaks_ties() {
        let a = ReferencedValue::new(b"x".to_vec(), MemoryPointer::new(10, 1));
        let b = ReferencedValue::new(b"x".to_vec(), MemoryPointer::new(20, 1));
        assert!(a < b);
        assert!(ReferencedValue::lower_sentinel(b"x".to_vec()) < a);
        assert!(ReferencedValue::upper_sentinel(b"x".to_vec()) > b);
        assert!(ReferencedValue::upper_sentinel(b"x".to_vec()) < ReferencedValue::inline(b"xa".to_vec()));
    }
}
