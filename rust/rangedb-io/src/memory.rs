use std::{
    ops::Range,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use rangedb_common::Result;

use crate::{
    Bytes, RangeRequest, RangeResolver, RangeResponse, ReadAt, ReadAtResolver, check_read_range,
};

impl<T> ReadAt for T
where
    T: details::SliceBytes + Send + Sync + 'static,
{
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        check_read_range(&range)?;
        let pos = range.start as usize;
        let len = (range.end - range.start) as usize;
        let content_len = self.len();
        if pos > content_len {
            return Ok(Bytes::new());
        }
        let len = std::cmp::min(len, content_len - pos);
        Ok(self.slice(pos..pos + len))
    }
}

/// An in-memory, append-only source.
///
/// Stands in for a remote file that keeps growing while readers hold on to it; the
/// observed [`size`](ReadAt::size) changes after every [`append`](Self::append).
#[derive(Default)]
pub struct GrowableBuffer {
    data: RwLock<Bytes>,
}

impl GrowableBuffer {
    pub fn new(initial: impl Into<Bytes>) -> GrowableBuffer {
        GrowableBuffer {
            data: RwLock::new(initial.into()),
        }
    }

    /// Appends `buf` to the end of the buffer.
    pub fn append(&self, buf: &[u8]) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        let mut next = Vec::with_capacity(data.len() + buf.len());
        next.extend_from_slice(data.as_ref());
        next.extend_from_slice(buf);
        *data = Bytes::from(next);
    }

    /// Replaces the whole content, e.g. when an index file is rewritten in place.
    pub fn replace(&self, content: impl Into<Bytes>) {
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = content.into();
    }

    fn snapshot(&self) -> Bytes {
        self.data.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ReadAt for GrowableBuffer {
    fn size(&self) -> std::io::Result<u64> {
        Ok(self.snapshot().len() as u64)
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.snapshot().read_at(range)
    }
}

/// A range resolver over an in-memory, append-only blob.
pub struct MemoryResolver {
    resolver: ReadAtResolver<Arc<GrowableBuffer>>,
}

impl MemoryResolver {
    pub fn new(content: impl Into<Bytes>) -> MemoryResolver {
        MemoryResolver::with_name(content, "memory")
    }

    pub fn with_name(content: impl Into<Bytes>, name: impl Into<String>) -> MemoryResolver {
        MemoryResolver {
            resolver: ReadAtResolver::with_name(Arc::new(GrowableBuffer::new(content)), name),
        }
    }

    pub fn append(&self, buf: &[u8]) {
        self.resolver.reader().append(buf);
    }

    pub fn replace(&self, content: impl Into<Bytes>) {
        self.resolver.reader().replace(content);
    }
}

#[async_trait]
impl RangeResolver for MemoryResolver {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        self.resolver.resolve(ranges).await
    }
}

mod details {
    use std::ops::Range;

    use crate::Bytes;

    pub trait SliceBytes {
        fn len(&self) -> usize;
        fn slice(&self, range: Range<usize>) -> Bytes;
    }

    impl SliceBytes for Bytes {
        fn len(&self) -> usize {
            Bytes::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::slice(self, range)
        }
    }

    impl SliceBytes for Vec<u8> {
        fn len(&self) -> usize {
            Vec::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::copy_from_slice(&self[range])
        }
    }

    impl SliceBytes for &'static [u8] {
        fn len(&self) -> usize {
            <[u8]>::len(self)
        }

        fn slice(&self, range: Range<usize>) -> Bytes {
            Bytes::copy_from_slice(&self[range])
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Bytes, GrowableBuffer, MemoryResolver, RangeRequest, RangeResolver, ReadAt};

    #[test]
    fn test_memory_read_at() {
        let data = Bytes::from(b"0123456789".to_vec());
        assert_eq!(data.read_at(2..5).expect("read_at").as_ref(), b"234");
        assert_eq!(data.read_at(8..20).expect("read_at").as_ref(), b"89");
        assert!(data.read_at(20..30).expect("read_at").is_empty());
        let err = data.read_at(5..2).expect_err("reversed range");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
        assert!(err.to_string().contains("5..2"), "{err}");
    }

    #[test]
    fn test_growable_buffer() {
        let buffer = GrowableBuffer::new(b"abc".as_slice());
        assert_eq!(buffer.size().expect("size"), 3);
        buffer.append(b"def");
        assert_eq!(buffer.size().expect("size"), 6);
        assert_eq!(buffer.read_at(2..4).expect("read_at").as_ref(), b"cd");
        buffer.replace(b"xy".as_slice());
        assert_eq!(buffer.read_at(0..10).expect("read_at").as_ref(), b"xy");
    }

    #[tokio::test]
    async fn test_memory_resolver_append() {
        let resolver = MemoryResolver::new(b"{\"a\":1}\n".as_slice());
        let first = resolver
            .resolve(&[RangeRequest::new(0, 100)])
            .await
            .expect("resolve");
        assert_eq!(first[0].total_length, 8);
        resolver.append(b"{\"a\":2}\n");
        let second = resolver
            .resolve(&[RangeRequest::new(8, 15)])
            .await
            .expect("resolve");
        assert_eq!(second[0].data.as_ref(), b"{\"a\":2}\n");
        assert_eq!(second[0].total_length, 16);
    }
}
