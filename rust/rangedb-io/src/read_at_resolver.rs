use async_trait::async_trait;
use rangedb_common::{Result, error::Error, verify_arg};

use crate::{RangeRequest, RangeResolver, RangeResponse, ReadAt};

/// Serves range requests from a local [`ReadAt`] source.
///
/// Every request observes the size of the source at the time it is served, so an
/// append between two calls shows up as an integrity failure for requests that pinned
/// the earlier length.
pub struct ReadAtResolver<R> {
    reader: R,
    name: String,
}

impl<R: ReadAt> ReadAtResolver<R> {
    pub fn new(reader: R) -> ReadAtResolver<R> {
        ReadAtResolver::with_name(reader, "memory")
    }

    /// Creates a resolver whose errors are reported against `name`.
    pub fn with_name(reader: R, name: impl Into<String>) -> ReadAtResolver<R> {
        ReadAtResolver {
            reader,
            name: name.into(),
        }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    fn read(&self, request: &RangeRequest) -> Result<RangeResponse> {
        verify_arg!(request, request.end >= request.start);
        let total_length = self
            .reader
            .size()
            .map_err(|e| Error::io(self.name.clone(), e))?;
        request.check_integrity(&self.name, total_length)?;
        let data = self
            .reader
            .read_at(request.start..request.end.saturating_add(1))
            .map_err(|e| Error::io(self.name.clone(), e))?;
        Ok(RangeResponse { data, total_length })
    }
}

#[async_trait]
impl<R: ReadAt> RangeResolver for ReadAtResolver<R> {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        log::trace!("{}: resolving {} range(s)", self.name, ranges.len());
        ranges.iter().map(|request| self.read(request)).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{Bytes, GrowableBuffer, RangeRequest, RangeResolver, ReadAtResolver};

    #[tokio::test]
    async fn test_resolve_in_request_order() {
        let resolver = ReadAtResolver::new(Bytes::from(b"abcdefghij".to_vec()));
        let responses = resolver
            .resolve(&[RangeRequest::new(5, 6), RangeRequest::new(0, 1)])
            .await
            .expect("resolve");
        assert_eq!(responses[0].data.as_ref(), b"fg");
        assert_eq!(responses[1].data.as_ref(), b"ab");
        assert_eq!(responses[0].total_length, 10);
    }

    #[tokio::test]
    async fn test_expected_length_mismatch() {
        let buffer = Arc::new(GrowableBuffer::new(b"abcd".as_slice()));
        let resolver = ReadAtResolver::new(buffer.clone());
        let pinned = RangeRequest::new(0, 1).with_expected_length(Some(4));
        resolver.resolve(&[pinned]).await.expect("resolve");

        buffer.append(b"ef");
        let err = resolver.resolve(&[pinned]).await.unwrap_err();
        assert!(err.is_integrity());
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let resolver = ReadAtResolver::new(Bytes::from(b"abcd".to_vec()));
        let request = RangeRequest {
            start: 3,
            end: 1,
            expected_length: None,
        };
        assert!(resolver.resolve(&[request]).await.is_err());
    }
}
