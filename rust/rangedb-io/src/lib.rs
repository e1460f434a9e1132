//! I/O abstractions:
//! - `ReadAt`: synchronous positional reader over a local file or buffer.
//! - `RangeResolver`: asynchronous batched byte-range fetcher, the only way the query
//!   engine touches a remote source.
//!
//! Provides a couple of simple implementations (memory and file backed readers, a
//! `ReadAt` bridge) and the shared caching layer that wraps any resolver.

use std::{ops::Range, sync::Arc};

use async_trait::async_trait;
use rangedb_common::{Result, error::Error};

pub mod bytes;
pub mod cache;
pub mod file;
pub mod memory;
pub mod read_at_resolver;

pub use bytes::Bytes;
pub use cache::{CachePolicy, CachingResolver};
pub use file::FileReader;
pub use memory::{GrowableBuffer, MemoryResolver};
pub use read_at_resolver::ReadAtResolver;

/// A trait representing a conceptual file or buffer that supports reading from arbitrary
/// positions.
pub trait ReadAt: Send + Sync + 'static {
    /// Returns the current size of the underlying object.
    fn size(&self) -> std::io::Result<u64>;

    /// Reads a specified range of bytes from the object.
    ///
    /// **NOTE**: `read_at` should not return with a short read, unless end-of-file
    /// is encountered.
    ///
    /// # Arguments
    ///
    /// * `range` - A `Range<u64>` that specifies the start and end positions for reading.
    ///   The function may return fewer bytes than requested if the range extends beyond
    ///   the end of the object.
    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes>;
}

/// Rejects a `read_at` range whose end precedes its start.
pub(crate) fn check_read_range(range: &Range<u64>) -> std::io::Result<()> {
    if range.end >= range.start {
        return Ok(());
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("read range {}..{} ends before it starts", range.start, range.end),
    ))
}

impl<T: ReadAt + ?Sized> ReadAt for Arc<T> {
    fn size(&self) -> std::io::Result<u64> {
        self.as_ref().size()
    }

    fn read_at(&self, range: Range<u64>) -> std::io::Result<Bytes> {
        self.as_ref().read_at(range)
    }
}

/// A single byte range to fetch from a remote source.
///
/// Both ends are inclusive, mirroring the HTTP `Range: bytes=start-end` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeRequest {
    pub start: u64,
    pub end: u64,
    /// When set, the source's total length observed by the response must match this value,
    /// otherwise the resolver fails with an integrity error.
    pub expected_length: Option<u64>,
}

impl RangeRequest {
    pub fn new(start: u64, end: u64) -> RangeRequest {
        RangeRequest {
            start,
            end,
            expected_length: None,
        }
    }

    /// Builds the request covering `length` bytes at `offset`.
    ///
    /// Returns `None` for an empty range, which has no inclusive representation.
    pub fn for_span(offset: u64, length: u64) -> Option<RangeRequest> {
        if length == 0 {
            return None;
        }
        Some(RangeRequest::new(offset, offset.checked_add(length - 1)?))
    }

    pub fn with_expected_length(mut self, expected_length: Option<u64>) -> RangeRequest {
        self.expected_length = expected_length;
        self
    }

    /// Number of bytes covered by the request.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Returns `true` when `other` lies entirely within this range.
    pub fn contains(&self, other: &RangeRequest) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Verifies the total length reported by a response against `expected_length`.
    pub fn check_integrity(&self, context: &str, total_length: u64) -> Result<()> {
        match self.expected_length {
            Some(expected) if expected != total_length => {
                Err(Error::integrity(context, expected, total_length))
            }
            _ => Ok(()),
        }
    }
}

/// The resolved content of a single [`RangeRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResponse {
    /// Bytes of the requested range. Shorter than requested when the range runs past
    /// the end of the source.
    pub data: Bytes,
    /// Total length of the source at the time the range was served.
    pub total_length: u64,
}

/// Fetches batches of byte ranges from a (possibly remote) source.
///
/// The index file and the data file are each accessed through their own resolver.
/// Responses are returned in request order, one per request.
///
/// # Errors
///
/// Implementations fail with an integrity error when a request carries an
/// `expected_length` that disagrees with the length observed by the source, and with
/// I/O or protocol errors when the transport misbehaves.
#[async_trait]
pub trait RangeResolver: Send + Sync + 'static {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>>;
}

#[async_trait]
impl<T: RangeResolver + ?Sized> RangeResolver for Arc<T> {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        self.as_ref().resolve(ranges).await
    }
}

/// Resolves a single range and returns its response.
pub async fn resolve_one(
    resolver: &dyn RangeResolver,
    request: RangeRequest,
) -> Result<RangeResponse> {
    let mut responses = resolver.resolve(std::slice::from_ref(&request)).await?;
    responses
        .pop()
        .ok_or_else(|| Error::protocol("resolver returned no response for a range"))
}
