//! A resolver wrapper that counts the ranges it forwards.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rangedb_common::Result;
use rangedb_io::{RangeRequest, RangeResolver, RangeResponse};

pub struct CountingResolver<R> {
    inner: R,
    calls: AtomicUsize,
    ranges: AtomicUsize,
}

impl<R: RangeResolver> CountingResolver<R> {
    pub fn new(inner: R) -> CountingResolver<R> {
        CountingResolver {
            inner,
            calls: AtomicUsize::new(0),
            ranges: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of `resolve` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of ranges requested so far.
    pub fn ranges(&self) -> usize {
        self.ranges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: RangeResolver> RangeResolver for CountingResolver<R> {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ranges.fetch_add(ranges.len(), Ordering::SeqCst);
        self.inner.resolve(ranges).await
    }
}
