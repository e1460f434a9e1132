//! Range cache shared by every reader of a source.
//!
//! Each fetched range is memoized in a compute-once cell. A request that lies entirely
//! within a range that is already cached (or being fetched) is served from that entry,
//! so concurrent readers of the same page share a single fetch.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rangedb_common::{Result, error::Error};
use tokio::sync::OnceCell;

use crate::{RangeRequest, RangeResolver, RangeResponse};

/// Controls how cached ranges react to changes of the underlying source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// The source may be rewritten (the index file). Every hit is checked against the
    /// request's `expected_length`; on an integrity failure the whole cache is dropped
    /// and the error is returned to the caller.
    EvictOnIntegrity,
    /// The source is append-only (the data file). Already cached bytes never change,
    /// so entries are never evicted and hits skip the length check.
    Immutable,
}

/// A group of ranges fetched with a single call to the inner resolver.
struct Fetch {
    requests: Vec<RangeRequest>,
    responses: OnceCell<Vec<RangeResponse>>,
}

struct Entry {
    range: RangeRequest,
    fetch: Arc<Fetch>,
    index: usize,
}

impl Entry {
    fn is_ready(&self) -> bool {
        self.fetch.responses.initialized()
    }
}

/// Wraps a [`RangeResolver`] with a per-range memoizing cache.
pub struct CachingResolver<R> {
    inner: R,
    policy: CachePolicy,
    name: String,
    entries: Mutex<Vec<Arc<Entry>>>,
}

impl<R: RangeResolver> CachingResolver<R> {
    pub fn new(inner: R, policy: CachePolicy, name: impl Into<String>) -> CachingResolver<R> {
        CachingResolver {
            inner,
            policy,
            name: name.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Number of cached (or in-flight) ranges.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached range.
    pub fn clear(&self) {
        let mut entries = self.lock();
        if !entries.is_empty() {
            log::debug!("{}: evicting {} cached range(s)", self.name, entries.len());
        }
        entries.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<Entry>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Assigns every request to a cache entry, creating one batched fetch for all the
    /// requests that are not covered by an existing entry.
    fn plan(&self, ranges: &[RangeRequest]) -> Vec<Arc<Entry>> {
        let mut entries = self.lock();
        let mut planned: Vec<Option<Arc<Entry>>> = ranges
            .iter()
            .map(|request| {
                let covering = entries
                    .iter()
                    .filter(|entry| entry.range.contains(request))
                    .min_by_key(|entry| !entry.is_ready());
                covering.cloned()
            })
            .collect();

        let misses: Vec<RangeRequest> = ranges
            .iter()
            .zip(planned.iter())
            .filter(|(_, entry)| entry.is_none())
            .map(|(request, _)| *request)
            .collect();
        if !misses.is_empty() {
            log::trace!("{}: {} cache miss(es)", self.name, misses.len());
            let fetch = Arc::new(Fetch {
                requests: misses,
                responses: OnceCell::new(),
            });
            let mut index = 0;
            for (request, slot) in ranges.iter().zip(planned.iter_mut()) {
                if slot.is_none() {
                    let entry = Arc::new(Entry {
                        range: *request,
                        fetch: fetch.clone(),
                        index,
                    });
                    entries.push(entry.clone());
                    *slot = Some(entry);
                    index += 1;
                }
            }
        }
        planned.into_iter().flatten().collect()
    }

    fn forget(&self, fetch: &Arc<Fetch>) {
        self.lock().retain(|entry| !Arc::ptr_eq(&entry.fetch, fetch));
    }

    async fn serve(&self, request: &RangeRequest, entry: &Entry) -> Result<RangeResponse> {
        let responses = entry
            .fetch
            .responses
            .get_or_try_init(|| async { self.inner.resolve(&entry.fetch.requests).await })
            .await;
        let responses = match responses {
            Ok(responses) => responses,
            Err(e) => {
                if e.is_integrity() && self.policy == CachePolicy::EvictOnIntegrity {
                    self.clear();
                } else {
                    self.forget(&entry.fetch);
                }
                return Err(e);
            }
        };
        let cached = responses.get(entry.index).ok_or_else(|| {
            Error::protocol(format!(
                "{}: resolver returned {} responses for {} ranges",
                self.name,
                responses.len(),
                entry.fetch.requests.len()
            ))
        })?;

        if self.policy == CachePolicy::EvictOnIntegrity {
            if let Err(e) = request.check_integrity(&self.name, cached.total_length) {
                self.clear();
                return Err(e);
            }
        }

        let offset = (request.start - entry.range.start) as usize;
        Ok(RangeResponse {
            data: cached.data.slice_clamped(offset, request.len() as usize),
            total_length: cached.total_length,
        })
    }
}

#[async_trait]
impl<R: RangeResolver> RangeResolver for CachingResolver<R> {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        let planned = self.plan(ranges);
        let mut responses = Vec::with_capacity(ranges.len());
        for (request, entry) in ranges.iter().zip(planned.iter()) {
            responses.push(self.serve(request, entry).await?);
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use rangedb_common::Result;

    use crate::{
        Bytes, CachePolicy, CachingResolver, GrowableBuffer, RangeRequest, RangeResolver,
        RangeResponse, ReadAtResolver,
    };

    struct CountingResolver<R> {
        inner: R,
        calls: AtomicUsize,
        ranges: AtomicUsize,
    }

    #[async_trait]
    impl<R: RangeResolver> RangeResolver for CountingResolver<R> {
        async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.ranges.fetch_add(ranges.len(), Ordering::SeqCst);
            self.inner.resolve(ranges).await
        }
    }

    type Counting = CountingResolver<ReadAtResolver<Arc<GrowableBuffer>>>;

    fn counting(buffer: Arc<GrowableBuffer>) -> Arc<Counting> {
        Arc::new(CountingResolver {
            inner: ReadAtResolver::new(buffer),
            calls: AtomicUsize::new(0),
            ranges: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_contained_request_served_from_cache() {
        let buffer = Arc::new(GrowableBuffer::new(Bytes::from(
            (0u8..=255).collect::<Vec<_>>(),
        )));
        let inner = counting(buffer);
        let cache = CachingResolver::new(inner.clone(), CachePolicy::Immutable, "data");

        let page = cache
            .resolve(&[RangeRequest::new(0, 127)])
            .await
            .expect("resolve");
        assert_eq!(page[0].data.len(), 128);

        let sub = cache
            .resolve(&[RangeRequest::new(10, 12)])
            .await
            .expect("resolve");
        assert_eq!(sub[0].data.as_ref(), &[10, 11, 12]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_misses_are_batched() {
        let buffer = Arc::new(GrowableBuffer::new(Bytes::from(vec![7u8; 1024])));
        let inner = counting(buffer);
        let cache = CachingResolver::new(inner.clone(), CachePolicy::Immutable, "data");
        cache
            .resolve(&[RangeRequest::new(0, 9)])
            .await
            .expect("resolve");
        let responses = cache
            .resolve(&[
                RangeRequest::new(100, 109),
                RangeRequest::new(2, 3),
                RangeRequest::new(200, 209),
            ])
            .await
            .expect("resolve");
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[1].data.len(), 2);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.ranges.load(Ordering::SeqCst), 3);
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let buffer = Arc::new(GrowableBuffer::new(Bytes::from(vec![1u8; 4096])));
        let inner = counting(buffer);
        let cache = Arc::new(CachingResolver::new(
            inner.clone(),
            CachePolicy::Immutable,
            "index",
        ));
        let tasks = (0..8).map(|_| {
            let cache = cache.clone();
            async move { cache.resolve(&[RangeRequest::new(0, 4095)]).await }
        });
        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.expect("resolve")[0].data.len(), 4096);
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_integrity_failure_evicts_index_cache() {
        let buffer = Arc::new(GrowableBuffer::new(Bytes::from(vec![0u8; 64])));
        let inner = counting(buffer.clone());
        let cache = CachingResolver::new(inner.clone(), CachePolicy::EvictOnIntegrity, "index");

        let pinned = RangeRequest::new(0, 15).with_expected_length(Some(64));
        cache.resolve(&[pinned]).await.expect("resolve");
        assert_eq!(cache.len(), 1);

        // A hit reporting a different length than the one the caller pinned.
        let stale = RangeRequest::new(0, 15).with_expected_length(Some(80));
        let err = cache.resolve(&[stale]).await.unwrap_err();
        assert!(err.is_integrity());
        assert!(cache.is_empty());

        buffer.append(&[1u8; 16]);
        let refreshed = cache.resolve(&[stale]).await.expect("resolve");
        assert_eq!(refreshed[0].total_length, 80);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_immutable_cache_ignores_growth() {
        let buffer = Arc::new(GrowableBuffer::new(Bytes::from(vec![0u8; 64])));
        let inner = counting(buffer.clone());
        let cache = CachingResolver::new(inner.clone(), CachePolicy::Immutable, "data");
        cache
            .resolve(&[RangeRequest::new(0, 15)])
            .await
            .expect("resolve");
        buffer.append(&[1u8; 16]);
        let hit = cache
            .resolve(&[RangeRequest::new(0, 7).with_expected_length(Some(80))])
            .await
            .expect("resolve");
        assert_eq!(hit[0].data.len(), 8);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
