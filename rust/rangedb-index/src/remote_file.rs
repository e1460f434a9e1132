use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};

use rangedb_common::{Result, error::Error};
use rangedb_format::MemoryPointer;
use rangedb_io::{Bytes, RangeRequest, RangeResolver};

/// A remote file accessed through a [`RangeResolver`].
///
/// When created with [`RemoteFile::pinned`], the total length observed by the first
/// response is remembered and sent as the expected length of every later request, so a
/// concurrent rewrite of the file surfaces as an integrity error instead of a mix of old
/// and new pages.
///
/// An integrity failure drops the pin and advances the [`generation`](Self::generation),
/// telling holders of state derived from the file's content to discard it. The next read
/// pins the new length.
pub struct RemoteFile {
    resolver: Arc<dyn RangeResolver>,
    name: String,
    pinned_length: Option<Mutex<Option<u64>>>,
    generation: AtomicU64,
}

impl RemoteFile {
    /// A file whose length may change between requests (the append-only data file).
    pub fn unpinned(resolver: Arc<dyn RangeResolver>, name: impl Into<String>) -> RemoteFile {
        RemoteFile {
            resolver,
            name: name.into(),
            pinned_length: None,
            generation: AtomicU64::new(0),
        }
    }

    /// A file whose length is pinned on first read (the index file).
    pub fn pinned(resolver: Arc<dyn RangeResolver>, name: impl Into<String>) -> RemoteFile {
        RemoteFile {
            resolver,
            name: name.into(),
            pinned_length: Some(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolver(&self) -> &Arc<dyn RangeResolver> {
        &self.resolver
    }

    /// The length observed by the first response, if the file is pinned and was read.
    pub fn pinned_length(&self) -> Option<u64> {
        *lock(self.pinned_length.as_ref()?)
    }

    /// Number of integrity failures seen so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Forgets the pinned length after an integrity failure.
    fn unpin(&self, err: &Error) {
        if let Some(pinned) = &self.pinned_length {
            *lock(pinned) = None;
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        log::warn!("{}: {err}; re-reading from generation {generation}", self.name);
    }

    /// Reads `length` bytes at `offset`. The result is shorter at the end of the file.
    pub async fn read(&self, offset: u64, length: u64) -> Result<Bytes> {
        let mut result = self.read_spans(&[(offset, length)]).await?;
        result
            .pop()
            .ok_or_else(|| Error::protocol(format!("{}: missing range response", self.name)))
    }

    /// Reads the spans addressed by `pointers` with a single resolver call.
    pub async fn read_pointers(&self, pointers: &[MemoryPointer]) -> Result<Vec<Bytes>> {
        let spans: Vec<(u64, u64)> = pointers
            .iter()
            .map(|p| (p.offset, p.length as u64))
            .collect();
        self.read_spans(&spans).await
    }

    /// Reads `(offset, length)` spans with a single resolver call. Empty spans are
    /// answered without I/O.
    pub async fn read_spans(&self, spans: &[(u64, u64)]) -> Result<Vec<Bytes>> {
        let expected_length = self.pinned_length();
        let requests: Vec<RangeRequest> = spans
            .iter()
            .filter_map(|&(offset, length)| RangeRequest::for_span(offset, length))
            .map(|r| r.with_expected_length(expected_length))
            .collect();
        if requests.is_empty() {
            return Ok(vec![Bytes::new(); spans.len()]);
        }

        let responses = match self.resolver.resolve(&requests).await {
            Ok(responses) => responses,
            Err(e) => {
                if e.is_integrity() {
                    self.unpin(&e);
                }
                return Err(e);
            }
        };
        if responses.len() != requests.len() {
            return Err(Error::protocol(format!(
                "{}: {} responses for {} ranges",
                self.name,
                responses.len(),
                requests.len()
            )));
        }
        if let (Some(pinned), Some(first)) = (&self.pinned_length, responses.first()) {
            let observed = *lock(pinned).get_or_insert(first.total_length);
            if let Some(mismatch) = responses.iter().find(|r| r.total_length != observed) {
                let err = Error::integrity(self.name.clone(), observed, mismatch.total_length);
                self.unpin(&err);
                return Err(err);
            }
        }

        let mut responses = responses.into_iter();
        spans
            .iter()
            .map(|&(_, length)| {
                if length == 0 {
                    return Ok(Bytes::new());
                }
                responses
                    .next()
                    .map(|r| r.data)
                    .ok_or_else(|| Error::protocol(format!("{}: missing range response", self.name)))
            })
            .collect()
    }
}

fn lock(pinned: &Mutex<Option<u64>>) -> MutexGuard<'_, Option<u64>> {
    pinned.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rangedb_format::MemoryPointer;
    use rangedb_io::MemoryResolver;

    use super::RemoteFile;

    #[tokio::test]
    async fn test_read_pointers_skips_empty_spans() {
        let resolver = Arc::new(MemoryResolver::new(b"hello world".as_slice()));
        let file = RemoteFile::unpinned(resolver, "data");
        let parts = file
            .read_pointers(&[
                MemoryPointer::new(6, 5),
                MemoryPointer::new(0, 0),
                MemoryPointer::new(0, 5),
            ])
            .await
            .expect("read");
        assert_eq!(parts[0].as_ref(), b"world");
        assert!(parts[1].is_empty());
        assert_eq!(parts[2].as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_pinned_length_detects_rewrite() {
        let resolver = Arc::new(MemoryResolver::new(vec![0u8; 100]));
        let file = RemoteFile::pinned(resolver.clone(), "index");
        file.read(0, 10).await.expect("read");
        assert_eq!(file.pinned_length(), Some(100));

        resolver.append(&[1u8; 28]);
        let err = file.read(10, 10).await.unwrap_err();
        assert!(err.is_integrity());
        assert_eq!(file.generation(), 1);
        assert_eq!(file.pinned_length(), None);

        file.read(10, 10).await.expect("read after rewrite");
        assert_eq!(file.pinned_length(), Some(128));
        assert_eq!(file.generation(), 1);

        let unpinned = RemoteFile::unpinned(resolver, "data");
        assert_eq!(unpinned.read(120, 100).await.expect("read").len(), 8);
    }
}
