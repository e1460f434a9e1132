use async_trait::async_trait;
use futures::TryStreamExt;
use rangedb_common::{Result, error::Error};
use rangedb_io::{Bytes, RangeRequest, RangeResolver, RangeResponse};

use crate::{client::HttpClient, content_range::ContentRange, multipart::MultipartDecoder};

/// Options of the [`HttpRangeResolver`].
#[derive(Debug, Clone)]
pub struct HttpResolverOptions {
    /// Upper bound on the number of ranges combined into a single `Range` header.
    pub max_ranges_per_request: usize,
}

impl Default for HttpResolverOptions {
    fn default() -> Self {
        HttpResolverOptions {
            max_ranges_per_request: 64,
        }
    }
}

impl HttpResolverOptions {
    pub fn with_max_ranges_per_request(mut self, max: usize) -> Self {
        self.max_ranges_per_request = max.max(1);
        self
    }
}

/// A part of the remote resource delivered by the server.
struct Part {
    range: ContentRange,
    data: Bytes,
}

enum Reply {
    Parts(Vec<Part>),
    /// The server ignored the `Range` header and sent the whole resource.
    FullBody(Bytes),
}

/// Resolves byte ranges of a remote resource with HTTP `Range` requests.
pub struct HttpRangeResolver<C> {
    client: C,
    url: String,
    options: HttpResolverOptions,
}

impl<C: HttpClient> HttpRangeResolver<C> {
    pub fn new(client: C, url: impl Into<String>) -> HttpRangeResolver<C> {
        HttpRangeResolver::with_options(client, url, HttpResolverOptions::default())
    }

    pub fn with_options(
        client: C,
        url: impl Into<String>,
        options: HttpResolverOptions,
    ) -> HttpRangeResolver<C> {
        HttpRangeResolver {
            client,
            url: url.into(),
            options,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, batch: &[RangeRequest]) -> Result<Reply> {
        let spec = batch
            .iter()
            .map(|r| format!("{}-{}", r.start, r.end))
            .collect::<Vec<_>>()
            .join(",");
        let headers = [("Range".to_string(), format!("bytes={spec}"))];
        let response = self.client.get(&self.url, &headers).await?;
        match response.status {
            206 => {
                let content_type = response
                    .header("content-type")
                    .unwrap_or_default()
                    .to_string();
                if content_type
                    .to_ascii_lowercase()
                    .starts_with("multipart/byteranges")
                {
                    let decoder = MultipartDecoder::new(&content_type, response.body)?;
                    let parts = decoder
                        .into_stream()
                        .map_ok(|chunk| Part {
                            range: chunk.range,
                            data: chunk.data,
                        })
                        .try_collect()
                        .await?;
                    Ok(Reply::Parts(parts))
                } else {
                    let range = response
                        .header("content-range")
                        .ok_or_else(|| Error::protocol("206 response without Content-Range"))
                        .and_then(ContentRange::parse)?;
                    let data = response.into_bytes().await?;
                    Ok(Reply::Parts(vec![Part { range, data }]))
                }
            }
            200 => Ok(Reply::FullBody(response.into_bytes().await?)),
            416 => Err(Error::protocol(format!(
                "range not satisfiable: {} bytes={spec}",
                self.url
            ))),
            status => Err(Error::io(
                self.url.clone(),
                std::io::Error::other(format!("unexpected HTTP status {status}")),
            )),
        }
    }

    fn from_parts(&self, batch: &[RangeRequest], parts: &[Part]) -> Result<Vec<RangeResponse>> {
        batch
            .iter()
            .map(|request| {
                let part = parts
                    .iter()
                    .find(|part| {
                        let last = part.range.total.map_or(u64::MAX, |t| t.saturating_sub(1));
                        part.range.start <= request.start
                            && request.end.min(last) <= part.range.end
                    })
                    .ok_or_else(|| {
                        Error::protocol(format!(
                            "no response part covers bytes {}-{}",
                            request.start, request.end
                        ))
                    })?;
                let total_length = part.range.total_or_end()?;
                request.check_integrity(&self.url, total_length)?;
                let offset = (request.start - part.range.start) as usize;
                Ok(RangeResponse {
                    data: part.data.slice_clamped(offset, request.len() as usize),
                    total_length,
                })
            })
            .collect()
    }

    fn from_full_body(&self, request: &RangeRequest, body: &Bytes) -> Result<RangeResponse> {
        let total_length = body.len() as u64;
        request.check_integrity(&self.url, total_length)?;
        Ok(RangeResponse {
            data: body.slice_clamped(request.start as usize, request.len() as usize),
            total_length,
        })
    }

    async fn fetch_batch(&self, batch: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        match self.request(batch).await? {
            Reply::Parts(parts) => self.from_parts(batch, &parts),
            Reply::FullBody(body) if batch.len() == 1 => {
                Ok(vec![self.from_full_body(&batch[0], &body)?])
            }
            Reply::FullBody(_) => {
                log::debug!(
                    "{}: server ignored a {}-range request, fetching ranges one by one",
                    self.url,
                    batch.len()
                );
                let mut responses = Vec::with_capacity(batch.len());
                for request in batch {
                    let single = std::slice::from_ref(request);
                    let response = match self.request(single).await? {
                        Reply::Parts(parts) => self.from_parts(single, &parts)?.remove(0),
                        Reply::FullBody(body) => self.from_full_body(request, &body)?,
                    };
                    responses.push(response);
                }
                Ok(responses)
            }
        }
    }
}

#[async_trait]
impl<C: HttpClient> RangeResolver for HttpRangeResolver<C> {
    async fn resolve(&self, ranges: &[RangeRequest]) -> Result<Vec<RangeResponse>> {
        let mut responses = Vec::with_capacity(ranges.len());
        for batch in ranges.chunks(self.options.max_ranges_per_request.max(1)) {
            if let Some(request) = batch.iter().find(|r| r.end < r.start) {
                return Err(Error::invalid_arg(
                    "ranges",
                    format!("inverted range {}-{}", request.start, request.end),
                ));
            }
            responses.extend(self.fetch_batch(batch).await?);
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::StreamExt;
    use rangedb_common::Result;
    use rangedb_io::{Bytes, RangeRequest, RangeResolver};

    use super::{HttpRangeResolver, HttpResolverOptions};
    use crate::client::{HttpClient, HttpResponse};

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Multipart,
        IgnoreRanges,
        Unsatisfiable,
    }

    struct FakeServer {
        content: Vec<u8>,
        mode: Mode,
        requests: Mutex<Vec<String>>,
    }

    impl FakeServer {
        fn new(mode: Mode) -> FakeServer {
            FakeServer {
                content: (0..2000u32).map(|i| (i % 256) as u8).collect(),
                mode,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn body(parts: Vec<u8>) -> futures::stream::BoxStream<'static, std::io::Result<Bytes>> {
            let chunks: Vec<std::io::Result<Bytes>> = parts
                .chunks(100)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            futures::stream::iter(chunks).boxed()
        }

        fn slice(&self, start: u64, end: u64) -> &[u8] {
            let end = (end as usize).min(self.content.len() - 1);
            &self.content[start as usize..=end]
        }
    }

    #[async_trait]
    impl HttpClient for FakeServer {
        async fn get(&self, _url: &str, headers: &[(String, String)]) -> Result<HttpResponse> {
            let range = headers[0].1.trim_start_matches("bytes=").to_string();
            self.requests.lock().expect("lock").push(range.clone());
            let total = self.content.len();
            let ranges: Vec<(u64, u64)> = range
                .split(',')
                .map(|r| {
                    let (a, b) = r.split_once('-').expect("range");
                    (a.parse().expect("start"), b.parse().expect("end"))
                })
                .collect();
            match self.mode {
                Mode::Unsatisfiable => Ok(HttpResponse {
                    status: 416,
                    headers: vec![],
                    body: Self::body(vec![]),
                }),
                Mode::IgnoreRanges if ranges.len() > 1 => Ok(HttpResponse {
                    status: 200,
                    headers: vec![],
                    body: Self::body(self.content.clone()),
                }),
                _ if ranges.len() == 1 => {
                    let (start, end) = ranges[0];
                    let data = self.slice(start, end).to_vec();
                    let end = start + data.len() as u64 - 1;
                    Ok(HttpResponse {
                        status: 206,
                        headers: vec![(
                            "Content-Range".to_string(),
                            format!("bytes {start}-{end}/{total}"),
                        )],
                        body: Self::body(data),
                    })
                }
                _ => {
                    let mut body = Vec::new();
                    // Parts in reverse order: matching must not rely on ordering.
                    for &(start, end) in ranges.iter().rev() {
                        let data = self.slice(start, end);
                        let end = start + data.len() as u64 - 1;
                        body.extend_from_slice(b"--SEP\r\n");
                        body.extend_from_slice(
                            format!("Content-Range: bytes {start}-{end}/{total}\r\n\r\n")
                                .as_bytes(),
                        );
                        body.extend_from_slice(data);
                        body.extend_from_slice(b"\r\n");
                    }
                    body.extend_from_slice(b"--SEP--\r\n");
                    Ok(HttpResponse {
                        status: 206,
                        headers: vec![(
                            "Content-Type".to_string(),
                            "multipart/byteranges; boundary=SEP".to_string(),
                        )],
                        body: Self::body(body),
                    })
                }
            }
        }
    }

    fn requests() -> Vec<RangeRequest> {
        vec![
            RangeRequest::new(0, 9),
            RangeRequest::new(1000, 1099),
            RangeRequest::new(1990, 2100),
        ]
    }

    #[tokio::test]
    async fn test_multipart_response() {
        let resolver = HttpRangeResolver::new(FakeServer::new(Mode::Multipart), "http://x/idx");
        let responses = resolver.resolve(&requests()).await.expect("resolve");
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].data.as_ref(), &(0u8..10).collect::<Vec<_>>()[..]);
        assert_eq!(responses[1].data[0], (1000 % 256) as u8);
        assert_eq!(responses[1].data.len(), 100);
        assert_eq!(responses[2].data.len(), 10);
        assert!(responses.iter().all(|r| r.total_length == 2000));
    }

    #[tokio::test]
    async fn test_full_body_fallback_refetches_each_range() {
        let server = FakeServer::new(Mode::IgnoreRanges);
        let resolver = HttpRangeResolver::new(server, "http://x/idx");
        let responses = resolver.resolve(&requests()).await.expect("resolve");
        assert_eq!(responses[1].data.len(), 100);
        assert_eq!(resolver.client.requests.lock().expect("lock").len(), 4);
    }

    #[tokio::test]
    async fn test_unsatisfiable_is_protocol_error() {
        let resolver = HttpRangeResolver::new(FakeServer::new(Mode::Unsatisfiable), "http://x");
        let err = resolver.resolve(&requests()).await.unwrap_err();
        assert!(err.to_string().starts_with("protocol error"), "{err}");
    }

    #[tokio::test]
    async fn test_integrity_and_batching() {
        let resolver = HttpRangeResolver::with_options(
            FakeServer::new(Mode::Multipart),
            "http://x/idx",
            HttpResolverOptions::default().with_max_ranges_per_request(2),
        );
        resolver.resolve(&requests()).await.expect("resolve");
        assert_eq!(
            *resolver.client.requests.lock().expect("lock"),
            vec!["0-9,1000-1099".to_string(), "1990-2100".to_string()]
        );

        let pinned = RangeRequest::new(0, 9).with_expected_length(Some(1500));
        let err = resolver.resolve(&[pinned]).await.unwrap_err();
        assert!(err.is_integrity());
    }
}
