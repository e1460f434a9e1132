use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use rangedb_common::{Result, error::Error};
use rangedb_io::Bytes;

use crate::multipart::find_header;

/// A streamed HTTP response.
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: BoxStream<'static, std::io::Result<Bytes>>,
}

impl HttpResponse {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Collects the whole body into one buffer.
    pub async fn into_bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let mut first: Option<Bytes> = None;
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::io("HTTP response body", e))?;
            match first.take() {
                None if buf.is_empty() => first = Some(chunk),
                Some(prev) => {
                    buf.extend_from_slice(&prev);
                    buf.extend_from_slice(&chunk);
                }
                None => buf.extend_from_slice(&chunk),
            }
        }
        Ok(first.unwrap_or_else(|| Bytes::from(buf)))
    }
}

/// The HTTP transport used by [`HttpRangeResolver`](crate::HttpRangeResolver).
///
/// Implementations wrap a concrete HTTP client library and issue a `GET` with the given
/// request headers, streaming back the response body.
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse>;
}
