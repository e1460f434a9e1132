//! Incremental `multipart/byteranges` decoding.
//!
//! The body is pulled from the source stream into a fixed-size [`RingBuffer`]. Header
//! lines and boundary tokens must fit into the buffer; part payloads are streamed
//! through it and may be arbitrarily large.

use futures::{Stream, StreamExt};
use rangedb_common::{Result, error::Error};
use rangedb_io::Bytes;

use crate::{MULTIPART_BUFFER_SIZE, content_range::ContentRange, ring_buffer::RingBuffer};

const CRLF: &[u8] = b"\r\n";

/// Extracts the boundary parameter of a `multipart/byteranges` content type.
pub fn parse_boundary(content_type: &str) -> Result<String> {
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("multipart/byteranges") {
        return Err(Error::protocol(format!(
            "expected multipart/byteranges content, got '{content_type}'"
        )));
    }
    params
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or_else(|| Error::protocol(format!("missing boundary in '{content_type}'")))
}

/// One decoded body part.
#[derive(Debug, Clone)]
pub struct MultipartChunk {
    pub data: Bytes,
    /// Part headers in arrival order, names as sent, values trimmed.
    pub headers: Vec<(String, String)>,
    pub range: ContentRange,
}

impl MultipartChunk {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Parts,
    Done,
}

/// Turns a multipart/byteranges body into a sequence of [`MultipartChunk`]s.
pub struct MultipartDecoder<S> {
    source: S,
    source_done: bool,
    pending: Bytes,
    delimiter: Vec<u8>,
    ring: RingBuffer<MULTIPART_BUFFER_SIZE>,
    state: State,
}

impl<S> MultipartDecoder<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin + Send,
{
    /// Creates a decoder for a body declared with `content_type`.
    ///
    /// # Errors
    ///
    /// Fails with a protocol error if the content type is not `multipart/byteranges`
    /// or carries no boundary.
    pub fn new(content_type: &str, source: S) -> Result<MultipartDecoder<S>> {
        let boundary = parse_boundary(content_type)?;
        let mut delimiter = b"--".to_vec();
        delimiter.extend_from_slice(boundary.as_bytes());
        if delimiter.len() + CRLF.len() > MULTIPART_BUFFER_SIZE {
            return Err(Error::protocol("multipart boundary exceeds buffer capacity"));
        }
        Ok(MultipartDecoder {
            source,
            source_done: false,
            pending: Bytes::new(),
            delimiter,
            ring: RingBuffer::new(),
            state: State::Start,
        })
    }

    /// Decodes the next part, or returns `None` once the closing delimiter was read.
    pub async fn next_chunk(&mut self) -> Result<Option<MultipartChunk>> {
        match self.state {
            State::Done => return Ok(None),
            State::Start => {
                self.ensure(CRLF.len()).await?;
                if self.ring.peek(CRLF) {
                    self.ring.consume(CRLF.len());
                }
                self.state = State::Parts;
            }
            State::Parts => (),
        }

        let delimiter = std::mem::take(&mut self.delimiter);
        let matched = self.expect(&delimiter, "boundary").await;
        self.delimiter = delimiter;
        matched?;

        self.ensure(2).await?;
        if self.ring.peek(b"--") {
            self.ring.consume(2);
            self.state = State::Done;
            return Ok(None);
        }
        self.expect(CRLF, "CRLF after boundary").await?;

        let mut headers = Vec::new();
        loop {
            let line = self.read_line().await?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::protocol(format!("invalid part header '{line}'")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let range = find_header(&headers, "content-range")
            .ok_or_else(|| Error::protocol("part without Content-Range header"))
            .and_then(ContentRange::parse)?;
        let data = self.read_payload(range.payload_len()?).await?;
        self.expect(CRLF, "CRLF after part payload").await?;

        Ok(Some(MultipartChunk {
            data,
            headers,
            range,
        }))
    }

    /// Converts the decoder into a lazy stream of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<MultipartChunk>> + Send
    where
        S: 'static,
    {
        futures::stream::try_unfold(self, |mut decoder| async move {
            Ok(decoder.next_chunk().await?.map(|chunk| (chunk, decoder)))
        })
    }

    /// Moves more bytes into the ring buffer. Returns `false` at the end of the body.
    async fn fill(&mut self) -> Result<bool> {
        if self.ring.is_full() {
            return Err(Error::protocol(
                "multipart element exceeds decoder buffer capacity",
            ));
        }
        loop {
            if !self.pending.is_empty() {
                let written = self.ring.write_from(&self.pending);
                self.pending = self.pending.slice(written..);
                return Ok(true);
            }
            if self.source_done {
                return Ok(false);
            }
            match self.source.next().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(Error::io("multipart body", e)),
                None => self.source_done = true,
            }
        }
    }

    /// Makes at least `n` bytes available in the ring buffer.
    async fn ensure(&mut self, n: usize) -> Result<()> {
        if n > self.ring.capacity() {
            return Err(Error::protocol(
                "multipart element exceeds decoder buffer capacity",
            ));
        }
        while self.ring.len() < n {
            if !self.fill().await? {
                return Err(Error::protocol("unexpected end of multipart body"));
            }
        }
        Ok(())
    }

    async fn expect(&mut self, literal: &[u8], what: &str) -> Result<()> {
        self.ensure(literal.len()).await?;
        if !self.ring.peek(literal) {
            return Err(Error::protocol(format!("expected {what} in multipart body")));
        }
        self.ring.consume(literal.len());
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String> {
        loop {
            if let Some(pos) = self.ring.find(CRLF) {
                let mut line = Vec::with_capacity(pos);
                self.ring.copy_out(pos, &mut line);
                self.ring.consume(pos + CRLF.len());
                return String::from_utf8(line)
                    .map_err(|_| Error::protocol("non UTF-8 part header"));
            }
            if !self.fill().await? {
                return Err(Error::protocol("unexpected end of multipart headers"));
            }
        }
    }

    /// Reads a payload of the length declared by the part header. The buffer grows as
    /// bytes arrive, so a bogus length fails at the end of the body, not on allocation.
    async fn read_payload(&mut self, len: u64) -> Result<Bytes> {
        let len = usize::try_from(len)
            .map_err(|_| Error::protocol("multipart part too large for this platform"))?;
        let mut data = Vec::with_capacity(len.min(MULTIPART_BUFFER_SIZE));
        while data.len() < len {
            if self.ring.is_empty() && !self.fill().await? {
                return Err(Error::protocol("unexpected end of multipart payload"));
            }
            let n = (len - data.len()).min(self.ring.len());
            self.ring.copy_out(n, &mut data);
            self.ring.consume(n);
        }
        Ok(Bytes::from(data))
    }
}
