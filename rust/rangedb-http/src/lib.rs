//! HTTP range transport: the multipart/byteranges decoder and a [`RangeResolver`]
//! implementation over an abstract HTTP client.
//!
//! [`RangeResolver`]: rangedb_io::RangeResolver

pub mod client;
pub mod content_range;
pub mod multipart;
pub mod resolver;
pub mod ring_buffer;

pub use client::{HttpClient, HttpResponse};
pub use content_range::ContentRange;
pub use multipart::{MultipartChunk, MultipartDecoder, parse_boundary};
pub use resolver::{HttpRangeResolver, HttpResolverOptions};
pub use ring_buffer::RingBuffer;

/// Capacity of the scratch buffer used to decode multipart bodies.
pub const MULTIPART_BUFFER_SIZE: usize = 4096;
