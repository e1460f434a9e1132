/// A fixed-capacity circular byte buffer.
///
/// Bytes are appended at the write position and removed from the read cursor. All
/// wraparound arithmetic lives in [`RingBuffer::physical`] and [`RingBuffer::segments`];
/// callers address the buffered bytes by logical index `0..len()`.
pub struct RingBuffer<const N: usize> {
    buf: Box<[u8]>,
    read_cursor: usize,
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    pub fn new() -> RingBuffer<N> {
        assert!(N > 0, "ring buffer capacity must be positive");
        RingBuffer {
            buf: vec![0u8; N].into_boxed_slice(),
            read_cursor: 0,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Number of bytes that can still be written.
    pub fn free(&self) -> usize {
        N - self.len
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    #[inline]
    fn physical(&self, index: usize) -> usize {
        (self.read_cursor + index) % N
    }

    /// Returns the byte at logical position `index`, counted from the read cursor.
    pub fn get(&self, index: usize) -> Option<u8> {
        (index < self.len).then(|| self.buf[self.physical(index)])
    }

    /// Returns `true` if the buffered bytes start with `prefix`.
    pub fn peek(&self, prefix: &[u8]) -> bool {
        prefix.len() <= self.len
            && prefix
                .iter()
                .enumerate()
                .all(|(i, &b)| self.buf[self.physical(i)] == b)
    }

    /// Returns the logical position of the first occurrence of `needle`.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len {
            return None;
        }
        (0..=self.len - needle.len()).find(|&start| {
            needle
                .iter()
                .enumerate()
                .all(|(i, &b)| self.buf[self.physical(start + i)] == b)
        })
    }

    /// The first `n` buffered bytes as (at most) two contiguous slices.
    fn segments(&self, n: usize) -> (&[u8], &[u8]) {
        let n = n.min(self.len);
        let head = (N - self.read_cursor).min(n);
        (
            &self.buf[self.read_cursor..self.read_cursor + head],
            &self.buf[..n - head],
        )
    }

    /// Appends as much of `src` as fits and returns the number of bytes written.
    pub fn write_from(&mut self, src: &[u8]) -> usize {
        let n = src.len().min(self.free());
        let write_pos = self.physical(self.len);
        let head = (N - write_pos).min(n);
        self.buf[write_pos..write_pos + head].copy_from_slice(&src[..head]);
        self.buf[..n - head].copy_from_slice(&src[head..n]);
        self.len += n;
        n
    }

    /// Appends the first `n` buffered bytes to `out` without consuming them.
    pub fn copy_out(&self, n: usize, out: &mut Vec<u8>) {
        let (a, b) = self.segments(n);
        out.extend_from_slice(a);
        out.extend_from_slice(b);
    }

    /// Drops up to `n` bytes from the read cursor.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.read_cursor = self.physical(n);
        self.len -= n;
        if self.len == 0 {
            self.read_cursor = 0;
        }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        RingBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::RingBuffer;

    #[test]
    fn test_wraparound() {
        let mut ring = RingBuffer::<8>::new();
        assert_eq!(ring.write_from(b"abcdef"), 6);
        ring.consume(4);
        assert_eq!(ring.read_cursor(), 4);
        // Wraps past the physical end of the buffer.
        assert_eq!(ring.write_from(b"ghijklmn"), 6);
        assert!(ring.is_full());

        let mut out = Vec::new();
        ring.copy_out(8, &mut out);
        assert_eq!(out, b"efghijkl");
        assert_eq!(ring.get(3), Some(b'h'));
        assert_eq!(ring.get(8), None);
        assert!(ring.peek(b"efgh"));
        assert_eq!(ring.find(b"hij"), Some(3));
        assert_eq!(ring.find(b"xyz"), None);
    }

    #[test]
    fn test_consume_resets_cursor() {
        let mut ring = RingBuffer::<4>::new();
        ring.write_from(b"abc");
        ring.consume(10);
        assert!(ring.is_empty());
        assert_eq!(ring.read_cursor(), 0);
        assert_eq!(ring.free(), 4);
    }
}
