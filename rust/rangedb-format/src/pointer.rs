use rangedb_common::{Result, error::Error};

/// A byte span inside the data file or the index file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryPointer {
    pub offset: u64,
    pub length: u32,
}

impl MemoryPointer {
    /// Encoded size: 8-byte offset followed by a 4-byte length, little-endian.
    pub const ENCODED_SIZE: usize = 12;

    /// Greatest possible pointer; used as an upper sentinel in key comparisons.
    pub const MAX: MemoryPointer = MemoryPointer {
        offset: u64::MAX,
        length: u32::MAX,
    };

    pub const fn new(offset: u64, length: u32) -> MemoryPointer {
        MemoryPointer { offset, length }
    }

    pub fn is_null(&self) -> bool {
        self.offset == 0 && self.length == 0
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.length.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<MemoryPointer> {
        if buf.len() < Self::ENCODED_SIZE {
            return Err(Error::malformed_node(format!(
                "memory pointer needs {} bytes, {} available",
                Self::ENCODED_SIZE,
                buf.len()
            )));
        }
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&buf[..8]);
        let mut length = [0u8; 4];
        length.copy_from_slice(&buf[8..12]);
        Ok(MemoryPointer {
            offset: u64::from_le_bytes(offset),
            length: u32::from_le_bytes(length),
        })
    }
}

impl std::fmt::Display for MemoryPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}+{}]", self.offset, self.length)
    }
}
