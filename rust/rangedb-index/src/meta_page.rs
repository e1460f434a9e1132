//! Linked meta pages.
//!
//! Slot layout (256 bytes, little-endian):
//!
//! ```text
//! [0, 12)    root pointer of the slot's tree (MemoryPointer)
//! [12, 20)   offset of the next slot in the chain, u64::MAX at the end
//! [20, 24)   reserved
//! [24, 28)   metadata length
//! [28, ..)   metadata bytes
//! ```

use std::sync::Arc;

use rangedb_common::{Result, error::Error};
use rangedb_format::{
    META_MAX_METADATA_SIZE, META_METADATA_OFFSET, META_SLOT_SIZE, MemoryPointer, NULL_PAGE_OFFSET,
};
use rangedb_io::Bytes;

use crate::RemoteFile;

const NEXT_OFFSET: usize = MemoryPointer::ENCODED_SIZE;
const METADATA_START: usize = META_METADATA_OFFSET + 4;

fn read_u64(buf: &[u8], pos: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[pos..pos + 8]);
    u64::from_le_bytes(bytes)
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

/// Contents of a meta-page slot, read in one request.
#[derive(Debug, Clone)]
pub struct MetaSlot {
    pub root: MemoryPointer,
    pub next: Option<u64>,
    pub metadata: Bytes,
}

impl MetaSlot {
    pub fn decode(offset: u64, buf: &Bytes) -> Result<MetaSlot> {
        if buf.len() < METADATA_START {
            return Err(Error::malformed_meta(format!(
                "meta page at {offset} truncated to {} bytes",
                buf.len()
            )));
        }
        let root = MemoryPointer::decode(&buf[..MemoryPointer::ENCODED_SIZE])
            .map_err(|_| Error::malformed_meta(format!("invalid root pointer at {offset}")))?;
        let next = read_u64(buf, NEXT_OFFSET);
        let len = read_u32(buf, META_METADATA_OFFSET) as usize;
        if len > META_MAX_METADATA_SIZE || METADATA_START + len > buf.len() {
            return Err(Error::malformed_meta(format!(
                "metadata of {len} bytes does not fit the meta page at {offset}"
            )));
        }
        Ok(MetaSlot {
            root,
            next: (next != NULL_PAGE_OFFSET).then_some(next),
            metadata: buf.slice(METADATA_START..METADATA_START + len),
        })
    }
}

/// A handle to one slot of the meta-page chain. Every accessor performs I/O.
#[derive(Clone)]
pub struct LinkedMetaPage {
    file: Arc<RemoteFile>,
    offset: u64,
}

impl LinkedMetaPage {
    pub fn new(file: Arc<RemoteFile>, offset: u64) -> LinkedMetaPage {
        LinkedMetaPage { file, offset }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Root pointer of the tree described by this page.
    pub async fn root(&self) -> Result<MemoryPointer> {
        let buf = self
            .file
            .read(self.offset, MemoryPointer::ENCODED_SIZE as u64)
            .await?;
        MemoryPointer::decode(&buf).map_err(|_| {
            Error::malformed_meta(format!("meta page at {} has no root pointer", self.offset))
        })
    }

    /// The next page of the chain, `None` at its end.
    pub async fn next(&self) -> Result<Option<LinkedMetaPage>> {
        let buf = self.file.read(self.offset + NEXT_OFFSET as u64, 8).await?;
        if buf.len() < 8 {
            return Err(Error::malformed_meta(format!(
                "meta page at {} has no next offset",
                self.offset
            )));
        }
        let next = read_u64(&buf, 0);
        Ok((next != NULL_PAGE_OFFSET).then(|| LinkedMetaPage::new(self.file.clone(), next)))
    }

    /// The metadata blob stored in this page.
    pub async fn metadata(&self) -> Result<Bytes> {
        let header = self
            .file
            .read(self.offset + META_METADATA_OFFSET as u64, 4)
            .await?;
        if header.len() < 4 {
            return Err(Error::malformed_meta(format!(
                "meta page at {} has no metadata length",
                self.offset
            )));
        }
        let len = read_u32(&header, 0) as usize;
        if len > META_MAX_METADATA_SIZE {
            return Err(Error::malformed_meta(format!(
                "metadata of {len} bytes exceeds the meta page at {}",
                self.offset
            )));
        }
        let data = self
            .file
            .read(self.offset + METADATA_START as u64, len as u64)
            .await?;
        if data.len() != len {
            return Err(Error::malformed_meta(format!(
                "metadata at {} truncated to {} of {len} bytes",
                self.offset,
                data.len()
            )));
        }
        Ok(data)
    }

    /// Reads the whole slot with a single request.
    pub async fn snapshot(&self) -> Result<MetaSlot> {
        let buf = self.file.read(self.offset, META_SLOT_SIZE as u64).await?;
        MetaSlot::decode(self.offset, &buf)
    }
}
