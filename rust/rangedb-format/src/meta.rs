//! Metadata blobs stored in meta-page slots.
//!
//! The first slot of the index file (offset 0) carries the [`FileMeta`]; every following
//! slot in the chain describes one indexed field with an [`IndexMeta`].

use rangedb_common::{Result, error::Error, verify_meta};

use crate::{
    FieldType,
    varint::{decode_uvarint, encode_uvarint},
};

/// Format of the records in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Jsonl = 0,
    Csv = 1,
}

impl FileFormat {
    pub fn from_tag(tag: u8) -> Result<FileFormat> {
        match tag {
            0 => Ok(FileFormat::Jsonl),
            1 => Ok(FileFormat::Csv),
            _ => Err(Error::malformed_meta(format!("unknown file format {tag}"))),
        }
    }
}

/// Dataset-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub version: u8,
    pub format: FileFormat,
    /// Number of data-file bytes covered by the index.
    pub read_offset: u64,
    /// Number of indexed records.
    pub entries: u64,
}

impl FileMeta {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(20);
        buf.push(self.version);
        buf.push(self.format as u8);
        buf.extend_from_slice(&self.read_offset.to_be_bytes());
        encode_uvarint(&mut buf, self.entries);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<FileMeta> {
        verify_meta!(buf.len() >= 10);
        let version = buf[0];
        let format = FileFormat::from_tag(buf[1])?;
        let mut read_offset = [0u8; 8];
        read_offset.copy_from_slice(&buf[2..10]);
        let (entries, read) = decode_uvarint(&buf[10..]);
        if read <= 0 {
            return Err(Error::malformed_meta("invalid entry count in file meta"));
        }
        Ok(FileMeta {
            version,
            format,
            read_offset: u64::from_be_bytes(read_offset),
            entries,
        })
    }
}

/// Per-tree metadata: which field, under which type, the tree indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub field_name: String,
    pub field_type: FieldType,
    /// Fixed key width hint, `0` for variable-width keys. Informational only.
    pub width: u16,
    /// Sum of the lengths of all indexed values.
    pub total_field_value_length: u64,
}

impl IndexMeta {
    pub fn encode(&self) -> Vec<u8> {
        let name = self.field_name.as_bytes();
        let mut buf = Vec::with_capacity(6 + name.len() + 10);
        buf.extend_from_slice(&self.field_type.tag().to_le_bytes());
        buf.extend_from_slice(&self.width.to_le_bytes());
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(name);
        encode_uvarint(&mut buf, self.total_field_value_length);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<IndexMeta> {
        verify_meta!(buf.len() >= 6);
        let u16_at = |pos: usize| u16::from_le_bytes([buf[pos], buf[pos + 1]]);
        let field_type = FieldType::from_tag(u16_at(0))?;
        let width = u16_at(2);
        let name_len = u16_at(4) as usize;
        let name_end = 6 + name_len;
        if buf.len() < name_end {
            return Err(Error::malformed_meta(format!(
                "field name of {name_len} bytes exceeds metadata of {} bytes",
                buf.len()
            )));
        }
        let field_name = std::str::from_utf8(&buf[6..name_end])
            .map_err(|_| Error::malformed_meta("field name is not valid UTF-8"))?
            .to_string();
        let (total_field_value_length, read) = decode_uvarint(&buf[name_end..]);
        if read <= 0 {
            return Err(Error::malformed_meta(format!(
                "invalid value length for field '{field_name}'"
            )));
        }
        Ok(IndexMeta {
            field_name,
            field_type,
            width,
            total_field_value_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{FileFormat, FileMeta, IndexMeta};
    use crate::FieldType;

    #[test]
    fn test_file_meta_layout() {
        let meta = FileMeta {
            version: 1,
            format: FileFormat::Csv,
            read_offset: 0x0102,
            entries: 300,
        };
        let buf = meta.encode();
        assert_eq!(&buf[..10], &[1, 1, 0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(&buf[10..], &[0xac, 0x02]);
        assert_eq!(FileMeta::decode(&buf).expect("decode"), meta);
        assert!(FileMeta::decode(&buf[..11]).is_err());
        assert!(FileMeta::decode(&[1, 7, 0, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_index_meta() {
        let meta = IndexMeta {
            field_name: "address.city".to_string(),
            field_type: FieldType::String,
            width: 0,
            total_field_value_length: 1234,
        };
        let buf = meta.encode();
        assert_eq!(IndexMeta::decode(&buf).expect("decode"), meta);
        assert!(IndexMeta::decode(&buf[..8]).is_err());
        assert!(IndexMeta::decode(&buf[..buf.len() - 1]).is_err());
    }
}
