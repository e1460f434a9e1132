//! On-disk format of the index file: the B+Tree node codec, memory pointers, the
//! varint codec, meta-page metadata blobs and the key encodings of indexed values.

pub mod field_type;
pub mod key;
pub mod meta;
pub mod node;
pub mod pointer;
pub mod value;
pub mod varint;

pub use field_type::FieldType;
pub use key::ReferencedValue;
pub use meta::{FileFormat, FileMeta, IndexMeta};
pub use node::{EncodedKey, EncodedNode, Node, NodeKind, decode_node};
pub use pointer::MemoryPointer;

/// Size of an index-file page. A node never spans more than one page.
pub const PAGE_SIZE: usize = 4096;

/// Size of a meta-page slot inside a page.
pub const META_SLOT_SIZE: usize = 256;

/// Offset of the metadata length prefix within a meta-page slot.
pub const META_METADATA_OFFSET: usize = 24;

/// Maximum metadata blob size that fits into a slot after the length prefix.
pub const META_MAX_METADATA_SIZE: usize = META_SLOT_SIZE - META_METADATA_OFFSET - 4;

/// Next-page offset marking the end of the meta-page chain.
pub const NULL_PAGE_OFFSET: u64 = u64::MAX;
