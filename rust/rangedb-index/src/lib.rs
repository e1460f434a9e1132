//! Read path of the index file: the linked meta-page directory that locates each
//! field's tree, and the B+Tree traversal engine with its bidirectional cursor.

pub mod btree;
pub mod cursor;
pub mod directory;
pub mod index_file;
pub mod meta_page;
pub mod remote_file;

pub use btree::BPTree;
pub use cursor::{TreeCursor, TreeEntry};
pub use directory::{FieldPage, IndexHeader, MetaDirectory};
pub use index_file::{IndexFile, IndexFileOptions};
pub use meta_page::{LinkedMetaPage, MetaSlot};
pub use remote_file::RemoteFile;
