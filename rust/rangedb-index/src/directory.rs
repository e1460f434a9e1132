//! The meta-page directory.
//!
//! The index file starts with a chain of linked meta pages: the page at offset 0 holds the
//! [`FileMeta`], and every following page describes one `(field name, field type)` tree.
//! The chain is walked once; the pages are then indexed by a skip list.

use std::sync::Arc;

use ahash::AHashSet;
use rangedb_collections::SkipList;
use rangedb_common::{Result, error::Error};
use rangedb_format::{FieldType, FileMeta, IndexMeta, MemoryPointer};
use tokio::sync::OnceCell;

use crate::{LinkedMetaPage, RemoteFile};

/// A field's meta page together with its decoded metadata.
#[derive(Clone)]
pub struct FieldPage {
    pub page: LinkedMetaPage,
    pub meta: IndexMeta,
    pub root: MemoryPointer,
}

/// An indexed field name with every type it is indexed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub field_name: String,
    pub field_types: Vec<FieldType>,
}

impl IndexHeader {
    pub fn has_type(&self, field_type: FieldType) -> bool {
        self.field_types.contains(&field_type)
    }

    /// Types of the field excluding the n-gram search trees.
    pub fn value_types(&self) -> impl Iterator<Item = FieldType> + '_ {
        self.field_types.iter().copied().filter(|t| !t.is_ngram())
    }
}

struct DirectoryState {
    file_meta: FileMeta,
    pages: Vec<FieldPage>,
    by_key: SkipList<(String, FieldType), usize>,
}

/// Locates the tree of each indexed field.
pub struct MetaDirectory {
    file: Arc<RemoteFile>,
    max_level: usize,
    state: OnceCell<DirectoryState>,
}

impl MetaDirectory {
    pub fn new(file: Arc<RemoteFile>, skip_list_max_level: usize) -> MetaDirectory {
        MetaDirectory {
            file,
            max_level: skip_list_max_level,
            state: OnceCell::new(),
        }
    }

    /// The page at offset 0, holding the file metadata.
    pub fn file_meta_page(&self) -> LinkedMetaPage {
        LinkedMetaPage::new(self.file.clone(), 0)
    }

    async fn state(&self) -> Result<&DirectoryState> {
        self.state.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<DirectoryState> {
        let head = self.file_meta_page().snapshot().await?;
        let file_meta = FileMeta::decode(&head.metadata)?;

        let mut visited = AHashSet::new();
        visited.insert(0u64);
        let mut pages = Vec::new();
        let mut by_key = SkipList::with_max_level(self.max_level);
        let mut next = head.next;
        while let Some(offset) = next {
            if !visited.insert(offset) {
                return Err(Error::malformed_meta(format!(
                    "meta page chain revisits offset {offset}"
                )));
            }
            let page = LinkedMetaPage::new(self.file.clone(), offset);
            let slot = page.snapshot().await?;
            let meta = IndexMeta::decode(&slot.metadata)?;
            let key = (meta.field_name.clone(), meta.field_type);
            if by_key.insert(key, pages.len()).is_some() {
                log::warn!(
                    "meta page at {offset} redefines field '{}' ({}), the later page wins",
                    meta.field_name,
                    meta.field_type
                );
            }
            pages.push(FieldPage {
                page,
                meta,
                root: slot.root,
            });
            next = slot.next;
        }
        log::debug!(
            "{}: loaded meta directory with {} field page(s)",
            self.file.name(),
            pages.len()
        );
        Ok(DirectoryState {
            file_meta,
            pages,
            by_key,
        })
    }

    pub async fn file_meta(&self) -> Result<FileMeta> {
        Ok(self.state().await?.file_meta.clone())
    }

    /// Finds the page of the tree indexing `field_name` under `field_type`.
    pub async fn lookup(&self, field_name: &str, field_type: FieldType) -> Result<Option<FieldPage>> {
        let state = self.state().await?;
        let found = state.by_key.find_by(|(name, ty)| {
            name.as_str()
                .cmp(field_name)
                .then_with(|| ty.cmp(&field_type))
        });
        Ok(found.map(|(_, &index)| state.pages[index].clone()))
    }

    /// Every indexed field, ordered by name, with its types in tag order.
    pub async fn headers(&self) -> Result<Vec<IndexHeader>> {
        let state = self.state().await?;
        let mut headers: Vec<IndexHeader> = Vec::new();
        for ((name, field_type), _) in state.by_key.iter() {
            match headers.last_mut() {
                Some(header) if header.field_name == *name => {
                    header.field_types.push(*field_type)
                }
                _ => headers.push(IndexHeader {
                    field_name: name.clone(),
                    field_types: vec![*field_type],
                }),
            }
        }
        Ok(headers)
    }

    /// The header of a single field.
    pub async fn header(&self, field_name: &str) -> Result<Option<IndexHeader>> {
        Ok(self
            .headers()
            .await?
            .into_iter()
            .find(|h| h.field_name == field_name))
    }

    /// Field pages in chain order.
    pub async fn pages(&self) -> Result<Vec<FieldPage>> {
        Ok(self.state().await?.pages.clone())
    }
}
