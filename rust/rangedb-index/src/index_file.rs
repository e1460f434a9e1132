use std::sync::{Arc, Mutex, MutexGuard};

use ahash::AHashMap;
use rangedb_collections::skip_list::DEFAULT_MAX_LEVEL;
use rangedb_common::Result;
use rangedb_format::{FieldType, FileMeta};
use rangedb_io::RangeResolver;

use crate::{BPTree, IndexHeader, MetaDirectory, RemoteFile};

/// Options of an [`IndexFile`].
#[derive(Debug, Clone)]
pub struct IndexFileOptions {
    pub skip_list_max_level: usize,
}

impl Default for IndexFileOptions {
    fn default() -> Self {
        IndexFileOptions {
            skip_list_max_level: DEFAULT_MAX_LEVEL,
        }
    }
}

/// Content-derived state of one generation of the index file.
struct Snapshot {
    generation: u64,
    directory: Arc<MetaDirectory>,
    trees: Mutex<AHashMap<(String, FieldType), BPTree>>,
}

/// An opened index file together with the data file its trees point into.
///
/// The meta directory and one [`BPTree`] per `(field, type)` are memoized for the
/// lifetime of the handle, so tree roots are decoded once and shared by concurrent
/// queries. When a read fails the integrity check, the memoized state is dropped and
/// rebuilt from the file on the next call.
pub struct IndexFile {
    index: Arc<RemoteFile>,
    data: Arc<RemoteFile>,
    options: IndexFileOptions,
    snapshot: Mutex<Arc<Snapshot>>,
}

impl IndexFile {
    /// Opens the index. No I/O happens until the first operation.
    ///
    /// The index file's length is pinned on first read; the data file may keep growing.
    pub fn open(
        index: Arc<dyn RangeResolver>,
        data: Arc<dyn RangeResolver>,
        options: IndexFileOptions,
    ) -> IndexFile {
        let index = Arc::new(RemoteFile::pinned(index, "index"));
        let data = Arc::new(RemoteFile::unpinned(data, "data"));
        let snapshot = Arc::new(Snapshot {
            generation: index.generation(),
            directory: Arc::new(MetaDirectory::new(
                index.clone(),
                options.skip_list_max_level,
            )),
            trees: Mutex::new(AHashMap::new()),
        });
        IndexFile {
            index,
            data,
            options,
            snapshot: Mutex::new(snapshot),
        }
    }

    /// The state of the current generation, rebuilt if an integrity failure was seen
    /// since it was created.
    fn snapshot(&self) -> Arc<Snapshot> {
        let generation = self.index.generation();
        let mut snapshot = self.snapshot.lock().unwrap_or_else(|e| e.into_inner());
        if snapshot.generation != generation {
            log::debug!(
                "{}: dropping directory and trees of generation {}",
                self.index.name(),
                snapshot.generation
            );
            *snapshot = Arc::new(Snapshot {
                generation,
                directory: Arc::new(MetaDirectory::new(
                    self.index.clone(),
                    self.options.skip_list_max_level,
                )),
                trees: Mutex::new(AHashMap::new()),
            });
        }
        snapshot.clone()
    }

    pub fn directory(&self) -> Arc<MetaDirectory> {
        self.snapshot().directory.clone()
    }

    pub fn index_file(&self) -> &Arc<RemoteFile> {
        &self.index
    }

    pub fn data_file(&self) -> &Arc<RemoteFile> {
        &self.data
    }

    pub async fn file_meta(&self) -> Result<FileMeta> {
        self.directory().file_meta().await
    }

    pub async fn headers(&self) -> Result<Vec<IndexHeader>> {
        self.directory().headers().await
    }

    /// The tree indexing `field_name` under `field_type`, if there is one.
    pub async fn tree(&self, field_name: &str, field_type: FieldType) -> Result<Option<BPTree>> {
        let snapshot = self.snapshot();
        let key = (field_name.to_string(), field_type);
        let cached = lock_trees(&snapshot).get(&key).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        let Some(field) = snapshot.directory.lookup(field_name, field_type).await? else {
            return Ok(None);
        };
        let tree = lock_trees(&snapshot)
            .entry(key)
            .or_insert_with(|| {
                BPTree::with_root(
                    field.page,
                    Some(field.root),
                    self.index.clone(),
                    self.data.clone(),
                )
            })
            .clone();
        Ok(Some(tree))
    }
}

fn lock_trees(snapshot: &Snapshot) -> MutexGuard<'_, AHashMap<(String, FieldType), BPTree>> {
    snapshot.trees.lock().unwrap_or_else(|e| e.into_inner())
}
