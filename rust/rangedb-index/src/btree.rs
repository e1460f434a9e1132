//! B+Tree reader over a remote index file.

use std::sync::Arc;

use rangedb_common::{Result, error::Error};
use rangedb_format::{MemoryPointer, Node, PAGE_SIZE, ReferencedValue, decode_node};
use tokio::sync::OnceCell;

use crate::{
    LinkedMetaPage, RemoteFile,
    cursor::{Frame, TreeCursor, TreeEntry},
};

/// Trees deeper than this are treated as corrupt (a child pointer cycle).
const MAX_DEPTH: usize = 64;

/// Where a descent positions the cursor.
#[derive(Clone, Copy)]
pub(crate) enum Seek<'a> {
    /// Before the first entry not less than the key.
    Lower(&'a ReferencedValue),
    /// After the last entry not greater than the key.
    Upper(&'a ReferencedValue),
    First,
    Last,
}

#[derive(Clone)]
struct Root {
    pointer: MemoryPointer,
    node: Arc<Node>,
}

struct TreeInner {
    meta: LinkedMetaPage,
    known_root: Option<MemoryPointer>,
    index: Arc<RemoteFile>,
    data: Arc<RemoteFile>,
    root: OnceCell<Option<Root>>,
}

/// A read-only B+Tree stored in the index file.
///
/// `BPTree` resolves its root lazily from the meta page that describes it, and loads
/// nodes on demand: one page read per node plus one batched data-file read for the
/// out-of-line keys of that node. The root pointer and the decoded root node are
/// memoized; concurrent first callers share a single load.
///
/// ## Key order
///
/// Keys are [`ReferencedValue`]s: value bytes compared lexicographically (shorter first
/// on equal prefixes), ties broken by the key's data-file pointer. The same value may
/// occur in many entries, possibly spread over several leaves.
///
/// ## Routing
///
/// Internal node keys are separators: the `i`-th key is not greater than any entry of the
/// child at `i + 1`, and not less than any entry of the child at `i`. An exact lookup
/// ([`find`](Self::find)) descends right on ties; cursor seeks descend to the leftmost
/// (or rightmost) child that can contain the sought position and rely on the cursor's
/// rollover to cross leaf boundaries.
///
/// ## Cloning
///
/// The tree is a cheap handle; clones share the memoized root.
#[derive(Clone)]
pub struct BPTree {
    inner: Arc<TreeInner>,
}

impl BPTree {
    /// Creates a tree described by `meta`, reading nodes from `index` and out-of-line
    /// keys from `data`.
    pub fn new(meta: LinkedMetaPage, index: Arc<RemoteFile>, data: Arc<RemoteFile>) -> BPTree {
        BPTree::with_root(meta, None, index, data)
    }

    /// Same as [`new`](Self::new), with the root pointer already known (e.g. read along
    /// with the meta page), which saves one request.
    pub fn with_root(
        meta: LinkedMetaPage,
        root: Option<MemoryPointer>,
        index: Arc<RemoteFile>,
        data: Arc<RemoteFile>,
    ) -> BPTree {
        BPTree {
            inner: Arc::new(TreeInner {
                meta,
                known_root: root,
                index,
                data,
                root: OnceCell::new(),
            }),
        }
    }

    pub fn meta_page(&self) -> &LinkedMetaPage {
        &self.inner.meta
    }

    /// Returns the root node and its pointer, or `None` for an empty tree.
    ///
    /// # Errors
    ///
    /// Fails if the meta page or the root node cannot be read or decoded.
    pub async fn root(&self) -> Result<Option<(MemoryPointer, Arc<Node>)>> {
        let root = self
            .inner
            .root
            .get_or_try_init(|| async {
                let pointer = match self.inner.known_root {
                    Some(pointer) => pointer,
                    None => self.inner.meta.root().await?,
                };
                if pointer.is_null() {
                    return Ok::<_, Error>(None);
                }
                let node = self.load_node(pointer).await?;
                Ok(Some(Root { pointer, node }))
            })
            .await?;
        Ok(root.as_ref().map(|r| (r.pointer, r.node.clone())))
    }

    /// Loads and decodes the node at `pointer`.
    pub async fn load_node(&self, pointer: MemoryPointer) -> Result<Arc<Node>> {
        let page = self.inner.index.read(pointer.offset, PAGE_SIZE as u64).await?;
        if page.is_empty() {
            return Err(Error::malformed_node(format!(
                "node offset {} is beyond the end of {}",
                pointer.offset,
                self.inner.index.name()
            )));
        }
        let (encoded, size) = decode_node(&page)?;
        let external = encoded.external_keys();
        let fetched = if external.is_empty() {
            Vec::new()
        } else {
            self.inner.data.read_pointers(&external).await?
        };
        log::trace!(
            "loaded node at {} ({size} bytes, {} external keys)",
            pointer.offset,
            external.len()
        );
        Ok(Arc::new(encoded.resolve(&fetched)?))
    }

    /// Descends from the root to a leaf, returning the frame stack leaf first.
    /// An empty tree yields an empty stack.
    pub(crate) async fn descend(&self, seek: Seek<'_>) -> Result<Vec<Frame>> {
        let Some((mut pointer, mut node)) = self.root().await? else {
            return Ok(Vec::new());
        };
        let mut frames = Vec::new();
        loop {
            if node.is_leaf() {
                let index = match seek {
                    Seek::Lower(key) => node.lower_bound(key),
                    Seek::Upper(key) => node.upper_bound(key),
                    Seek::First => 0,
                    Seek::Last => node.len(),
                };
                frames.push(Frame {
                    node,
                    index,
                    pointer,
                });
                break;
            }
            if frames.len() >= MAX_DEPTH {
                return Err(Error::malformed_node(format!(
                    "tree deeper than {MAX_DEPTH} levels"
                )));
            }
            let index = match seek {
                Seek::Lower(key) => node.lower_bound(key),
                Seek::Upper(key) => node.upper_bound(key),
                Seek::First => 0,
                Seek::Last => node.num_pointers() - 1,
            };
            let child = node.child(index).ok_or_else(|| {
                Error::malformed_node(format!("missing child {index} at {}", pointer.offset))
            })?;
            frames.push(Frame {
                node,
                index,
                pointer,
            });
            node = self.load_node(child).await?;
            pointer = child;
        }
        frames.reverse();
        Ok(frames)
    }

    /// Looks up the entry whose key equals `key` exactly.
    ///
    /// Internal nodes route to the child following the first separator greater than the
    /// key; the leaf is then binary searched.
    pub async fn find(&self, key: &ReferencedValue) -> Result<Option<TreeEntry>> {
        let frames = self.descend(Seek::Upper(key)).await?;
        let Some(leaf) = frames.first() else {
            return Ok(None);
        };
        let index = leaf.node.bsearch(key);
        Ok(if index >= 0 {
            leaf.node.entry(index as usize)
        } else {
            None
        })
    }

    /// A cursor positioned before the first entry not less than `key`.
    pub async fn iter(&self, key: &ReferencedValue) -> Result<TreeCursor> {
        Ok(TreeCursor::new(self.clone(), self.descend(Seek::Lower(key)).await?))
    }

    /// A cursor positioned after the last entry not greater than `key`.
    pub async fn iter_after(&self, key: &ReferencedValue) -> Result<TreeCursor> {
        Ok(TreeCursor::new(self.clone(), self.descend(Seek::Upper(key)).await?))
    }

    /// A cursor positioned before the first entry of the tree.
    pub async fn iter_first(&self) -> Result<TreeCursor> {
        Ok(TreeCursor::new(self.clone(), self.descend(Seek::First).await?))
    }

    /// A cursor positioned after the last entry of the tree.
    pub async fn iter_last(&self) -> Result<TreeCursor> {
        Ok(TreeCursor::new(self.clone(), self.descend(Seek::Last).await?))
    }

    /// The smallest entry of the tree.
    pub async fn first(&self) -> Result<Option<TreeEntry>> {
        self.iter_first().await?.next().await
    }

    /// The greatest entry of the tree.
    pub async fn last(&self) -> Result<Option<TreeEntry>> {
        self.iter_last().await?.prev().await
    }
}
