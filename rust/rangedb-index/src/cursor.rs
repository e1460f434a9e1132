use std::sync::Arc;

use rangedb_common::{Result, error::Error};
use rangedb_format::{MemoryPointer, Node, ReferencedValue};

use crate::BPTree;

/// A leaf entry: the key and the data-file location of its record.
pub type TreeEntry = (ReferencedValue, MemoryPointer);

/// One level of the path from a leaf to the root.
///
/// For internal nodes `index` is the child the path descends into. For the leaf it is the
/// cursor position, between entries, in `0..=len`.
pub(crate) struct Frame {
    pub(crate) node: Arc<Node>,
    pub(crate) index: usize,
    pub(crate) pointer: MemoryPointer,
}

/// A bidirectional cursor over the entries of a [`BPTree`].
///
/// The cursor sits between two entries. [`next`](Self::next) returns the entry after the
/// position and moves past it; [`prev`](Self::prev) returns the entry before the position
/// and moves before it. When the position leaves a leaf, the cursor climbs to the lowest
/// ancestor that has a sibling subtree in that direction and re-descends along its edge,
/// so stepping never repeats a root-to-leaf search.
pub struct TreeCursor {
    tree: BPTree,
    /// Leaf first; empty for an empty tree.
    frames: Vec<Frame>,
}

impl TreeCursor {
    pub(crate) fn new(tree: BPTree, frames: Vec<Frame>) -> TreeCursor {
        TreeCursor { tree, frames }
    }

    pub fn tree(&self) -> &BPTree {
        &self.tree
    }

    /// Index-file location of the leaf the cursor is in.
    pub fn leaf_pointer(&self) -> Option<MemoryPointer> {
        self.frames.first().map(|f| f.pointer)
    }

    /// Returns the next entry in key order, or `None` past the last entry.
    pub async fn next(&mut self) -> Result<Option<TreeEntry>> {
        loop {
            let Some(leaf) = self.frames.first_mut() else {
                return Ok(None);
            };
            if leaf.index < leaf.node.len() {
                let entry = leaf.node.entry(leaf.index);
                leaf.index += 1;
                return Ok(entry);
            }
            if !self.step_subtree(true).await? {
                return Ok(None);
            }
        }
    }

    /// Returns the previous entry in key order, or `None` before the first entry.
    pub async fn prev(&mut self) -> Result<Option<TreeEntry>> {
        loop {
            let Some(leaf) = self.frames.first_mut() else {
                return Ok(None);
            };
            if leaf.index > 0 {
                leaf.index -= 1;
                return Ok(leaf.node.entry(leaf.index));
            }
            if !self.step_subtree(false).await? {
                return Ok(None);
            }
        }
    }

    /// Moves the leaf frame to the adjacent leaf in the given direction. Returns `false`
    /// (leaving the cursor unchanged) when there is none.
    async fn step_subtree(&mut self, forward: bool) -> Result<bool> {
        let level = (1..self.frames.len()).find(|&level| {
            let frame = &self.frames[level];
            if forward {
                frame.index + 1 < frame.node.num_pointers()
            } else {
                frame.index > 0
            }
        });
        let Some(level) = level else {
            return Ok(false);
        };

        if forward {
            self.frames[level].index += 1;
        } else {
            self.frames[level].index -= 1;
        }
        for depth in (0..level).rev() {
            let parent = &self.frames[depth + 1];
            let pointer = parent.node.child(parent.index).ok_or_else(|| {
                Error::malformed_node(format!(
                    "missing child {} at {}",
                    parent.index, parent.pointer.offset
                ))
            })?;
            let node = self.tree.load_node(pointer).await?;
            if node.is_leaf() != (depth == 0) {
                return Err(Error::malformed_node(format!(
                    "node at {} is at an unexpected depth",
                    pointer.offset
                )));
            }
            let index = match (forward, depth) {
                (true, _) => 0,
                (false, 0) => node.len(),
                (false, _) => node.num_pointers() - 1,
            };
            self.frames[depth] = Frame {
                node,
                index,
                pointer,
            };
        }
        log::trace!(
            "cursor moved {} to leaf at {}",
            if forward { "forward" } else { "backward" },
            self.frames[0].pointer.offset
        );
        Ok(true)
    }
}
