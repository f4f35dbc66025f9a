//! A nested set encoding of an ordered tree on top of a flat record store.
//!
//! Also known as the *modified preorder traversal* model, see [Celko] and
//! the [mysql article].
//!
//! Every node carries three integers: `left`, `right` and `level`. A depth
//! first walk of the tree that increments a counter every time it enters or
//! leaves a node assigns `left` on entry and `right` on exit. `level` is the
//! depth of the node, with the root at level 0.
//!
//! As a consequence, every question about the shape of the tree becomes a
//! question about intervals:
//!
//! - `B` is a descendant of `A` iff `A.left < B.left && B.right < A.right`.
//! - `B` is a child of `A` iff additionally `B.level == A.level + 1`.
//! - sorting by `left` yields the preorder traversal of the tree.
//! - sorting the ancestors of a node by `right` yields them nearest first.
//! - `right - left == 2 * descendants + 1`.
//!
//! So reads never have to walk the persisted data recursively. The cost is
//! paid on writes: every structural change renumbers a contiguous range of
//! other rows.
//!
//! # Stores
//!
//! The algorithm only needs a handful of primitives from the underlying
//! store, captured in the [`NodeStoreRead`] and [`NodeStore`] traits: point
//! lookup, insert, ordered range select, range delete and a conditional
//! bulk increment of one of the three fields.
//!
//! Two implementations are provided. [`MemStore`] keeps everything in a hash
//! map and is mostly useful for tests. [`RedbStore`] persists rows in a
//! [redb] table.
//!
//! # Operations
//!
//! Mutations live in the [`NestedSet`] extension trait, queries in the
//! [`NestedSetRead`] extension trait. Both are implemented for every store.
//!
//! ## Insertion
//!
//! Inserting a leaf opens a gap of size 2 at an *anchor* position by adding
//! 2 to every `left` and every `right` that is `>= anchor`, then writes the
//! new row with `left = anchor, right = anchor + 1`. The anchor depends on
//! the requested position relative to the target node:
//!
//! | position     | anchor         | level          |
//! |--------------|----------------|----------------|
//! | first child  | `target.left+1`| `target.level+1`|
//! | last child   | `target.right` | `target.level+1`|
//! | prev sibling | `target.left`  | `target.level` |
//! | next sibling | `target.right+1`| `target.level`|
//!
//! ## Deletion
//!
//! Deleting a node removes its whole subtree, which is exactly the rows with
//! `left >= node.left && right <= node.right`, then closes the hole by
//! shifting everything to the right of it down by the width of the subtree.
//!
//! ## Moving
//!
//! Moving a subtree uses the same anchors as insertion. With
//! `size = right - left + 1`:
//!
//! 1. open a gap of `size` at the anchor,
//! 2. if the subtree itself was shifted by this, track its new position,
//! 3. adjust the level of all proper descendants,
//! 4. translate the whole subtree interval into the gap,
//! 5. close the gap the subtree left behind.
//!
//! # Atomicity
//!
//! Every structural mutation is a sequence of dependent store operations,
//! and the tree is inconsistent between them. Mutations must therefore run
//! inside a unit of work that is committed or rolled back as a whole, such
//! as a [`WriteBatch`] or [`MemStore::atomically`]. This crate does no
//! locking of its own.
//!
//! # Policy
//!
//! A store holds a single tree. Inserting a second root, or inserting or
//! moving a node next to the root, fails with
//! [`NestedSetError::InvalidOperation`]. So does moving a node relative to
//! itself or into its own subtree.
//!
//! [Celko]: https://www.oreilly.com/library/view/joe-celkos-trees/9780123877338/
//! [mysql article]: https://mikehillyer.com/articles/managing-hierarchical-data-in-mysql/
//! [redb]: https://www.redb.org/
use anyhow::Result;

mod error;
mod fmt;
mod layout;
mod mutate;
mod node;
mod query;
mod read;
mod store;
mod tree;

pub use error::NestedSetError;
pub use mutate::{NestedSet, Position};
pub use node::{Bounds, Node, NodeData, NodeId};
pub use query::{BoundsQuery, Field, QueryRange, SortOrder};
pub use read::NestedSetRead;
pub use store::mem::MemStore;
#[cfg(feature = "redb")]
pub use store::redb::{RedbStore, Snapshot, WriteBatch};
pub use store::{NodeStore, NodeStoreRead};
pub use tree::TreeNode;

/// Conversion of a payload to and from the bytes of a persisted row.
///
/// Only needed for persistent stores. [`MemStore`] keeps payloads as they
/// are.
pub trait VariableSize: Sized {
    fn size(&self) -> usize;
    fn write(&self, buf: &mut [u8]);
    fn read(buf: &[u8]) -> Result<Self>;

    fn to_vec(&self) -> Vec<u8> {
        let mut buf = vec![0; self.size()];
        self.write(&mut buf);
        buf
    }
}

impl VariableSize for u64 {
    fn size(&self) -> usize {
        8
    }
    fn write(&self, buf: &mut [u8]) {
        buf.copy_from_slice(&self.to_be_bytes());
    }
    fn read(buf: &[u8]) -> Result<Self> {
        Ok(u64::from_be_bytes(buf.try_into()?))
    }
}

impl VariableSize for Vec<u8> {
    fn size(&self) -> usize {
        self.len()
    }
    fn write(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }
    fn read(buf: &[u8]) -> Result<Self> {
        Ok(buf.to_vec())
    }
}

impl VariableSize for String {
    fn size(&self) -> usize {
        self.len()
    }
    fn write(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self.as_bytes());
    }
    fn read(buf: &[u8]) -> Result<Self> {
        Ok(std::str::from_utf8(buf)?.to_owned())
    }
}

impl VariableSize for () {
    fn size(&self) -> usize {
        0
    }
    fn write(&self, _buf: &mut [u8]) {}
    fn read(buf: &[u8]) -> Result<Self> {
        anyhow::ensure!(buf.is_empty(), "unexpected payload of {} bytes", buf.len());
        Ok(())
    }
}
