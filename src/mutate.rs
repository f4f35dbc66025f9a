//! Structural mutations: insert, delete and move.
//!
//! All of them work by shifting ranges of `left`/`right` values. None of them
//! are atomic on their own, see the crate docs.
use anyhow::{bail, Result};
use tracing::{debug, trace};

use crate::{
    tree, Bounds, BoundsQuery, Field, NestedSetError, NestedSetRead, Node, NodeData, NodeId,
    NodeStore, QueryRange, TreeNode,
};

/// Where to put a node relative to an existing target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    FirstChild,
    LastChild,
    PrevSibling,
    NextSibling,
}

impl Position {
    pub fn is_sibling(&self) -> bool {
        matches!(self, Position::PrevSibling | Position::NextSibling)
    }

    /// The `left` value and level a node placed here ends up with.
    pub fn anchor(&self, target: &Bounds) -> (i64, i64) {
        match self {
            Position::FirstChild => (target.left + 1, target.level + 1),
            Position::LastChild => (target.right, target.level + 1),
            Position::PrevSibling => (target.left, target.level),
            Position::NextSibling => (target.right + 1, target.level),
        }
    }
}

/// Mutations of a nested set, available on every [`NodeStore`].
///
/// Every method re-reads the rows it needs, so ids are all that callers have
/// to keep around.
pub trait NestedSet<V>: NodeStore<V> {
    /// Insert the root of the tree at `(1, 2, 0)`.
    ///
    /// Fails with [`NestedSetError::InvalidOperation`] if the store is not
    /// empty.
    fn insert_as_root(&mut self, value: V) -> Result<NodeId> {
        if !self.is_empty()? {
            bail!(NestedSetError::invalid("store already contains a tree"));
        }
        let id = self.create(NodeData::new(Bounds::ROOT, value))?;
        debug!("inserted {} as root", id);
        Ok(id)
    }

    fn insert_as_first_child(&mut self, parent: NodeId, value: V) -> Result<NodeId> {
        self.insert_at(parent, Position::FirstChild, value)
    }

    fn insert_as_last_child(&mut self, parent: NodeId, value: V) -> Result<NodeId> {
        self.insert_at(parent, Position::LastChild, value)
    }

    fn insert_as_prev_sibling(&mut self, existing: NodeId, value: V) -> Result<NodeId> {
        self.insert_at(existing, Position::PrevSibling, value)
    }

    fn insert_as_next_sibling(&mut self, existing: NodeId, value: V) -> Result<NodeId> {
        self.insert_at(existing, Position::NextSibling, value)
    }

    /// Insert a new leaf at the given position relative to `target`.
    fn insert_at(&mut self, target: NodeId, position: Position, value: V) -> Result<NodeId> {
        let target = self.get_node(target)?;
        check_not_beside_root(&target, position)?;
        let (left, level) = position.anchor(&target.bounds);
        shift_nodes::<V, _>(self, left, 2)?;
        let bounds = Bounds::leaf(left, level);
        let id = self.create(NodeData::new(bounds, value))?;
        debug!("inserted {} at {} as {:?} of {}", id, bounds, position, target.id);
        Ok(id)
    }

    /// Delete a node and its whole subtree, then close the gap.
    ///
    /// Returns the number of deleted rows.
    fn delete(&mut self, id: NodeId) -> Result<u64> {
        let node = self.get_node(id)?;
        let count = self.delete_where(&BoundsQuery::subtree(&node.bounds))?;
        let gap = node.left() - node.right() - 1;
        shift_nodes::<V, _>(self, node.right() + 1, gap)?;
        debug!("deleted {} at {} with {} rows", id, node.bounds, count);
        Ok(count)
    }

    fn move_as_first_child(&mut self, source: NodeId, destination: NodeId) -> Result<()> {
        self.move_to(source, destination, Position::FirstChild)
    }

    fn move_as_last_child(&mut self, source: NodeId, destination: NodeId) -> Result<()> {
        self.move_to(source, destination, Position::LastChild)
    }

    fn move_as_prev_sibling(&mut self, source: NodeId, destination: NodeId) -> Result<()> {
        self.move_to(source, destination, Position::PrevSibling)
    }

    fn move_as_next_sibling(&mut self, source: NodeId, destination: NodeId) -> Result<()> {
        self.move_to(source, destination, Position::NextSibling)
    }

    /// Move `source` and its subtree to the given position relative to
    /// `destination`.
    ///
    /// Fails with [`NestedSetError::InvalidOperation`] if `destination` is
    /// `source` or lies in its subtree.
    fn move_to(&mut self, source: NodeId, destination: NodeId, position: Position) -> Result<()> {
        if source == destination {
            bail!(NestedSetError::invalid(format!(
                "cannot move {} relative to itself",
                source
            )));
        }
        let src = self.get_node(source)?;
        let dst = self.get_node(destination)?;
        if src.bounds.contains(&dst.bounds) {
            bail!(NestedSetError::invalid(format!(
                "cannot move {} into its own subtree",
                source
            )));
        }
        check_not_beside_root(&dst, position)?;
        let (anchor, level) = position.anchor(&dst.bounds);
        let level_delta = level - src.level();
        if level_delta != 0 {
            self.bulk_add(
                Field::Level,
                level_delta,
                &BoundsQuery::left(QueryRange::exactly(src.left())),
            )?;
        }
        relocate::<V, _>(self, src.bounds, anchor, level_delta)?;
        debug!(
            "moved {} from {} as {:?} of {}",
            source, src.bounds, position, destination
        );
        Ok(())
    }

    /// Insert a hierarchy built in memory, or fetched from another store.
    ///
    /// A [`TreeNode`] without parent becomes the root, otherwise it is added as
    /// the last child of its parent. Children follow in order. Returns the id
    /// of the topmost inserted node.
    fn insert_tree(&mut self, tree: &TreeNode<V>) -> Result<NodeId>
    where
        V: Clone,
    {
        tree::insert(self, tree)
    }
}

impl<V, T: NodeStore<V> + ?Sized> NestedSet<V> for T {}

fn check_not_beside_root<V>(target: &Node<V>, position: Position) -> Result<()> {
    if position.is_sibling() && target.level() == 0 {
        bail!(NestedSetError::invalid(format!(
            "cannot place a sibling next to root {}",
            target.id
        )));
    }
    Ok(())
}

/// Open a gap of `delta` at `threshold`, or close one if `delta` is negative.
fn shift_nodes<V, S: NodeStore<V> + ?Sized>(
    store: &mut S,
    threshold: i64,
    delta: i64,
) -> Result<()> {
    let l = store.bulk_add(
        Field::Left,
        delta,
        &BoundsQuery::left(QueryRange::at_least(threshold)),
    )?;
    let r = store.bulk_add(
        Field::Right,
        delta,
        &BoundsQuery::right(QueryRange::at_least(threshold)),
    )?;
    trace!("shift {} from {}: {} left, {} right", delta, threshold, l, r);
    Ok(())
}

/// Translate all values inside `[from, to]` by `delta`.
fn shift_nodes_between<V, S: NodeStore<V> + ?Sized>(
    store: &mut S,
    from: i64,
    to: i64,
    delta: i64,
) -> Result<()> {
    let range = QueryRange::between(from, to);
    let l = store.bulk_add(Field::Left, delta, &BoundsQuery::left(range.clone()))?;
    let r = store.bulk_add(Field::Right, delta, &BoundsQuery::right(range))?;
    trace!(
        "shift {} in [{}, {}]: {} left, {} right",
        delta,
        from,
        to,
        l,
        r
    );
    Ok(())
}

/// Move the subtree at `bounds` so that its root starts at `anchor`.
///
/// The level of the subtree root must already be updated.
fn relocate<V, S: NodeStore<V> + ?Sized>(
    store: &mut S,
    bounds: Bounds,
    anchor: i64,
    level_delta: i64,
) -> Result<()> {
    let size = bounds.width();
    shift_nodes::<V, _>(store, anchor, size)?;
    let (mut left, mut right) = (bounds.left, bounds.right);
    // the subtree was shifted along with everything else
    if left >= anchor {
        left += size;
        right += size;
    }
    if level_delta != 0 {
        store.bulk_add(
            Field::Level,
            level_delta,
            &BoundsQuery::descendants(&Bounds::new(left, right, 0)),
        )?;
    }
    shift_nodes_between::<V, _>(store, left, right, anchor - left)?;
    shift_nodes::<V, _>(store, right + 1, -size)
}
