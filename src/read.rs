//! Interval queries.
use anyhow::{ensure, Result};
use smallvec::SmallVec;

use crate::{
    tree, Bounds, BoundsQuery, NestedSetError, Node, NodeId, NodeStoreRead, QueryRange,
    SortOrder, TreeNode,
};

/// Queries on a nested set, available on every [`NodeStoreRead`].
///
/// All of them are a single range select against the store after fetching
/// the node they are relative to.
pub trait NestedSetRead<V>: NodeStoreRead<V> {
    /// The current row of a node.
    ///
    /// Fails with [`NestedSetError::NotFound`] if there is none.
    fn get_node(&self, id: NodeId) -> Result<Node<V>> {
        match self.get(id)? {
            Some(node) => Ok(node),
            None => Err(NestedSetError::NotFound(id).into()),
        }
    }

    fn has_children(&self, id: NodeId) -> Result<bool> {
        Ok(self.get_node(id)?.bounds.has_children())
    }

    fn is_root(&self, id: NodeId) -> Result<bool> {
        Ok(self.get_node(id)?.level() == 0)
    }

    /// Direct children, in order.
    fn get_children(&self, id: NodeId) -> Result<Vec<Node<V>>> {
        self.get_descendants(id, 1)
    }

    /// Descendants up to `depth_limit` generations below the node, in
    /// preorder. A limit of 0 means all of them.
    fn get_descendants(&self, id: NodeId, depth_limit: u64) -> Result<Vec<Node<V>>> {
        let node = self.get_node(id)?;
        let mut query = BoundsQuery::descendants(&node.bounds);
        if depth_limit != 0 {
            let max = node.level().saturating_add(generations(depth_limit));
            query = query.with_level(QueryRange::at_most(max));
        }
        self.select(&query, SortOrder::Left)
    }

    fn all_descendants(&self, id: NodeId) -> Result<Vec<Node<V>>> {
        self.get_descendants(id, 0)
    }

    /// The node followed by its whole subtree in preorder.
    fn get_node_and_all_descendants(&self, id: NodeId) -> Result<Vec<Node<V>>> {
        let node = self.get_node(id)?;
        self.select(&BoundsQuery::subtree(&node.bounds), SortOrder::Left)
    }

    /// Ancestors up to `limit` generations above the node, nearest first. A
    /// limit of 0 means all of them.
    fn get_ancestors(&self, id: NodeId, limit: u64) -> Result<Vec<Node<V>>> {
        let node = self.get_node(id)?;
        let mut query = BoundsQuery::ancestors(&node.bounds);
        if limit != 0 {
            let min = node.level().saturating_sub(generations(limit));
            query = query.with_level(QueryRange::at_least(min));
        }
        self.select(&query, SortOrder::Right)
    }

    fn all_ancestors(&self, id: NodeId) -> Result<Vec<Node<V>>> {
        self.get_ancestors(id, 0)
    }

    /// Fails with [`NestedSetError::InvalidOperation`] for the root.
    fn get_parent(&self, id: NodeId) -> Result<Node<V>> {
        match self.get_ancestors(id, 1)?.into_iter().next() {
            Some(parent) => Ok(parent),
            None => {
                let msg = format!("{} is a root and has no parent", id);
                Err(NestedSetError::invalid(msg).into())
            }
        }
    }

    /// Every row in preorder.
    fn find_all(&self) -> Result<Vec<Node<V>>> {
        self.select(&BoundsQuery::all(), SortOrder::Left)
    }

    /// The whole tree, or `None` if the store is empty.
    fn fetch_tree(&self) -> Result<Option<TreeNode<V>>> {
        Ok(tree::assemble(self.find_all()?))
    }

    /// The subtree below and including a node.
    fn fetch_subtree(&self, id: NodeId) -> Result<TreeNode<V>> {
        match tree::assemble(self.get_node_and_all_descendants(id)?) {
            Some(tree) => Ok(tree),
            None => Err(NestedSetError::NotFound(id).into()),
        }
    }

    /// Check that the rows form a single consistent tree.
    ///
    /// - the root is at `(1, 2n, 0)` for `n` rows
    /// - every `left` and `right` value in `1..=2n` is used exactly once
    /// - `left < right` and `right - left == 2 * descendants + 1`
    /// - intervals are disjoint or nested
    /// - the level of a node is the number of its ancestors
    fn assert_invariants(&self) -> Result<()> {
        let nodes = self.find_all()?;
        let Some(root) = nodes.first() else {
            return Ok(());
        };
        let n = nodes.len() as i64;
        ensure!(
            root.bounds == Bounds::new(1, 2 * n, 0),
            "root {} at {}, expected {}",
            root.id,
            root.bounds,
            Bounds::new(1, 2 * n, 0)
        );
        let mut used = vec![false; nodes.len() * 2 + 1];
        let mut path: SmallVec<[&Node<V>; 16]> = SmallVec::new();
        for (i, node) in nodes.iter().enumerate() {
            let b = &node.bounds;
            ensure!(b.left < b.right, "{} at {}: left >= right", node.id, b);
            for value in [b.left, b.right] {
                ensure!(
                    (1..=2 * n).contains(&value) && !used[value as usize],
                    "{} at {}: value {} out of range or used twice",
                    node.id,
                    b,
                    value
                );
                used[value as usize] = true;
            }
            let descendants = nodes[i + 1..]
                .iter()
                .take_while(|d| d.left() < b.right)
                .count() as i64;
            ensure!(
                b.right - b.left == 2 * descendants + 1,
                "{} at {}: width does not match {} descendants",
                node.id,
                b,
                descendants
            );
            while path.last().is_some_and(|top| top.right() < b.left) {
                path.pop();
            }
            match path.last() {
                Some(parent) => {
                    ensure!(
                        parent.bounds.contains(b),
                        "{} at {} overlaps {} at {}",
                        node.id,
                        b,
                        parent.id,
                        parent.bounds
                    );
                    ensure!(
                        parent.bounds.is_parent_of(b),
                        "{} at {}: level does not match parent {} at {}",
                        node.id,
                        b,
                        parent.id,
                        parent.bounds
                    );
                }
                None => ensure!(i == 0, "{} at {} is a second root", node.id, b),
            }
            path.push(node);
        }
        Ok(())
    }
}

impl<V, T: NodeStoreRead<V> + ?Sized> NestedSetRead<V> for T {}

fn generations(limit: u64) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
