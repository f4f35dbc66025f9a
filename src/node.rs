use std::fmt::{Debug, Display};

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::query::Field;

/// Identity of a row in a store.
///
/// Ids are assigned by the store on insert and never reused.
///
/// We implement the zero copy traits with native u64. This means that the storage
/// will use the native endianess of the platform, and the DBs will not be compatible
/// between platforms with different endianess.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, AsBytes, FromZeroes, FromBytes, Hash)]
#[repr(transparent)]
pub struct NodeId(u64);

impl Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

impl From<NodeId> for u64 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl NodeId {
    /// Placeholder for nodes that have not been written to a store yet.
    pub const EMPTY: Self = NodeId(0);

    pub fn is_empty(&self) -> bool {
        self == &Self::EMPTY
    }
}

/// Position of a node in the nested set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, AsBytes, FromZeroes, FromBytes)]
#[repr(C)]
pub struct Bounds {
    pub left: i64,
    pub right: i64,
    pub level: i64,
}

impl Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.left, self.right, self.level)
    }
}

impl Bounds {
    /// Bounds of the root of a tree with a single node.
    pub const ROOT: Self = Self::new(1, 2, 0);

    pub const fn new(left: i64, right: i64, level: i64) -> Self {
        Self { left, right, level }
    }

    /// Bounds of a node without descendants.
    pub const fn leaf(left: i64, level: i64) -> Self {
        Self::new(left, left + 1, level)
    }

    /// Number of `left`/`right` values occupied by the node and its subtree.
    pub fn width(&self) -> i64 {
        self.right - self.left + 1
    }

    pub fn descendant_count(&self) -> i64 {
        (self.right - self.left - 1) / 2
    }

    pub fn has_children(&self) -> bool {
        self.right - self.left > 1
    }

    /// True if `other` lies strictly inside this interval, i.e. is a
    /// descendant.
    pub fn contains(&self, other: &Bounds) -> bool {
        self.left < other.left && other.right < self.right
    }

    pub fn is_parent_of(&self, other: &Bounds) -> bool {
        self.contains(other) && other.level == self.level + 1
    }

    pub fn get(&self, field: Field) -> i64 {
        match field {
            Field::Left => self.left,
            Field::Right => self.right,
            Field::Level => self.level,
        }
    }

    pub(crate) fn add(&mut self, field: Field, delta: i64) {
        match field {
            Field::Left => self.left += delta,
            Field::Right => self.right += delta,
            Field::Level => self.level += delta,
        }
    }
}

/// A row that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData<V> {
    pub bounds: Bounds,
    pub value: V,
}

impl<V> NodeData<V> {
    pub fn new(bounds: Bounds, value: V) -> Self {
        Self { bounds, value }
    }
}

/// A row of a store: id, position and payload.
///
/// This is a snapshot. The store owns the current state, so a `Node` is
/// outdated as soon as the tree is mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<V> {
    pub id: NodeId,
    pub bounds: Bounds,
    pub value: V,
}

impl<V> Node<V> {
    pub fn new(id: NodeId, data: NodeData<V>) -> Self {
        Self {
            id,
            bounds: data.bounds,
            value: data.value,
        }
    }

    pub fn left(&self) -> i64 {
        self.bounds.left
    }

    pub fn right(&self) -> i64 {
        self.bounds.right
    }

    pub fn level(&self) -> i64 {
        self.bounds.level
    }

    pub fn into_data(self) -> NodeData<V> {
        NodeData::new(self.bounds, self.value)
    }
}
