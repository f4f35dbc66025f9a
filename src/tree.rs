//! In-memory hierarchies and their conversion to and from the flat encoding.
use std::fmt::{Display, Formatter};

use anyhow::Result;
use smallvec::{smallvec, SmallVec};
use tracing::warn;

use crate::{fmt::Indent, Bounds, NestedSet, Node, NodeId, NodeStore};

/// A node together with its children, in order.
///
/// Either assembled from a snapshot of a store with
/// [`fetch_tree`](crate::NestedSetRead::fetch_tree), or built by hand to be
/// inserted with [`insert_tree`](crate::NestedSet::insert_tree). It is a copy
/// and does not follow later changes to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode<V> {
    node: Node<V>,
    parent: Option<NodeId>,
    children: Vec<TreeNode<V>>,
}

impl<V> TreeNode<V> {
    /// A node that is not in any store yet.
    pub fn new(value: V) -> Self {
        Self::from_node(Node {
            id: NodeId::EMPTY,
            bounds: Bounds::default(),
            value,
        })
    }

    /// A node without parent or children.
    pub fn from_node(node: Node<V>) -> Self {
        Self {
            node,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn node(&self) -> &Node<V> {
        &self.node
    }

    pub fn value(&self) -> &V {
        &self.node.value
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Attach this node below an existing node of a store, so that
    /// [`insert_tree`](crate::NestedSet::insert_tree) adds it as a child of
    /// `parent` instead of as a root.
    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        self.parent = parent;
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn children(&self) -> &[TreeNode<V>] {
        &self.children
    }

    /// Append a child and return it.
    pub fn add_child(&mut self, mut child: TreeNode<V>) -> &mut TreeNode<V> {
        child.parent = Some(self.node.id);
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn with_child(mut self, child: TreeNode<V>) -> Self {
        self.add_child(child);
        self
    }

    /// All nodes of the tree in preorder, starting with this one.
    pub fn iter(&self) -> impl Iterator<Item = &TreeNode<V>> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// The first node in preorder for which `f` returns true.
    pub fn find(&self, f: impl Fn(&Node<V>) -> bool) -> Option<&TreeNode<V>> {
        self.iter().find(|t| f(&t.node))
    }

    pub fn into_node(self) -> Node<V> {
        self.node
    }

    fn fmt0(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result
    where
        V: Display,
    {
        writeln!(f, "{}{}", Indent(depth), self.node.value)?;
        for child in &self.children {
            child.fmt0(f, depth + 1)?;
        }
        Ok(())
    }
}

/// One line per node, indented by depth.
impl<V: Display> Display for TreeNode<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt0(f, 0)
    }
}

/// Build the hierarchy from rows in preorder.
///
/// The first row becomes the top of the hierarchy. Every following row is
/// attached to the nearest open node that contains it. Rows that are not a
/// direct child of that node can only come from an inconsistent store and
/// are skipped.
pub(crate) fn assemble<V>(nodes: impl IntoIterator<Item = Node<V>>) -> Option<TreeNode<V>> {
    let mut nodes = nodes.into_iter();
    let top = nodes.next()?;
    // the path from the top to the most recently added node
    let mut path: SmallVec<[TreeNode<V>; 8]> = smallvec![TreeNode::from_node(top)];
    for node in nodes {
        while path.len() > 1 && !path[path.len() - 1].node.bounds.contains(&node.bounds) {
            close(&mut path);
        }
        let parent = &path[path.len() - 1].node;
        if !parent.bounds.is_parent_of(&node.bounds) {
            warn!(
                "skipping {} at {}: not a child of {} at {}",
                node.id, node.bounds, parent.id, parent.bounds
            );
            continue;
        }
        let mut child = TreeNode::from_node(node);
        child.parent = Some(parent.id);
        path.push(child);
    }
    while path.len() > 1 {
        close(&mut path);
    }
    path.pop()
}

/// Pop the last node of the path and append it to its parent.
fn close<V>(path: &mut SmallVec<[TreeNode<V>; 8]>) {
    if let Some(child) = path.pop() {
        if let Some(parent) = path.last_mut() {
            parent.children.push(child);
        }
    }
}

pub(crate) fn insert<V, S>(store: &mut S, tree: &TreeNode<V>) -> Result<NodeId>
where
    V: Clone,
    S: NodeStore<V> + ?Sized,
{
    let value = tree.node.value.clone();
    let id = match tree.parent {
        None => store.insert_as_root(value)?,
        Some(parent) => store.insert_as_last_child(parent, value)?,
    };
    insert_children(store, tree, id)?;
    Ok(id)
}

fn insert_children<V, S>(store: &mut S, tree: &TreeNode<V>, parent: NodeId) -> Result<()>
where
    V: Clone,
    S: NodeStore<V> + ?Sized,
{
    for child in &tree.children {
        let id = store.insert_as_last_child(parent, child.node.value.clone())?;
        insert_children(store, child, id)?;
    }
    Ok(())
}
