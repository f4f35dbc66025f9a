use anyhow::Result;

use crate::{BoundsQuery, Field, Node, NodeData, NodeId, SortOrder};

pub mod mem;
#[cfg(feature = "redb")]
pub mod redb;

/// Read access to an ordered collection of rows.
pub trait NodeStoreRead<V> {
    /// Point lookup by id.
    fn get(&self, id: NodeId) -> Result<Option<Node<V>>>;
    /// All rows matching the query, ascending by the given field.
    fn select(&self, query: &BoundsQuery, order: SortOrder) -> Result<Vec<Node<V>>>;
    fn is_empty(&self) -> Result<bool>;
}

/// Write access to an ordered collection of rows.
///
/// Each call is a single statement. Callers that issue several dependent
/// statements are responsible for running them in one unit of work.
pub trait NodeStore<V>: NodeStoreRead<V> {
    /// Insert a row. The generated ids should not be reused.
    fn create(&mut self, data: NodeData<V>) -> Result<NodeId>;
    /// Delete all rows matching the query. Returns the number of deleted rows.
    fn delete_where(&mut self, query: &BoundsQuery) -> Result<u64>;
    /// Add `delta` to `field` of all rows matching the query. The query is
    /// evaluated against the values before the update. Returns the number of
    /// updated rows.
    fn bulk_add(&mut self, field: Field, delta: i64, query: &BoundsQuery) -> Result<u64>;
}

impl<V> NodeStoreRead<V> for Box<dyn NodeStore<V>> {
    fn get(&self, id: NodeId) -> Result<Option<Node<V>>> {
        self.as_ref().get(id)
    }

    fn select(&self, query: &BoundsQuery, order: SortOrder) -> Result<Vec<Node<V>>> {
        self.as_ref().select(query, order)
    }

    fn is_empty(&self) -> Result<bool> {
        self.as_ref().is_empty()
    }
}

impl<V> NodeStore<V> for Box<dyn NodeStore<V>> {
    fn create(&mut self, data: NodeData<V>) -> Result<NodeId> {
        self.as_mut().create(data)
    }

    fn delete_where(&mut self, query: &BoundsQuery) -> Result<u64> {
        self.as_mut().delete_where(query)
    }

    fn bulk_add(&mut self, field: Field, delta: i64, query: &BoundsQuery) -> Result<u64> {
        self.as_mut().bulk_add(field, delta, query)
    }
}
