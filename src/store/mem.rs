use std::collections::HashMap;

use itertools::Itertools;

use super::{NodeStore, NodeStoreRead, Result};
use crate::{BoundsQuery, Field, Node, NodeData, NodeId, SortOrder};

#[derive(Debug, Clone)]
pub struct MemStore<V> {
    nodes: HashMap<NodeId, NodeData<V>>,
    max_id: u64,
}

impl<V> Default for MemStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemStore<V> {
    pub fn new() -> Self {
        MemStore {
            nodes: Default::default(),
            max_id: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_id(&self) -> u64 {
        self.max_id
    }
}

impl<V: Clone> MemStore<V> {
    /// Run `f` as a single unit of work.
    ///
    /// `f` operates on a copy of the store, which replaces the store only if
    /// `f` succeeds. On error the store is left as it was.
    pub fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut work = self.clone();
        let res = f(&mut work)?;
        *self = work;
        Ok(res)
    }
}

impl<V: Clone> NodeStoreRead<V> for MemStore<V> {
    fn get(&self, id: NodeId) -> Result<Option<Node<V>>> {
        Ok(self
            .nodes
            .get(&id)
            .map(|data| Node::new(id, data.clone())))
    }

    fn select(&self, query: &BoundsQuery, order: SortOrder) -> Result<Vec<Node<V>>> {
        Ok(self
            .nodes
            .iter()
            .filter(|(_, data)| query.contains(&data.bounds))
            .map(|(id, data)| Node::new(*id, data.clone()))
            .sorted_by_key(|node| order.key(&node.bounds))
            .collect())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.nodes.is_empty())
    }
}

impl<V: Clone> NodeStore<V> for MemStore<V> {
    fn create(&mut self, data: NodeData<V>) -> Result<NodeId> {
        self.max_id += 1;
        let id = NodeId::from(self.max_id);
        assert!(!id.is_empty());
        self.nodes.insert(id, data);
        Ok(id)
    }

    fn delete_where(&mut self, query: &BoundsQuery) -> Result<u64> {
        let before = self.nodes.len();
        self.nodes.retain(|_, data| !query.contains(&data.bounds));
        Ok((before - self.nodes.len()) as u64)
    }

    fn bulk_add(&mut self, field: Field, delta: i64, query: &BoundsQuery) -> Result<u64> {
        let mut count = 0;
        for data in self.nodes.values_mut() {
            if query.contains(&data.bounds) {
                data.bounds.add(field, delta);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bounds, QueryRange};
    use testresult::TestResult;

    #[test]
    fn mem_store_primitives() -> TestResult<()> {
        let mut store = MemStore::new();
        let a = store.create(NodeData::new(Bounds::new(1, 4, 0), "a"))?;
        let b = store.create(NodeData::new(Bounds::new(2, 3, 1), "b"))?;
        assert_ne!(a, b);
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(b)?.map(|n| n.value), Some("b"));
        assert_eq!(store.get(NodeId::from(99))?, None);

        let by_right = store.select(&BoundsQuery::all(), SortOrder::Right)?;
        assert_eq!(by_right.iter().map(|n| n.id).collect::<Vec<_>>(), vec![b, a]);

        let n = store.bulk_add(Field::Right, 10, &BoundsQuery::right(QueryRange::at_least(4)))?;
        assert_eq!(n, 1);
        assert_eq!(store.get(a)?.map(|n| n.bounds), Some(Bounds::new(1, 14, 0)));

        let n = store.delete_where(&BoundsQuery::left(QueryRange::exactly(2)))?;
        assert_eq!(n, 1);
        assert_eq!(store.size(), 1);
        // ids are not reused
        let c = store.create(NodeData::new(Bounds::ROOT, "c"))?;
        assert_eq!(u64::from(c), 3);
        Ok(())
    }

    #[test]
    fn atomically_rolls_back_on_error() -> TestResult<()> {
        let mut store = MemStore::new();
        store.create(NodeData::new(Bounds::ROOT, 1u64))?;
        let res: Result<()> = store.atomically(|s| {
            s.bulk_add(Field::Left, 5, &BoundsQuery::all())?;
            anyhow::bail!("boom")
        });
        assert!(res.is_err());
        let all = store.select(&BoundsQuery::all(), SortOrder::Left)?;
        assert_eq!(all[0].bounds, Bounds::ROOT);

        store.atomically(|s| s.bulk_add(Field::Left, 5, &BoundsQuery::all()))?;
        let all = store.select(&BoundsQuery::all(), SortOrder::Left)?;
        assert_eq!(all[0].bounds.left, 6);
        Ok(())
    }
}
