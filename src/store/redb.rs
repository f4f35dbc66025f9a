use std::marker::PhantomData;

use itertools::Itertools;
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use tracing::trace;
use zerocopy::{AsBytes, FromBytes};

use super::{NodeStore, NodeStoreRead, Result};
use crate::{layout, BoundsQuery, Field, Node, NodeData, NodeId, SortOrder, VariableSize};

const AUTOINC_TABLE: TableDefinition<&str, u64> = TableDefinition::new("autoinc");
const NODE_TABLE: TableDefinition<NodeId, &[u8]> = TableDefinition::new("nodes");

impl redb::Value for NodeId {
    type SelfType<'b> = NodeId where Self: 'b;

    type AsBytes<'a> = &'a [u8];

    fn fixed_width() -> Option<usize> {
        Some(8)
    }

    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        // redb hands us exactly fixed_width bytes
        NodeId::read_from(data).unwrap()
    }

    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'a,
        Self: 'b,
    {
        AsBytes::as_bytes(value)
    }

    fn type_name() -> redb::TypeName {
        redb::TypeName::new("NodeId")
    }
}

impl redb::Key for NodeId {
    fn compare(data1: &[u8], data2: &[u8]) -> std::cmp::Ordering {
        data1.cmp(data2)
    }
}

/// A nested set persisted in a redb database.
///
/// Reads can go directly against the store, each in its own read
/// transaction. Mutations go through a [`WriteBatch`], so a structural change
/// is committed as a whole or not at all.
pub struct RedbStore<V> {
    db: Database,
    _payload: PhantomData<fn() -> V>,
}

impl<V> RedbStore<V> {
    /// Open or create a database file.
    pub fn new(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let db = Database::create(path.as_ref())?;
        Self::create_tables(&db)?;
        Ok(Self {
            db,
            _payload: PhantomData,
        })
    }

    pub fn memory() -> Result<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::create_tables(&db)?;
        Ok(Self {
            db,
            _payload: PhantomData,
        })
    }

    fn create_tables(db: &redb::Database) -> Result<()> {
        let txn = db.begin_write()?;
        txn.open_table(AUTOINC_TABLE)?;
        txn.open_table(NODE_TABLE)?;
        txn.commit()?;
        Ok(())
    }

    /// A consistent read-only view of the current state.
    pub fn snapshot(&self) -> Result<Snapshot<V>> {
        let txn = self.db.begin_read()?;
        Ok(Snapshot {
            nodes: txn.open_table(NODE_TABLE)?,
            _payload: PhantomData,
        })
    }

    /// Start a write transaction. Changes are visible to others only after
    /// [`WriteBatch::commit`]. Dropping the batch discards them.
    pub fn txn(&self) -> Result<WriteBatch<V>> {
        let txn = self.db.begin_write()?;
        let inner = WriteTransactionInner::try_new(txn, |txn| {
            let autoinc = txn.open_table(AUTOINC_TABLE)?;
            let nodes = txn.open_table(NODE_TABLE)?;
            anyhow::Ok(Tables { autoinc, nodes })
        })?;
        Ok(WriteBatch(inner, PhantomData))
    }
}

fn get<V: VariableSize>(
    table: &impl ReadableTable<NodeId, &'static [u8]>,
    id: NodeId,
) -> Result<Option<Node<V>>> {
    match table.get(&id)? {
        Some(row) => Ok(Some(Node::new(id, layout::decode(row.value())?))),
        None => Ok(None),
    }
}

/// Ids and raw rows of all rows matching the query.
fn scan(
    table: &impl ReadableTable<NodeId, &'static [u8]>,
    query: &BoundsQuery,
) -> Result<Vec<(NodeId, Vec<u8>)>> {
    let mut res = Vec::new();
    for item in table.iter()? {
        let (id, row) = item?;
        if query.contains(&layout::bounds(row.value())?) {
            res.push((id.value(), row.value().to_vec()));
        }
    }
    Ok(res)
}

fn select<V: VariableSize>(
    table: &impl ReadableTable<NodeId, &'static [u8]>,
    query: &BoundsQuery,
    order: SortOrder,
) -> Result<Vec<Node<V>>> {
    let nodes = scan(table, query)?
        .into_iter()
        .map(|(id, row)| Ok(Node::new(id, layout::decode(&row)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(nodes
        .into_iter()
        .sorted_by_key(|node| order.key(&node.bounds))
        .collect())
}

fn is_empty(table: &impl ReadableTable<NodeId, &'static [u8]>) -> Result<bool> {
    Ok(table.iter()?.next().is_none())
}

pub struct Snapshot<V> {
    nodes: redb::ReadOnlyTable<NodeId, &'static [u8]>,
    _payload: PhantomData<fn() -> V>,
}

impl<V: VariableSize> NodeStoreRead<V> for Snapshot<V> {
    fn get(&self, id: NodeId) -> Result<Option<Node<V>>> {
        get(&self.nodes, id)
    }

    fn select(&self, query: &BoundsQuery, order: SortOrder) -> Result<Vec<Node<V>>> {
        select(&self.nodes, query, order)
    }

    fn is_empty(&self) -> Result<bool> {
        is_empty(&self.nodes)
    }
}

impl<V: VariableSize> NodeStoreRead<V> for RedbStore<V> {
    fn get(&self, id: NodeId) -> Result<Option<Node<V>>> {
        let txn = self.db.begin_read()?;
        get(&txn.open_table(NODE_TABLE)?, id)
    }

    fn select(&self, query: &BoundsQuery, order: SortOrder) -> Result<Vec<Node<V>>> {
        let txn = self.db.begin_read()?;
        select(&txn.open_table(NODE_TABLE)?, query, order)
    }

    fn is_empty(&self) -> Result<bool> {
        let txn = self.db.begin_read()?;
        is_empty(&txn.open_table(NODE_TABLE)?)
    }
}

struct Tables<'a> {
    autoinc: redb::Table<'a, &'static str, u64>,
    nodes: redb::Table<'a, NodeId, &'static [u8]>,
}

self_cell::self_cell!(
    struct WriteTransactionInner {
        owner: WriteTransaction,

        #[covariant]
        dependent: Tables,
    }
);

/// A write transaction on a [`RedbStore`].
pub struct WriteBatch<V>(WriteTransactionInner, PhantomData<fn() -> V>);

impl<V> WriteBatch<V> {
    pub fn commit(self) -> Result<()> {
        self.0.into_owner().commit()?;
        Ok(())
    }

    /// Discard all changes made in this batch.
    pub fn abort(self) -> Result<()> {
        self.0.into_owner().abort()?;
        Ok(())
    }
}

impl<V: VariableSize> NodeStoreRead<V> for WriteBatch<V> {
    fn get(&self, id: NodeId) -> Result<Option<Node<V>>> {
        self.0.with_dependent(|_txn, tables| get(&tables.nodes, id))
    }

    fn select(&self, query: &BoundsQuery, order: SortOrder) -> Result<Vec<Node<V>>> {
        self.0
            .with_dependent(|_txn, tables| select(&tables.nodes, query, order))
    }

    fn is_empty(&self) -> Result<bool> {
        self.0.with_dependent(|_txn, tables| is_empty(&tables.nodes))
    }
}

impl<V: VariableSize> NodeStore<V> for WriteBatch<V> {
    fn create(&mut self, data: NodeData<V>) -> Result<NodeId> {
        let row = layout::encode(&data);
        self.0.with_dependent_mut(|_txn, tables| {
            let current_id = match tables.autoinc.get("id")? {
                Some(id) => id.value(),
                None => 0u64,
            };
            let new_id = current_id + 1;
            tables.autoinc.insert("id", &new_id)?;
            let id = NodeId::from(new_id);
            tables.nodes.insert(&id, row.as_slice())?;
            anyhow::Ok(id)
        })
    }

    fn delete_where(&mut self, query: &BoundsQuery) -> Result<u64> {
        self.0.with_dependent_mut(|_txn, tables| {
            let hits = scan(&tables.nodes, query)?;
            for (id, _) in &hits {
                tables.nodes.remove(id)?;
            }
            trace!("deleted {} rows where {}", hits.len(), query);
            anyhow::Ok(hits.len() as u64)
        })
    }

    fn bulk_add(&mut self, field: Field, delta: i64, query: &BoundsQuery) -> Result<u64> {
        self.0.with_dependent_mut(|_txn, tables| {
            let hits = scan(&tables.nodes, query)?;
            let count = hits.len() as u64;
            for (id, mut row) in hits {
                let mut bounds = layout::bounds(&row)?;
                bounds.add(field, delta);
                layout::set_bounds(&mut row, &bounds)?;
                tables.nodes.insert(&id, row.as_slice())?;
            }
            trace!("added {} to {:?} of {} rows where {}", delta, field, count, query);
            anyhow::Ok(count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bounds, NestedSet, NestedSetError, NestedSetRead};
    use testresult::TestResult;

    type TStore = RedbStore<String>;

    fn init(names: &[&str]) -> Result<(TStore, Vec<NodeId>)> {
        let store = TStore::memory()?;
        let mut batch = store.txn()?;
        let mut ids = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let id = if i == 0 {
                batch.insert_as_root(name.to_string())?
            } else {
                batch.insert_as_last_child(ids[0], name.to_string())?
            };
            ids.push(id);
        }
        batch.commit()?;
        Ok((store, ids))
    }

    #[test]
    fn db_smoke_test() -> TestResult<()> {
        let (store, ids) = init(&["root", "a", "b"])?;
        let all = store.find_all()?;
        let actual = all
            .iter()
            .map(|n| (n.value.as_str(), n.bounds))
            .collect::<Vec<_>>();
        assert_eq!(
            actual,
            vec![
                ("root", Bounds::new(1, 6, 0)),
                ("a", Bounds::new(2, 3, 1)),
                ("b", Bounds::new(4, 5, 1)),
            ]
        );
        assert_eq!(store.get_parent(ids[2])?.id, ids[0]);
        store.assert_invariants()?;
        Ok(())
    }

    #[test]
    fn db_uncommitted_batch_is_invisible() -> TestResult<()> {
        let (store, ids) = init(&["root", "a"])?;
        let ss = store.snapshot()?;
        {
            let mut batch = store.txn()?;
            batch.insert_as_first_child(ids[1], "c".to_owned())?;
            batch.delete(ids[0])?;
            assert!(NodeStoreRead::<String>::is_empty(&batch)?);
            // dropped without commit
        }
        assert_eq!(store.find_all()?.len(), 2);

        let mut batch = store.txn()?;
        batch.insert_as_first_child(ids[1], "c".to_owned())?;
        batch.abort()?;
        assert_eq!(store.find_all()?.len(), 2);

        let mut batch = store.txn()?;
        let c = batch.insert_as_first_child(ids[1], "c".to_owned())?;
        batch.commit()?;
        assert_eq!(store.get_node(c)?.bounds, Bounds::new(3, 4, 2));
        // the snapshot still sees the state from before
        assert_eq!(ss.find_all()?.len(), 2);
        assert_eq!(store.snapshot()?.find_all()?.len(), 3);
        Ok(())
    }

    #[test]
    fn db_move_and_delete() -> TestResult<()> {
        let (store, ids) = init(&["root", "a", "b", "c"])?;
        let mut batch = store.txn()?;
        batch.move_as_first_child(ids[3], ids[1])?;
        batch.move_as_next_sibling(ids[2], ids[3])?;
        batch.commit()?;
        store.assert_invariants()?;
        let outline = store
            .fetch_tree()?
            .map(|t| t.to_string())
            .unwrap_or_default();
        assert_eq!(outline, "root\n  a\n    c\n    b\n");

        let mut batch = store.txn()?;
        assert_eq!(batch.delete(ids[1])?, 3);
        batch.commit()?;
        assert_eq!(store.find_all()?.len(), 1);
        assert_eq!(store.get_node(ids[0])?.bounds, Bounds::ROOT);
        Ok(())
    }

    #[test]
    fn db_not_found() -> TestResult<()> {
        let (store, _) = init(&["root"])?;
        let mut batch = store.txn()?;
        let err = batch
            .insert_as_last_child(NodeId::from(42), "x".to_owned())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<NestedSetError>(),
            Some(&NestedSetError::NotFound(NodeId::from(42)))
        );
        Ok(())
    }

    #[test]
    fn db_file_roundtrip() -> TestResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tree.redb");
        let root = {
            let store = TStore::new(&path)?;
            let mut batch = store.txn()?;
            let root = batch.insert_as_root("root".to_owned())?;
            batch.insert_as_last_child(root, "child".to_owned())?;
            batch.commit()?;
            root
        };
        let store = TStore::new(&path)?;
        assert_eq!(store.get_children(root)?[0].value, "child");
        // ids keep counting after reopening
        let mut batch = store.txn()?;
        let next = batch.insert_as_first_child(root, "first".to_owned())?;
        batch.commit()?;
        assert_eq!(u64::from(next), 3);
        Ok(())
    }
}
