//! Checks the interval arithmetic against a plain tree with owned child lists.
use std::collections::BTreeMap;

use anyhow::Result;
use nested_set_store::{Bounds, MemStore, NestedSet, NestedSetError, NestedSetRead, NodeId, Position};
use proptest::prelude::*;
use test_strategy::proptest;
use testresult::TestResult;

/// Nodes are identified by their value, which is unique.
#[derive(Debug, Default)]
struct Reference {
    root: Option<u64>,
    parent: BTreeMap<u64, u64>,
    children: BTreeMap<u64, Vec<u64>>,
}

#[derive(Debug, PartialEq, Eq)]
struct Invalid;

impl Reference {
    fn preorder(&self) -> Vec<u64> {
        let mut res = Vec::new();
        let mut stack: Vec<u64> = self.root.into_iter().collect();
        while let Some(x) = stack.pop() {
            res.push(x);
            stack.extend(self.children[&x].iter().rev());
        }
        res
    }

    /// Number the nodes in a depth first walk.
    fn rows(&self) -> Vec<(u64, Bounds)> {
        fn walk(
            r: &Reference,
            x: u64,
            level: i64,
            counter: &mut i64,
            res: &mut Vec<(u64, Bounds)>,
        ) {
            *counter += 1;
            let i = res.len();
            res.push((x, Bounds::new(*counter, 0, level)));
            for &c in &r.children[&x] {
                walk(r, c, level + 1, counter, res);
            }
            *counter += 1;
            res[i].1.right = *counter;
        }
        let mut res = Vec::new();
        if let Some(root) = self.root {
            walk(self, root, 0, &mut 0, &mut res);
        }
        res
    }

    fn is_ancestor(&self, a: u64, mut x: u64) -> bool {
        while let Some(&p) = self.parent.get(&x) {
            if p == a {
                return true;
            }
            x = p;
        }
        false
    }

    fn insert_root(&mut self, value: u64) -> Result<(), Invalid> {
        if self.root.is_some() {
            return Err(Invalid);
        }
        self.root = Some(value);
        self.children.insert(value, Vec::new());
        Ok(())
    }

    /// Link a node that has no parent at the given position.
    fn link(&mut self, x: u64, target: u64, position: Position) {
        let (parent, index) = match position {
            Position::FirstChild => (target, 0),
            Position::LastChild => (target, self.children[&target].len()),
            Position::PrevSibling | Position::NextSibling => {
                let parent = self.parent[&target];
                let i = self.children[&parent]
                    .iter()
                    .position(|&c| c == target)
                    .unwrap();
                let i = if position == Position::NextSibling { i + 1 } else { i };
                (parent, i)
            }
        };
        self.children.get_mut(&parent).unwrap().insert(index, x);
        self.parent.insert(x, parent);
    }

    fn unlink(&mut self, x: u64) {
        if let Some(p) = self.parent.remove(&x) {
            self.children.get_mut(&p).unwrap().retain(|&c| c != x);
        }
    }

    fn beside_root(&self, target: u64, position: Position) -> bool {
        matches!(position, Position::PrevSibling | Position::NextSibling)
            && self.root == Some(target)
    }

    fn insert(&mut self, target: u64, position: Position, value: u64) -> Result<(), Invalid> {
        if self.beside_root(target, position) {
            return Err(Invalid);
        }
        self.children.insert(value, Vec::new());
        self.link(value, target, position);
        Ok(())
    }

    fn delete(&mut self, x: u64) {
        self.unlink(x);
        let mut stack = vec![x];
        while let Some(x) = stack.pop() {
            stack.extend(self.children.remove(&x).unwrap_or_default());
            self.parent.remove(&x);
        }
        if self.root == Some(x) {
            self.root = None;
        }
    }

    fn move_to(
        &mut self,
        source: u64,
        destination: u64,
        position: Position,
    ) -> Result<(), Invalid> {
        if source == destination
            || self.is_ancestor(source, destination)
            || self.beside_root(destination, position)
        {
            return Err(Invalid);
        }
        self.unlink(source);
        self.link(source, destination, position);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Position, usize),
    Delete(usize),
    Move(Position, usize, usize),
}

fn position() -> impl Strategy<Value = Position> {
    prop_oneof![
        Just(Position::FirstChild),
        Just(Position::LastChild),
        Just(Position::PrevSibling),
        Just(Position::NextSibling),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (position(), any::<usize>()).prop_map(|(p, i)| Op::Insert(p, i)),
        1 => any::<usize>().prop_map(Op::Delete),
        4 => (position(), any::<usize>(), any::<usize>()).prop_map(|(p, i, j)| Op::Move(p, i, j)),
    ]
}

fn check(res: Result<()>) -> Result<Result<(), Invalid>> {
    match res {
        Ok(()) => Ok(Ok(())),
        Err(e) => match e.downcast_ref::<NestedSetError>() {
            Some(NestedSetError::InvalidOperation(_)) => Ok(Err(Invalid)),
            _ => Err(e),
        },
    }
}

fn reference_impl(ops: Vec<Op>) -> TestResult<()> {
    let mut store = MemStore::new();
    let mut reference = Reference::default();
    for (value, op) in (0u64..).zip(ops) {
        let values = reference.preorder();
        if values.is_empty() {
            store.insert_as_root(value)?;
            reference.insert_root(value).unwrap();
            continue;
        }
        // both sides are addressed by preorder position
        let ids: Vec<NodeId> = store.find_all()?.into_iter().map(|n| n.id).collect();
        assert_eq!(ids.len(), values.len());
        let n = ids.len();
        let (actual, expected) = match op {
            Op::Insert(p, i) => (
                check(store.insert_at(ids[i % n], p, value).map(|_| ()))?,
                reference.insert(values[i % n], p, value),
            ),
            Op::Delete(i) => {
                let deleted = store.delete(ids[i % n])?;
                let before = reference.preorder().len();
                reference.delete(values[i % n]);
                assert_eq!(deleted as usize, before - reference.preorder().len());
                (Ok(()), Ok(()))
            }
            Op::Move(p, i, j) => (
                check(store.move_to(ids[i % n], ids[j % n], p))?,
                reference.move_to(values[i % n], values[j % n], p),
            ),
        };
        assert_eq!(actual, expected, "{:?}", op);
        let rows: Vec<(u64, Bounds)> = store
            .find_all()?
            .into_iter()
            .map(|n| (n.value, n.bounds))
            .collect();
        assert_eq!(rows, reference.rows(), "after {:?}", op);
    }
    Ok(())
}

#[proptest]
fn prop_reference(#[strategy(prop::collection::vec(op(), 0..80))] ops: Vec<Op>) {
    reference_impl(ops).unwrap();
}

#[test]
fn test_reference() -> TestResult<()> {
    use Position::*;
    let ops = vec![
        Op::Insert(FirstChild, 0),
        Op::Insert(NextSibling, 1),
        Op::Insert(PrevSibling, 1),
        Op::Insert(LastChild, 2),
        Op::Move(FirstChild, 1, 3),
        Op::Move(NextSibling, 3, 1),
        Op::Move(LastChild, 0, 1),
        Op::Move(PrevSibling, 4, 1),
        Op::Delete(2),
        Op::Insert(NextSibling, 0),
    ];
    reference_impl(ops)
}
