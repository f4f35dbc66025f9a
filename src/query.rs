//! Range predicates over the three fields of a row.
use std::fmt::{Debug, Display};

use crate::Bounds;

/// One of the three integer fields every row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Left,
    Right,
    Level,
}

/// Order of the rows returned by a range select. Always ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Preorder.
    #[default]
    Left,
    /// Subtrees before their ancestors, ancestors nearest first.
    Right,
}

impl SortOrder {
    pub fn key(&self, bounds: &Bounds) -> i64 {
        match self {
            SortOrder::Left => bounds.left,
            SortOrder::Right => bounds.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRange<T> {
    // min is inclusive
    min: T,
    // max is exclusive, None means unbounded
    max: Option<T>,
}

impl<T: Display> Display for QueryRange<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.max {
            Some(max) => write!(f, "[{}, {})", self.min, max),
            None => write!(f, "[{}, ∞)", self.min),
        }
    }
}

impl<T: Ord> QueryRange<T> {
    pub fn new(min: T, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: &T) -> bool {
        if value < &self.min {
            return false;
        }
        if let Some(max) = &self.max {
            if value >= max {
                return false;
            }
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        matches!(&self.max, Some(max) if max <= &self.min)
    }
}

impl QueryRange<i64> {
    pub fn all() -> Self {
        Self::new(i64::MIN, None)
    }

    /// `value >= min`
    pub fn at_least(min: i64) -> Self {
        Self::new(min, None)
    }

    /// `value > min`
    pub fn greater_than(min: i64) -> Self {
        Self::new(min + 1, None)
    }

    /// `value <= max`
    pub fn at_most(max: i64) -> Self {
        Self::new(i64::MIN, max.checked_add(1))
    }

    /// `value < max`
    pub fn less_than(max: i64) -> Self {
        Self::new(i64::MIN, Some(max))
    }

    /// `min <= value <= max`
    pub fn between(min: i64, max: i64) -> Self {
        Self::new(min, max.checked_add(1))
    }

    /// `min < value < max`
    pub fn strictly_between(min: i64, max: i64) -> Self {
        Self::new(min + 1, Some(max))
    }

    pub fn exactly(value: i64) -> Self {
        Self::between(value, value)
    }
}

/// A conjunction of ranges over `left`, `right` and `level`.
///
/// This is the only kind of predicate the nested set operations need, so it
/// is all a store has to understand. A relational store would translate it
/// to a `WHERE` clause.
#[derive(Clone, PartialEq, Eq)]
pub struct BoundsQuery {
    pub left: QueryRange<i64>,
    pub right: QueryRange<i64>,
    pub level: QueryRange<i64>,
}

impl Default for BoundsQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl Display for BoundsQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "left {} right {} level {}",
            self.left, self.right, self.level
        )
    }
}

impl Debug for BoundsQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundsQuery")
            .field("left", &self.left)
            .field("right", &self.right)
            .field("level", &self.level)
            .finish()
    }
}

impl BoundsQuery {
    pub fn new(left: QueryRange<i64>, right: QueryRange<i64>, level: QueryRange<i64>) -> Self {
        Self { left, right, level }
    }

    pub fn all() -> Self {
        Self::new(QueryRange::all(), QueryRange::all(), QueryRange::all())
    }

    pub fn left(range: QueryRange<i64>) -> Self {
        Self {
            left: range,
            ..Self::all()
        }
    }

    pub fn right(range: QueryRange<i64>) -> Self {
        Self {
            right: range,
            ..Self::all()
        }
    }

    pub fn with_level(self, level: QueryRange<i64>) -> Self {
        Self { level, ..self }
    }

    /// The node with these bounds and its whole subtree.
    pub fn subtree(bounds: &Bounds) -> Self {
        Self::new(
            QueryRange::at_least(bounds.left),
            QueryRange::at_most(bounds.right),
            QueryRange::all(),
        )
    }

    /// All proper descendants of the node with these bounds.
    pub fn descendants(bounds: &Bounds) -> Self {
        Self::new(
            QueryRange::greater_than(bounds.left),
            QueryRange::less_than(bounds.right),
            QueryRange::all(),
        )
    }

    /// All proper ancestors of the node with these bounds.
    pub fn ancestors(bounds: &Bounds) -> Self {
        Self::new(
            QueryRange::less_than(bounds.left),
            QueryRange::greater_than(bounds.right),
            QueryRange::all(),
        )
    }

    pub fn contains(&self, bounds: &Bounds) -> bool {
        self.left.contains(&bounds.left)
            && self.right.contains(&bounds.right)
            && self.level.contains(&bounds.level)
    }
}
