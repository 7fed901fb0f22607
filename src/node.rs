//! Trie nodes of the index.
//!
//! The trie alternates between two kinds of levels, both represented by the
//! same [IndexNode]:
//!
//! - a *column level*, whose children are keyed by hashed column names,
//! - a *value level*, whose children are keyed by hashed values of one column.
//!
//! The root is a column level. Every node records the ids of the rows
//! reachable through it.

use std::collections::BTreeMap;
use std::fmt;

use allocative::Allocative;
use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::symbols::Symbol;

/// Zero-based position of a row in input order.
pub type RowId = usize;

/// Set of row ids, kept as a sorted list.
///
/// Builds insert ids in ascending order, so an insert is a push or a no-op
/// repeat of the last id. Memory is proportional to the number of members,
/// not to the largest id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Allocative)]
pub struct RowSet {
    ids: Vec<RowId>,
}

impl RowSet {
    pub fn new() -> Self {
        Self { ids: Vec::new() }
    }

    /// Adds a row id. Returns `false` if the id was already present.
    pub fn insert(&mut self, id: RowId) -> bool {
        match self.ids.last() {
            None => {
                self.ids.push(id);
                true
            }
            Some(&last) if last < id => {
                self.ids.push(id);
                true
            }
            Some(&last) if last == id => false,
            Some(_) => match self.ids.binary_search(&id) {
                Ok(_) => false,
                Err(pos) => {
                    self.ids.insert(pos, id);
                    true
                }
            },
        }
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Largest member, if any.
    pub fn last(&self) -> Option<RowId> {
        self.ids.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowId> + '_ {
        self.ids.iter().copied()
    }

    /// Adds every id of `other` to this set.
    pub fn union_with(&mut self, other: &RowSet) {
        let mut merged = Vec::with_capacity(self.ids.len() + other.ids.len());
        let (mut a, mut b) = (self.ids.iter().peekable(), other.ids.iter().peekable());
        loop {
            let next = match (a.peek(), b.peek()) {
                (Some(&&x), Some(&&y)) if x < y => a.next(),
                (Some(&&x), Some(&&y)) if x > y => b.next(),
                (Some(_), Some(_)) => {
                    b.next();
                    a.next()
                }
                (Some(_), None) => a.next(),
                (None, Some(_)) => b.next(),
                (None, None) => break,
            };
            merged.extend(next.copied());
        }
        self.ids = merged;
    }
}

impl FromIterator<RowId> for RowSet {
    fn from_iter<I: IntoIterator<Item = RowId>>(iter: I) -> Self {
        let mut set = RowSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl Serialize for RowSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for id in self.iter() {
            seq.serialize_element(&id)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for RowSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let ids = Vec::<RowId>::deserialize(deserializer)?;
        Ok(ids.into_iter().collect())
    }
}

/// A point in the trie: the rows reachable here and the branches below.
///
/// `child_symbols` keeps first-insertion order and names exactly the keys of
/// `children`. Unless the node is a leaf, `row_ids` is the union of the
/// children's `row_ids`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Allocative)]
#[serde(rename_all = "camelCase")]
pub struct IndexNode {
    row_ids: RowSet,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    child_symbols: Vec<Symbol>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<Symbol, IndexNode>,
}

impl IndexNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_ids(&self) -> &RowSet {
        &self.row_ids
    }

    /// Symbols naming the next level, in the order they were first seen.
    pub fn child_symbols(&self) -> &[Symbol] {
        &self.child_symbols
    }

    pub fn child(&self, symbol: &str) -> Option<&IndexNode> {
        self.children.get(symbol)
    }

    /// Children in `child_symbols` order.
    pub fn children(&self) -> impl Iterator<Item = (&Symbol, &IndexNode)> {
        self.child_symbols
            .iter()
            .filter_map(|symbol| self.children.get(symbol).map(|node| (symbol, node)))
    }

    pub fn is_leaf(&self) -> bool {
        self.child_symbols.is_empty()
    }

    /// Number of nodes in this subtree, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(IndexNode::node_count).sum::<usize>()
    }

    /// Longest path from this node to a leaf, in edges.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn add_row(&mut self, id: RowId) {
        self.row_ids.insert(id);
    }

    /// Returns the child under `symbol`, creating it (and recording the
    /// symbol) if absent.
    pub(crate) fn child_entry(&mut self, symbol: &Symbol) -> &mut IndexNode {
        if !self.children.contains_key(symbol) {
            self.child_symbols.push(symbol.clone());
        }
        self.children.entry(symbol.clone()).or_default()
    }

    /// Calls `f` on every symbol used as a branch key in this subtree.
    pub(crate) fn try_for_each_symbol<F>(&self, f: &mut F) -> Result<()>
    where
        F: FnMut(&Symbol) -> Result<()>,
    {
        for (symbol, child) in &self.children {
            f(symbol)?;
            child.try_for_each_symbol(f)?;
        }
        Ok(())
    }

    /// Checks the structural invariants of this subtree.
    ///
    /// Every row id must be below `row_count`. `path` is the list of symbols
    /// leading here and is only used to make error messages point at the
    /// broken node.
    pub fn validate(&self, row_count: usize, path: &mut Vec<Symbol>) -> Result<()> {
        let at = || format!("/{}", path.iter().map(Symbol::as_str).collect::<Vec<_>>().join("/"));

        if let Some(last) = self.row_ids.last().filter(|&id| id >= row_count) {
            return Err(IndexError::InvalidDataset(format!(
                "node {} points at row {} of a {}-row dataset",
                at(),
                last,
                row_count
            )));
        }

        if self.child_symbols.len() != self.children.len() {
            return Err(IndexError::InvalidDataset(format!(
                "node {} lists {} child symbols but has {} children",
                at(),
                self.child_symbols.len(),
                self.children.len()
            )));
        }
        for symbol in &self.child_symbols {
            if !self.children.contains_key(symbol) {
                return Err(IndexError::InvalidDataset(format!(
                    "node {} lists child symbol `{}` without a child",
                    at(),
                    symbol
                )));
            }
        }

        if self.is_leaf() {
            return Ok(());
        }

        let mut union = RowSet::new();
        for child in self.children.values() {
            union.union_with(&child.row_ids);
        }
        if union != self.row_ids {
            return Err(IndexError::InvalidDataset(format!(
                "row ids of node {} differ from the union of its children",
                at()
            )));
        }

        for (symbol, child) in &self.children {
            path.push(symbol.clone());
            child.validate(row_count, path)?;
            path.pop();
        }
        Ok(())
    }
}

impl fmt::Display for IndexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IndexNode({} rows, {} children)",
            self.row_ids.len(),
            self.child_symbols.len()
        )
    }
}
