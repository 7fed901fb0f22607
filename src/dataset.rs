//! The frozen, serializable result of a build.
//!
//! Serialized form (JSON):
//! ```text
//! {
//!   "data":       [ { column symbol: value symbol, ... }, ... ],   // by row id
//!   "index":      { "rowIds": [...], "childSymbols": [...], "children": { symbol: node } },
//!   "hash":       { value text: symbol },
//!   "unhash":     { symbol: value },
//!   "slim":       bool,
//!   "indexOrder": [ column, ... ]                                  // slim only
//! }
//! ```

use std::collections::HashSet;

use allocative::Allocative;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::node::{IndexNode, RowId};
use crate::query::QueryEngine;
use crate::row::EncodedRow;
use crate::symbols::{Symbol, SymbolTable};

#[derive(Debug, Clone, Serialize, Deserialize, Allocative)]
#[serde(rename_all = "camelCase")]
pub struct IndexedDataset {
    data: Vec<EncodedRow>,
    index: IndexNode,
    #[serde(flatten)]
    symbols: SymbolTable,
    slim: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index_order: Option<Vec<String>>,
}

impl IndexedDataset {
    pub(crate) fn assemble(
        data: Vec<EncodedRow>,
        index: IndexNode,
        symbols: SymbolTable,
        slim: bool,
        index_order: Option<Vec<String>>,
    ) -> Self {
        Self {
            data,
            index,
            symbols,
            slim,
            index_order,
        }
    }

    /// Root of the trie.
    pub fn index(&self) -> &IndexNode {
        &self.index
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn is_slim(&self) -> bool {
        self.slim
    }

    /// Column order a slim index must be queried in; `None` for a full index.
    pub fn index_order(&self) -> Option<&[String]> {
        self.index_order.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Hashed form of a stored row.
    pub fn encoded_row(&self, row_id: RowId) -> Option<&EncodedRow> {
        self.data.get(row_id)
    }

    /// Read-only query engine over this dataset.
    pub fn engine(&self) -> QueryEngine<'_> {
        QueryEngine::new(self)
    }

    /// Bytes of heap memory owned by the dataset.
    pub fn heap_size(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a serialized dataset and checks it with [IndexedDataset::validate].
    pub fn from_json(json: &str) -> Result<Self> {
        let dataset: IndexedDataset = serde_json::from_str(json)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Checks the invariants a correctly built dataset holds:
    ///
    /// - every node lists exactly its children and carries the union of
    ///   their row ids,
    /// - no node points past the stored rows,
    /// - the root carries every stored row,
    /// - every symbol in the rows and the trie decodes,
    /// - `indexOrder` is present exactly when the index is slim.
    pub fn validate(&self) -> Result<()> {
        self.index.validate(self.data.len(), &mut Vec::new())?;

        let root_ids: Vec<RowId> = self.index.row_ids().iter().collect();
        let expected: Vec<RowId> = (0..self.data.len()).collect();
        if root_ids != expected {
            return Err(IndexError::InvalidDataset(format!(
                "root holds {} row ids for {} stored rows",
                root_ids.len(),
                expected.len()
            )));
        }

        let mut checked: HashSet<&str> = HashSet::new();
        let mut check = |symbol: &Symbol| -> Result<()> {
            if self.symbols.contains_symbol(symbol.as_str()) {
                Ok(())
            } else {
                Err(IndexError::UnknownSymbol(symbol.to_string()))
            }
        };
        for row in &self.data {
            for (column, value) in row.iter() {
                for symbol in [column, value] {
                    if checked.insert(symbol.as_str()) {
                        check(symbol)?;
                    }
                }
            }
        }
        self.index.try_for_each_symbol(&mut check)?;

        match (&self.index_order, self.slim) {
            (Some(_), false) => Err(IndexError::InvalidDataset(
                "indexOrder is only meaningful for a slim index".into(),
            )),
            (None, true) => Err(IndexError::InvalidDataset(
                "slim index without indexOrder".into(),
            )),
            _ => Ok(()),
        }
    }
}
