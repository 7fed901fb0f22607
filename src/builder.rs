//! Index builder: folds rows, one at a time, into the trie.
//!
//! For every row the builder
//! 1. hashes every column name and value into the [SymbolTable],
//! 2. stores the hashed row under the next row id,
//! 3. inserts the row id along the trie paths of the indexed columns.
//!
//! A *full* index opens a branch for every remaining column at every depth,
//! so any subset of the columns can later be queried in any order. Its size
//! grows factorially with the column count. A *slim* index only follows the
//! columns in their configured order: linear growth, but queries must name
//! columns in that order.

use tracing::{debug, info, warn};

use crate::dataset::IndexedDataset;
use crate::error::{IndexError, Result};
use crate::node::{IndexNode, RowId};
use crate::row::{EncodedRow, Row};
use crate::symbols::{HashStrategy, Symbol, SymbolTable};
use crate::value::Value;

/// Default ceiling on the column count of a full index.
pub const DEFAULT_MAX_FULL_COLUMNS: usize = 8;

/// Full indexes over this many columns log a size warning.
const FACTORIAL_WARN_COLUMNS: usize = 6;

/// Which columns of the rows go into the trie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelection {
    /// Every column of the first row, in its order.
    #[default]
    All,
    /// An explicit subset, in this order.
    Columns(Vec<String>),
}

impl ColumnSelection {
    /// An empty list means every column, as on the command line.
    pub fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            Self::All
        } else {
            Self::Columns(names)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub columns: ColumnSelection,
    pub slim: bool,
    pub strategy: HashStrategy,
    /// Largest column count accepted for a full index; `0` disables the check.
    pub max_full_columns: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            columns: ColumnSelection::All,
            slim: false,
            strategy: HashStrategy::Serial,
            max_full_columns: DEFAULT_MAX_FULL_COLUMNS,
        }
    }
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = ColumnSelection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_slim(mut self, slim: bool) -> Self {
        self.slim = slim;
        self
    }

    pub fn with_strategy(mut self, strategy: HashStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_max_full_columns(mut self, limit: usize) -> Self {
        self.max_full_columns = limit;
        self
    }
}

/// Number of column levels one row opens in the trie.
///
/// A full index over `n` columns creates one column node per ordered prefix
/// of distinct columns: `n + n(n-1) + ... + n!`. A slim index creates `n`.
/// Saturates at `usize::MAX`.
pub fn estimate_branches(column_count: usize, slim: bool) -> usize {
    if slim {
        return column_count;
    }
    let mut total: usize = 0;
    let mut prefixes: usize = 1;
    for k in 0..column_count {
        prefixes = prefixes.saturating_mul(column_count - k);
        total = total.saturating_add(prefixes);
    }
    total
}

/// Inserts `row_id` into `node` along every path through `remaining`.
///
/// `remaining` holds the (column, value) symbol pairs still to branch on.
/// Each sibling recursion drops only its own column, so in a full index every
/// remaining column is a separate entry point at every depth. The pair is
/// taken out of the buffer for the recursion and put back at the same place
/// afterwards.
fn insert(
    node: &mut IndexNode,
    remaining: &mut Vec<(Symbol, Symbol)>,
    row_id: RowId,
    slim: bool,
) {
    node.add_row(row_id);
    if remaining.is_empty() {
        return;
    }

    let working = if slim { 1 } else { remaining.len() };
    for i in 0..working {
        let (column, value) = remaining.remove(i);

        let column_node = node.child_entry(&column);
        column_node.add_row(row_id);
        let value_node = column_node.child_entry(&value);
        insert(value_node, remaining, row_id, slim);

        remaining.insert(i, (column, value));
    }
}

/// Incremental builder. Rows must be pushed in order; the builder owns the
/// only mutable symbol table of the build.
#[derive(Debug)]
pub struct IndexBuilder {
    config: BuildConfig,
    symbols: SymbolTable,
    root: IndexNode,
    rows: Vec<EncodedRow>,
    /// Indexed columns, resolved from the config and the first row.
    columns: Option<Vec<String>>,
}

impl IndexBuilder {
    /// # Errors
    /// Fails with [IndexError::TooManyColumns] when an explicit column list
    /// is too wide for a full index.
    pub fn new(config: BuildConfig) -> Result<Self> {
        let mut builder = Self {
            symbols: SymbolTable::new(config.strategy),
            root: IndexNode::new(),
            rows: Vec::new(),
            columns: None,
            config,
        };
        if let ColumnSelection::Columns(columns) = &builder.config.columns {
            let columns = columns.clone();
            builder.set_columns(columns)?;
        }
        Ok(builder)
    }

    fn set_columns(&mut self, columns: Vec<String>) -> Result<()> {
        let limit = self.config.max_full_columns;
        if !self.config.slim {
            if limit > 0 && columns.len() > limit {
                return Err(IndexError::TooManyColumns {
                    requested: columns.len(),
                    limit,
                });
            }
            if columns.len() >= FACTORIAL_WARN_COLUMNS {
                warn!(
                    columns = columns.len(),
                    branches_per_row = estimate_branches(columns.len(), false),
                    "full index grows factorially with the column count"
                );
            }
        }
        self.columns = Some(columns);
        Ok(())
    }

    /// Columns this build indexes, once known.
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Checks that `row` carries every indexed column.
    ///
    /// With [ColumnSelection::All] and no row pushed yet, any row passes: its
    /// own columns become the indexed ones.
    pub fn check_row(&self, row: &Row, row_id: RowId) -> Result<()> {
        let Some(columns) = &self.columns else {
            return Ok(());
        };
        match columns.iter().find(|column| !row.contains_key(column)) {
            Some(missing) => Err(IndexError::MissingColumn {
                column: missing.clone(),
                row: row_id,
            }),
            None => Ok(()),
        }
    }

    /// Encodes and indexes one row, returning its id.
    pub fn push_row(&mut self, row: &Row) -> Result<RowId> {
        let row_id = self.rows.len();
        if self.columns.is_none() {
            self.set_columns(row.columns())?;
        }
        self.check_row(row, row_id)?;
        debug!(row = row_id, "indexing row");

        let mut encoded = EncodedRow::with_capacity(row.len());
        for (column, value) in row.iter() {
            let column = self.symbols.hash(&Value::from(column.as_str()))?;
            let value = self.symbols.hash(value)?;
            encoded.insert(column, value);
        }

        let mut pairs = Vec::new();
        for column in self.columns.iter().flatten() {
            let column_symbol = self.symbols.lookup(&Value::from(column.as_str()))?.clone();
            let value_symbol = encoded
                .get(column_symbol.as_str())
                .cloned()
                .ok_or_else(|| IndexError::UnknownValue(column.clone()))?;
            pairs.push((column_symbol, value_symbol));
        }

        insert(&mut self.root, &mut pairs, row_id, self.config.slim);
        self.rows.push(encoded);
        Ok(row_id)
    }

    /// Freezes the build into a dataset.
    pub fn finish(self) -> IndexedDataset {
        let index_order = if self.config.slim {
            Some(self.columns.unwrap_or_default())
        } else {
            None
        };
        let dataset = IndexedDataset::assemble(
            self.rows,
            self.root,
            self.symbols,
            self.config.slim,
            index_order,
        );
        info!(
            rows = dataset.row_count(),
            symbols = dataset.symbols().len(),
            nodes = dataset.index().node_count(),
            slim = dataset.is_slim(),
            "index built"
        );
        dataset
    }
}

/// Builds a dataset from `rows` in one go.
///
/// Every row is checked for the indexed columns before the first one is
/// indexed, so a bad input never produces a partial index.
pub fn build<'a, I>(rows: I, config: BuildConfig) -> Result<IndexedDataset>
where
    I: IntoIterator<Item = &'a Row>,
{
    let rows: Vec<&Row> = rows.into_iter().collect();
    let mut builder = IndexBuilder::new(config)?;

    let resolved = match (&builder.config.columns, rows.first()) {
        (ColumnSelection::Columns(columns), _) => Some(columns.clone()),
        (ColumnSelection::All, Some(first)) => Some(first.columns()),
        (ColumnSelection::All, None) => None,
    };
    if let Some(columns) = resolved {
        if builder.columns.is_none() {
            builder.set_columns(columns)?;
        }
        for (row_id, row) in rows.iter().enumerate() {
            builder.check_row(row, row_id)?;
        }
    }

    for row in rows {
        builder.push_row(row)?;
    }
    Ok(builder.finish())
}
