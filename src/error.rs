//! Error types for index construction and loading.

use thiserror::Error;

use crate::node::RowId;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Column `{column}` does not appear in row {row}")]
    MissingColumn { column: String, row: RowId },

    #[error("Could not hash {0}: not in hash table")]
    UnknownValue(String),

    #[error("Could not unhash {0}: value not found in hash table")]
    UnknownSymbol(String),

    #[error("Row {0} is not part of the dataset")]
    UnknownRow(RowId),

    #[error("Symbol `{symbol}` already names {existing}, cannot reuse it for {incoming}")]
    SymbolCollision {
        symbol: String,
        existing: String,
        incoming: String,
    },

    #[error("Full index over {requested} columns exceeds the limit of {limit}; use a slim index or raise the limit")]
    TooManyColumns { requested: usize, limit: usize },

    #[error("Invalid query: {0}")]
    QueryShape(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether the error comes from a malformed or unmatched query rather
    /// than from a broken dataset.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            IndexError::QueryShape(_) | IndexError::UnknownValue(_)
        )
    }
}
