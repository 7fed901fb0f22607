pub mod builder;
pub mod csv_source;
pub mod dataset;
pub mod error;
pub mod node;
pub mod query;
pub mod row;
pub mod symbols;
pub mod value;
pub mod wrap;

pub use builder::{BuildConfig, ColumnSelection, IndexBuilder, build, estimate_branches};
pub use dataset::IndexedDataset;
pub use error::{IndexError, Result};
pub use node::{IndexNode, RowId, RowSet};
pub use query::{Query, QueryEngine, Term};
pub use row::{EncodedRow, Row};
pub use symbols::{HashStrategy, Symbol, SymbolTable};
pub use value::Value;
pub use wrap::OutputFormat;
