//! Query engine: resolves equality predicates against a frozen dataset.
//!
//! A query names a path through the trie. In flat form it alternates column
//! and value, `["city", "NY", "year", 2020]`; an open term after a column
//! name stops the path there, which is how [QueryEngine::levels] enumerates
//! the values of that column. A full index also accepts the mapping form
//! `{city: "NY", year: 2020}`, whose entries may come in any order.
//!
//! Nothing on the query surface returns an error: an unknown column or value
//! combination, or a malformed query, simply matches no rows.

use tracing::{debug, warn};

use crate::dataset::IndexedDataset;
use crate::error::{IndexError, Result};
use crate::node::{IndexNode, RowId};
use crate::row::Row;
use crate::value::Value;

/// One element of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Value(Value),
    /// Any value: stop here and enumerate.
    Open,
}

macro_rules! term_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Term {
            fn from(v: $t) -> Self {
                Term::Value(Value::from(v))
            }
        })*
    };
}

term_from!(i64, i32, f64, bool, &str, String);

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Term::Value(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Column, value, column, value, ...
    Terms(Vec<Term>),
    /// Column -> value entries; an open value ends the query at that column.
    Mapping(Vec<(String, Term)>),
}

impl Default for Query {
    fn default() -> Self {
        Query::Terms(Vec::new())
    }
}

impl Query {
    pub fn terms<I, T>(terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Term>,
    {
        Query::Terms(terms.into_iter().map(Into::into).collect())
    }

    pub fn mapping<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Term>,
    {
        Query::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Reads a query from JSON: an array is the flat form (`null` marks an
    /// open term), an object the mapping form, a bare scalar a one-term query
    /// and `null` the empty query.
    ///
    /// # Errors
    /// [IndexError::QueryShape] when a term is itself an array or object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        fn term(json: &serde_json::Value) -> Result<Term> {
            match json {
                serde_json::Value::Null => Ok(Term::Open),
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => Err(
                    IndexError::QueryShape(format!("term {json} is neither a column nor a value")),
                ),
                scalar => Ok(Term::Value(serde_json::from_value(scalar.clone())?)),
            }
        }

        match json {
            serde_json::Value::Null => Ok(Query::default()),
            serde_json::Value::Array(items) => {
                Ok(Query::Terms(items.iter().map(term).collect::<Result<_>>()?))
            }
            serde_json::Value::Object(entries) => Ok(Query::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| -> Result<(String, Term)> { Ok((k.clone(), term(v)?)) })
                    .collect::<Result<_>>()?,
            )),
            scalar => Ok(Query::Terms(vec![term(scalar)?])),
        }
    }
}

/// Read-only view answering queries over one dataset.
///
/// Holds nothing but a shared reference, so any number of engines can query
/// the same dataset concurrently.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine<'a> {
    dataset: &'a IndexedDataset,
}

impl<'a> QueryEngine<'a> {
    pub fn new(dataset: &'a IndexedDataset) -> Self {
        Self { dataset }
    }

    pub fn dataset(&self) -> &'a IndexedDataset {
        self.dataset
    }

    /// Flattens a query into the list of raw terms to walk.
    ///
    /// The flat form stops at its first open term. The mapping form is
    /// rebuilt as column, value, ... and stops right after the first column
    /// whose value is open; later entries are ignored.
    ///
    /// # Errors
    /// The mapping form is rejected on a slim index, where the column order
    /// of the query has to match the index order.
    pub fn normalize_query(&self, query: &Query) -> Result<Vec<Value>> {
        match query {
            Query::Terms(terms) => Ok(terms
                .iter()
                .map_while(|term| match term {
                    Term::Value(v) => Some(v.clone()),
                    Term::Open => None,
                })
                .collect()),
            Query::Mapping(_) if self.dataset.is_slim() => Err(IndexError::QueryShape(
                "query order matters for a truncated index: use the flat term form".into(),
            )),
            Query::Mapping(entries) => {
                let mut flat = Vec::with_capacity(entries.len() * 2);
                for (column, term) in entries {
                    flat.push(Value::from(column.as_str()));
                    match term {
                        Term::Value(v) => flat.push(v.clone()),
                        Term::Open => break,
                    }
                }
                Ok(flat)
            }
        }
    }

    /// Walks the trie along `terms`.
    ///
    /// Returns `Ok(None)` when the path leaves the trie.
    ///
    /// # Errors
    /// [IndexError::UnknownValue] when a term was never hashed during the
    /// build.
    pub fn resolve(&self, terms: &[Value]) -> Result<Option<&'a IndexNode>> {
        let symbols = self.dataset.symbols();
        let mut node = self.dataset.index();
        for term in terms {
            let symbol = symbols.lookup(term)?;
            match node.child(symbol.as_str()) {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
        Ok(Some(node))
    }

    /// Decodes a stored row back to its raw column -> value mapping.
    ///
    /// # Errors
    /// Fails if the row id or one of its symbols is unknown, which does not
    /// happen on a dataset that passed validation.
    pub fn decode_row(&self, row_id: RowId) -> Result<Row> {
        let encoded = self
            .dataset
            .encoded_row(row_id)
            .ok_or(IndexError::UnknownRow(row_id))?;
        let symbols = self.dataset.symbols();

        let mut row = Row::with_capacity(encoded.len());
        for (column, value) in encoded.iter() {
            let column = match symbols.unhash(column.as_str())? {
                Value::Text(name) => name.to_string(),
                other => other.to_string(),
            };
            row.insert(column, symbols.unhash(value.as_str())?.clone());
        }
        Ok(row)
    }

    fn try_select(&self, query: &Query, limit: usize) -> Result<Vec<Row>> {
        let terms = self.normalize_query(query)?;
        let Some(node) = self.resolve(&terms)? else {
            return Ok(Vec::new());
        };
        let take = if limit > 0 { limit } else { usize::MAX };
        node.row_ids()
            .iter()
            .take(take)
            .map(|id| self.decode_row(id))
            .collect()
    }

    /// Rows matching `query`, in row id order. A positive `limit` keeps only
    /// the first `limit` rows; `0` keeps all.
    pub fn select_many(&self, query: &Query, limit: usize) -> Vec<Row> {
        self.try_select(query, limit).unwrap_or_else(|e| {
            log_suppressed(&e, query);
            Vec::new()
        })
    }

    /// First row matching `query`.
    pub fn select_one(&self, query: &Query) -> Option<Row> {
        self.select_many(query, 1).into_iter().next()
    }

    /// Value of `column` in every matching row; `None` where a row lacks it.
    pub fn select_many_column(&self, query: &Query, column: &str) -> Vec<Option<Value>> {
        extract(self.select_many(query, 0), column)
    }

    /// Value of `column` in the first matching row.
    pub fn select_one_column(&self, query: &Query, column: &str) -> Option<Value> {
        self.select_one(query)
            .and_then(|row| row.get(column).cloned())
    }

    fn try_levels(&self, query: &Query) -> Result<Option<Vec<Value>>> {
        let terms = self.normalize_query(query)?;
        let Some(node) = self.resolve(&terms)? else {
            return Ok(None);
        };
        let on_value = terms.len() % 2 == 0 && !terms.is_empty();
        let next = match node.children().next() {
            // A value node with one column below: list that column's values.
            Some((_, column)) if on_value && node.child_symbols().len() == 1 => {
                column.child_symbols()
            }
            _ => node.child_symbols(),
        };
        let symbols = self.dataset.symbols();
        next.iter()
            .map(|symbol| symbols.unhash(symbol.as_str()).cloned())
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Distinct values that can follow `query`.
    ///
    /// The empty query lists the column names and a query ending on a column
    /// name lists that column's values. A query ending on a value lists the
    /// values of the next column when exactly one column is left below it, so
    /// on a slim index `[A, a]` gives the distinct values of the next indexed
    /// column among rows with `A = a`. With several columns left it lists
    /// their names.
    pub fn levels(&self, query: &Query) -> Vec<Value> {
        match self.try_levels(query) {
            Ok(Some(levels)) => levels,
            Ok(None) => {
                warn!(query = ?query, "no level values found");
                Vec::new()
            }
            Err(e) => {
                warn!(query = ?query, error = %e, "no level values found");
                Vec::new()
            }
        }
    }
}

fn extract(rows: Vec<Row>, column: &str) -> Vec<Option<Value>> {
    rows.into_iter()
        .map(|row| row.get(column).cloned())
        .collect()
}

fn log_suppressed(error: &IndexError, query: &Query) {
    if error.is_query_error() {
        debug!(query = ?query, error = %error, "query matched nothing");
    } else {
        warn!(query = ?query, error = %error, "query failed on an inconsistent dataset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildConfig, build};

    fn cities() -> IndexedDataset {
        let rows = vec![
            Row::from_iter([("city", Value::from("NY")), ("year", Value::from(2020))]),
            Row::from_iter([("city", Value::from("NY")), ("year", Value::from(2021))]),
            Row::from_iter([("city", Value::from("LA")), ("year", Value::from(2020))]),
        ];
        build(&rows, BuildConfig::new()).unwrap()
    }

    fn slim_cities() -> IndexedDataset {
        let rows = vec![
            Row::from_iter([("city", Value::from("NY")), ("year", Value::from(2020))]),
            Row::from_iter([("city", Value::from("LA")), ("year", Value::from(2020))]),
        ];
        build(&rows, BuildConfig::new().with_slim(true)).unwrap()
    }

    // ─────────────────────────────────────────────────────────────
    // normalize_query
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_normalize_flat_stops_at_open() {
        let dataset = cities();
        let engine = dataset.engine();
        let query = Query::terms([Term::from("city"), Term::Open, Term::from("year")]);
        assert_eq!(
            engine.normalize_query(&query).unwrap(),
            vec![Value::from("city")]
        );
    }

    #[test]
    fn test_normalize_mapping_truncates_after_first_open_column() {
        let dataset = cities();
        let engine = dataset.engine();
        let query = Query::mapping([
            ("year", Term::from(2020)),
            ("city", Term::Open),
            ("month", Term::from(1)),
        ]);
        assert_eq!(
            engine.normalize_query(&query).unwrap(),
            vec![Value::from("year"), Value::Int(2020), Value::from("city")]
        );
    }

    #[test]
    fn test_normalize_mapping_rejected_on_slim() {
        let dataset = slim_cities();
        let err = dataset
            .engine()
            .normalize_query(&Query::mapping([("city", "NY")]))
            .unwrap_err();
        assert!(matches!(err, IndexError::QueryShape(_)));
    }

    // ─────────────────────────────────────────────────────────────
    // resolve
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_resolve_paths() {
        let dataset = cities();
        let engine = dataset.engine();

        let root = engine.resolve(&[]).unwrap().unwrap();
        assert_eq!(root.row_ids().len(), 3);

        let ny = engine
            .resolve(&[Value::from("city"), Value::from("NY")])
            .unwrap()
            .unwrap();
        assert_eq!(ny.row_ids().iter().collect::<Vec<_>>(), vec![0, 1]);

        // Known value, but not below this column.
        assert!(
            engine
                .resolve(&[Value::from("city"), Value::Int(2020)])
                .unwrap()
                .is_none()
        );

        // Never hashed.
        assert!(matches!(
            engine.resolve(&[Value::from("state")]),
            Err(IndexError::UnknownValue(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // select
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_select_many_and_limit() {
        let dataset = cities();
        let engine = dataset.engine();
        let query = Query::terms(["city", "NY"]);

        let all = engine.select_many(&query, 0);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].get("year"), Some(&Value::Int(2020)));
        assert_eq!(all[1].get("year"), Some(&Value::Int(2021)));

        let first = engine.select_many(&query, 1);
        assert_eq!(first, all[..1].to_vec());
        assert_eq!(engine.select_one(&query), Some(all[0].clone()));
    }

    #[test]
    fn test_empty_query_selects_everything() {
        let dataset = cities();
        assert_eq!(dataset.engine().select_many(&Query::default(), 0).len(), 3);
    }

    #[test]
    fn test_select_no_match_is_empty() {
        let dataset = cities();
        let engine = dataset.engine();
        assert!(engine.select_many(&Query::terms(["city", "SF"]), 0).is_empty());
        assert!(engine.select_many(&Query::terms(["state", "CA"]), 0).is_empty());
        assert_eq!(engine.select_one(&Query::terms(["city", "SF"])), None);
    }

    #[test]
    fn test_select_column_projection() {
        let dataset = cities();
        let engine = dataset.engine();
        let query = Query::terms(["city", "NY"]);
        assert_eq!(
            engine.select_many_column(&query, "year"),
            vec![Some(Value::Int(2020)), Some(Value::Int(2021))]
        );
        assert_eq!(engine.select_many_column(&query, "month"), vec![None, None]);
        assert_eq!(
            engine.select_one_column(
                &Query::terms([Term::from("year"), Term::from(2020)]),
                "city"
            ),
            Some(Value::from("NY"))
        );
    }

    // ─────────────────────────────────────────────────────────────
    // levels
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_levels() {
        let dataset = cities();
        let engine = dataset.engine();

        assert_eq!(
            engine.levels(&Query::default()),
            vec![Value::from("city"), Value::from("year")]
        );
        assert_eq!(
            engine.levels(&Query::terms(["city"])),
            vec![Value::from("NY"), Value::from("LA")]
        );
        assert_eq!(
            engine.levels(&Query::terms(["city", "NY"])),
            vec![Value::Int(2020), Value::Int(2021)]
        );
        assert_eq!(
            engine.levels(&Query::terms([Term::from("year"), Term::from(2020)])),
            vec![Value::from("NY"), Value::from("LA")]
        );
        assert_eq!(
            engine.levels(&Query::terms(["city", "NY", "year"])),
            vec![Value::Int(2020), Value::Int(2021)]
        );
        assert!(engine.levels(&Query::terms(["city", "SF"])).is_empty());
    }

    #[test]
    fn test_levels_lists_column_names_when_several_remain() {
        let rows = vec![
            Row::from_iter([
                ("city", Value::from("NY")),
                ("year", Value::from(2020)),
                ("month", Value::from("Jan")),
            ]),
            Row::from_iter([
                ("city", Value::from("NY")),
                ("year", Value::from(2021)),
                ("month", Value::from("Feb")),
            ]),
        ];
        let dataset = build(&rows, BuildConfig::new()).unwrap();
        let engine = dataset.engine();

        assert_eq!(
            engine.levels(&Query::terms(["city", "NY"])),
            vec![Value::from("year"), Value::from("month")]
        );
        // One column left below: its values.
        assert_eq!(
            engine.levels(&Query::terms(["city", "NY", "month", "Jan"])),
            vec![Value::Int(2020)]
        );
        assert_eq!(
            engine.levels(&Query::terms(["city", "NY", "year"])),
            vec![Value::Int(2020), Value::Int(2021)]
        );
    }

    #[test]
    fn test_levels_through_mapping_open_column() {
        let dataset = cities();
        let query = Query::mapping([("year", Term::from(2020)), ("city", Term::Open)]);
        assert_eq!(
            dataset.engine().levels(&query),
            vec![Value::from("NY"), Value::from("LA")]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // decode_row
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_decode_row() {
        let dataset = cities();
        let row = dataset.engine().decode_row(2).unwrap();
        assert_eq!(row.columns(), vec!["city", "year"]);
        assert_eq!(row.get("city"), Some(&Value::from("LA")));
        assert!(matches!(
            dataset.engine().decode_row(3),
            Err(IndexError::UnknownRow(3))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // JSON queries
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_query_from_json() {
        let q = Query::from_json(&serde_json::json!(["city", "NY", "year", null])).unwrap();
        assert_eq!(
            q,
            Query::terms([Term::from("city"), Term::from("NY"), Term::from("year"), Term::Open])
        );

        let q = Query::from_json(&serde_json::json!({"year": 2020, "city": null})).unwrap();
        assert_eq!(
            q,
            Query::mapping([("year", Term::from(2020)), ("city", Term::Open)])
        );

        let q = Query::from_json(&serde_json::json!("city")).unwrap();
        assert_eq!(q, Query::terms(["city"]));

        assert_eq!(Query::from_json(&serde_json::Value::Null).unwrap(), Query::default());
    }

    #[test]
    fn test_query_from_json_rejects_nested_terms() {
        let err = Query::from_json(&serde_json::json!(["city", ["NY"]])).unwrap_err();
        assert!(matches!(err, IndexError::QueryShape(_)));
        let err = Query::from_json(&serde_json::json!({"city": {"eq": "NY"}})).unwrap_err();
        assert!(matches!(err, IndexError::QueryShape(_)));
    }
}
