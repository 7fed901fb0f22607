//! Reads rows from CSV with a header line.
//!
//! Every cell is kept as text: `2020` in a CSV file becomes `Value::Text("2020")`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<Row>> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = csv.headers()?.iter().map(str::to_owned).collect();

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record?;
        let mut row = Row::with_capacity(headers.len());
        for (column, cell) in headers.iter().zip(record.iter()) {
            row.insert(column.clone(), Value::from(cell));
        }
        rows.push(row);
    }
    debug!(rows = rows.len(), columns = headers.len(), "read csv");
    Ok(rows)
}

pub fn read_rows_from_path(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    read_rows(File::open(path)?)
}
