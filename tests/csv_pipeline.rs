//! CSV in, wrapped dataset out, queries on the reloaded result.

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tidyindex::csv_source::{read_rows, read_rows_from_path};
use tidyindex::{BuildConfig, HashStrategy, IndexError, IndexedDataset, OutputFormat, Query, Value, build};

const SOURCE: &str = "\
region,product,units
north,apples,10
north,pears,4
south,apples,7
south,plums,1
";

#[test]
fn csv_to_json_and_back() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.csv");
    fs::write(&source, SOURCE).unwrap();

    let rows = read_rows_from_path(&source).unwrap();
    let dataset = build(&rows, BuildConfig::new().with_columns(["region", "product"])).unwrap();

    let format = OutputFormat::choose(None, false, false);
    let out = dir.path().join(format.default_file_name());
    fs::write(&out, format.render(&dataset).unwrap()).unwrap();

    let reloaded = IndexedDataset::from_json(&fs::read_to_string(&out).unwrap()).unwrap();
    let engine = reloaded.engine();

    // Unindexed columns still come back with the row.
    assert_eq!(
        engine.select_many_column(&Query::terms(["product", "apples"]), "units"),
        vec![Some(Value::from("10")), Some(Value::from("7"))]
    );
    assert_eq!(
        engine.levels(&Query::terms(["region", "south", "product"])),
        vec![Value::from("apples"), Value::from("plums")]
    );
    // units is stored but not indexed.
    assert!(engine.select_many(&Query::terms(["region", "north", "units", "10"]), 0).is_empty());
}

#[test]
fn identity_symbols_are_readable() {
    let rows = read_rows(SOURCE.as_bytes()).unwrap();
    let dataset = build(
        &rows,
        BuildConfig::new()
            .with_slim(true)
            .with_strategy(HashStrategy::Identity),
    )
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&dataset.to_json().unwrap()).unwrap();
    assert_eq!(
        json["data"][2],
        serde_json::json!({"region": "south", "product": "apples", "units": "7"})
    );
    assert_eq!(json["indexOrder"], serde_json::json!(["region", "product", "units"]));
    assert_eq!(json["index"]["childSymbols"], serde_json::json!(["region"]));
}

#[test]
fn missing_column_aborts_the_build() {
    let rows = read_rows(SOURCE.as_bytes()).unwrap();
    let err = build(&rows, BuildConfig::new().with_columns(["region", "colour"])).unwrap_err();
    assert!(
        matches!(&err, IndexError::MissingColumn { column, row: 0 } if column == "colour"),
        "{err}"
    );
}

#[test]
fn module_wrappers_name_their_files() {
    let rows = read_rows(SOURCE.as_bytes()).unwrap();
    let dataset = build(&rows, BuildConfig::new().with_slim(true)).unwrap();

    let window = OutputFormat::choose(Some("Sales".into()), false, false);
    assert_eq!(window.default_file_name(), "Sales.js");
    let rendered = window.render(&dataset).unwrap();
    assert!(rendered.starts_with(";(function(d){ return d.Sales = {"));

    let angular = OutputFormat::choose(Some("Sales".into()), true, false);
    assert_eq!(angular.default_file_name(), "ng-sales.js");
}
