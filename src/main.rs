use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use tidyindex::builder::DEFAULT_MAX_FULL_COLUMNS;
use tidyindex::{BuildConfig, ColumnSelection, HashStrategy, OutputFormat, build, csv_source};

/// Index a tidy CSV table into a trie-shaped JSON dataset.
///
/// If no column names are given, every column is indexed.
#[derive(Debug, Parser)]
#[command(name = "tidyindex", version)]
struct Cli {
    /// Columns to index, in index order.
    columns: Vec<String>,

    /// Source table.
    #[arg(long, default_value = "source.csv")]
    csv: PathBuf,

    /// Output file; derived from the output format when absent.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Wrap the dataset in a JavaScript module of this name.
    #[arg(long)]
    module_name: Option<String>,

    /// Use values as their own symbols instead of serial ids.
    #[arg(long)]
    no_hash: bool,

    /// Index only the given column order.
    #[arg(long)]
    slim: bool,

    /// With --module-name, emit an Angular provider.
    #[arg(long)]
    angular2: bool,

    /// With --module-name, emit an ES module.
    #[arg(long)]
    es6: bool,

    /// Largest column count a full (non-slim) index accepts; 0 disables the check.
    #[arg(long, default_value_t = DEFAULT_MAX_FULL_COLUMNS)]
    max_full_columns: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,tidyindex=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = BuildConfig::new()
        .with_slim(cli.slim)
        .with_strategy(if cli.no_hash {
            HashStrategy::Identity
        } else {
            HashStrategy::Serial
        })
        .with_max_full_columns(cli.max_full_columns);
    let config = BuildConfig {
        columns: ColumnSelection::from_names(cli.columns),
        ..config
    };

    match &config.columns {
        ColumnSelection::All => info!(csv = %cli.csv.display(), "indexing on all columns"),
        ColumnSelection::Columns(columns) => {
            info!(csv = %cli.csv.display(), columns = %columns.join(", "), "indexing on columns")
        }
    }

    let rows = csv_source::read_rows_from_path(&cli.csv)
        .with_context(|| format!("reading {}", cli.csv.display()))?;
    let dataset = build(&rows, config)
        .with_context(|| format!("indexing {}", cli.csv.display()))?;

    let format = OutputFormat::choose(cli.module_name, cli.angular2, cli.es6);
    let out = cli
        .out
        .unwrap_or_else(|| PathBuf::from(format.default_file_name()));
    let rendered = format.render(&dataset)?;

    info!(out = %out.display(), format = %format, "writing dataset");
    std::fs::write(&out, rendered).with_context(|| format!("writing {}", out.display()))?;
    Ok(())
}
