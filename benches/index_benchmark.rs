use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tidyindex::{BuildConfig, IndexedDataset, Query, Row, Term, Value, build};

fn setup_rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            Row::from_iter([
                ("id", Value::Int(i as i64)),
                ("name", Value::from(format!("user{}", i % 500))),
                ("age", Value::Int((i % 100) as i64)),
                ("active", Value::Bool(i % 2 == 0)),
            ])
        })
        .collect()
}

fn setup_dataset(n: usize, slim: bool) -> IndexedDataset {
    let config = BuildConfig::new()
        .with_columns(["age", "active", "name"])
        .with_slim(slim);
    build(&setup_rows(n), config).unwrap()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("Build");

    for n in [1000, 10000].iter() {
        let rows = setup_rows(*n);
        group.bench_with_input(BenchmarkId::new("full", n), &rows, |b, rows| {
            b.iter(|| {
                let config = BuildConfig::new().with_columns(["age", "active", "name"]);
                black_box(build(rows, config).unwrap());
            });
        });
        group.bench_with_input(BenchmarkId::new("slim", n), &rows, |b, rows| {
            b.iter(|| {
                let config = BuildConfig::new()
                    .with_columns(["age", "active", "name"])
                    .with_slim(true);
                black_box(build(rows, config).unwrap());
            });
        });
    }
    group.finish();
}

fn bench_select_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("Select_Many");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let dataset = setup_dataset(n, false);
            let engine = dataset.engine();
            let query = Query::mapping([("active", Term::from(true)), ("age", Term::from(42))]);
            b.iter(|| {
                black_box(engine.select_many(black_box(&query), 0));
            });
        });
    }
    group.finish();
}

fn bench_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("Levels");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            let dataset = setup_dataset(n, true);
            let engine = dataset.engine();
            let query = Query::terms([Term::from("age"), Term::from(42), Term::from("active")]);
            b.iter(|| {
                black_box(engine.levels(black_box(&query)));
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_select_many, bench_levels);
criterion_main!(benches);
