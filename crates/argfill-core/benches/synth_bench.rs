//! Criterion benchmarks for argfill-core.
//!
//! 1. **extraction**: tree-sitter parsing and definition extraction.
//! 2. **project**: building the project model from many modules.
//! 3. **synthesis**: previewing populated calls, flat and nested.
//!
//! ```sh
//! cargo bench --manifest-path crates/argfill-core/Cargo.toml -- synthesis
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use _argfill_core::config::EngineConfig;
use _argfill_core::indexer::symbols::extract_module;
use _argfill_core::models::{PopulateOptions, UnionSelections};
use _argfill_core::store::project::Project;
use _argfill_core::Workspace;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A module with `n` dataclasses, each nesting the previous one.
fn record_chain(n: usize) -> String {
    let mut source = String::from("from dataclasses import dataclass\n\n");
    for i in 0..n {
        source.push_str(&format!("\n@dataclass\nclass R{i}:\n    value: int\n    label: str\n"));
        if i > 0 {
            source.push_str(&format!("    inner: R{}\n", i - 1));
        }
    }
    source.push_str(&format!("\n\nR{}()\n", n.saturating_sub(1)));
    source
}

/// `n` modules importing records from each other.
fn package(n: usize) -> Vec<(String, String)> {
    (0..n)
        .map(|i| {
            let mut source = String::from("from dataclasses import dataclass\n");
            if i > 0 {
                source.push_str(&format!("from pkg.m{} import M{}\n", i - 1, i - 1));
            }
            source.push_str(&format!("\n\n@dataclass\nclass M{i}:\n    a: int\n    b: str | None\n"));
            if i > 0 {
                source.push_str(&format!("    prev: M{}\n", i - 1));
            }
            source.push_str(&format!("\n\ndef use{i}(x: M{i}, y: int = 0):\n    use{i}()\n"));
            (format!("pkg/m{i}.py"), source)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    for n in [10, 100] {
        let source = record_chain(n);
        group.bench_with_input(BenchmarkId::new("record_chain", n), &source, |b, source| {
            b.iter(|| extract_module(black_box("main.py"), source.clone()).unwrap());
        });
    }
    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("project");
    let config = EngineConfig::default();
    for n in [10, 100] {
        let sources = package(n);
        group.bench_with_input(BenchmarkId::new("build", n), &sources, |b, sources| {
            b.iter(|| Project::from_sources(black_box(sources.clone()), &config));
        });
    }
    group.finish();
}

fn bench_synthesis(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesis");
    let selections = UnionSelections::new();

    let source = record_chain(8);
    let offset = source.rfind("()").unwrap() + 1;
    let ws = Workspace::from_sources([("main.py", source.as_str())], EngineConfig::default());
    for (label, options) in [
        ("nested", PopulateOptions::default()),
        ("flat", PopulateOptions::default().flat()),
        ("locals", PopulateOptions::default().with_local_scope()),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                ws.preview("main.py", black_box(offset), &options, &selections)
                    .unwrap()
            });
        });
    }

    let sources = package(20);
    let path = sources[19].0.clone();
    let offset = sources[19].1.rfind("()").unwrap() + 1;
    let ws = Workspace::from_sources(sources, EngineConfig::default());
    group.bench_function("cross_module", |b| {
        b.iter(|| {
            ws.preview(&path, black_box(offset), &PopulateOptions::default(), &selections)
                .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, bench_extraction, bench_project, bench_synthesis);
criterion_main!(benches);
