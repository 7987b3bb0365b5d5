//! # Mapping Benchmarks
//!
//! Performance benchmarks for isagraph-core row mapping, export and
//! snapshots.
//!
//! Run with: `cargo bench -p isagraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use isagraph_core::{
    FileContext, FormatInstance, Grammar, Graph, MappingConfig, MappingSession, Protocol,
    SectionInstance, Study, graph_to_bytes,
};
use std::hint::black_box;

const GRAMMAR: &str = r#"{"formats":[{"id":"samples","role":"sample","sections":[
    {"id":"main","fields":[
        {"id":"Source Name","type":"source"},
        {"id":"Characteristics","type":"characteristic"},
        {"id":"Protocol REF","type":"protocol_ref"},
        {"id":"Parameter Value","type":"parameter_value"},
        {"id":"Sample Name","type":"sample"},
        {"id":"Factor Value","type":"factor_value"}]}]}]}"#;

fn study() -> Study {
    Study::new("B").with_protocol(Protocol::new("collection").with_parameters(["method"]))
}

/// A sample table with `rows` rows; every tenth row reuses a source.
fn create_sample_table(grammar: &Grammar, rows: usize) -> FormatInstance {
    let def = grammar.format("samples").expect("format");
    let headers = [
        "Source Name",
        "Characteristics[organism]",
        "Protocol REF",
        "Parameter Value[method]",
        "Sample Name",
        "Factor Value[dose]",
    ];
    let records = (0..rows)
        .map(|i| {
            vec![
                format!("source-{}", i / 10),
                "mouse".to_string(),
                "collection".to_string(),
                "biopsy".to_string(),
                format!("sample-{}", i),
                if i % 2 == 0 { "low" } else { "high" }.to_string(),
            ]
        })
        .collect();
    let section =
        SectionInstance::from_rows("s_main", def.section("main").expect("section"), &headers, records)
            .expect("section");
    let mut format = FormatInstance::new(def, "s_main");
    format.push_section(section);
    format
}

fn mapped_graph(grammar: &Grammar, format: &FormatInstance) -> Graph {
    let mut session =
        MappingSession::new(grammar, study(), MappingConfig::default()).expect("session");
    session.map_format(format).expect("map");
    session.into_parts().graph
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_map_rows(c: &mut Criterion) {
    let grammar = Grammar::from_json_str(GRAMMAR).expect("grammar");
    let mut group = c.benchmark_group("map_rows");

    for size in [100, 1000, 10000].iter() {
        let format = create_sample_table(&grammar, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &format, |b, format| {
            b.iter(|| black_box(mapped_graph(&grammar, format)));
        });
    }

    group.finish();
}

fn bench_export_table(c: &mut Criterion) {
    let grammar = Grammar::from_json_str(GRAMMAR).expect("grammar");
    let mut group = c.benchmark_group("export_table");

    for size in [100, 1000].iter() {
        let format = create_sample_table(&grammar, *size);
        let mut session =
            MappingSession::new(&grammar, study(), MappingConfig::default()).expect("session");
        session.map_format(&format).expect("map");
        let context = FileContext::Sample("s_main".into());

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(session.export_table(&context)));
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let grammar = Grammar::from_json_str(GRAMMAR).expect("grammar");
    let mut group = c.benchmark_group("snapshot");

    for size in [100, 1000].iter() {
        let graph = mapped_graph(&grammar, &create_sample_table(&grammar, *size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(graph_to_bytes(&graph)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_map_rows, bench_export_table, bench_snapshot);
criterion_main!(benches);
