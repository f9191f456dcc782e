use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

use graph_importer::{
    model::{Attribute, ConstTensor, DataType, ForeignGraph, ForeignNode, TensorPayload},
    ops::sequence::sequence_length,
    Graph, GraphImporter, Operator, Range, Tensor,
};

fn int_constant(name: &str, value: i64) -> ForeignNode {
    ForeignNode::new(name, "Const", &[]).with_attribute(
        "value",
        Attribute::Tensor(ConstTensor {
            data_type: DataType::Int64,
            dims: vec![],
            payload: TensorPayload::Int64(vec![value]),
        }),
    )
}

/// `count` independent ranges, every other one fed by a placeholder delta
fn mixed_graph(count: usize, rng: &mut StdRng) -> ForeignGraph {
    let mut nodes = Vec::with_capacity(count * 4);
    for i in 0..count {
        let start = format!("r{}/start", i);
        let limit = format!("r{}/limit", i);
        let delta = format!("r{}/delta", i);

        nodes.push(int_constant(&start, rng.gen_range(-100..100)));
        nodes.push(int_constant(&limit, rng.gen_range(100..1000)));
        if i % 2 == 0 {
            nodes.push(int_constant(&delta, rng.gen_range(1..10)));
        } else {
            nodes.push(ForeignNode::new(&delta, "Placeholder", &[]));
        }
        nodes.push(ForeignNode::new(
            &format!("r{}", i),
            "Range",
            &[start.as_str(), limit.as_str(), delta.as_str()],
        ));
    }
    ForeignGraph::new(nodes)
}

fn bench_sequence_length(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequence_length");

    for &len in &[10i64, 1_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("integer", len), &len, |b, &len| {
            b.iter(|| sequence_length(black_box(0i64), black_box(len), black_box(1i64)))
        });
        group.bench_with_input(BenchmarkId::new("float", len), &len, |b, &len| {
            b.iter(|| sequence_length(black_box(0.0f64), black_box(len as f64 / 10.0), black_box(0.1f64)))
        });
    }

    group.finish();
}

fn bench_calculate_output_shape(c: &mut Criterion) {
    let graph = Graph::default();
    let range = Range::with_integer_args("r", 0, 4096, 3);

    c.bench_function("calculate_output_shape", |b| {
        b.iter(|| range.calculate_output_shape(black_box(&graph)))
    });
}

fn bench_import(c: &mut Criterion) {
    let mut group = c.benchmark_group("import");
    let mut rng = StdRng::seed_from_u64(7);

    for &count in &[16usize, 256] {
        let foreign = mixed_graph(count, &mut rng);
        let importer = GraphImporter::default();

        group.bench_with_input(BenchmarkId::new("import", count), &foreign, |b, foreign| {
            b.iter(|| importer.import(foreign))
        });

        group.bench_with_input(BenchmarkId::new("import_and_resolve", count), &foreign, |b, foreign| {
            b.iter(|| {
                let mut outcome = importer.import(foreign).ok()?;
                for i in (1..count).step_by(2) {
                    let name = format!("r{}/delta", i);
                    outcome.graph.feed(&name, Tensor::scalar(2.0, DataType::Int64)).ok()?;
                }
                outcome.graph.resolve_pending().ok()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_sequence_length,
    bench_calculate_output_shape,
    bench_import
);
criterion_main!(benches);
