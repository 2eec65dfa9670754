use coursegraph_bench::synthetic_forest;
use coursegraph_core::derive_edges;
use coursegraph_graph::{LayoutConfig, TreeLayouter};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_layout_at_ceiling(c: &mut Criterion) {
    // 8 groups * 6 majors * 24 courses = 1208 nodes, just past the hard ceiling.
    let nodes = synthetic_forest(8, 6, 24);
    let edges = derive_edges(&nodes);
    let layouter = TreeLayouter::new(LayoutConfig::default());

    c.bench_function("tree_layout_1200_nodes", |b| {
        b.iter(|| {
            let result = layouter.layout(black_box(&nodes), black_box(&edges));
            black_box(result);
        })
    });
}

fn bench_layout_initial_load(c: &mut Criterion) {
    let nodes = synthetic_forest(40, 9, 0);
    let edges = derive_edges(&nodes);
    let layouter = TreeLayouter::new(LayoutConfig::default());

    c.bench_function("tree_layout_initial_400_nodes", |b| {
        b.iter(|| black_box(layouter.layout(black_box(&nodes), black_box(&edges))))
    });
}

criterion_group!(benches, bench_layout_at_ceiling, bench_layout_initial_load);
criterion_main!(benches);
