use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tokio_util::sync::CancellationToken;
use vaultmap_core::{LayoutConfig, NodeId};
use vaultmap_layout::{LayoutEngine, LayoutInput};

fn sparse_tree(n: usize) -> LayoutInput {
    let ids: Vec<NodeId> = (0..n).map(|i| NodeId::new(format!("n{i:05}"))).collect();
    let edges: Vec<(usize, usize, f64)> = (1..n).map(|i| (i, (i * 7 + 3) % i, 1.0)).collect();
    LayoutInput::from_edges(ids, &edges)
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    group.sample_size(10);
    for n in [200, 800] {
        let input = sparse_tree(n);
        let brute = LayoutConfig {
            iterations: 50,
            repulsion_cutoff: Some(240.0),
            ..Default::default()
        };
        let grid = LayoutConfig { grid_binning: true, ..brute.clone() };

        group.bench_with_input(BenchmarkId::new("brute_force", n), &input, |b, input| {
            let engine = LayoutEngine::new(brute.clone());
            b.iter(|| engine.run_input(black_box(input), &CancellationToken::new(), |_| {}))
        });
        group.bench_with_input(BenchmarkId::new("grid", n), &input, |b, input| {
            let engine = LayoutEngine::new(grid.clone());
            b.iter(|| engine.run_input(black_box(input), &CancellationToken::new(), |_| {}))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_layout);
criterion_main!(benches);
