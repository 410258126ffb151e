//! Performance benchmarks for centrality estimation and full simulation.
//!
//! Run with: `cargo bench --bench centrality`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Centrality, 2k segments, k=60 | <50ms | Sampled Brandes + exact closeness |
//! | Full simulation, 2k segments | <150ms | Two passes plus edit application |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::LineString;

use scenario_kernel::{
    estimate_centrality, planar_length, CentralityParams, CoordinateSpace, EditBatch,
    EditOperation, FunctionalClass, NetworkGraph, PlanarIdentity, Segment, SimulationConfig,
    Simulator,
};

/// Square street grid with `side` x `side` blocks of 80 m.
fn grid(side: usize) -> Vec<Segment> {
    let block = 80.0;
    let mut segments = Vec::new();
    for i in 0..=side {
        for j in 0..side {
            let (a, b) = (i as f64 * block, j as f64 * block);
            for (id, coords) in [
                (format!("h_{}_{}", i, j), vec![(b, a), (b + block, a)]),
                (format!("v_{}_{}", i, j), vec![(a, b), (a, b + block)]),
            ] {
                let line = LineString::from(coords);
                let length = planar_length(&line);
                segments.push(Segment::new(id, FunctionalClass::new("residential"), line, length));
            }
        }
    }
    segments
}

fn bench_centrality(c: &mut Criterion) {
    let mut group = c.benchmark_group("centrality");

    for side in [10, 20, 30] {
        let segments = grid(side);
        let network = NetworkGraph::build(&segments, &PlanarIdentity);
        let params = CentralityParams::default();

        group.throughput(Throughput::Elements(segments.len() as u64));
        group.bench_with_input(BenchmarkId::new("grid", side), &network, |b, network| {
            b.iter(|| estimate_centrality(black_box(network), &params))
        });
    }

    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let simulator = Simulator::new(SimulationConfig {
        coordinates: CoordinateSpace::Planar,
        ..SimulationConfig::default()
    });
    let mut group = c.benchmark_group("simulation");

    for side in [10, 20, 30] {
        let baseline = grid(side);
        let edits = EditBatch::from(vec![
            EditOperation::Delete {
                segment_id: "h_1_1".into(),
            },
            EditOperation::Add {
                geometry: LineString::from(vec![(0.0, 0.0), (80.0, 80.0)]),
                functional_class: Some(FunctionalClass::new("footway")),
                id: None,
            },
        ]);

        group.throughput(Throughput::Elements(baseline.len() as u64));
        group.bench_with_input(BenchmarkId::new("grid", side), &baseline, |b, baseline| {
            b.iter(|| simulator.run(black_box(baseline), &edits))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_centrality, bench_simulation);
criterion_main!(benches);
