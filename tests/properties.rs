//! Property tests for centrality, snapping and edit application.

use geo::{Coord, LineString};
use proptest::prelude::*;

use scenario_kernel::{
    estimate_centrality, planar_length, CentralityParams, EditApplier, EditBatch, FunctionalClass,
    NetworkGraph, PlanarIdentity, Segment, Snapper,
};

/// Segments between random points on a small integer grid, so that shared
/// endpoints (and therefore real junctions) are common.
fn grid_network(edges: &[(u8, u8, u8, u8)]) -> Vec<Segment> {
    edges
        .iter()
        .enumerate()
        .map(|(i, &(x1, y1, x2, y2))| {
            let line = LineString::from(vec![
                (f64::from(x1) * 10.0, f64::from(y1) * 10.0),
                (f64::from(x2) * 10.0, f64::from(y2) * 10.0),
            ]);
            let length = planar_length(&line);
            Segment::new(format!("e{i}"), FunctionalClass::new("footway"), line, length)
        })
        .collect()
}

fn edge_strategy() -> impl Strategy<Value = Vec<(u8, u8, u8, u8)>> {
    prop::collection::vec((0u8..6, 0u8..6, 0u8..6, 0u8..6), 1..40)
}

// =============================================================================
// Betweenness bounds
// =============================================================================
proptest! {
    #[test]
    fn betweenness_within_unit_interval(
        edges in edge_strategy(),
        sample_size in 1usize..20,
        seed in any::<u64>(),
    ) {
        let network = NetworkGraph::build(&grid_network(&edges), &PlanarIdentity);
        let result = estimate_centrality(&network, &CentralityParams { sample_size, seed });

        for (id, record) in &result.records {
            prop_assert!(
                (0.0..=1.0).contains(&record.betweenness),
                "{} betweenness {} out of range", id, record.betweenness
            );
            prop_assert!(record.closeness >= 0.0 && record.closeness.is_finite());
        }
    }
}

// =============================================================================
// Determinism
// =============================================================================
proptest! {
    #[test]
    fn centrality_is_deterministic(
        edges in edge_strategy(),
        sample_size in 1usize..20,
        seed in any::<u64>(),
    ) {
        let segments = grid_network(&edges);
        let params = CentralityParams { sample_size, seed };

        let first = estimate_centrality(&NetworkGraph::build(&segments, &PlanarIdentity), &params);
        let second = estimate_centrality(&NetworkGraph::build(&segments, &PlanarIdentity), &params);

        prop_assert_eq!(&first.sampled_nodes, &second.sampled_nodes);
        prop_assert_eq!(first.records, second.records);
    }
}

// =============================================================================
// Every segment with geometry gets a centrality record
// =============================================================================
proptest! {
    #[test]
    fn every_segment_has_centrality(edges in edge_strategy()) {
        let segments = grid_network(&edges);
        let result = estimate_centrality(
            &NetworkGraph::build(&segments, &PlanarIdentity),
            &CentralityParams::default(),
        );
        for segment in &segments {
            prop_assert!(result.get(&segment.id).is_some());
        }
    }
}

// =============================================================================
// Snap correctness
// =============================================================================
proptest! {
    #[test]
    fn snapped_ends_land_exactly_or_stay_put(
        edges in edge_strategy(),
        start in (-20.0f64..70.0, -20.0f64..70.0),
        end in (-20.0f64..70.0, -20.0f64..70.0),
    ) {
        let baseline = grid_network(&edges);
        let endpoints: Vec<Coord<f64>> = baseline
            .iter()
            .flat_map(|s| [s.start(), s.end()])
            .flatten()
            .collect();
        let snapper = Snapper::from_segments(&baseline, &PlanarIdentity, 8.0);

        let line = LineString::from(vec![start, end]);
        let snapped = snapper.snap(&line);

        let dist = |a: Coord<f64>, b: Coord<f64>| ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();

        for (before, after) in [(line.0[0], snapped.0[0]), (line.0[1], snapped.0[1])] {
            let nearest = endpoints
                .iter()
                .map(|&p| dist(p, before))
                .fold(f64::INFINITY, f64::min);

            if nearest <= 8.0 {
                // Within tolerance: must land on a nearest endpoint.
                prop_assert!(
                    endpoints.contains(&after),
                    "{:?} is {} from an endpoint but stayed at {:?}", before, nearest, after
                );
                prop_assert!((dist(after, before) - nearest).abs() < 1e-9);
            } else {
                prop_assert_eq!(after, before);
            }
        }
    }
}

// =============================================================================
// Idempotence
// =============================================================================
proptest! {
    #[test]
    fn empty_batch_leaves_network_unchanged(edges in edge_strategy()) {
        let baseline = grid_network(&edges);
        let applier = EditApplier::new(&baseline, &PlanarIdentity, 8.0);
        let outcome = applier.apply(&baseline, &EditBatch::default());

        prop_assert_eq!(outcome.segments, baseline);
        prop_assert!(outcome.warnings.is_empty());
    }
}
