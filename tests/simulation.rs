//! Integration tests: GeoJSON baseline -> source -> cache -> simulator.

use serde_json::json;
use std::sync::Arc;

use scenario_kernel::{
    AreaQuery, BaselineCache, FeatureContract, InMemoryNetworkSource, LinearModelOracle,
    SimulationConfig, SimulationError, SimulationRequest, Simulator,
};

// ─────────────────────────────────────────────────────────────────────────────
// Test Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Three segments along a street in Monaco, ~80 m each, meeting end to end.
fn monaco() -> serde_json::Value {
    let feature = |id: &str, osmid: u64, highway: &str, a: [f64; 2], b: [f64; 2]| {
        json!({
            "type": "Feature",
            "geometry": {"type": "LineString", "coordinates": [a, b]},
            "properties": {"edge_id": id, "osmid": osmid, "highway": highway, "place": "Monaco"}
        })
    };
    json!({
        "type": "FeatureCollection",
        "features": [
            feature("e_001", 12345, "residential", [7.4180, 43.7300], [7.4190, 43.7300]),
            feature("e_002", 12346, "tertiary", [7.4190, 43.7300], [7.4200, 43.7300]),
            feature("e_003", 12347, "residential", [7.4200, 43.7300], [7.4210, 43.7300]),
        ]
    })
}

fn source() -> InMemoryNetworkSource {
    InMemoryNetworkSource::from_geojson(&monaco()).unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_simulate_geographic_add_snaps_to_baseline_node() {
    let simulator = Simulator::default();
    let cache = BaselineCache::default();
    let request = SimulationRequest::from_json(&json!({
        "place": "Monaco",
        "edits": [{
            "op": "add",
            // Starts ~2 m from the e_001/e_002 junction.
            "geometry": [[7.41902, 43.73001], [7.4190, 43.7310]],
            "highway": "footway"
        }]
    }))
    .unwrap();

    let report = simulator.simulate(&source(), &cache, &request).await.unwrap();

    assert_eq!(report.segments.len(), 4);
    let added = report.segments.last().unwrap();
    assert_eq!(added.geometry.0[0].x, 7.4190);
    assert_eq!(added.geometry.0[0].y, 43.7300);
    assert_eq!(added.geometry.0[1].y, 43.7310);
    // ~111 m north.
    assert!((added.length - 111.2).abs() < 1.0, "length {}", added.length);

    assert_eq!(report.baseline_stats.n_nodes, 4);
    assert_eq!(report.scenario_stats.n_nodes, 5);
    assert_eq!(report.row(&added.id).unwrap().pred_before, 0.0);
}

#[tokio::test]
async fn test_bbox_request_and_cache_reuse() {
    let simulator = Simulator::default();
    let cache = BaselineCache::default();
    let source = source();
    let request = SimulationRequest::from_json(&json!({
        "bbox": "7.417,43.729,7.4195,43.731",
        "edits": []
    }))
    .unwrap();

    let first = simulator.simulate(&source, &cache, &request).await.unwrap();
    let second = simulator.simulate(&source, &cache, &request).await.unwrap();

    // Only e_001 and e_002 reach into the box.
    assert_eq!(first.segments.len(), 2);
    assert_eq!(first.scenario_id, second.scenario_id);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn test_unknown_place_is_source_error() {
    let request = SimulationRequest {
        area: AreaQuery::Place("Atlantis".into()),
        edits: Default::default(),
        max_features: None,
    };
    let err = Simulator::default()
        .simulate(&source(), &BaselineCache::default(), &request)
        .await
        .unwrap_err();
    assert!(matches!(err, SimulationError::Source(_)));
}

#[tokio::test]
async fn test_max_features_limits_baseline() {
    let request = SimulationRequest::from_json(&json!({"place": "monaco", "max_features": 1})).unwrap();
    let report = Simulator::default()
        .simulate(&source(), &BaselineCache::default(), &request)
        .await
        .unwrap();
    assert_eq!(report.segments.len(), 1);
    assert_eq!(report.segments[0].source_ref.as_deref(), Some("12345"));
}

#[tokio::test]
async fn test_configured_model_is_used() {
    let model = LinearModelOracle::from_json_str(
        r#"{"name": "ped_v1", "columns": ["length", "class_ordinal"], "coefficients": [0.5, 10.0], "intercept": 3.0}"#,
    )
    .unwrap();
    let simulator = Simulator::new(SimulationConfig::default()).with_oracle(Arc::new(model));
    let request = SimulationRequest::from_json(&json!({
        "place": "Monaco",
        "edits": [{"op": "reshape", "edge_id": "e_002", "geometry": [[7.4190, 43.7300], [7.4195, 43.7302], [7.4200, 43.7300]], "highway": "footway"}]
    }))
    .unwrap();

    let report = simulator
        .simulate(&source(), &BaselineCache::default(), &request)
        .await
        .unwrap();

    assert!(!report.degraded());
    assert_eq!(report.oracle.name, "ped_v1");

    // tertiary (3) -> footway (0) outweighs the small length gain.
    let row = report.row(&"e_002".into()).unwrap();
    assert!(row.delta < 0.0, "delta {}", row.delta);
    assert_eq!(report.segments.iter().find(|s| s.id.as_str() == "e_002").unwrap().source_ref.as_deref(), Some("12346"));
}

#[test]
fn test_model_rejects_mismatched_coefficients() {
    let err = LinearModelOracle::new("bad", FeatureContract::new(["length"]), vec![1.0, 2.0], 0.0);
    assert!(err.is_err());
}
