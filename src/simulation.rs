//! End-to-end what-if pass.
//!
//! ```text
//! baseline ──► EditApplier ──► scenario
//!    │                            │
//!    ▼                            ▼
//! NetworkGraph ──► centrality ──► features ──► oracle ──┐
//!                                                       ├──► diff
//! NetworkGraph ──► centrality ──► features ──► oracle ──┘
//! ```
//!
//! Both passes share one projection (centred on the baseline) and one
//! oracle. If the oracle fails on either pass, both are re-scored with the
//! betweenness proxy so that the deltas compare like with like.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::applier::{EditApplier, EditStats};
use crate::canonical::canonical_hash_hex;
use crate::centrality::{self, CentralityParams, CentralityResult};
use crate::diff::{self, DiffRow, DiffSummary};
use crate::features::{self, FeatureContract};
use crate::geojson::{finite_or_null, segment_to_feature, FeatureCollection};
use crate::graph::NetworkGraph;
use crate::oracle::{predict_checked, BetweennessProxy, OracleError, PredictionOracle};
use crate::projection::{LocalTangentPlane, PlanarIdentity, Projection};
use crate::snap::DEFAULT_SNAP_TOLERANCE_M;
use crate::source::{AreaQuery, AreaQueryError, BaselineCache, NetworkSource};
use crate::types::{EditBatch, EditOperation, EditWarning, EditsNotAList, Segment, SegmentId};

/// Default cap on baseline segments per request.
pub const DEFAULT_MAX_FEATURES: usize = 5000;

/// Floats are multiplied by this and rounded before hashing.
const QUANTIZATION_FACTOR: f64 = 1_000_000.0;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Coordinate space of incoming segments and edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Longitude/latitude; projected to a local tangent plane.
    #[default]
    Geographic,
    /// Already metric; used as-is.
    Planar,
}

/// Knobs for one simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Maximum snap distance, meters.
    pub snap_tolerance_m: f64,
    /// Betweenness sampling.
    pub centrality: CentralityParams,
    /// Baseline segment cap when a request does not give one.
    pub max_features: usize,
    /// Feature layout for the betweenness proxy, used when no oracle is
    /// configured or the oracle fails. Must include `betweenness`.
    pub contract: FeatureContract,
    /// Coordinate space of the data.
    pub coordinates: CoordinateSpace,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            snap_tolerance_m: DEFAULT_SNAP_TOLERANCE_M,
            centrality: CentralityParams::default(),
            max_features: DEFAULT_MAX_FEATURES,
            contract: FeatureContract::default(),
            coordinates: CoordinateSpace::Geographic,
        }
    }
}

#[derive(Serialize)]
struct QuantizedConfig<'a> {
    snap_tolerance_q: i64,
    sample_size: usize,
    seed: u64,
    contract: &'a FeatureContract,
    coordinates: CoordinateSpace,
}

impl SimulationConfig {
    /// Read overrides from `SNAP_TOLERANCE_M`, `CENTRALITY_SAMPLE_K`,
    /// `CENTRALITY_SEED` and `MAX_FEATURES`.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<f64>("SNAP_TOLERANCE_M") {
            if v.is_finite() && v >= 0.0 {
                config.snap_tolerance_m = v;
            } else {
                tracing::warn!(value = v, "SNAP_TOLERANCE_M must be a non-negative number, ignoring");
            }
        }
        if let Some(k) = env_parse::<usize>("CENTRALITY_SAMPLE_K") {
            config.centrality.sample_size = k;
        }
        if let Some(seed) = env_parse::<u64>("CENTRALITY_SEED") {
            config.centrality.seed = seed;
        }
        if let Some(n) = env_parse::<usize>("MAX_FEATURES") {
            config.max_features = n;
        }
        config
    }

    /// Hash of the parameters that affect results.
    ///
    /// The snap tolerance is quantized so that the hash does not depend on
    /// float formatting.
    pub fn params_hash(&self) -> Result<String, SimulationError> {
        canonical_hash_hex(&QuantizedConfig {
            snap_tolerance_q: (self.snap_tolerance_m * QUANTIZATION_FACTOR).round() as i64,
            sample_size: self.centrality.sample_size,
            seed: self.centrality.seed,
            contract: &self.contract,
            coordinates: self.coordinates,
        })
        .map_err(|e| SimulationError::Internal(format!("hashing parameters: {}", e)))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error type for simulation requests.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    /// The request was rejected before any computation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The baseline could not be fetched.
    #[error("Network source error: {0}")]
    Source(String),
    /// Unexpected failure; no partial result is produced.
    #[error("Simulation failed: {0}")]
    Internal(String),
}

impl From<AreaQueryError> for SimulationError {
    fn from(e: AreaQueryError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<EditsNotAList> for SimulationError {
    fn from(e: EditsNotAList) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reports
// ─────────────────────────────────────────────────────────────────────────────

/// Size of one network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Graph nodes.
    pub n_nodes: usize,
    /// Graph edges (after coalescing parallels).
    pub n_edges: usize,
    /// Input segments.
    pub n_segments: usize,
    /// Segments skipped for lacking geometry.
    pub n_skipped: usize,
    /// Sum of segment lengths, kilometers.
    pub total_length_km: f64,
}

impl NetworkStats {
    fn of(segments: &[Segment], graph: &NetworkGraph) -> Self {
        Self {
            n_nodes: graph.node_count(),
            n_edges: graph.edge_count(),
            n_segments: segments.len(),
            n_skipped: graph.skipped().len(),
            total_length_km: graph.total_length() / 1000.0,
        }
    }
}

/// How predictions were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleReport {
    /// Oracle that produced the returned predictions.
    pub name: String,
    /// Whether the proxy stood in for the configured oracle.
    pub degraded: bool,
    /// Why the proxy was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of a baseline-only pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    /// Segments, in baseline order.
    pub segments: Vec<Segment>,
    /// One prediction per segment.
    pub predictions: Vec<f64>,
    /// Oracle used.
    pub oracle: OracleReport,
    /// Network size.
    pub network_stats: NetworkStats,
    /// Hash of the config used.
    pub params_hash: String,
    /// When the pass finished.
    pub generated_at: DateTime<Utc>,
    /// Wall time, seconds.
    pub processing_time: f64,
}

impl PredictionReport {
    /// GeoJSON with `pred` on every feature.
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .segments
            .iter()
            .zip(&self.predictions)
            .map(|(segment, &pred)| {
                let mut feature = segment_to_feature(segment);
                feature.properties.insert("pred".into(), finite_or_null(pred));
                feature
            })
            .collect();
        FeatureCollection::new(features)
            .with_member("degraded", Value::Bool(self.oracle.degraded))
            .with_member("oracle", json!(self.oracle))
            .with_member("network_stats", stats_json(&self.network_stats))
            .with_member("params_hash", Value::String(self.params_hash.clone()))
    }
}

/// Result of a what-if pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Fingerprint of baseline ids, edits and config.
    pub scenario_id: String,
    /// Hash of the config used.
    pub params_hash: String,
    /// Scenario segments, parallel to `rows`.
    pub segments: Vec<Segment>,
    /// Per-segment prediction change.
    pub rows: Vec<DiffRow>,
    /// Aggregate change.
    pub summary: DiffSummary,
    /// Non-fatal edit problems.
    pub warnings: Vec<EditWarning>,
    /// What the edits did.
    pub edit_stats: EditStats,
    /// Oracle used.
    pub oracle: OracleReport,
    /// Baseline size.
    pub baseline_stats: NetworkStats,
    /// Scenario size.
    pub scenario_stats: NetworkStats,
    /// When the pass finished.
    pub generated_at: DateTime<Utc>,
    /// Wall time, seconds.
    pub processing_time: f64,
}

impl SimulationReport {
    /// Whether the proxy stood in for the configured oracle.
    pub fn degraded(&self) -> bool {
        self.oracle.degraded
    }

    /// Diff row for a segment.
    pub fn row(&self, id: &SegmentId) -> Option<&DiffRow> {
        self.rows.iter().find(|r| &r.segment_id == id)
    }

    /// GeoJSON FeatureCollection of the scenario with before/after/delta on
    /// every feature. Non-finite numbers become `null`.
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .segments
            .iter()
            .zip(&self.rows)
            .map(|(segment, row)| {
                let mut feature = segment_to_feature(segment);
                let props = &mut feature.properties;
                props.insert("pred_before".into(), finite_or_null(row.pred_before));
                props.insert("pred_after".into(), finite_or_null(row.pred_after));
                props.insert("delta".into(), finite_or_null(row.delta));
                feature
            })
            .collect();

        FeatureCollection::new(features)
            .with_member("scenario_id", Value::String(self.scenario_id.clone()))
            .with_member("degraded", Value::Bool(self.oracle.degraded))
            .with_member("oracle", json!(self.oracle))
            .with_member("validation", json!({ "warnings": self.warnings }))
            .with_member(
                "network_stats",
                json!({
                    "baseline": stats_json(&self.baseline_stats),
                    "scenario": stats_json(&self.scenario_stats),
                }),
            )
            .with_member(
                "summary",
                json!({
                    "added": self.summary.added,
                    "removed": self.summary.removed,
                    "changed": self.summary.changed,
                    "mean_delta": finite_or_null(self.summary.mean_delta),
                }),
            )
            .with_member("edit_stats", json!(self.edit_stats))
    }
}

fn stats_json(stats: &NetworkStats) -> Value {
    json!({
        "n_nodes": stats.n_nodes,
        "n_edges": stats.n_edges,
        "n_segments": stats.n_segments,
        "n_skipped": stats.n_skipped,
        "total_length_km": finite_or_null(stats.total_length_km),
    })
}

/// A `/simulate` request after boundary validation.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    /// Area to fetch.
    pub area: AreaQuery,
    /// Validated edits.
    pub edits: EditBatch,
    /// Baseline segment cap; the config default when `None`.
    pub max_features: Option<usize>,
}

impl SimulationRequest {
    /// Validate a raw JSON body `{place?, bbox?, edits?, max_features?}`.
    pub fn from_json(body: &Value) -> Result<Self, SimulationError> {
        if !body.is_object() && !body.is_null() {
            return Err(SimulationError::InvalidInput("request body must be an object".into()));
        }
        let area = AreaQuery::from_parts(
            body.get("place").and_then(Value::as_str),
            body.get("bbox"),
        )?;
        let edits = EditBatch::parse(body.get("edits").unwrap_or(&Value::Null))?;
        let max_features = match body.get("max_features") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().filter(|&n| n > 0).map(|n| n as usize).ok_or_else(|| {
                SimulationError::InvalidInput(format!("max_features must be a positive integer, got {}", v))
            })?),
        };
        Ok(Self {
            area,
            edits,
            max_features,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulator
// ─────────────────────────────────────────────────────────────────────────────

struct Scored {
    before: Vec<f64>,
    after: Vec<f64>,
    oracle: OracleReport,
}

/// Runs what-if passes with a fixed config and oracle.
///
/// Cheap to clone; share one across requests.
#[derive(Clone)]
pub struct Simulator {
    config: Arc<SimulationConfig>,
    oracle: Option<Arc<dyn PredictionOracle>>,
    proxy: Arc<BetweennessProxy>,
}

impl Simulator {
    /// Create a simulator with no oracle; predictions come from the proxy.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            oracle: None,
            proxy: Arc::new(BetweennessProxy::with_contract(config.contract.clone())),
            config: Arc::new(config),
        }
    }

    /// Use `oracle` for predictions.
    pub fn with_oracle(mut self, oracle: Arc<dyn PredictionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Name of the configured oracle, if any.
    pub fn oracle_name(&self) -> Option<&str> {
        self.oracle.as_deref().map(|o| o.name())
    }

    /// Centred on the baseline; on the edit geometries when the baseline
    /// has no coordinates.
    fn projection_for(&self, baseline: &[Segment], edits: &EditBatch) -> Box<dyn Projection> {
        match self.config.coordinates {
            CoordinateSpace::Planar => Box::new(PlanarIdentity),
            CoordinateSpace::Geographic => Box::new(
                LocalTangentPlane::centered_on(baseline)
                    .or_else(|| {
                        LocalTangentPlane::centered_on_lines(
                            edits.edits().iter().filter_map(EditOperation::geometry),
                        )
                    })
                    .unwrap_or_else(|| LocalTangentPlane::new(0.0, 0.0)),
            ),
        }
    }

    fn analyze(&self, segments: &[Segment], projection: &dyn Projection) -> (NetworkGraph, CentralityResult) {
        let graph = NetworkGraph::build(segments, projection);
        let centrality = centrality::estimate(&graph, &self.config.centrality);
        (graph, centrality)
    }

    /// Score both passes, falling back to the proxy for both if the oracle
    /// is missing or fails on either.
    fn score(
        &self,
        baseline: (&[Segment], &CentralityResult),
        scenario: (&[Segment], &CentralityResult),
    ) -> Result<Scored, SimulationError> {
        let reason = match &self.oracle {
            Some(oracle) => {
                let contract = oracle.contract();
                let attempt = || -> Result<(Vec<f64>, Vec<f64>), OracleError> {
                    let before = predict_checked(
                        oracle.as_ref(),
                        &features::assemble(baseline.0, baseline.1, contract),
                    )?;
                    let after = predict_checked(
                        oracle.as_ref(),
                        &features::assemble(scenario.0, scenario.1, contract),
                    )?;
                    Ok((before, after))
                };
                match attempt() {
                    Ok((before, after)) => {
                        return Ok(Scored {
                            before,
                            after,
                            oracle: OracleReport {
                                name: oracle.name().to_string(),
                                degraded: false,
                                reason: None,
                            },
                        })
                    }
                    Err(e) => {
                        tracing::warn!(oracle = oracle.name(), error = %e, "oracle failed, using betweenness proxy");
                        e.to_string()
                    }
                }
            }
            None => "no prediction model configured".to_string(),
        };

        let contract = self.proxy.contract();
        let proxy_predict = |segments: &[Segment], centrality: &CentralityResult| {
            predict_checked(self.proxy.as_ref(), &features::assemble(segments, centrality, contract))
                .map_err(|e| SimulationError::Internal(e.to_string()))
        };
        Ok(Scored {
            before: proxy_predict(baseline.0, baseline.1)?,
            after: proxy_predict(scenario.0, scenario.1)?,
            oracle: OracleReport {
                name: self.proxy.name().to_string(),
                degraded: true,
                reason: Some(reason),
            },
        })
    }

    /// Baseline-only pass.
    pub fn predict(&self, baseline: &[Segment]) -> Result<PredictionReport, SimulationError> {
        let started = Instant::now();
        ensure_unique_ids(baseline)?;

        let _span = tracing::info_span!("predict", segments = baseline.len()).entered();
        let projection = self.projection_for(baseline, &EditBatch::default());
        let (graph, centrality) = self.analyze(baseline, projection.as_ref());
        // Empty scenario side; only the baseline predictions are used.
        let scored = self.score((baseline, &centrality), (&[], &CentralityResult::default()))?;

        Ok(PredictionReport {
            segments: baseline.to_vec(),
            predictions: scored.before,
            oracle: scored.oracle,
            network_stats: NetworkStats::of(baseline, &graph),
            params_hash: self.config.params_hash()?,
            generated_at: Utc::now(),
            processing_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Apply `edits` to `baseline` and diff predictions.
    pub fn run(&self, baseline: &[Segment], edits: &EditBatch) -> Result<SimulationReport, SimulationError> {
        let started = Instant::now();
        ensure_unique_ids(baseline)?;

        let params_hash = self.config.params_hash()?;
        let baseline_ids: Vec<&SegmentId> = baseline.iter().map(|s| &s.id).collect();
        let scenario_id = canonical_hash_hex(&(&baseline_ids, edits, &params_hash))
            .map_err(|e| SimulationError::Internal(format!("hashing scenario: {}", e)))?;

        let span = tracing::info_span!(
            "simulate",
            scenario_id = %scenario_id,
            baseline = baseline.len(),
            edits = edits.len()
        );
        let _guard = span.enter();

        let projection = self.projection_for(baseline, edits);
        let applier = EditApplier::new(baseline, projection.as_ref(), self.config.snap_tolerance_m);
        let outcome = applier.apply(baseline, edits);

        let (base_graph, base_centrality) = self.analyze(baseline, projection.as_ref());
        let (scen_graph, scen_centrality) = self.analyze(&outcome.segments, projection.as_ref());

        let scored = self.score(
            (baseline, &base_centrality),
            (&outcome.segments, &scen_centrality),
        )?;

        let pred_before: HashMap<SegmentId, f64> = baseline
            .iter()
            .map(|s| s.id.clone())
            .zip(scored.before.iter().copied())
            .collect();
        let rows = diff::diff(&outcome.segments, &scored.after, &pred_before);
        if rows.len() != outcome.segments.len() {
            return Err(SimulationError::Internal(format!(
                "{} diff rows for {} scenario segments",
                rows.len(),
                outcome.segments.len()
            )));
        }
        let summary = diff::summarize(&rows, &pred_before);

        tracing::info!(
            scenario = outcome.segments.len(),
            added = summary.added,
            removed = summary.removed,
            changed = summary.changed,
            warnings = outcome.warnings.len(),
            degraded = scored.oracle.degraded,
            "simulation complete"
        );

        Ok(SimulationReport {
            scenario_id,
            params_hash,
            baseline_stats: NetworkStats::of(baseline, &base_graph),
            scenario_stats: NetworkStats::of(&outcome.segments, &scen_graph),
            segments: outcome.segments,
            rows,
            summary,
            warnings: outcome.warnings,
            edit_stats: outcome.stats,
            oracle: scored.oracle,
            generated_at: Utc::now(),
            processing_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Fetch the baseline through `cache` and run.
    pub async fn simulate<S: NetworkSource>(
        &self,
        source: &S,
        cache: &BaselineCache,
        request: &SimulationRequest,
    ) -> Result<SimulationReport, SimulationError> {
        let max_features = request.max_features.unwrap_or(self.config.max_features);
        let baseline = cache
            .get_or_fetch(source, &request.area, max_features)
            .await
            .map_err(|e| SimulationError::Source(e.to_string()))?;
        self.run(&baseline, &request.edits)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

fn ensure_unique_ids(segments: &[Segment]) -> Result<(), SimulationError> {
    let mut seen = HashSet::with_capacity(segments.len());
    for segment in segments {
        if !seen.insert(&segment.id) {
            return Err(SimulationError::InvalidInput(format!(
                "duplicate segment id in baseline: {}",
                segment.id
            )));
        }
    }
    Ok(())
}
