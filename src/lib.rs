//! # scenario-kernel
//!
//! Counterfactual "what-if" analysis for pedestrian path networks.
//!
//! The kernel answers one question:
//!
//! > If these segments were added, removed or reshaped, how would the
//! > predicted use of every segment change?
//!
//! ## Core Contract
//!
//! 1. Apply an ordered batch of edits to a baseline edge set, snapping new
//!    endpoints onto the existing network
//! 2. Rebuild the graph and re-estimate centrality for both networks
//! 3. Score both with the same oracle and report a per-segment diff
//!
//! ## Architecture
//!
//! ```text
//! NetworkSource → baseline ─┬─────────────────────────► Graph → Centrality → Features → Oracle ─┐
//!                           └─ EditApplier (Snapper) ─► Graph → Centrality → Features → Oracle ─┴─► Diff
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same baseline + same edits + same config → identical predictions and `scenario_id`
//! - Centrality sampling uses an explicit seed, never a global generator
//! - Graph node identity is a pure function of rounded planar coordinates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod applier;
pub mod canonical;
pub mod centrality;
pub mod diff;
pub mod features;
pub mod geojson;
pub mod graph;
pub mod oracle;
pub mod projection;
pub mod simulation;
pub mod snap;
pub mod source;
pub mod types;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    planar_length, EditBatch, EditOperation, EditWarning, EditWarningKind, EditsNotAList,
    FunctionalClass, Segment, SegmentId,
};
pub use applier::{EditApplier, EditOutcome, EditStats, SYNTHETIC_ID_PREFIX};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use centrality::{
    estimate as estimate_centrality, CentralityParams, CentralityRecord, CentralityResult,
    DEFAULT_SAMPLE_SIZE, DEFAULT_SEED,
};
pub use diff::{diff, summarize, DiffRow, DiffSummary};
pub use features::{assemble as assemble_features, FeatureContract, FeatureRow, FeatureTable};
pub use geojson::{FeatureCollection, GeoJsonError};
pub use graph::{NetworkEdge, NetworkGraph, NodeKey};
pub use oracle::{
    BetweennessProxy, LinearModelOracle, OracleError, PredictionOracle, PROXY_SCALE,
};
pub use projection::{LocalTangentPlane, PlanarIdentity, Projection};
pub use simulation::{
    CoordinateSpace, NetworkStats, OracleReport, PredictionReport, SimulationConfig,
    SimulationError, SimulationReport, SimulationRequest, Simulator, DEFAULT_MAX_FEATURES,
};
pub use snap::{Snapper, DEFAULT_SNAP_TOLERANCE_M};
pub use source::{
    AreaQuery, AreaQueryError, BBox, BaselineCache, CacheConfig, CacheStats,
    InMemoryNetworkSource, InMemorySourceError, NetworkSource,
};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Schema version for all scenario kernel types.
/// Increment on breaking changes to any schema type.
pub const SCENARIO_KERNEL_SCHEMA_VERSION: &str = "1.0.0";
