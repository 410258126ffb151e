//! Axum routes for the scenario kernel service.

use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::geojson::{segment_to_feature, FeatureCollection};
use crate::simulation::{SimulationError, SimulationRequest};
use crate::source::{AreaQuery, CacheStats, InMemoryNetworkSource, NetworkSource};
use crate::types::Segment;
use crate::SCENARIO_KERNEL_SCHEMA_VERSION;

use super::middleware::{correlation_id, record_baseline_fetch, record_simulation_metrics};
use super::state::ServiceState;

/// Type alias for the service state with the in-memory source.
pub type AppState = ServiceState<InMemoryNetworkSource>;

/// Handler error: status plus JSON body.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query string for area-based routes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaParams {
    /// Place name, e.g. "Monaco".
    pub place: Option<String>,
    /// `w,s,e,n` in degrees.
    pub bbox: Option<String>,
    /// Baseline segment cap.
    pub max_features: Option<usize>,
}

impl AreaParams {
    fn area(&self) -> Result<AreaQuery, SimulationError> {
        let bbox = self.bbox.clone().map(Value::String);
        Ok(AreaQuery::from_parts(self.place.as_deref(), bbox.as_ref())?)
    }
}

/// Service health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" when the service answers.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Crate version.
    pub version: String,
    /// Response schema version.
    pub schema_version: String,
    /// Oracle used for predictions.
    pub oracle: String,
    /// Hash of the simulation config; absent if it could not be computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params_hash: Option<String>,
    /// Baseline cache counters.
    pub cache: CacheStats,
    /// Seconds since the state was created.
    pub uptime_seconds: i64,
}

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID for request tracing (matches X-Cloud-Trace-Context or generated UUID).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Map a simulation error to an HTTP error.
///
/// Invalid input is a 400, source failures a 502, anything else a 500.
fn api_error(err: SimulationError, correlation_id: &str) -> ApiError {
    let (status, code) = match &err {
        SimulationError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        SimulationError::Source(_) => (StatusCode::BAD_GATEWAY, "NETWORK_UNAVAILABLE"),
        SimulationError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SIMULATION_FAILED"),
    };
    if status.is_server_error() {
        tracing::error!(code, error = %err, correlation_id, "request failed");
    } else {
        tracing::warn!(code, error = %err, correlation_id, "request rejected");
    }
    (
        status,
        Json(ErrorResponse::new(code, err.to_string()).with_correlation_id(correlation_id)),
    )
}

async fn fetch_baseline<S: NetworkSource + 'static>(
    state: &ServiceState<S>,
    area: &AreaQuery,
    max_features: Option<usize>,
) -> Result<Arc<Vec<Segment>>, SimulationError> {
    let max_features = max_features.unwrap_or(state.simulator.config().max_features);
    let baseline = state
        .cache
        .get_or_fetch(state.source.as_ref(), area, max_features)
        .await
        .map_err(|e| SimulationError::Source(e.to_string()))?;
    let stats = state.cache.stats();
    record_baseline_fetch(stats.hits, stats.misses, stats.len);
    Ok(baseline)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Detailed health check.
async fn health_handler<S: NetworkSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "scenario-kernel".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        schema_version: SCENARIO_KERNEL_SCHEMA_VERSION.to_string(),
        oracle: state
            .simulator
            .oracle_name()
            .unwrap_or("betweenness_proxy")
            .to_string(),
        params_hash: state.simulator.config().params_hash().ok(),
        cache: state.cache.stats(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

/// Liveness ping.
async fn ping_handler() -> Json<Value> {
    Json(json!({ "pong": true }))
}

/// Baseline network as GeoJSON.
async fn base_network_handler<S: NetworkSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    headers: HeaderMap,
    Query(params): Query<AreaParams>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let cid = correlation_id(&headers);
    let area = params.area().map_err(|e| api_error(e, &cid))?;
    let baseline = fetch_baseline(&state, &area, params.max_features)
        .await
        .map_err(|e| api_error(e, &cid))?;

    let collection = FeatureCollection::new(baseline.iter().map(segment_to_feature).collect())
        .with_member("count", json!(baseline.len()));
    Ok(Json(collection))
}

/// Baseline predictions for an area.
async fn predict_handler<S: NetworkSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    headers: HeaderMap,
    Query(params): Query<AreaParams>,
) -> Result<Json<Value>, ApiError> {
    let cid = correlation_id(&headers);
    let area = params.area().map_err(|e| api_error(e, &cid))?;
    tracing::info!(area = %area, correlation_id = %cid, "prediction request");

    let baseline = fetch_baseline(&state, &area, params.max_features)
        .await
        .map_err(|e| api_error(e, &cid))?;

    let simulator = state.simulator.clone();
    let report = tokio::task::spawn_blocking(move || simulator.predict(&baseline))
        .await
        .map_err(|e| SimulationError::Internal(e.to_string()))
        .and_then(|r| r)
        .map_err(|e| api_error(e, &cid))?;

    Ok(Json(json!({
        "success": true,
        "location": area.to_string(),
        "timestamp": report.generated_at.to_rfc3339(),
        "processing_time": report.processing_time,
        "network_stats": report.network_stats,
        "oracle": report.oracle,
        "validation": { "warnings": [] },
        "geojson": report.to_geojson(),
    })))
}

/// Apply edits and return the per-segment diff as GeoJSON.
///
/// The body is read leniently: anything that is not a JSON object is treated
/// as an empty request and rejected for lacking an area.
async fn simulate_handler<S: NetworkSource + 'static>(
    State(state): State<Arc<ServiceState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FeatureCollection>, ApiError> {
    let started = Instant::now();
    let cid = correlation_id(&headers);

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let payload = if payload.is_object() { payload } else { json!({}) };
    let request = SimulationRequest::from_json(&payload).map_err(|e| api_error(e, &cid))?;
    tracing::info!(
        area = %request.area,
        edits = request.edits.len(),
        correlation_id = %cid,
        "simulation request"
    );

    let baseline = fetch_baseline(&state, &request.area, request.max_features)
        .await
        .map_err(|e| api_error(e, &cid))?;

    let simulator = state.simulator.clone();
    let edits = request.edits.clone();
    let report = tokio::task::spawn_blocking(move || simulator.run(&baseline, &edits))
        .await
        .map_err(|e| SimulationError::Internal(e.to_string()))
        .and_then(|r| r)
        .map_err(|e| api_error(e, &cid))?;

    record_simulation_metrics(
        report.segments.len(),
        request.edits.len(),
        report.warnings.len(),
        report.degraded(),
        started.elapsed().as_millis() as u64,
    );

    Ok(Json(report.to_geojson()))
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the scenario kernel service.
pub fn create_router<S: NetworkSource + 'static>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/ping", get(ping_handler))
        // Network and predictions
        .route("/base-network", get(base_network_handler::<S>))
        .route("/predict", get(predict_handler::<S>))
        // What-if simulation
        .route("/simulate", post(simulate_handler::<S>))
        .with_state(state)
}
