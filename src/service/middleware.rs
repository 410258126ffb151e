//! Service middleware for metrics and request tracking.
//!
//! ## Metrics Exposed
//!
//! - `request` - request count and latency by path, method, status
//! - `simulation` - segments, edits, warnings and degradation per simulation
//! - `baseline_fetch` - cache hits and misses per fetch

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Header carrying the upstream trace id.
pub const TRACE_HEADER: &str = "X-Cloud-Trace-Context";

/// Metrics middleware that records request counts and latency.
///
/// Uses tracing for now; the events can be aggregated from logs.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "scenario_kernel::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Correlation id for a request: the trace part of `X-Cloud-Trace-Context`,
/// or a fresh UUID.
pub fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split('/').next())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces UUIDs and numeric segments with `:id`.
fn normalize_path(path: &str) -> String {
    regex_lite::Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|/\d+(/|$)",
    )
    .map(|re| {
        re.replace_all(path, |caps: &regex_lite::Captures| {
            if caps[0].starts_with('/') {
                format!("/:id{}", caps.get(1).map_or("", |m| m.as_str()))
            } else {
                ":id".to_string()
            }
        })
        .into_owned()
    })
    .unwrap_or_else(|_| path.to_string())
}

/// Record simulation metrics.
pub fn record_simulation_metrics(
    segments: usize,
    edits: usize,
    warnings: usize,
    degraded: bool,
    latency_ms: u64,
) {
    info!(
        target: "scenario_kernel::metrics",
        metric_type = "simulation",
        segments = segments,
        edits = edits,
        warnings = warnings,
        degraded = degraded,
        latency_ms = latency_ms,
        "simulation_metric"
    );
}

/// Record baseline fetch metrics.
pub fn record_baseline_fetch(hits: u64, misses: u64, cached: usize) {
    info!(
        target: "scenario_kernel::metrics",
        metric_type = "baseline_fetch",
        cache_hits = hits,
        cache_misses = misses,
        cached_networks = cached,
        "baseline_fetch_metric"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_uuid() {
        let path = "/scenario/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/scenario/:id");
    }

    #[test]
    fn test_normalize_path_replaces_numbers() {
        assert_eq!(normalize_path("/tiles/12/summary"), "/tiles/:id/summary");
        assert_eq!(normalize_path("/tiles/12"), "/tiles/:id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/base-network"), "/base-network");
    }

    #[test]
    fn test_correlation_id_from_trace_header() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_HEADER, "abc123/456;o=1".parse().unwrap());
        assert_eq!(correlation_id(&headers), "abc123");

        let generated = correlation_id(&HeaderMap::new());
        assert_eq!(generated.len(), 36);
    }
}
