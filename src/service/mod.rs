//! Scenario Kernel REST Service
//!
//! Exposes baseline networks, predictions and what-if simulation over HTTP.
//!
//! ## Endpoints
//!
//! - `GET /health` - Service health, oracle and cache status
//! - `GET /ping` - Liveness ping
//! - `GET /base-network?place=..|bbox=w,s,e,n` - Baseline network as GeoJSON
//! - `GET /predict?place=..|bbox=..` - Baseline predictions as GeoJSON
//! - `POST /simulate` - Apply edits and return the per-segment diff

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{correlation_id, metrics_middleware, record_simulation_metrics};
pub use routes::{create_router, AppState, ErrorResponse};
pub use state::ServiceState;
