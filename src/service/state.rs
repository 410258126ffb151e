//! Service state management.
//!
//! Holds the network source, the baseline cache and the simulator shared by
//! every request.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::oracle::{LinearModelOracle, PredictionOracle};
use crate::simulation::{SimulationConfig, Simulator};
use crate::source::{BaselineCache, CacheConfig, NetworkSource};

/// Shared service state.
pub struct ServiceState<S: NetworkSource + 'static> {
    /// Where baselines come from.
    pub source: Arc<S>,
    /// Read-only cache of fetched baselines.
    pub cache: Arc<BaselineCache>,
    /// Configured simulator (config + oracle).
    pub simulator: Simulator,
    /// When the state was created.
    pub started_at: DateTime<Utc>,
}

impl<S: NetworkSource + 'static> ServiceState<S> {
    /// Create state with the default cache and a proxy-only simulator.
    pub fn new(source: S) -> Self {
        Self::with_parts(source, BaselineCache::default(), Simulator::default())
    }

    /// Create state from explicit parts.
    pub fn with_parts(source: S, cache: BaselineCache, simulator: Simulator) -> Self {
        Self {
            source: Arc::new(source),
            cache: Arc::new(cache),
            simulator,
            started_at: Utc::now(),
        }
    }

    /// Create service state from environment variables.
    ///
    /// Reads `BASELINE_CACHE_SIZE` (0 disables caching), `MODEL_PATH` and the
    /// simulation knobs of [`SimulationConfig::from_env`]. A model that fails
    /// to load is logged and the service runs on the betweenness proxy.
    pub fn from_env(source: S) -> Self {
        let cache_config = match std::env::var("BASELINE_CACHE_SIZE").ok().map(|s| s.parse::<usize>()) {
            Some(Ok(0)) => CacheConfig {
                enabled: false,
                ..CacheConfig::default()
            },
            Some(Ok(n)) => CacheConfig {
                max_entries: n,
                enabled: true,
            },
            Some(Err(e)) => {
                tracing::warn!(error = %e, "invalid BASELINE_CACHE_SIZE, using default");
                CacheConfig::default()
            }
            None => CacheConfig::default(),
        };

        let mut simulator = Simulator::new(SimulationConfig::from_env());
        match std::env::var("MODEL_PATH") {
            Ok(path) if !path.is_empty() => match LinearModelOracle::from_path(&path) {
                Ok(model) => {
                    tracing::info!(model = model.name(), path = %path, "prediction model loaded");
                    simulator = simulator.with_oracle(Arc::new(model));
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path,
                        error = %e,
                        "failed to load prediction model, predictions will use the betweenness proxy"
                    );
                }
            },
            _ => {
                tracing::warn!("MODEL_PATH not set, predictions will use the betweenness proxy");
            }
        }

        Self::with_parts(source, BaselineCache::new(cache_config), simulator)
    }
}

impl<S: NetworkSource + 'static> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            simulator: self.simulator.clone(),
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryNetworkSource;

    #[test]
    fn test_clone_shares_cache_and_source() {
        let state = ServiceState::new(InMemoryNetworkSource::new());
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.cache, &cloned.cache));
        assert!(Arc::ptr_eq(&state.source, &cloned.source));
        assert_eq!(state.started_at, cloned.started_at);
    }

    #[test]
    fn test_new_has_no_oracle() {
        let state = ServiceState::new(InMemoryNetworkSource::new());
        assert!(state.simulator.oracle_name().is_none());
    }
}
