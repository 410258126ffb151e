//! Betweenness proxy used when no model is available.

use super::{OracleError, PredictionOracle};
use crate::features::{FeatureContract, FeatureTable, COL_BETWEENNESS};

/// Multiplier applied to betweenness by the proxy.
pub const PROXY_SCALE: f64 = 1000.0;

/// Predicts `betweenness * 1000`.
#[derive(Debug, Clone, Default)]
pub struct BetweennessProxy {
    contract: FeatureContract,
}

impl BetweennessProxy {
    /// Create the proxy with the default contract.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the proxy over a custom feature layout.
    pub fn with_contract(contract: FeatureContract) -> Self {
        Self { contract }
    }
}

impl PredictionOracle for BetweennessProxy {
    fn name(&self) -> &str {
        "betweenness_proxy"
    }

    fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, OracleError> {
        let betweenness = table
            .column(COL_BETWEENNESS)
            .ok_or_else(|| OracleError::ContractMismatch {
                expected: vec![COL_BETWEENNESS.to_string()],
                got: table.contract.columns().to_vec(),
            })?;
        Ok(betweenness.into_iter().map(|b| b * PROXY_SCALE).collect())
    }
}
