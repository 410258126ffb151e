//! Linear model loaded from JSON.
//!
//! ```json
//! {
//!   "name": "ped_volume_v3",
//!   "columns": ["length", "betweenness", "closeness", "class_ordinal"],
//!   "coefficients": [0.01, 850.0, 120.0, -4.0],
//!   "intercept": 12.0
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{ensure_contract, OracleError, PredictionOracle};
use crate::features::{FeatureContract, FeatureTable};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LinearModelFile {
    #[serde(default)]
    name: Option<String>,
    columns: Vec<String>,
    coefficients: Vec<f64>,
    #[serde(default)]
    intercept: f64,
}

/// `intercept + sum(coefficient_i * column_i)`.
#[derive(Debug, Clone)]
pub struct LinearModelOracle {
    name: String,
    contract: FeatureContract,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LinearModelOracle {
    /// Create a model directly.
    pub fn new(
        name: impl Into<String>,
        contract: FeatureContract,
        coefficients: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, OracleError> {
        if contract.len() != coefficients.len() {
            return Err(OracleError::Unavailable(format!(
                "{} columns but {} coefficients",
                contract.len(),
                coefficients.len()
            )));
        }
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(OracleError::Unavailable("non-finite model parameter".to_string()));
        }
        Ok(Self {
            name: name.into(),
            contract,
            coefficients,
            intercept,
        })
    }

    /// Parse a model document.
    pub fn from_json_str(json: &str) -> Result<Self, OracleError> {
        let file: LinearModelFile = serde_json::from_str(json)
            .map_err(|e| OracleError::Unavailable(format!("invalid model file: {}", e)))?;
        Self::new(
            file.name.unwrap_or_else(|| "linear_model".to_string()),
            FeatureContract::new(file.columns),
            file.coefficients,
            file.intercept,
        )
    }

    /// Load a model document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OracleError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| OracleError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

impl PredictionOracle for LinearModelOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, OracleError> {
        ensure_contract(&self.contract, table)?;
        Ok(table
            .rows
            .iter()
            .map(|row| {
                self.intercept
                    + row
                        .values
                        .iter()
                        .zip(&self.coefficients)
                        .map(|(v, c)| v * c)
                        .sum::<f64>()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRow;

    const MODEL: &str = r#"{
        "name": "test_model",
        "columns": ["length", "betweenness"],
        "coefficients": [0.5, 100.0],
        "intercept": 1.0
    }"#;

    #[test]
    fn test_predict() {
        let model = LinearModelOracle::from_json_str(MODEL).unwrap();
        let table = FeatureTable {
            contract: FeatureContract::new(["length", "betweenness"]),
            rows: vec![FeatureRow { segment_id: "a".into(), values: vec![10.0, 0.5] }],
        };
        assert_eq!(model.name(), "test_model");
        assert_eq!(model.predict(&table).unwrap(), vec![1.0 + 5.0 + 50.0]);
    }

    #[test]
    fn test_rejects_other_contract() {
        let model = LinearModelOracle::from_json_str(MODEL).unwrap();
        let table = FeatureTable {
            contract: FeatureContract::default(),
            rows: vec![],
        };
        assert!(matches!(
            model.predict(&table),
            Err(OracleError::ContractMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_documents() {
        assert!(LinearModelOracle::from_json_str("{").is_err());
        assert!(LinearModelOracle::from_json_str(
            r#"{"columns": ["a", "b"], "coefficients": [1.0]}"#
        )
        .is_err());
        assert!(LinearModelOracle::from_path("/nonexistent/model.json").is_err());
    }
}
