//! Prediction oracles.
//!
//! The kernel treats the predictive model as a black box: a feature table in,
//! one number per row out. When no model is configured, or the configured one
//! fails, [`BetweennessProxy`] stands in so that before/after deltas still
//! mean something.

pub mod linear;
pub mod proxy;

use crate::features::{FeatureContract, FeatureTable};

pub use linear::LinearModelOracle;
pub use proxy::{BetweennessProxy, PROXY_SCALE};

/// Error type for oracle operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    /// The model could not be loaded or reached.
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
    /// The table was built for a different column layout.
    #[error("Feature contract mismatch: expected {expected:?}, got {got:?}")]
    ContractMismatch {
        /// Columns the oracle needs.
        expected: Vec<String>,
        /// Columns the table has.
        got: Vec<String>,
    },
    /// The oracle answered with the wrong number of predictions.
    #[error("Oracle returned {got} predictions for {expected} rows")]
    RowCountMismatch {
        /// Rows in the table.
        expected: usize,
        /// Predictions returned.
        got: usize,
    },
}

/// A predictive model consumed as a black box.
///
/// Implementations must be deterministic: the same table yields the same
/// predictions. They are shared read-only across concurrent requests.
pub trait PredictionOracle: Send + Sync {
    /// Short identifier reported alongside results.
    fn name(&self) -> &str;

    /// Column layout the oracle expects.
    fn contract(&self) -> &FeatureContract;

    /// One prediction per row, in row order.
    fn predict(&self, table: &FeatureTable) -> Result<Vec<f64>, OracleError>;
}

/// Run `oracle` and check it answered once per row.
pub fn predict_checked(
    oracle: &dyn PredictionOracle,
    table: &FeatureTable,
) -> Result<Vec<f64>, OracleError> {
    let predictions = oracle.predict(table)?;
    if predictions.len() != table.len() {
        return Err(OracleError::RowCountMismatch {
            expected: table.len(),
            got: predictions.len(),
        });
    }
    Ok(predictions)
}

/// Reject a table whose columns differ from `expected`.
pub(crate) fn ensure_contract(
    expected: &FeatureContract,
    table: &FeatureTable,
) -> Result<(), OracleError> {
    if &table.contract != expected {
        return Err(OracleError::ContractMismatch {
            expected: expected.columns().to_vec(),
            got: table.contract.columns().to_vec(),
        });
    }
    Ok(())
}
