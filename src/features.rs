//! Feature table assembly.
//!
//! Every prediction pass sees the same column layout, named by a
//! [`FeatureContract`]. Columns the kernel knows how to derive are filled in;
//! anything else in the contract is zero.

use serde::{Deserialize, Serialize};

use crate::centrality::CentralityResult;
use crate::types::{Segment, SegmentId};

/// Column holding segment length, meters.
pub const COL_LENGTH: &str = "length";
/// Column holding sampled edge betweenness.
pub const COL_BETWEENNESS: &str = "betweenness";
/// Column holding mean endpoint closeness.
pub const COL_CLOSENESS: &str = "closeness";
/// Column holding the functional-class ordinal.
pub const COL_CLASS_ORDINAL: &str = "class_ordinal";

/// Ordered, named feature columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureContract(Vec<String>);

impl FeatureContract {
    /// Create a contract from column names, in order.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.0
    }

    /// Position of a column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|c| c == name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the contract has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for FeatureContract {
    fn default() -> Self {
        Self::new([COL_LENGTH, COL_BETWEENNESS, COL_CLOSENESS, COL_CLASS_ORDINAL])
    }
}

/// One segment's feature values, aligned to the table's contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Segment the row describes.
    pub segment_id: SegmentId,
    /// Values in contract order.
    pub values: Vec<f64>,
}

/// Feature rows plus the contract they follow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    /// Column layout.
    pub contract: FeatureContract,
    /// One row per segment, in edge-set order.
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Values of a named column, row order. `None` if the column is absent.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.contract.position(name)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn derive_column(name: &str, segment: &Segment, centrality: &CentralityResult) -> f64 {
    let record = centrality.get(&segment.id);
    match name {
        COL_LENGTH | "length_m" => segment.length,
        COL_BETWEENNESS => record.map_or(0.0, |r| r.betweenness),
        COL_CLOSENESS => record.map_or(0.0, |r| r.closeness),
        COL_CLASS_ORDINAL | "highway_ord" => segment.functional_class.ordinal(),
        _ => 0.0,
    }
}

/// Build the feature table for `segments`.
///
/// Segments missing from `centrality` (no geometry) get zero centrality.
/// NaN and infinities are written as 0.0.
pub fn assemble(
    segments: &[Segment],
    centrality: &CentralityResult,
    contract: &FeatureContract,
) -> FeatureTable {
    let rows = segments
        .iter()
        .map(|segment| FeatureRow {
            segment_id: segment.id.clone(),
            values: contract
                .columns()
                .iter()
                .map(|name| derive_column(name, segment, centrality))
                .map(|v| if v.is_finite() { v } else { 0.0 })
                .collect(),
        })
        .collect();

    FeatureTable {
        contract: contract.clone(),
        rows,
    }
}
