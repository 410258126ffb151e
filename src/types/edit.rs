//! Edit operations and the non-fatal warnings they can raise.
//!
//! Edits arrive as loosely-typed JSON. They are validated here, at the
//! boundary, into the closed [`EditOperation`] type; anything that does not
//! parse is skipped and reported as an [`EditWarning`] instead of failing the
//! whole batch.

use geo::LineString;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::segment::{FunctionalClass, SegmentId};
use crate::geojson::line_coords;

/// A user-proposed change to the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum EditOperation {
    /// Remove a segment.
    Delete {
        /// Segment to remove.
        #[serde(alias = "edge_id", alias = "id")]
        segment_id: SegmentId,
    },
    /// Draw a new segment.
    Add {
        /// Polyline in geographic coordinates.
        #[serde(with = "line_coords")]
        geometry: LineString<f64>,
        /// Road/path type; "unclassified" when omitted.
        #[serde(default, alias = "highway", skip_serializing_if = "Option::is_none")]
        functional_class: Option<FunctionalClass>,
        /// Requested id; a synthetic one is generated when omitted.
        #[serde(default, alias = "edge_id", skip_serializing_if = "Option::is_none")]
        id: Option<SegmentId>,
    },
    /// Replace the geometry of an existing segment.
    Reshape {
        /// Segment to reshape.
        #[serde(alias = "edge_id", alias = "id")]
        segment_id: SegmentId,
        /// New polyline in geographic coordinates.
        #[serde(with = "line_coords")]
        geometry: LineString<f64>,
        /// Replacement road/path type.
        #[serde(default, alias = "highway", skip_serializing_if = "Option::is_none")]
        functional_class: Option<FunctionalClass>,
    },
}

impl EditOperation {
    /// Operation kind as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Add { .. } => "add",
            Self::Reshape { .. } => "reshape",
        }
    }

    /// New geometry carried by an add or reshape.
    pub fn geometry(&self) -> Option<&LineString<f64>> {
        match self {
            Self::Add { geometry, .. } | Self::Reshape { geometry, .. } => Some(geometry),
            Self::Delete { .. } => None,
        }
    }

    /// Validate a single raw edit.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, EditWarningKind> {
        let op = value
            .get("op")
            .and_then(|v| v.as_str())
            .ok_or(EditWarningKind::MalformedEdit)?;

        if !matches!(op, "delete" | "add" | "reshape") {
            return Err(EditWarningKind::UnknownOperation);
        }

        let edit: Self =
            serde_json::from_value(value.clone()).map_err(|_| EditWarningKind::MalformedEdit)?;

        match &edit {
            Self::Add { geometry, .. } | Self::Reshape { geometry, .. } if geometry.0.is_empty() => {
                Err(EditWarningKind::MalformedEdit)
            }
            _ => Ok(edit),
        }
    }
}

/// Category of a non-fatal edit problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditWarningKind {
    /// Operation kind not supported; the edit was ignored.
    UnknownOperation,
    /// Required fields missing or unparseable; the edit was ignored.
    MalformedEdit,
    /// Reshape named an id that does not exist; applied as an add.
    ReshapeTargetMissing,
    /// Delete named an id that does not exist; nothing happened.
    DeleteTargetMissing,
    /// Add requested an id that already exists; a fresh id was used.
    IdCollision,
}

impl fmt::Display for EditWarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOperation => write!(f, "unknown_operation"),
            Self::MalformedEdit => write!(f, "malformed_edit"),
            Self::ReshapeTargetMissing => write!(f, "reshape_target_missing"),
            Self::DeleteTargetMissing => write!(f, "delete_target_missing"),
            Self::IdCollision => write!(f, "id_collision"),
        }
    }
}

/// Non-fatal problem with one edit of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditWarning {
    /// Position of the edit in the request's `edits` array.
    pub index: usize,
    /// Warning category.
    pub kind: EditWarningKind,
    /// Human-readable detail.
    pub message: String,
}

impl EditWarning {
    /// Create a new warning.
    pub fn new(index: usize, kind: EditWarningKind, message: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            message: message.into(),
        }
    }
}

/// The raw `edits` value was not a list.
#[derive(Debug, Clone, thiserror::Error)]
#[error("edits must be a list, got {0}")]
pub struct EditsNotAList(pub String);

/// A validated, ordered batch of edits.
///
/// Keeps the request position of every accepted edit so that warnings raised
/// later, while applying, still point at the right entry of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditBatch {
    edits: Vec<EditOperation>,
    #[serde(skip)]
    positions: Vec<usize>,
    #[serde(skip)]
    warnings: Vec<EditWarning>,
}

impl EditBatch {
    /// Parse a raw JSON `edits` value.
    ///
    /// `null` is treated as an empty list. Anything else that is not an array
    /// is rejected. Individual entries that fail validation are skipped with a
    /// warning.
    pub fn parse(value: &serde_json::Value) -> Result<Self, EditsNotAList> {
        let items = match value {
            serde_json::Value::Null => return Ok(Self::default()),
            serde_json::Value::Array(items) => items,
            other => return Err(EditsNotAList(json_type_name(other).to_string())),
        };

        let mut batch = Self::default();
        for (index, item) in items.iter().enumerate() {
            match EditOperation::from_value(item) {
                Ok(edit) => {
                    batch.edits.push(edit);
                    batch.positions.push(index);
                }
                Err(kind) => {
                    let op = item.get("op").and_then(|v| v.as_str()).unwrap_or("<missing>");
                    let message = match kind {
                        EditWarningKind::UnknownOperation => {
                            format!("unsupported op '{}' ignored", op)
                        }
                        _ => format!("malformed '{}' edit ignored", op),
                    };
                    tracing::debug!(index, %kind, "skipping edit");
                    batch.warnings.push(EditWarning::new(index, kind, message));
                }
            }
        }
        Ok(batch)
    }

    /// Accepted edits in request order.
    pub fn edits(&self) -> &[EditOperation] {
        &self.edits
    }

    /// Warnings raised while parsing.
    pub fn warnings(&self) -> &[EditWarning] {
        &self.warnings
    }

    /// Request position of the `i`-th accepted edit.
    pub fn position(&self, i: usize) -> usize {
        self.positions.get(i).copied().unwrap_or(i)
    }

    /// Number of accepted edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Whether no edit was accepted.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

impl From<Vec<EditOperation>> for EditBatch {
    fn from(edits: Vec<EditOperation>) -> Self {
        let positions = (0..edits.len()).collect();
        Self {
            edits,
            positions,
            warnings: Vec::new(),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_all_variants() {
        let raw = json!([
            {"op": "delete", "edge_id": "e1"},
            {"op": "add", "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}, "highway": "footway"},
            {"op": "reshape", "segment_id": "e2", "geometry": [[0.0, 0.0], [2.0, 2.0]]}
        ]);

        let batch = EditBatch::parse(&raw).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.warnings().is_empty());

        assert_eq!(
            batch.edits()[0],
            EditOperation::Delete { segment_id: SegmentId::new("e1") }
        );
        match &batch.edits()[1] {
            EditOperation::Add { geometry, functional_class, id } => {
                assert_eq!(geometry.0.len(), 2);
                assert_eq!(functional_class.as_ref().unwrap().as_str(), "footway");
                assert!(id.is_none());
            }
            other => panic!("expected add, got {:?}", other),
        }
        assert_eq!(batch.edits()[2].kind(), "reshape");
    }

    #[test]
    fn test_unknown_op_is_warning() {
        let batch = EditBatch::parse(&json!([{"op": "rotate"}])).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.warnings().len(), 1);
        assert_eq!(batch.warnings()[0].kind, EditWarningKind::UnknownOperation);
        assert_eq!(batch.warnings()[0].index, 0);
    }

    #[test]
    fn test_missing_geometry_is_malformed() {
        let raw = json!([
            {"op": "add"},
            {"op": "add", "geometry": []},
            {"op": "delete", "edge_id": "e9"}
        ]);
        let batch = EditBatch::parse(&raw).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.position(0), 2);
        assert_eq!(batch.warnings().len(), 2);
        assert!(batch
            .warnings()
            .iter()
            .all(|w| w.kind == EditWarningKind::MalformedEdit));
    }

    #[test]
    fn test_edits_must_be_list() {
        assert!(EditBatch::parse(&json!({"op": "delete"})).is_err());
        assert!(EditBatch::parse(&json!("add")).is_err());
        assert!(EditBatch::parse(&serde_json::Value::Null).unwrap().is_empty());
    }
}
