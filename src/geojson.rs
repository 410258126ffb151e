//! GeoJSON wire format for segments and simulation results.
//!
//! Only `LineString` features are understood. Coordinates are `[lon, lat]`;
//! any extra ordinates (elevation) are dropped on the way in.

use geo::{Coord, HaversineLength, LineString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{FunctionalClass, Segment, SegmentId};

/// Serde adapter reading a polyline from either a GeoJSON `LineString`
/// object or a bare coordinate array, and writing a bare coordinate array.
pub mod line_coords {
    use super::*;
    use serde::{Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LineInput {
        Object { coordinates: Vec<Vec<f64>> },
        Coordinates(Vec<Vec<f64>>),
    }

    /// Serialize as `[[x, y], ...]`.
    pub fn serialize<S: Serializer>(line: &LineString<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let coords: Vec<[f64; 2]> = line.0.iter().map(|c| [c.x, c.y]).collect();
        coords.serialize(serializer)
    }

    /// Deserialize from a GeoJSON geometry object or a coordinate array.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LineString<f64>, D::Error> {
        let raw = match LineInput::deserialize(deserializer)? {
            LineInput::Object { coordinates } => coordinates,
            LineInput::Coordinates(coordinates) => coordinates,
        };
        coords_to_line(&raw).map_err(serde::de::Error::custom)
    }
}

fn coords_to_line(raw: &[Vec<f64>]) -> Result<LineString<f64>, String> {
    raw.iter()
        .map(|c| match c.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(format!("invalid coordinate {:?}", c)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}

/// GeoJSON `LineString` geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    /// Always `"LineString"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `[lon, lat]` pairs.
    pub coordinates: Vec<Vec<f64>>,
}

impl From<&LineString<f64>> for LineGeometry {
    fn from(line: &LineString<f64>) -> Self {
        Self {
            kind: "LineString".to_string(),
            coordinates: line.0.iter().map(|c| vec![c.x, c.y]).collect(),
        }
    }
}

/// GeoJSON feature carrying a line geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Always `"Feature"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Line geometry; `null` geometries deserialize as `None`.
    pub geometry: Option<LineGeometry>,
    /// Free-form properties.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// GeoJSON feature collection with optional foreign members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always `"FeatureCollection"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Member features.
    pub features: Vec<Feature>,
    /// Top-level members besides `type` and `features`.
    #[serde(flatten)]
    pub members: Map<String, Value>,
}

impl FeatureCollection {
    /// Create a collection from features.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features,
            members: Map::new(),
        }
    }

    /// Add a top-level member.
    pub fn with_member(mut self, key: impl Into<String>, value: Value) -> Self {
        self.members.insert(key.into(), value);
        self
    }
}

/// JSON number, or `null` for NaN/Infinity.
pub fn finite_or_null(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Render a segment as a feature with the standard properties
/// (`edge_id`, `osmid`, `highway`, `length`).
pub fn segment_to_feature(segment: &Segment) -> Feature {
    let mut properties = Map::new();
    properties.insert("edge_id".into(), Value::String(segment.id.to_string()));
    properties.insert(
        "osmid".into(),
        segment
            .source_ref
            .as_ref()
            .map(|s| Value::String(s.clone()))
            .unwrap_or(Value::Null),
    );
    properties.insert(
        "highway".into(),
        Value::String(segment.functional_class.to_string()),
    );
    properties.insert("length".into(), finite_or_null(segment.length));

    Feature {
        kind: "Feature".to_string(),
        geometry: Some(LineGeometry::from(&segment.geometry)),
        properties,
    }
}

/// Error reading segments from GeoJSON.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeoJsonError {
    /// Document is not a FeatureCollection.
    #[error("Not a FeatureCollection: {0}")]
    NotAFeatureCollection(String),
    /// A feature has an unusable geometry.
    #[error("Feature {index}: {reason}")]
    InvalidFeature {
        /// Position in the collection.
        index: usize,
        /// What was wrong.
        reason: String,
    },
}

/// A segment read from GeoJSON along with the `place` property, if present.
#[derive(Debug, Clone)]
pub struct ImportedSegment {
    /// The segment.
    pub segment: Segment,
    /// Value of the feature's `place` property.
    pub place: Option<String>,
}

/// Read segments from a FeatureCollection document.
///
/// Ids come from `edge_id`, then `id`, then the feature position. Features
/// with a null geometry are kept with an empty geometry; they are skipped
/// later, at graph construction. Lengths default to the haversine length.
pub fn segments_from_geojson(value: &Value) -> Result<Vec<ImportedSegment>, GeoJsonError> {
    let collection: FeatureCollection = serde_json::from_value(value.clone())
        .map_err(|e| GeoJsonError::NotAFeatureCollection(e.to_string()))?;

    collection
        .features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = match &feature.geometry {
                Some(g) if g.kind == "LineString" => coords_to_line(&g.coordinates)
                    .map_err(|reason| GeoJsonError::InvalidFeature { index, reason })?,
                Some(g) => {
                    return Err(GeoJsonError::InvalidFeature {
                        index,
                        reason: format!("unsupported geometry type {}", g.kind),
                    })
                }
                None => LineString::new(Vec::new()),
            };

            let props = &feature.properties;
            let id = props
                .get("edge_id")
                .or_else(|| props.get("id"))
                .and_then(scalar_string)
                .unwrap_or_else(|| format!("feature_{}", index));
            let class = props
                .get("highway")
                .and_then(first_scalar_string)
                .map(FunctionalClass::new)
                .unwrap_or_default();
            let length = props
                .get("length")
                .and_then(Value::as_f64)
                .filter(|l| l.is_finite() && *l >= 0.0)
                .unwrap_or_else(|| geometry.haversine_length());

            let mut segment = Segment::new(SegmentId::new(id), class, geometry, length);
            segment.source_ref = props.get("osmid").and_then(first_scalar_string);

            Ok(ImportedSegment {
                segment,
                place: props.get("place").and_then(scalar_string),
            })
        })
        .collect()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Upstream data sometimes carries a list where a scalar is expected
/// (merged ways); take the first entry.
fn first_scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.first().and_then(scalar_string),
        other => scalar_string(other),
    }
}
