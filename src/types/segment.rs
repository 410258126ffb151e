//! Segment types for the path network.

use geo::{Coord, EuclideanLength, LineString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a segment within one edge set.
///
/// Implements `Ord` so edge sets and hashes can be ordered deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    /// Create a new SegmentId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SegmentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SegmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Functional class of a segment (road/path type, e.g. `footway`, `primary`).
///
/// The set of classes is open: anything the network source reports is kept
/// verbatim and only interpreted through [`FunctionalClass::ordinal`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FunctionalClass(String);

impl FunctionalClass {
    /// Class assigned to added segments that do not name one.
    pub const UNCLASSIFIED: &'static str = "unclassified";

    /// Ordinal used for classes missing from the table.
    pub const UNKNOWN_ORDINAL: f64 = 2.5;

    /// Create a new functional class. Input is trimmed and lowercased.
    pub fn new(class: impl AsRef<str>) -> Self {
        Self(class.as_ref().trim().to_lowercase())
    }

    /// The default class for new segments.
    pub fn unclassified() -> Self {
        Self(Self::UNCLASSIFIED.to_string())
    }

    /// Borrow the class name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map the class onto an ordinal scale.
    ///
    /// Pedestrian-only classes are lowest, residential/local mid-low,
    /// tertiary < secondary < primary above that. `*_link` classes take the
    /// ordinal of their base class.
    pub fn ordinal(&self) -> f64 {
        let base = self.0.strip_suffix("_link").unwrap_or(&self.0);
        match base {
            "footway" | "pedestrian" | "path" | "steps" | "corridor" => 0.0,
            "cycleway" | "track" | "bridleway" => 1.0,
            "service" | "living_street" => 1.5,
            "residential" | "unclassified" => 2.0,
            "tertiary" => 3.0,
            "secondary" => 4.0,
            "primary" => 5.0,
            "trunk" => 6.0,
            "motorway" => 7.0,
            _ => Self::UNKNOWN_ORDINAL,
        }
    }
}

impl Default for FunctionalClass {
    fn default() -> Self {
        Self::unclassified()
    }
}

impl fmt::Display for FunctionalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One path element of the network.
///
/// Geometry is held in geographic coordinates (x = longitude, y = latitude)
/// unless the caller works in [`PlanarIdentity`](crate::projection::PlanarIdentity)
/// space. Length is always meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Unique segment identifier.
    pub id: SegmentId,
    /// Identifier in the upstream map data, if any (e.g. an OSM way id).
    pub source_ref: Option<String>,
    /// Road/path type.
    pub functional_class: FunctionalClass,
    /// Ordered polyline.
    pub geometry: LineString<f64>,
    /// Length in meters.
    pub length: f64,
}

impl Segment {
    /// Create a new segment.
    pub fn new(
        id: impl Into<SegmentId>,
        functional_class: FunctionalClass,
        geometry: LineString<f64>,
        length: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source_ref: None,
            functional_class,
            geometry,
            length,
        }
    }

    /// Attach an upstream source reference.
    pub fn with_source_ref(mut self, source_ref: impl Into<String>) -> Self {
        self.source_ref = Some(source_ref.into());
        self
    }

    /// First coordinate of the geometry.
    pub fn start(&self) -> Option<Coord<f64>> {
        self.geometry.0.first().copied()
    }

    /// Last coordinate of the geometry.
    pub fn end(&self) -> Option<Coord<f64>> {
        self.geometry.0.last().copied()
    }

    /// Whether the geometry has no coordinates at all.
    pub fn is_degenerate(&self) -> bool {
        self.geometry.0.is_empty()
    }
}

/// Euclidean length of a polyline in its own units.
pub fn planar_length(line: &LineString<f64>) -> f64 {
    line.euclidean_length()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinal_ordering() {
        let footway = FunctionalClass::new("footway").ordinal();
        let residential = FunctionalClass::new("residential").ordinal();
        let tertiary = FunctionalClass::new("tertiary").ordinal();
        let secondary = FunctionalClass::new("secondary").ordinal();
        let primary = FunctionalClass::new("primary").ordinal();

        assert!(footway < residential);
        assert!(residential < tertiary);
        assert!(tertiary < secondary);
        assert!(secondary < primary);
    }

    #[test]
    fn test_ordinal_link_and_unknown() {
        assert_eq!(FunctionalClass::new("primary_link").ordinal(), 5.0);
        assert_eq!(
            FunctionalClass::new("raceway").ordinal(),
            FunctionalClass::UNKNOWN_ORDINAL
        );
        assert_eq!(FunctionalClass::new("  Footway ").as_str(), "footway");
    }

    #[test]
    fn test_planar_length() {
        let line = LineString::from(vec![(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)]);
        assert!((planar_length(&line) - 11.0).abs() < 1e-12);
    }
}
