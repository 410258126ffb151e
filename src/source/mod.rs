//! Baseline network sources.
//!
//! Fetching the network from map data is outside the kernel; this module
//! only defines the seam ([`NetworkSource`]), the area query it accepts, an
//! in-memory implementation, and a read-only cache in front of any source.

pub mod cache;
pub mod memory;

use async_trait::async_trait;
use geo::{coord, Rect};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Segment;

pub use cache::{BaselineCache, CacheConfig, CacheStats};
pub use memory::{InMemoryNetworkSource, InMemorySourceError};

/// Error type for area query validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AreaQueryError {
    /// Neither a place nor a bbox was given.
    #[error("provide 'place' or 'bbox'")]
    Missing,
    /// The bbox could not be parsed or is not a valid box.
    #[error("malformed bbox: {0}")]
    MalformedBBox(String),
}

/// Geographic bounding box, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Minimum longitude.
    pub west: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Maximum latitude.
    pub north: f64,
}

impl BBox {
    /// Create a validated bbox.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, AreaQueryError> {
        let values = [west, south, east, north];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AreaQueryError::MalformedBBox("non-finite coordinate".to_string()));
        }
        if !(-90.0..=90.0).contains(&south) || !(-90.0..=90.0).contains(&north) {
            return Err(AreaQueryError::MalformedBBox("latitude out of range".to_string()));
        }
        if west >= east || south >= north {
            return Err(AreaQueryError::MalformedBBox(
                "expected west < east and south < north".to_string(),
            ));
        }
        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// Parse `"w,s,e,n"`.
    pub fn parse(raw: &str) -> Result<Self, AreaQueryError> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| AreaQueryError::MalformedBBox(format!("{}: {}", raw, e)))?;
        Self::from_slice(&parts)
    }

    /// Parse a JSON string `"w,s,e,n"` or array `[w, s, e, n]`.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, AreaQueryError> {
        match value {
            serde_json::Value::String(s) => Self::parse(s),
            serde_json::Value::Array(items) => {
                let parts: Vec<f64> = items
                    .iter()
                    .map(|v| v.as_f64())
                    .collect::<Option<_>>()
                    .ok_or_else(|| AreaQueryError::MalformedBBox("non-numeric entry".to_string()))?;
                Self::from_slice(&parts)
            }
            other => Err(AreaQueryError::MalformedBBox(format!("unsupported bbox {}", other))),
        }
    }

    fn from_slice(parts: &[f64]) -> Result<Self, AreaQueryError> {
        match parts {
            [w, s, e, n] => Self::new(*w, *s, *e, *n),
            _ => Err(AreaQueryError::MalformedBBox(format!(
                "expected 4 values, got {}",
                parts.len()
            ))),
        }
    }

    /// The box as a `geo` rectangle.
    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        )
    }
}

/// Where to fetch the baseline network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaQuery {
    /// Named place, e.g. "Monaco".
    Place(String),
    /// Geographic bounding box.
    BBox(BBox),
}

impl AreaQuery {
    /// Build from optional request parts. A non-empty place wins over a bbox.
    pub fn from_parts(
        place: Option<&str>,
        bbox: Option<&serde_json::Value>,
    ) -> Result<Self, AreaQueryError> {
        if let Some(place) = place.map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(Self::Place(place.to_string()));
        }
        match bbox {
            Some(serde_json::Value::Null) | None => Err(AreaQueryError::Missing),
            Some(value) => Ok(Self::BBox(BBox::from_value(value)?)),
        }
    }

    /// Stable key for caching.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Place(p) => format!("place:{}", p.to_lowercase()),
            Self::BBox(b) => format!("bbox:{},{},{},{}", b.west, b.south, b.east, b.north),
        }
    }
}

impl fmt::Display for AreaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Place(p) => write!(f, "{}", p),
            Self::BBox(b) => write!(f, "[{}, {}, {}, {}]", b.west, b.south, b.east, b.north),
        }
    }
}

/// Trait for baseline network backends.
///
/// Implementations must return segments with unique ids, in a stable order,
/// and at most `max_features` of them.
#[async_trait]
pub trait NetworkSource: Send + Sync {
    /// Error type for source operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the segments covering `area`.
    async fn fetch(&self, area: &AreaQuery, max_features: usize) -> Result<Vec<Segment>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bbox_parse() {
        let b = BBox::parse("7.41, 43.72,7.44,43.75").unwrap();
        assert_eq!(b.west, 7.41);
        assert_eq!(b.north, 43.75);
        assert_eq!(BBox::from_value(&json!([7.41, 43.72, 7.44, 43.75])).unwrap(), b);
    }

    #[test]
    fn test_bbox_rejects_bad_input() {
        assert!(BBox::parse("1,2,3").is_err());
        assert!(BBox::parse("a,b,c,d").is_err());
        assert!(BBox::parse("5,5,1,1").is_err());
        assert!(BBox::parse("0,-95,1,1").is_err());
        assert!(BBox::from_value(&json!({"w": 1})).is_err());
    }

    #[test]
    fn test_area_query_from_parts() {
        assert_eq!(
            AreaQuery::from_parts(Some("Monaco"), None).unwrap(),
            AreaQuery::Place("Monaco".to_string())
        );
        assert!(matches!(
            AreaQuery::from_parts(Some("  "), Some(&json!("0,0,1,1"))).unwrap(),
            AreaQuery::BBox(_)
        ));
        assert_eq!(AreaQuery::from_parts(None, None), Err(AreaQueryError::Missing));
        assert_eq!(
            AreaQuery::from_parts(None, Some(&serde_json::Value::Null)),
            Err(AreaQueryError::Missing)
        );
    }
}
