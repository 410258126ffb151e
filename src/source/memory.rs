//! In-memory network source.

use async_trait::async_trait;
use geo::{BoundingRect, Intersects};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::{AreaQuery, NetworkSource};
use crate::geojson::{segments_from_geojson, GeoJsonError};
use crate::types::{Segment, SegmentId};

/// Error type for the in-memory source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemorySourceError {
    /// No segments are registered under the place.
    #[error("Place not found: {0}")]
    PlaceNotFound(String),
    /// A segment id was registered twice.
    #[error("Duplicate segment id: {0}")]
    DuplicateSegment(SegmentId),
    /// The backing document could not be read.
    #[error("Failed to load network: {0}")]
    Load(String),
}

impl From<GeoJsonError> for InMemorySourceError {
    fn from(e: GeoJsonError) -> Self {
        Self::Load(e.to_string())
    }
}

/// Network source backed by a fixed segment collection.
///
/// Segments may be tagged with a place name (matched case-insensitively);
/// bbox queries scan every segment. Insertion order is preserved.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNetworkSource {
    segments: Vec<Segment>,
    places: BTreeMap<String, Vec<usize>>,
    ids: HashSet<SegmentId>,
}

impl InMemoryNetworkSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a segment, optionally under a place name.
    pub fn add_segment(
        &mut self,
        segment: Segment,
        place: Option<&str>,
    ) -> Result<(), InMemorySourceError> {
        if !self.ids.insert(segment.id.clone()) {
            return Err(InMemorySourceError::DuplicateSegment(segment.id));
        }
        let idx = self.segments.len();
        self.segments.push(segment);
        if let Some(place) = place {
            self.places.entry(place.to_lowercase()).or_default().push(idx);
        }
        Ok(())
    }

    /// Add every segment under one place name.
    pub fn with_place(
        mut self,
        place: &str,
        segments: impl IntoIterator<Item = Segment>,
    ) -> Result<Self, InMemorySourceError> {
        for segment in segments {
            self.add_segment(segment, Some(place))?;
        }
        Ok(self)
    }

    /// Load from a GeoJSON FeatureCollection; the `place` property tags segments.
    pub fn from_geojson(value: &serde_json::Value) -> Result<Self, InMemorySourceError> {
        let mut source = Self::new();
        for imported in segments_from_geojson(value)? {
            source.add_segment(imported.segment, imported.place.as_deref())?;
        }
        Ok(source)
    }

    /// Load a GeoJSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InMemorySourceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| InMemorySourceError::Load(format!("{}: {}", path.display(), e)))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| InMemorySourceError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_geojson(&value)
    }

    /// Number of segments held.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether the source holds nothing.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Known place names (lowercased).
    pub fn places(&self) -> Vec<&str> {
        self.places.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl NetworkSource for InMemoryNetworkSource {
    type Error = InMemorySourceError;

    async fn fetch(&self, area: &AreaQuery, max_features: usize) -> Result<Vec<Segment>, Self::Error> {
        let selected: Vec<Segment> = match area {
            AreaQuery::Place(place) => self
                .places
                .get(&place.to_lowercase())
                .ok_or_else(|| InMemorySourceError::PlaceNotFound(place.clone()))?
                .iter()
                .take(max_features)
                .map(|&i| self.segments[i].clone())
                .collect(),
            AreaQuery::BBox(bbox) => {
                let rect = bbox.to_rect();
                self.segments
                    .iter()
                    .filter(|s| {
                        s.geometry
                            .bounding_rect()
                            .map_or(false, |r| r.intersects(&rect))
                    })
                    .take(max_features)
                    .cloned()
                    .collect()
            }
        };
        Ok(selected)
    }
}
