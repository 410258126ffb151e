//! Endpoint snapping.
//!
//! When a user draws a new or reshaped segment its ends rarely land exactly on
//! an existing endpoint. The snapper moves each end onto the nearest existing
//! endpoint within tolerance so the new segment actually connects.

use geo::{Coord, LineString};
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::projection::Projection;
use crate::types::Segment;

/// Default snap tolerance, meters.
pub const DEFAULT_SNAP_TOLERANCE_M: f64 = 8.0;

/// Indexed endpoint: planar position, with the geographic coordinate it was
/// projected from.
type EndpointEntry = GeomWithData<[f64; 2], Coord<f64>>;

/// An end that was moved onto an existing endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedEnd {
    /// Planar position of the existing endpoint.
    pub planar: Coord<f64>,
    /// Geographic position of the existing endpoint, as it was ingested.
    pub geographic: Coord<f64>,
    /// How far the end moved, meters.
    pub distance: f64,
}

/// Result of snapping one polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapResult {
    /// Planar polyline with snapped ends substituted.
    pub line: LineString<f64>,
    /// Set when the first coordinate snapped.
    pub start: Option<SnappedEnd>,
    /// Set when the last coordinate snapped.
    pub end: Option<SnappedEnd>,
}

/// Nearest-endpoint snapper over a fixed endpoint set.
#[derive(Debug, Clone)]
pub struct Snapper {
    tree: RTree<EndpointEntry>,
    tolerance: f64,
}

impl Snapper {
    /// Build from `(planar, geographic)` endpoint pairs.
    pub fn new(endpoints: impl IntoIterator<Item = (Coord<f64>, Coord<f64>)>, tolerance: f64) -> Self {
        let entries: Vec<EndpointEntry> = endpoints
            .into_iter()
            .map(|(planar, geographic)| GeomWithData::new([planar.x, planar.y], geographic))
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
            tolerance,
        }
    }

    /// Index the first and last coordinate of every segment.
    pub fn from_segments(segments: &[Segment], projection: &dyn Projection, tolerance: f64) -> Self {
        let endpoints = segments
            .iter()
            .flat_map(|s| [s.start(), s.end()])
            .flatten()
            .map(|geographic| (projection.forward(geographic), geographic));

        Self::new(endpoints, tolerance)
    }

    /// Snap tolerance, meters.
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Number of indexed endpoints.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether the endpoint set is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Snap a planar polyline, returning only the geometry.
    pub fn snap(&self, line: &LineString<f64>) -> LineString<f64> {
        self.snap_detailed(line).line
    }

    /// Snap a planar polyline and report which ends moved.
    ///
    /// Each end is evaluated on its own. Both ends may land on the same
    /// endpoint, turning a short line into a loop. A single-point line has
    /// the same point as both ends; the result may be a duplicated vertex.
    pub fn snap_detailed(&self, line: &LineString<f64>) -> SnapResult {
        let mut coords = line.0.clone();
        if coords.is_empty() || self.is_empty() {
            return SnapResult {
                line: LineString::new(coords),
                start: None,
                end: None,
            };
        }

        let last = coords.len() - 1;
        let start = self.nearest_within_tolerance(coords[0]);
        let end = self.nearest_within_tolerance(coords[last]);

        if let Some(snapped) = start {
            coords[0] = snapped.planar;
        }
        if let Some(snapped) = end {
            if last == 0 {
                coords.push(snapped.planar);
            } else {
                coords[last] = snapped.planar;
            }
        }

        SnapResult {
            line: LineString::new(coords),
            start,
            end,
        }
    }

    fn nearest_within_tolerance(&self, at: Coord<f64>) -> Option<SnappedEnd> {
        let nearest = self.tree.nearest_neighbor(&[at.x, at.y])?;
        let [x, y] = *nearest.geom();
        let distance = ((x - at.x).powi(2) + (y - at.y).powi(2)).sqrt();

        (distance <= self.tolerance).then_some(SnappedEnd {
            planar: Coord { x, y },
            geographic: nearest.data,
            distance,
        })
    }
}
