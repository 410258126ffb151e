//! Geographic <-> planar coordinate conversion.
//!
//! Snapping, node rounding and length computation all need a metric plane.
//! Segments come in and go out as (lon, lat); everything in between works on
//! projected coordinates.

use geo::{BoundingRect, Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::types::Segment;

/// Mean earth radius (IUGG), meters.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A reversible mapping between geographic and planar coordinates.
pub trait Projection: Send + Sync {
    /// Geographic (lon, lat) to planar meters.
    fn forward(&self, coord: Coord<f64>) -> Coord<f64>;

    /// Planar meters back to geographic (lon, lat).
    fn inverse(&self, coord: Coord<f64>) -> Coord<f64>;

    /// Project every vertex of a line.
    fn forward_line(&self, line: &LineString<f64>) -> LineString<f64> {
        line.0.iter().map(|c| self.forward(*c)).collect()
    }

    /// Unproject every vertex of a line.
    fn inverse_line(&self, line: &LineString<f64>) -> LineString<f64> {
        line.0.iter().map(|c| self.inverse(*c)).collect()
    }
}

/// Equirectangular projection about a fixed origin.
///
/// Distances are accurate to well under a percent across a city-sized
/// extent, which is all the snap tolerance and node rounding need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTangentPlane {
    origin_lon: f64,
    origin_lat: f64,
    cos_lat: f64,
}

impl LocalTangentPlane {
    /// Create a projection about `(lon, lat)`.
    pub fn new(origin_lon: f64, origin_lat: f64) -> Self {
        Self {
            origin_lon,
            origin_lat,
            cos_lat: origin_lat.to_radians().cos(),
        }
    }

    /// Projection centred on the bounding box of the given segments.
    ///
    /// Returns `None` if no segment has any coordinate.
    pub fn centered_on(segments: &[Segment]) -> Option<Self> {
        Self::centered_on_lines(segments.iter().map(|s| &s.geometry))
    }

    /// Projection centred on the bounding box of the given lines.
    pub fn centered_on_lines<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Option<Self> {
        let coords: Vec<Coord<f64>> = lines
            .into_iter()
            .flat_map(|line| line.0.iter().copied())
            .collect();
        let rect = LineString::new(coords).bounding_rect()?;
        let center = rect.center();
        Some(Self::new(center.x, center.y))
    }

    /// Origin as (lon, lat).
    pub fn origin(&self) -> (f64, f64) {
        (self.origin_lon, self.origin_lat)
    }
}

impl Projection for LocalTangentPlane {
    fn forward(&self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: EARTH_RADIUS_M * (coord.x - self.origin_lon).to_radians() * self.cos_lat,
            y: EARTH_RADIUS_M * (coord.y - self.origin_lat).to_radians(),
        }
    }

    fn inverse(&self, coord: Coord<f64>) -> Coord<f64> {
        Coord {
            x: self.origin_lon + (coord.x / (EARTH_RADIUS_M * self.cos_lat)).to_degrees(),
            y: self.origin_lat + (coord.y / EARTH_RADIUS_M).to_degrees(),
        }
    }
}

/// Coordinates that are already planar meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanarIdentity;

impl Projection for PlanarIdentity {
    fn forward(&self, coord: Coord<f64>) -> Coord<f64> {
        coord
    }

    fn inverse(&self, coord: Coord<f64>) -> Coord<f64> {
        coord
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{HaversineDistance, Point};

    #[test]
    fn test_round_trip() {
        let proj = LocalTangentPlane::new(7.42, 43.73);
        let original = Coord { x: 7.4215, y: 43.7312 };
        let back = proj.inverse(proj.forward(original));
        assert!((back.x - original.x).abs() < 1e-12);
        assert!((back.y - original.y).abs() < 1e-12);
    }

    #[test]
    fn test_centered_on_lines() {
        let lines = [
            LineString::from(vec![(10.0, 59.0), (10.5, 59.5)]),
            LineString::from(vec![(11.0, 61.0)]),
        ];
        let proj = LocalTangentPlane::centered_on_lines(&lines).unwrap();
        assert_eq!(proj.origin(), (10.5, 60.0));
        assert!(LocalTangentPlane::centered_on_lines(&[]).is_none());
    }

    #[test]
    fn test_distances_match_haversine() {
        let proj = LocalTangentPlane::new(7.42, 43.73);
        let a = Coord { x: 7.4200, y: 43.7300 };
        let b = Coord { x: 7.4250, y: 43.7330 };

        let pa = proj.forward(a);
        let pb = proj.forward(b);
        let planar = ((pa.x - pb.x).powi(2) + (pa.y - pb.y).powi(2)).sqrt();
        let great_circle = Point::from(a).haversine_distance(&Point::from(b));

        assert!((planar - great_circle).abs() / great_circle < 0.005);
    }

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = LocalTangentPlane::new(-73.98, 40.75);
        let p = proj.forward(Coord { x: -73.98, y: 40.75 });
        assert_eq!(p, Coord { x: 0.0, y: 0.0 });
    }
}
