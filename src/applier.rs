//! Edit application: baseline edge set + edit batch -> scenario edge set.

use geo::{Coord, LineString};
use std::collections::HashSet;

use crate::projection::Projection;
use crate::snap::{SnapResult, Snapper};
use crate::types::{
    planar_length, EditBatch, EditOperation, EditWarning, EditWarningKind, FunctionalClass,
    Segment, SegmentId,
};

/// Prefix of generated segment ids.
pub const SYNTHETIC_ID_PREFIX: &str = "added_";

/// Counts of what a batch did to the edge set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EditStats {
    /// Segments appended by `add` (including reshapes that degraded to adds).
    pub added: usize,
    /// Segments removed by `delete`.
    pub deleted: usize,
    /// Segments replaced in place by `reshape`.
    pub reshaped: usize,
    /// Endpoints moved by snapping.
    pub snapped_endpoints: usize,
}

/// Scenario edge set produced by applying a batch.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    /// Scenario segments, geographic coordinates.
    pub segments: Vec<Segment>,
    /// Non-fatal problems, positioned by request index.
    pub warnings: Vec<EditWarning>,
    /// Summary counts.
    pub stats: EditStats,
}

/// Applies edits to a working copy of the baseline.
///
/// The snap index is built from the baseline once and is not updated as
/// edits land, so new segments snap to the network the user was looking at.
pub struct EditApplier<'a> {
    projection: &'a dyn Projection,
    snapper: Snapper,
}

impl<'a> EditApplier<'a> {
    /// Create an applier for `baseline`.
    pub fn new(baseline: &[Segment], projection: &'a dyn Projection, tolerance: f64) -> Self {
        Self {
            projection,
            snapper: Snapper::from_segments(baseline, projection, tolerance),
        }
    }

    /// Apply `batch` to `baseline` in order.
    ///
    /// Untouched baseline segments are passed through unchanged. Parse
    /// warnings already on the batch are carried into the outcome.
    pub fn apply(&self, baseline: &[Segment], batch: &EditBatch) -> EditOutcome {
        let mut working: Vec<Segment> = baseline.to_vec();
        let mut taken: HashSet<SegmentId> = baseline.iter().map(|s| s.id.clone()).collect();
        let mut warnings: Vec<EditWarning> = batch.warnings().to_vec();
        let mut stats = EditStats::default();
        let mut next_synthetic = 0usize;

        for (i, edit) in batch.edits().iter().enumerate() {
            let index = batch.position(i);

            match edit {
                EditOperation::Delete { segment_id } => {
                    match working.iter().position(|s| &s.id == segment_id) {
                        Some(pos) => {
                            working.remove(pos);
                            stats.deleted += 1;
                        }
                        None => warnings.push(EditWarning::new(
                            index,
                            EditWarningKind::DeleteTargetMissing,
                            format!("delete of unknown segment '{}' ignored", segment_id),
                        )),
                    }
                }
                EditOperation::Add {
                    geometry,
                    functional_class,
                    id,
                } => {
                    let id = match id {
                        Some(requested) if !working.iter().any(|s| &s.id == requested) => {
                            taken.insert(requested.clone());
                            requested.clone()
                        }
                        Some(requested) => {
                            let fresh = fresh_id(&mut taken, &mut next_synthetic);
                            warnings.push(EditWarning::new(
                                index,
                                EditWarningKind::IdCollision,
                                format!("segment '{}' already exists, added as '{}'", requested, fresh),
                            ));
                            fresh
                        }
                        None => fresh_id(&mut taken, &mut next_synthetic),
                    };

                    let class = functional_class.clone().unwrap_or_default();
                    let (segment, moved) = self.build_segment(id, class, geometry);
                    stats.snapped_endpoints += moved;
                    stats.added += 1;
                    working.push(segment);
                }
                EditOperation::Reshape {
                    segment_id,
                    geometry,
                    functional_class,
                } => match working.iter().position(|s| &s.id == segment_id) {
                    Some(pos) => {
                        let previous = working.remove(pos);
                        let class = functional_class
                            .clone()
                            .unwrap_or_else(|| previous.functional_class.clone());
                        let (mut segment, moved) =
                            self.build_segment(segment_id.clone(), class, geometry);
                        segment.source_ref = previous.source_ref;
                        stats.snapped_endpoints += moved;
                        stats.reshaped += 1;
                        working.push(segment);
                    }
                    None => {
                        let fresh = fresh_id(&mut taken, &mut next_synthetic);
                        warnings.push(EditWarning::new(
                            index,
                            EditWarningKind::ReshapeTargetMissing,
                            format!(
                                "reshape of unknown segment '{}' applied as add '{}'",
                                segment_id, fresh
                            ),
                        ));
                        let class = functional_class.clone().unwrap_or_default();
                        let (segment, moved) = self.build_segment(fresh, class, geometry);
                        stats.snapped_endpoints += moved;
                        stats.added += 1;
                        working.push(segment);
                    }
                },
            }
        }

        warnings.sort_by_key(|w| w.index);

        tracing::debug!(
            baseline = baseline.len(),
            scenario = working.len(),
            added = stats.added,
            deleted = stats.deleted,
            reshaped = stats.reshaped,
            snapped = stats.snapped_endpoints,
            warnings = warnings.len(),
            "edits applied"
        );

        EditOutcome {
            segments: working,
            warnings,
            stats,
        }
    }

    /// Project, snap, measure, and bring back to geographic coordinates.
    ///
    /// Vertices that did not snap keep their input coordinates verbatim and
    /// snapped ends take the exact coordinate of the endpoint they landed on.
    fn build_segment(
        &self,
        id: SegmentId,
        class: FunctionalClass,
        geometry: &LineString<f64>,
    ) -> (Segment, usize) {
        let planar = self.projection.forward_line(geometry);
        let SnapResult { line, start, end } = self.snapper.snap_detailed(&planar);

        let mut coords: Vec<Coord<f64>> = geometry.0.clone();
        if let Some(snapped) = start {
            coords[0] = snapped.geographic;
        }
        if let Some(snapped) = end {
            if coords.len() == 1 {
                coords.push(snapped.geographic);
            } else if let Some(last) = coords.last_mut() {
                *last = snapped.geographic;
            }
        }

        let moved = usize::from(start.is_some()) + usize::from(end.is_some());
        let segment = Segment::new(id, class, LineString::new(coords), planar_length(&line));
        (segment, moved)
    }
}

fn fresh_id(taken: &mut HashSet<SegmentId>, counter: &mut usize) -> SegmentId {
    loop {
        *counter += 1;
        let candidate = SegmentId::new(format!("{}{}", SYNTHETIC_ID_PREFIX, counter));
        if taken.insert(candidate.clone()) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::PlanarIdentity;

    fn seg(id: &str, coords: Vec<(f64, f64)>) -> Segment {
        let line = LineString::from(coords);
        let length = planar_length(&line);
        Segment::new(id, FunctionalClass::new("residential"), line, length).with_source_ref("w1")
    }

    fn baseline() -> Vec<Segment> {
        vec![
            seg("ab", vec![(0.0, 0.0), (10.0, 0.0)]),
            seg("bc", vec![(10.0, 0.0), (20.0, 0.0)]),
        ]
    }

    fn apply(edits: Vec<EditOperation>) -> EditOutcome {
        let base = baseline();
        let applier = EditApplier::new(&base, &PlanarIdentity, 8.0);
        applier.apply(&base, &EditBatch::from(edits))
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let outcome = apply(vec![]);
        assert_eq!(outcome.segments, baseline());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_delete_removes_segment() {
        let outcome = apply(vec![EditOperation::Delete { segment_id: "ab".into() }]);
        assert_eq!(outcome.segments.len(), 1);
        assert!(outcome.segments.iter().all(|s| s.id.as_str() != "ab"));
        assert_eq!(outcome.stats.deleted, 1);
    }

    #[test]
    fn test_delete_missing_is_noop_with_warning() {
        let outcome = apply(vec![EditOperation::Delete { segment_id: "zz".into() }]);
        assert_eq!(outcome.segments, baseline());
        assert_eq!(outcome.warnings[0].kind, EditWarningKind::DeleteTargetMissing);
    }

    #[test]
    fn test_add_snaps_and_defaults() {
        let outcome = apply(vec![EditOperation::Add {
            geometry: LineString::from(vec![(10.5, 0.5), (10.0, 5.0)]),
            functional_class: None,
            id: None,
        }]);

        let added = outcome.segments.last().unwrap();
        assert_eq!(added.id.as_str(), "added_1");
        assert_eq!(added.functional_class.as_str(), "unclassified");
        assert_eq!(added.start(), Some(Coord { x: 10.0, y: 0.0 }));
        assert!((added.length - 5.0).abs() < 1e-12);
        assert_eq!(outcome.stats.snapped_endpoints, 1);
    }

    #[test]
    fn test_add_with_colliding_id_gets_fresh_id() {
        let outcome = apply(vec![EditOperation::Add {
            geometry: LineString::from(vec![(0.0, 50.0), (0.0, 60.0)]),
            functional_class: Some(FunctionalClass::new("footway")),
            id: Some("ab".into()),
        }]);

        assert_eq!(outcome.segments.len(), 3);
        assert_eq!(outcome.segments.iter().filter(|s| s.id.as_str() == "ab").count(), 1);
        assert_eq!(outcome.warnings[0].kind, EditWarningKind::IdCollision);
    }

    #[test]
    fn test_synthetic_ids_skip_existing() {
        let mut base = baseline();
        base.push(seg("added_1", vec![(100.0, 100.0), (110.0, 100.0)]));
        let applier = EditApplier::new(&base, &PlanarIdentity, 8.0);

        let outcome = applier.apply(
            &base,
            &EditBatch::from(vec![EditOperation::Add {
                geometry: LineString::from(vec![(0.0, 50.0), (0.0, 60.0)]),
                functional_class: None,
                id: None,
            }]),
        );

        assert_eq!(outcome.segments.last().unwrap().id.as_str(), "added_2");
    }

    #[test]
    fn test_reshape_preserves_id_and_metadata() {
        let outcome = apply(vec![EditOperation::Reshape {
            segment_id: "ab".into(),
            geometry: LineString::from(vec![(0.0, 0.0), (5.0, 5.0), (10.0, 0.0)]),
            functional_class: None,
        }]);

        let matching: Vec<_> = outcome.segments.iter().filter(|s| s.id.as_str() == "ab").collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].functional_class.as_str(), "residential");
        assert_eq!(matching[0].source_ref.as_deref(), Some("w1"));
        assert_eq!(matching[0].geometry.0.len(), 3);
        assert_eq!(outcome.segments.len(), 2);
    }

    #[test]
    fn test_reshape_missing_degrades_to_add() {
        let outcome = apply(vec![EditOperation::Reshape {
            segment_id: "ghost".into(),
            geometry: LineString::from(vec![(0.0, 40.0), (0.0, 60.0)]),
            functional_class: None,
        }]);

        assert_eq!(outcome.segments.len(), 3);
        assert!(outcome.segments.iter().all(|s| s.id.as_str() != "ghost"));
        assert_eq!(outcome.warnings[0].kind, EditWarningKind::ReshapeTargetMissing);
    }

    #[test]
    fn test_edits_apply_in_order() {
        let outcome = apply(vec![
            EditOperation::Add {
                geometry: LineString::from(vec![(20.0, 0.0), (30.0, 0.0)]),
                functional_class: None,
                id: Some("cd".into()),
            },
            EditOperation::Delete { segment_id: "cd".into() },
        ]);

        assert_eq!(outcome.segments, baseline());
        assert!(outcome.warnings.is_empty());
    }
}
