//! Before/after join of predictions by segment id.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::types::{Segment, SegmentId};

/// Prediction change for one scenario segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffRow {
    /// Segment id.
    pub segment_id: SegmentId,
    /// Baseline prediction; 0.0 for segments not in the baseline.
    pub pred_before: f64,
    /// Scenario prediction.
    pub pred_after: f64,
    /// `pred_after - pred_before`.
    pub delta: f64,
}

/// Aggregate view of a diff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Scenario segments without a baseline counterpart.
    pub added: usize,
    /// Baseline segments without a scenario counterpart.
    pub removed: usize,
    /// Segments in both whose prediction moved.
    pub changed: usize,
    /// Mean delta over scenario segments (0.0 when empty).
    pub mean_delta: f64,
}

/// One row per scenario segment, in scenario order.
///
/// `scenario` and `pred_after` are parallel; baseline-only segments are not
/// reported.
pub fn diff(
    scenario: &[Segment],
    pred_after: &[f64],
    pred_before: &HashMap<SegmentId, f64>,
) -> Vec<DiffRow> {
    scenario
        .iter()
        .zip(pred_after)
        .map(|(segment, &after)| {
            let before = pred_before.get(&segment.id).copied().unwrap_or(0.0);
            DiffRow {
                segment_id: segment.id.clone(),
                pred_before: before,
                pred_after: after,
                delta: after - before,
            }
        })
        .collect()
}

/// Summarize `rows` against the baseline prediction map.
pub fn summarize(rows: &[DiffRow], pred_before: &HashMap<SegmentId, f64>) -> DiffSummary {
    let in_scenario: HashSet<&SegmentId> = rows.iter().map(|r| &r.segment_id).collect();
    let added = rows
        .iter()
        .filter(|r| !pred_before.contains_key(&r.segment_id))
        .count();
    let removed = pred_before.keys().filter(|id| !in_scenario.contains(id)).count();
    let changed = rows
        .iter()
        .filter(|r| pred_before.contains_key(&r.segment_id) && r.delta != 0.0)
        .count();
    let mean_delta = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|r| r.delta).sum::<f64>() / rows.len() as f64
    };

    DiffSummary {
        added,
        removed,
        changed,
        mean_delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FunctionalClass;
    use geo::LineString;

    fn seg(id: &str) -> Segment {
        Segment::new(
            id,
            FunctionalClass::default(),
            LineString::from(vec![(0.0, 0.0), (1.0, 0.0)]),
            1.0,
        )
    }

    #[test]
    fn test_diff_tracks_scenario() {
        let before: HashMap<SegmentId, f64> =
            [("a".into(), 10.0), ("gone".into(), 5.0)].into_iter().collect();
        let rows = diff(&[seg("a"), seg("new")], &[12.0, 3.0], &before);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].delta, 2.0);
        assert_eq!(rows[1].pred_before, 0.0);
        assert_eq!(rows[1].delta, 3.0);
        assert!(rows.iter().all(|r| r.segment_id.as_str() != "gone"));

        let summary = summarize(&rows, &before);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.changed, 1);
        assert!((summary.mean_delta - 2.5).abs() < 1e-12);
    }
}
