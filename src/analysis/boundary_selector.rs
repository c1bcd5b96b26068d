// src/analysis/boundary_selector.rs
//
// Picks the boundary used for a whole session from the segmentation results
// of the first and last frame. The tighter outline (lower perimeter/area)
// wins; a zero-area candidate counts as missing.

use super::boundary::BoundaryPolygon;
use crate::types::Point;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateOrigin {
    FirstFrame,
    LastFrame,
}

impl CandidateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstFrame => "FIRST_FRAME",
            Self::LastFrame => "LAST_FRAME",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoundarySelection {
    pub polygon: BoundaryPolygon,
    pub origin: CandidateOrigin,
}

impl BoundarySelection {
    pub fn compactness(&self) -> f32 {
        self.polygon.compactness()
    }
}

/// Select from raw outlines. Degenerate outlines are logged and dropped.
pub fn select(
    first_frame: Option<Vec<Point>>,
    last_frame: Option<Vec<Point>>,
) -> Option<BoundarySelection> {
    let first = first_frame.and_then(|pts| validate(pts, CandidateOrigin::FirstFrame));
    let last = last_frame.and_then(|pts| validate(pts, CandidateOrigin::LastFrame));
    select_polygons(first, last)
}

/// Select from already validated polygons.
pub fn select_polygons(
    first_frame: Option<BoundaryPolygon>,
    last_frame: Option<BoundaryPolygon>,
) -> Option<BoundarySelection> {
    let selection = match (first_frame, last_frame) {
        (Some(first), Some(last)) => {
            let first_ratio = first.compactness();
            let last_ratio = last.compactness();
            debug!(
                "Boundary candidates: first ratio={:.4}, last ratio={:.4}",
                first_ratio, last_ratio
            );
            // Ties go to the first frame
            if last_ratio < first_ratio {
                BoundarySelection {
                    polygon: last,
                    origin: CandidateOrigin::LastFrame,
                }
            } else {
                BoundarySelection {
                    polygon: first,
                    origin: CandidateOrigin::FirstFrame,
                }
            }
        }
        (Some(first), None) => BoundarySelection {
            polygon: first,
            origin: CandidateOrigin::FirstFrame,
        },
        (None, Some(last)) => BoundarySelection {
            polygon: last,
            origin: CandidateOrigin::LastFrame,
        },
        (None, None) => {
            warn!("⚠️  No usable boundary candidate: evasion classification disabled for this session");
            return None;
        }
    };

    info!(
        "✓ Boundary selected from {} ({} vertices, area={:.0}px², ratio={:.4})",
        selection.origin.as_str(),
        selection.polygon.points().len(),
        selection.polygon.area(),
        selection.compactness()
    );
    Some(selection)
}

fn validate(points: Vec<Point>, origin: CandidateOrigin) -> Option<BoundaryPolygon> {
    match BoundaryPolygon::new(points) {
        Ok(polygon) => Some(polygon),
        Err(e) => {
            warn!("Discarding {} boundary candidate: {}", origin.as_str(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned rectangle whose perimeter/area equals `ratio`
    /// (square of side 4/ratio).
    fn square_with_ratio(ratio: f32, x0: f32) -> Vec<Point> {
        let side = 4.0 / ratio;
        vec![
            Point::new(x0, 0.0),
            Point::new(x0 + side, 0.0),
            Point::new(x0 + side, side),
            Point::new(x0, side),
        ]
    }

    fn degenerate() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
        ]
    }

    #[test]
    fn test_lower_ratio_wins_regardless_of_frame() {
        let selected = select(
            Some(square_with_ratio(1.8, 0.0)),
            Some(square_with_ratio(1.2, 100.0)),
        )
        .unwrap();
        assert_eq!(selected.origin, CandidateOrigin::LastFrame);
        assert!((selected.compactness() - 1.2).abs() < 1e-4);

        let selected = select(
            Some(square_with_ratio(1.2, 0.0)),
            Some(square_with_ratio(1.8, 100.0)),
        )
        .unwrap();
        assert_eq!(selected.origin, CandidateOrigin::FirstFrame);
        assert!((selected.compactness() - 1.2).abs() < 1e-4);
    }

    #[test]
    fn test_tie_prefers_first_frame() {
        let selected = select(
            Some(square_with_ratio(1.5, 0.0)),
            Some(square_with_ratio(1.5, 50.0)),
        )
        .unwrap();
        assert_eq!(selected.origin, CandidateOrigin::FirstFrame);
    }

    #[test]
    fn test_single_candidate_is_used() {
        let only_last = select(None, Some(square_with_ratio(0.5, 0.0))).unwrap();
        assert_eq!(only_last.origin, CandidateOrigin::LastFrame);

        let only_first = select(Some(square_with_ratio(0.5, 0.0)), None).unwrap();
        assert_eq!(only_first.origin, CandidateOrigin::FirstFrame);
    }

    #[test]
    fn test_degenerate_candidate_treated_as_absent() {
        let selected = select(Some(degenerate()), Some(square_with_ratio(2.0, 0.0))).unwrap();
        assert_eq!(selected.origin, CandidateOrigin::LastFrame);

        assert!(select(Some(degenerate()), Some(degenerate())).is_none());
    }

    #[test]
    fn test_no_candidates() {
        assert!(select(None, None).is_none());
    }
}
