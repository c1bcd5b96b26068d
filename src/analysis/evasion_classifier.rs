// src/analysis/evasion_classifier.rs
//
// Decides whether a tracked person evaded the fare barrier.
//
// CASE 1 (entry): the person walks into the boundary after having been
//   tracked outside for at least `min_time_outside` seconds.
//
// CASE 2 (disappearance): the person is lost while close to the boundary,
//   had been tracked long enough, and the last three trajectory points were
//   getting strictly closer to the boundary. Tracks that vanish while
//   walking away, or with jittery distances, stay benign.
//
// The classifier only inspects state; the orchestrator applies verdicts to
// the registry.

use super::boundary::BoundaryPolygon;
use super::track_registry::{Classification, Identity};
use crate::error::EvasionError;
use crate::types::{EvasionConfig, Point};
use serde::Serialize;

/// Trajectory points inspected for the approach check
const APPROACH_WINDOW: usize = 3;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvasionKind {
    Entry,
    Disappearance,
}

impl EvasionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Disappearance => "DISAPPEARANCE",
        }
    }

    pub fn classification(&self) -> Classification {
        match self {
            Self::Entry => Classification::EntryEvasion,
            Self::Disappearance => Classification::DisappearanceEvasion,
        }
    }
}

/// Where and when an evasion was flagged
#[derive(Debug, Clone, Serialize)]
pub struct EvasionMark {
    pub track_id: u32,
    pub kind: EvasionKind,
    pub point: Point,
    pub frame_index: u64,
    /// Seconds between first sighting and the deciding frame
    pub elapsed_secs: f64,
    /// Unsigned distance to the boundary at the deciding point
    pub boundary_distance: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    TrackedTooBriefly { elapsed_secs: f64 },
    TooFarFromBoundary { distance: f32 },
    TooFewPositions { count: usize },
    NotApproaching { distances: [f32; APPROACH_WINDOW] },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrackedTooBriefly { elapsed_secs } => {
                write!(f, "tracked only {:.2}s", elapsed_secs)
            }
            Self::TooFarFromBoundary { distance } => {
                write!(f, "lost {:.1}px from boundary", distance)
            }
            Self::TooFewPositions { count } => write!(f, "only {} positions", count),
            Self::NotApproaching { distances } => write!(
                f,
                "not approaching (distances {:.1} → {:.1} → {:.1})",
                distances[0], distances[1], distances[2]
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum DisappearanceVerdict {
    Evasion(EvasionMark),
    Benign(RejectReason),
    /// Ignored or already classified: nothing to decide
    NotApplicable,
    /// Geometry could not be evaluated for this identity
    Skipped(String),
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone)]
pub struct EvasionClassifier {
    config: EvasionConfig,
    fps: f64,
}

impl EvasionClassifier {
    pub fn new(config: EvasionConfig, fps: f64) -> Result<Self, EvasionError> {
        config.validate()?;
        if !(fps.is_finite() && fps > 0.0) {
            return Err(EvasionError::Configuration(format!(
                "frame rate must be positive, got {}",
                fps
            )));
        }
        Ok(Self { config, fps })
    }

    pub fn config(&self) -> &EvasionConfig {
        &self.config
    }

    fn elapsed_secs(&self, from_frame: u64, to_frame: u64) -> f64 {
        to_frame.saturating_sub(from_frame) as f64 / self.fps
    }

    /// Case 1. Call right after the identity was observed in `frame_index`.
    pub fn evaluate_entry(&self, identity: &Identity, frame_index: u64) -> Option<EvasionMark> {
        if identity.ignored || identity.classification() != Classification::Unresolved {
            return None;
        }
        if identity.was_contained() || !identity.contained() {
            return None;
        }

        let elapsed_secs = self.elapsed_secs(identity.first_seen_frame, frame_index);
        if elapsed_secs < self.config.min_time_outside {
            return None;
        }

        let point = identity.last_position()?;
        Some(EvasionMark {
            track_id: identity.id,
            kind: EvasionKind::Entry,
            point,
            frame_index,
            elapsed_secs,
            boundary_distance: None,
        })
    }

    /// Case 2. Call for an identity that was not seen in `frame_index`.
    pub fn evaluate_disappearance(
        &self,
        identity: &Identity,
        boundary: &BoundaryPolygon,
        frame_index: u64,
    ) -> DisappearanceVerdict {
        if identity.ignored || identity.classification() != Classification::Unresolved {
            return DisappearanceVerdict::NotApplicable;
        }

        let Some(last_pos) = identity.last_position() else {
            return DisappearanceVerdict::Benign(RejectReason::TooFewPositions { count: 0 });
        };

        let elapsed_secs = self.elapsed_secs(identity.first_seen_frame, identity.last_seen_frame);
        if elapsed_secs < self.config.min_time_outside {
            return DisappearanceVerdict::Benign(RejectReason::TrackedTooBriefly { elapsed_secs });
        }

        let Some(distance) = boundary.distance(&last_pos) else {
            return DisappearanceVerdict::Skipped(format!(
                "last position ({}, {}) cannot be projected onto the boundary",
                last_pos.x, last_pos.y
            ));
        };
        if distance > self.config.proximity_threshold {
            return DisappearanceVerdict::Benign(RejectReason::TooFarFromBoundary { distance });
        }

        let positions = identity.positions();
        if positions.len() < APPROACH_WINDOW {
            return DisappearanceVerdict::Benign(RejectReason::TooFewPositions {
                count: positions.len(),
            });
        }

        let mut distances = [0.0f32; APPROACH_WINDOW];
        for (slot, p) in distances
            .iter_mut()
            .zip(&positions[positions.len() - APPROACH_WINDOW..])
        {
            match boundary.distance(p) {
                Some(d) => *slot = d,
                None => {
                    return DisappearanceVerdict::Skipped(format!(
                        "trajectory point ({}, {}) cannot be projected onto the boundary",
                        p.x, p.y
                    ))
                }
            }
        }

        if !strictly_decreasing(&distances) {
            return DisappearanceVerdict::Benign(RejectReason::NotApproaching { distances });
        }

        DisappearanceVerdict::Evasion(EvasionMark {
            track_id: identity.id,
            kind: EvasionKind::Disappearance,
            point: last_pos,
            frame_index,
            elapsed_secs,
            boundary_distance: Some(distance),
        })
    }
}

fn strictly_decreasing(values: &[f32]) -> bool {
    values.windows(2).all(|w| w[0] > w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::track_registry::TrackRegistry;

    /// Boundary occupying x in [100, 300], y in [100, 300]
    fn boundary() -> BoundaryPolygon {
        BoundaryPolygon::new(vec![
            Point::new(100.0, 100.0),
            Point::new(300.0, 100.0),
            Point::new(300.0, 300.0),
            Point::new(100.0, 300.0),
        ])
        .unwrap()
    }

    fn classifier() -> EvasionClassifier {
        EvasionClassifier::new(EvasionConfig::default(), 30.0).unwrap()
    }

    /// Observe `xs` (y fixed at 200) on consecutive frames starting at `start`.
    fn walk(registry: &mut TrackRegistry, id: u32, start: u64, xs: &[f32]) {
        let poly = boundary();
        for (i, x) in xs.iter().enumerate() {
            let p = Point::new(*x, 200.0);
            registry.observe(id, p, start + i as u64, poly.contains(&p));
        }
    }

    #[test]
    fn test_entry_after_min_time_outside() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        registry.observe(1, Point::new(50.0, 200.0), 10, false);
        registry.observe(1, Point::new(150.0, 200.0), 50, true);

        let mark = c.evaluate_entry(registry.get(1).unwrap(), 50).unwrap();
        assert_eq!(mark.kind, EvasionKind::Entry);
        assert_eq!(mark.frame_index, 50);
        assert!((mark.elapsed_secs - 40.0 / 30.0).abs() < 1e-9);
        assert_eq!(mark.point, Point::new(150.0, 200.0));
    }

    #[test]
    fn test_entry_too_soon_is_not_flagged() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        registry.observe(1, Point::new(50.0, 200.0), 10, false);
        registry.observe(1, Point::new(150.0, 200.0), 35, true);
        assert!(c.evaluate_entry(registry.get(1).unwrap(), 35).is_none());
    }

    #[test]
    fn test_entry_requires_outside_to_inside_transition() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        registry.observe(1, Point::new(50.0, 200.0), 1, false);
        registry.observe(1, Point::new(60.0, 200.0), 60, false);
        assert!(c.evaluate_entry(registry.get(1).unwrap(), 60).is_none());

        registry.observe(1, Point::new(150.0, 200.0), 61, true);
        assert!(c.evaluate_entry(registry.get(1).unwrap(), 61).is_some());

        // Staying inside is not a second crossing
        registry.observe(1, Point::new(160.0, 200.0), 62, true);
        assert!(c.evaluate_entry(registry.get(1).unwrap(), 62).is_none());
    }

    #[test]
    fn test_entry_never_fires_for_classified_or_ignored() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        registry.observe(1, Point::new(50.0, 200.0), 1, false);
        registry.observe(1, Point::new(150.0, 200.0), 60, true);
        registry.classify(1, Classification::EntryEvasion);
        assert!(c.evaluate_entry(registry.get(1).unwrap(), 60).is_none());

        registry.observe(2, Point::new(150.0, 200.0), 1, true);
        registry.observe(2, Point::new(50.0, 200.0), 30, false);
        registry.observe(2, Point::new(150.0, 200.0), 60, true);
        assert!(c.evaluate_entry(registry.get(2).unwrap(), 60).is_none());
    }

    #[test]
    fn test_disappearance_while_approaching() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        // Distances to the left edge: ..., 30, 20, 10
        let mut xs: Vec<f32> = vec![0.0; 30];
        xs.extend([70.0, 80.0, 90.0]);
        walk(&mut registry, 4, 1, &xs);

        match c.evaluate_disappearance(registry.get(4).unwrap(), &boundary(), 34) {
            DisappearanceVerdict::Evasion(mark) => {
                assert_eq!(mark.kind, EvasionKind::Disappearance);
                assert_eq!(mark.point, Point::new(90.0, 200.0));
                assert!((mark.boundary_distance.unwrap() - 10.0).abs() < 1e-4);
            }
            other => panic!("expected evasion, got {:?}", other),
        }
    }

    #[test]
    fn test_disappearance_while_retreating_is_benign() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        let mut xs: Vec<f32> = vec![90.0; 30];
        xs.extend([90.0, 80.0, 70.0]);
        walk(&mut registry, 5, 1, &xs);

        let verdict = c.evaluate_disappearance(registry.get(5).unwrap(), &boundary(), 34);
        assert!(matches!(
            verdict,
            DisappearanceVerdict::Benign(RejectReason::NotApproaching { .. })
        ));
    }

    #[test]
    fn test_disappearance_with_equal_distances_is_benign() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        let xs: Vec<f32> = vec![80.0; 40];
        walk(&mut registry, 6, 1, &xs);

        assert!(matches!(
            c.evaluate_disappearance(registry.get(6).unwrap(), &boundary(), 41),
            DisappearanceVerdict::Benign(RejectReason::NotApproaching { .. })
        ));
    }

    #[test]
    fn test_disappearance_far_from_boundary_is_benign() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        let mut xs: Vec<f32> = vec![0.0; 30];
        xs.extend([20.0, 30.0, 40.0]);
        walk(&mut registry, 7, 1, &xs);

        assert!(matches!(
            c.evaluate_disappearance(registry.get(7).unwrap(), &boundary(), 34),
            DisappearanceVerdict::Benign(RejectReason::TooFarFromBoundary { .. })
        ));
    }

    #[test]
    fn test_disappearance_of_short_track_is_benign() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        walk(&mut registry, 8, 1, &[70.0, 80.0, 90.0]);

        assert!(matches!(
            c.evaluate_disappearance(registry.get(8).unwrap(), &boundary(), 4),
            DisappearanceVerdict::Benign(RejectReason::TrackedTooBriefly { .. })
        ));
    }

    #[test]
    fn test_disappearance_needs_three_positions() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        registry.observe(9, Point::new(70.0, 200.0), 1, false);
        registry.observe(9, Point::new(90.0, 200.0), 60, false);

        assert!(matches!(
            c.evaluate_disappearance(registry.get(9).unwrap(), &boundary(), 61),
            DisappearanceVerdict::Benign(RejectReason::TooFewPositions { count: 2 })
        ));
    }

    #[test]
    fn test_disappearance_inside_near_edge_counts() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        // Inside the boundary, walking towards the right edge: 40, 25, 5 px
        registry.observe(10, Point::new(50.0, 200.0), 1, false);
        walk(&mut registry, 10, 40, &[260.0, 275.0, 295.0]);

        assert!(matches!(
            c.evaluate_disappearance(registry.get(10).unwrap(), &boundary(), 43),
            DisappearanceVerdict::Evasion(_)
        ));
    }

    #[test]
    fn test_disappearance_skips_unprojectable_points() {
        let c = classifier();
        let mut registry = TrackRegistry::new();
        registry.observe(11, Point::new(70.0, 200.0), 1, false);
        registry.observe(11, Point::new(80.0, 200.0), 30, false);
        registry.observe(11, Point::new(f32::NAN, 200.0), 40, false);

        assert!(matches!(
            c.evaluate_disappearance(registry.get(11).unwrap(), &boundary(), 41),
            DisappearanceVerdict::Skipped(_)
        ));
    }

    #[test]
    fn test_invalid_frame_rate_rejected() {
        assert!(matches!(
            EvasionClassifier::new(EvasionConfig::default(), 0.0),
            Err(EvasionError::Configuration(_))
        ));
        assert!(EvasionClassifier::new(EvasionConfig::default(), f64::NAN).is_err());
    }
}
