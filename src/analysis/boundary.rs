// src/analysis/boundary.rs
//
// Closed boundary polygon of the restricted boarding zone, in image pixels.
//
// Distances follow the usual contour convention:
//   > 0  inside the polygon
//   = 0  on an edge
//   < 0  outside
// with magnitude equal to the distance to the nearest edge.

use crate::error::EvasionError;
use crate::types::Point;
use serde::Serialize;

/// Points closer than this to an edge are treated as lying on it.
const EDGE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryPolygon {
    points: Vec<Point>,
    area: f32,
    perimeter: f32,
}

impl BoundaryPolygon {
    /// Validate a candidate outline. Anything with fewer than three finite
    /// vertices or no enclosed area is degenerate.
    pub fn new(points: Vec<Point>) -> Result<Self, EvasionError> {
        if points.len() < 3 {
            return Err(EvasionError::DegenerateGeometry(format!(
                "polygon needs at least 3 vertices, got {}",
                points.len()
            )));
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            return Err(EvasionError::DegenerateGeometry(format!(
                "non-finite vertex ({}, {})",
                bad.x, bad.y
            )));
        }

        let area = shoelace_area(&points);
        let perimeter = closed_perimeter(&points);
        if area <= EDGE_EPSILON || perimeter <= EDGE_EPSILON {
            return Err(EvasionError::DegenerateGeometry(format!(
                "zero-area polygon ({} vertices, area={:.3}, perimeter={:.3})",
                points.len(),
                area,
                perimeter
            )));
        }

        Ok(Self {
            points,
            area: area as f32,
            perimeter: perimeter as f32,
        })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn perimeter(&self) -> f32 {
        self.perimeter
    }

    /// Perimeter over area. Lower means a tighter outline.
    pub fn compactness(&self) -> f32 {
        self.perimeter / self.area
    }

    /// Inside-or-on-edge test. Non-finite points are never contained.
    pub fn contains(&self, p: &Point) -> bool {
        self.signed_distance(p).is_some_and(|d| d >= 0.0)
    }

    /// Signed distance to the outline, `None` for a point that cannot be
    /// projected (non-finite coordinates).
    pub fn signed_distance(&self, p: &Point) -> Option<f32> {
        if !p.is_finite() {
            return None;
        }

        let px = p.x as f64;
        let py = p.y as f64;
        let n = self.points.len();

        let mut min_dist = f64::INFINITY;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            min_dist = min_dist.min(point_segment_distance(px, py, a, b));
        }

        if min_dist <= EDGE_EPSILON {
            return Some(0.0);
        }

        let dist = min_dist as f32;
        if self.ray_cast_inside(px, py) {
            Some(dist)
        } else {
            Some(-dist)
        }
    }

    /// Unsigned distance to the outline.
    pub fn distance(&self, p: &Point) -> Option<f32> {
        self.signed_distance(p).map(f32::abs)
    }

    fn ray_cast_inside(&self, px: f64, py: f64) -> bool {
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;

        for i in 0..n {
            let (xi, yi) = (self.points[i].x as f64, self.points[i].y as f64);
            let (xj, yj) = (self.points[j].x as f64, self.points[j].y as f64);

            if (yi > py) != (yj > py) {
                let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
                if px < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }

        inside
    }
}

fn shoelace_area(points: &[Point]) -> f64 {
    let n = points.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
        })
        .sum();
    (twice * 0.5).abs()
}

fn closed_perimeter(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].distance_to(&points[(i + 1) % n]) as f64)
        .sum()
}

fn point_segment_distance(px: f64, py: f64, a: Point, b: Point) -> f64 {
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - ax, b.y as f64 - ay);
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = ax + t * dx;
    let cy = ay + t * dy;
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, side: f32) -> BoundaryPolygon {
        BoundaryPolygon::new(vec![
            Point::new(x0, y0),
            Point::new(x0 + side, y0),
            Point::new(x0 + side, y0 + side),
            Point::new(x0, y0 + side),
        ])
        .unwrap()
    }

    #[test]
    fn test_area_perimeter_compactness() {
        let poly = square(0.0, 0.0, 100.0);
        assert!((poly.area() - 10_000.0).abs() < 1e-3);
        assert!((poly.perimeter() - 400.0).abs() < 1e-3);
        assert!((poly.compactness() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn test_winding_order_does_not_change_area() {
        let cw = BoundaryPolygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 50.0),
            Point::new(50.0, 50.0),
            Point::new(50.0, 0.0),
        ])
        .unwrap();
        assert!((cw.area() - 2_500.0).abs() < 1e-3);
    }

    #[test]
    fn test_contains_inside_outside_and_edge() {
        let poly = square(100.0, 100.0, 200.0);
        assert!(poly.contains(&Point::new(200.0, 200.0)));
        assert!(!poly.contains(&Point::new(50.0, 200.0)));
        assert!(poly.contains(&Point::new(100.0, 150.0)), "edge counts as inside");
        assert!(poly.contains(&Point::new(300.0, 300.0)), "vertex counts as inside");
    }

    #[test]
    fn test_signed_distance() {
        let poly = square(100.0, 100.0, 200.0);
        assert!((poly.signed_distance(&Point::new(70.0, 200.0)).unwrap() + 30.0).abs() < 1e-4);
        assert!((poly.signed_distance(&Point::new(120.0, 200.0)).unwrap() - 20.0).abs() < 1e-4);
        assert_eq!(poly.signed_distance(&Point::new(300.0, 200.0)), Some(0.0));
        // Corner region: distance to the nearest vertex
        let d = poly.distance(&Point::new(97.0, 96.0)).unwrap();
        assert!((d - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_concave_polygon_containment() {
        // U shape opening upwards
        let poly = BoundaryPolygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(30.0, 0.0),
            Point::new(30.0, 100.0),
            Point::new(70.0, 100.0),
            Point::new(70.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 150.0),
            Point::new(0.0, 150.0),
        ])
        .unwrap();
        assert!(poly.contains(&Point::new(10.0, 50.0)));
        assert!(!poly.contains(&Point::new(50.0, 50.0)));
        assert!(poly.contains(&Point::new(50.0, 120.0)));
    }

    #[test]
    fn test_degenerate_candidates_rejected() {
        let collinear = BoundaryPolygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(20.0, 20.0),
        ]);
        assert!(matches!(collinear, Err(EvasionError::DegenerateGeometry(_))));

        let two_points = BoundaryPolygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert!(two_points.is_err());

        let nan = BoundaryPolygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(f32::NAN, 0.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(nan.is_err());
    }

    #[test]
    fn test_non_finite_point_has_no_distance() {
        let poly = square(0.0, 0.0, 10.0);
        assert_eq!(poly.signed_distance(&Point::new(f32::INFINITY, 1.0)), None);
        assert!(!poly.contains(&Point::new(f32::NAN, 1.0)));
    }
}
