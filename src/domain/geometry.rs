//! Point-in-polygon kernel
//!
//! Even-odd ray casting on raw (longitude, latitude) pairs treated as planar
//! coordinates. No geodesic correction is applied.
//!
//! Points lying exactly on an edge or vertex get whatever answer the crossing
//! rule produces: edges are half-open in y, so a point on a bottom edge tends
//! to count as inside and a point on a top edge as outside. Callers must not
//! rely on boundary inclusion.

use crate::domain::types::Point;

/// Test whether `(x, y)` lies inside the ring
///
/// The ring is implicitly closed (last vertex wraps to the first); an
/// explicitly repeated closing vertex is harmless. Rings with fewer than
/// three vertices always yield `false`.
pub fn point_in_polygon(x: f64, y: f64, ring: &[Point]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].x, ring[i].y);
        let (xj, yj) = (ring[j].x, ring[j].y);

        // Straddle check first: guarantees yi != yj before dividing
        if (yi > y) != (yj > y) {
            let cross_x = (xj - xi) * (y - yi) / (yj - yi) + xi;
            if x < cross_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn square() -> Vec<Point> {
        ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)])
    }

    #[test]
    fn test_square_contains_center() {
        assert!(point_in_polygon(5.0, 5.0, &square()));
    }

    #[test]
    fn test_square_excludes_outside() {
        let sq = square();
        assert!(!point_in_polygon(15.0, 5.0, &sq));
        assert!(!point_in_polygon(-1.0, 5.0, &sq));
        assert!(!point_in_polygon(5.0, 11.0, &sq));
        assert!(!point_in_polygon(5.0, -0.5, &sq));
    }

    #[test]
    fn test_winding_order_does_not_matter() {
        let mut reversed = square();
        reversed.reverse();
        assert!(point_in_polygon(5.0, 5.0, &reversed));
        assert!(!point_in_polygon(15.0, 5.0, &reversed));
    }

    #[test]
    fn test_explicitly_closed_ring() {
        let closed = ring(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)]);
        assert!(point_in_polygon(5.0, 5.0, &closed));
        assert!(!point_in_polygon(15.0, 5.0, &closed));
    }

    #[test]
    fn test_concave_notch_is_outside() {
        // U shape: notch between x=4..6 from y=4 upwards
        let u = ring(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (6.0, 10.0),
            (6.0, 4.0),
            (4.0, 4.0),
            (4.0, 10.0),
            (0.0, 10.0),
        ]);
        assert!(!point_in_polygon(5.0, 8.0, &u));
        assert!(point_in_polygon(2.0, 8.0, &u));
        assert!(point_in_polygon(8.0, 8.0, &u));
        assert!(point_in_polygon(5.0, 2.0, &u));
    }

    #[test]
    fn test_degenerate_rings_are_false() {
        assert!(!point_in_polygon(0.0, 0.0, &[]));
        assert!(!point_in_polygon(0.5, 0.0, &ring(&[(0.0, 0.0), (1.0, 0.0)])));
        // All collinear
        let line = ring(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]);
        assert!(!point_in_polygon(1.0, 1.0, &line));
        assert!(!point_in_polygon(0.5, 1.0, &line));
    }

    #[test]
    fn test_real_coordinates() {
        // Small lot near Jakarta, lon/lat
        let lot = ring(&[(106.65, -6.13), (106.66, -6.13), (106.66, -6.12), (106.65, -6.12)]);
        assert!(point_in_polygon(106.655, -6.125, &lot));
        assert!(!point_in_polygon(106.70, -6.125, &lot));
    }

    #[test]
    fn test_boundary_is_deterministic() {
        let sq = square();
        let first = point_in_polygon(0.0, 5.0, &sq);
        for _ in 0..10 {
            assert_eq!(point_in_polygon(0.0, 5.0, &sq), first);
        }
    }
}
