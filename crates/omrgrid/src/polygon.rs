//! Contour polygon helpers shared by the sheet localizer and the anchor
//! finder.

use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

/// Douglas–Peucker approximation of a closed contour.
///
/// The contour is split at two mutually distant points and each half is
/// simplified as an open curve, so the result does not depend on where the
/// tracer happened to start.
pub(crate) fn approximate_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon.is_nan() || epsilon <= 0.0 {
        return points.to_vec();
    }

    let i1 = farthest_from(points, points[0]);
    let i2 = farthest_from(points, points[i1]);
    let (a, b) = if i1 < i2 { (i1, i2) } else { (i2, i1) };
    if a == b {
        return points.to_vec();
    }

    let first = &points[a..=b];
    let mut second: Vec<Point<i32>> = points[b..].to_vec();
    second.extend_from_slice(&points[..=a]);

    let mut poly = approximate_polygon_dp(first, epsilon, false);
    let tail = approximate_polygon_dp(&second, epsilon, false);
    // Drop the shared endpoints of the second half.
    if tail.len() > 2 {
        poly.extend_from_slice(&tail[1..tail.len() - 1]);
    }
    poly
}

fn farthest_from(points: &[Point<i32>], origin: Point<i32>) -> usize {
    let mut best = 0;
    let mut best_d = -1i64;
    for (i, p) in points.iter().enumerate() {
        let dx = (p.x - origin.x) as i64;
        let dy = (p.y - origin.y) as i64;
        let d = dx * dx + dy * dy;
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// Absolute shoelace area.
pub(crate) fn polygon_area(poly: &[Point<i32>]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0i64;
    for i in 0..poly.len() {
        let p = poly[i];
        let q = poly[(i + 1) % poly.len()];
        acc += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (acc as f64).abs() / 2.0
}

/// Strictly convex: every turn has the same nonzero orientation.
pub(crate) fn is_convex(poly: &[Point<i32>]) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0i64;
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let c = poly[(i + 2) % n];
        let cross = (b.x - a.x) as i64 * (c.y - b.y) as i64
            - (b.y - a.y) as i64 * (c.x - b.x) as i64;
        if cross == 0 {
            return false;
        }
        let s = cross.signum();
        if sign == 0 {
            sign = s;
        } else if s != sign {
            return false;
        }
    }
    true
}

/// Inclusive integer bounding box `(min_x, min_y, max_x, max_y)`.
pub(crate) fn bounding_box(points: &[Point<i32>]) -> Option<(i32, i32, i32, i32)> {
    let first = points.first()?;
    let mut bb = (first.x, first.y, first.x, first.y);
    for p in points {
        bb.0 = bb.0.min(p.x);
        bb.1 = bb.1.min(p.y);
        bb.2 = bb.2.max(p.x);
        bb.3 = bb.3.max(p.y);
    }
    Some(bb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_contour(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<Point<i32>> {
        let mut pts = Vec::new();
        for x in x0..x1 {
            pts.push(Point::new(x, y0));
        }
        for y in y0..y1 {
            pts.push(Point::new(x1, y));
        }
        for x in (x0 + 1..=x1).rev() {
            pts.push(Point::new(x, y1));
        }
        for y in (y0 + 1..=y1).rev() {
            pts.push(Point::new(x0, y));
        }
        pts
    }

    #[test]
    fn rectangle_contour_reduces_to_four_corners() {
        // Start the trace mid-edge so the start point is not a corner.
        let mut pts = rect_contour(10, 20, 60, 50);
        pts.rotate_left(17);
        let poly = approximate_closed(&pts, 2.0);
        assert_eq!(poly.len(), 4, "got {:?}", poly);
        assert!(is_convex(&poly));
        assert_eq!(polygon_area(&poly), 50.0 * 30.0);
        assert_eq!(bounding_box(&poly), Some((10, 20, 60, 50)));
    }

    #[test]
    fn non_convex_polygon_is_detected() {
        let poly = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(5, 3),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert!(!is_convex(&poly));
    }

    #[test]
    fn short_or_zero_epsilon_input_is_returned_unchanged() {
        let pts = vec![Point::new(0, 0), Point::new(1, 1)];
        assert_eq!(approximate_closed(&pts, 1.0), pts);
        let rect = rect_contour(0, 0, 5, 5);
        assert_eq!(approximate_closed(&rect, 0.0).len(), rect.len());
    }
}
