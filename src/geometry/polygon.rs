//! 2D polygon validity and Boolean helpers
//!
//! Rings are open (the closing vertex is implicit) and simple within
//! `EPS_PLANE`. Repair of self-intersecting rings falls back to the convex
//! hull; the degraded path always emits a warning.

use tracing::warn;

use crate::core::tolerance::{EPS_PLANE, EPS_POS};

/// 2D point as an `(x, y)` tuple; serializes as a JSON array.
pub type Point2 = (f64, f64);

/// 3D point as an `(x, y, z)` tuple.
pub type Point3 = (f64, f64, f64);

/// Signed area of a ring (positive for CCW).
pub fn signed_area(ring: &[Point2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut s = 0.0;
    for i in 0..ring.len() {
        let (x1, y1) = ring[i];
        let (x2, y2) = ring[(i + 1) % ring.len()];
        s += x1 * y2 - x2 * y1;
    }
    0.5 * s
}

/// Test orientation by signed area.
pub fn is_ccw(ring: &[Point2]) -> bool {
    signed_area(ring) > 0.0
}

/// Repair orientation: reverse the ring if it is clockwise.
pub fn ensure_ccw(ring: &[Point2]) -> Vec<Point2> {
    let mut out = ring.to_vec();
    if !is_ccw(&out) {
        out.reverse();
    }
    out
}

fn orient(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn on_segment(a: Point2, b: Point2, p: Point2) -> bool {
    p.0 >= a.0.min(b.0) - EPS_PLANE
        && p.0 <= a.0.max(b.0) + EPS_PLANE
        && p.1 >= a.1.min(b.1) - EPS_PLANE
        && p.1 <= a.1.max(b.1) + EPS_PLANE
}

/// Proper or touching intersection of two segments.
pub fn segments_intersect(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> bool {
    let d1 = orient(b1, b2, a1);
    let d2 = orient(b1, b2, a2);
    let d3 = orient(a1, a2, b1);
    let d4 = orient(a1, a2, b2);
    if ((d1 > EPS_PLANE && d2 < -EPS_PLANE) || (d1 < -EPS_PLANE && d2 > EPS_PLANE))
        && ((d3 > EPS_PLANE && d4 < -EPS_PLANE) || (d3 < -EPS_PLANE && d4 > EPS_PLANE))
    {
        return true;
    }
    if d1.abs() <= EPS_PLANE && on_segment(b1, b2, a1) {
        return true;
    }
    if d2.abs() <= EPS_PLANE && on_segment(b1, b2, a2) {
        return true;
    }
    if d3.abs() <= EPS_PLANE && on_segment(a1, a2, b1) {
        return true;
    }
    if d4.abs() <= EPS_PLANE && on_segment(a1, a2, b2) {
        return true;
    }
    false
}

/// Pairwise non-adjacent segment intersection check.
pub fn is_self_intersecting(ring: &[Point2]) -> bool {
    let n = ring.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        let a1 = ring[i];
        let a2 = ring[(i + 1) % n];
        for j in (i + 1)..n {
            // Skip adjacent segments (sharing a vertex), including the wrap pair.
            if j == i || (j + 1) % n == i || (i + 1) % n == j {
                continue;
            }
            let b1 = ring[j];
            let b2 = ring[(j + 1) % n];
            if segments_intersect(a1, a2, b1, b2) {
                return true;
            }
        }
    }
    false
}

/// Andrew's monotone-chain convex hull (CCW, no duplicate closing vertex).
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut pts: Vec<Point2> = points.to_vec();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    pts.dedup_by(|a, b| (a.0 - b.0).abs() <= EPS_POS && (a.1 - b.1).abs() <= EPS_POS);
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Point2> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && orient(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point2> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && orient(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Repair a polygon: enforce CCW orientation; on self-intersection fall back
/// to the convex hull of the vertices with a warning.
pub fn make_polygon_valid(ring: &[Point2]) -> Vec<Point2> {
    if ring.len() < 3 {
        return ring.to_vec();
    }
    let oriented = ensure_ccw(ring);
    if !is_self_intersecting(&oriented) {
        return oriented;
    }
    warn!(
        vertices = ring.len(),
        "self-intersecting polygon repaired via convex-hull fallback"
    );
    convex_hull(&oriented)
}

/// Ray-casting point-in-polygon (odd crossings).
pub fn point_in_polygon(point: Point2, polygon: &[Point2]) -> bool {
    let (x, y) = point;
    let mut inside = false;
    let n = polygon.len();
    for i in 0..n {
        let (x1, y1) = polygon[i];
        let (x2, y2) = polygon[(i + 1) % n];
        if (y1 > y) != (y2 > y) {
            let denom = if (y2 - y1).abs() > EPS_POS {
                y2 - y1
            } else {
                EPS_POS
            };
            if x < (x2 - x1) * (y - y1) / denom + x1 {
                inside = !inside;
            }
        }
    }
    inside
}

/// Union of polygons. Without a robust Boolean backend the result is the
/// convex hull of all vertices, emitted with a warning.
pub fn polygon_union(polygons: &[Vec<Point2>]) -> Vec<Point2> {
    let pts: Vec<Point2> = polygons
        .iter()
        .filter(|p| p.len() >= 3)
        .flatten()
        .copied()
        .collect();
    if pts.is_empty() {
        return Vec::new();
    }
    warn!("polygon union via convex-hull fallback");
    convex_hull(&pts)
}

/// Intersection of two polygons via Sutherland–Hodgman clipping against a
/// convex clip polygon; for non-convex clips falls back to vertex filtering.
pub fn polygon_intersection(subject: &[Point2], clip: &[Point2]) -> Vec<Point2> {
    if subject.len() < 3 || clip.len() < 3 {
        return Vec::new();
    }
    let clip_ccw = ensure_ccw(clip);
    let convex = {
        let n = clip_ccw.len();
        (0..n).all(|i| {
            orient(clip_ccw[i], clip_ccw[(i + 1) % n], clip_ccw[(i + 2) % n]) >= -EPS_PLANE
        })
    };
    if !convex {
        return subject
            .iter()
            .copied()
            .filter(|p| point_in_polygon(*p, clip))
            .collect();
    }
    let mut output = subject.to_vec();
    let n = clip_ccw.len();
    for i in 0..n {
        if output.is_empty() {
            break;
        }
        let ca = clip_ccw[i];
        let cb = clip_ccw[(i + 1) % n];
        let input = std::mem::take(&mut output);
        let m = input.len();
        for j in 0..m {
            let cur = input[j];
            let prev = input[(j + m - 1) % m];
            let cur_in = orient(ca, cb, cur) >= -EPS_PLANE;
            let prev_in = orient(ca, cb, prev) >= -EPS_PLANE;
            if cur_in {
                if !prev_in {
                    if let Some(p) = line_intersection(prev, cur, ca, cb) {
                        output.push(p);
                    }
                }
                output.push(cur);
            } else if prev_in {
                if let Some(p) = line_intersection(prev, cur, ca, cb) {
                    output.push(p);
                }
            }
        }
    }
    output
}

fn line_intersection(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Option<Point2> {
    let d1 = (a2.0 - a1.0, a2.1 - a1.1);
    let d2 = (b2.0 - b1.0, b2.1 - b1.1);
    let denom = d1.0 * d2.1 - d1.1 * d2.0;
    if denom.abs() <= EPS_POS {
        return None;
    }
    let t = ((b1.0 - a1.0) * d2.1 - (b1.1 - a1.1) * d2.0) / denom;
    Some((a1.0 + d1.0 * t, a1.1 + d1.1 * t))
}

/// Clip a polyline to a polygon by dropping outside vertices.
pub fn clip_polyline_to_polygon(polyline: &[Point2], polygon: &[Point2]) -> Vec<Point2> {
    polyline
        .iter()
        .copied()
        .filter(|p| point_in_polygon(*p, polygon))
        .collect()
}

/// Axis-aligned bounding box of a ring as `(min_x, min_y, max_x, max_y)`.
pub fn bbox(ring: &[Point2]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(x, y) in ring {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    (min_x, min_y, max_x, max_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2> {
        vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)]
    }

    #[test]
    fn test_signed_area_square() {
        assert!((signed_area(&square()) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_ensure_ccw_reverses_cw() {
        let mut cw = square();
        cw.reverse();
        let fixed = ensure_ccw(&cw);
        assert!(is_ccw(&fixed));
    }

    #[test]
    fn test_self_intersection_bowtie() {
        let bowtie = vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)];
        assert!(is_self_intersecting(&bowtie));
        assert!(!is_self_intersecting(&square()));
    }

    #[test]
    fn test_make_polygon_valid_hull_fallback() {
        let bowtie = vec![(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)];
        let fixed = make_polygon_valid(&bowtie);
        assert!(!is_self_intersecting(&fixed));
        assert_eq!(fixed.len(), 4);
    }

    #[test]
    fn test_point_in_polygon() {
        assert!(point_in_polygon((1.0, 1.0), &square()));
        assert!(!point_in_polygon((5.0, 1.0), &square()));
    }

    #[test]
    fn test_polygon_intersection_convex() {
        let a = square();
        let b = vec![(2.0, 1.0), (6.0, 1.0), (6.0, 2.0), (2.0, 2.0)];
        let inter = polygon_intersection(&a, &b);
        assert!((signed_area(&ensure_ccw(&inter)) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_convex_hull_of_square_with_interior_point() {
        let mut pts = square();
        pts.push((1.0, 1.0));
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
    }

    #[test]
    fn test_bbox() {
        assert_eq!(bbox(&square()), (0.0, 0.0, 4.0, 3.0));
    }
}
