//! Opening subtraction in wall UV space
//!
//! The all-rectangular case splits the wall into strips per cut. Non-rect
//! walls with rectangular cuts use half-plane clipping. Anything else keeps
//! the wall unchanged with a warning (no robust Boolean backend is bundled).

use tracing::warn;

use crate::core::tolerance::EPS_PLANE;
use crate::geometry::polygon::{signed_area, Point2};

/// A UV polygon with optional holes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UvPolygon {
    pub outer: Vec<Point2>,
    pub holes: Vec<Vec<Point2>>,
}

impl UvPolygon {
    pub fn from_outer(outer: Vec<Point2>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn area(&self) -> f64 {
        let outer = signed_area(&self.outer).abs();
        let holes: f64 = self.holes.iter().map(|h| signed_area(h).abs()).sum();
        outer - holes
    }
}

/// Result of a subtraction: one polygon (possibly with holes) or a disjoint
/// multipolygon of solid parts.
#[derive(Debug, Clone, PartialEq)]
pub enum SubtractResult {
    Polygon(UvPolygon),
    MultiPolygon(Vec<UvPolygon>),
}

impl SubtractResult {
    pub fn polygons(&self) -> Vec<UvPolygon> {
        match self {
            SubtractResult::Polygon(p) => vec![p.clone()],
            SubtractResult::MultiPolygon(ps) => ps.clone(),
        }
    }

    pub fn total_area(&self) -> f64 {
        self.polygons().iter().map(|p| p.area()).sum()
    }
}

type Rect = (f64, f64, f64, f64); // (x0, x1, y0, y1)

/// Is the ring an axis-aligned rectangle (vertices within eps of its bbox
/// corners)? Returns the bbox as `(x0, x1, y0, y1)`.
fn as_rect(poly: &[Point2], eps: f64) -> Option<Rect> {
    if poly.len() < 4 {
        return None;
    }
    let x0 = poly.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let x1 = poly.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let y0 = poly.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let y1 = poly.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
    for &(x, y) in poly {
        let on_x = (x - x0).abs() <= eps || (x - x1).abs() <= eps;
        let on_y = (y - y0).abs() <= eps || (y - y1).abs() <= eps;
        if !(on_x && on_y) {
            return None;
        }
    }
    Some((x0, x1, y0, y1))
}

fn rect_poly(x0: f64, x1: f64, y0: f64, y1: f64) -> UvPolygon {
    UvPolygon::from_outer(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
}

/// Subtract an axis-aligned cut from an axis-aligned rect, partitioning the
/// remainder into left/right/below/above rectangles.
fn subtract_rect(rect: Rect, cut: Rect, eps: f64) -> Vec<UvPolygon> {
    let (x0, x1, y0, y1) = rect;
    let (cx0, cx1, cy0, cy1) = cut;
    let ix0 = x0.max(cx0);
    let ix1 = x1.min(cx1);
    let iy0 = y0.max(cy0);
    let iy1 = y1.min(cy1);
    if ix1 - ix0 <= eps || iy1 - iy0 <= eps {
        return vec![rect_poly(x0, x1, y0, y1)];
    }
    let mut out = Vec::new();
    if ix0 - x0 > eps {
        out.push(rect_poly(x0, ix0, y0, y1));
    }
    if x1 - ix1 > eps {
        out.push(rect_poly(ix1, x1, y0, y1));
    }
    if iy0 - y0 > eps {
        out.push(rect_poly(ix0, ix1, y0, iy0));
    }
    if y1 - iy1 > eps {
        out.push(rect_poly(ix0, ix1, iy1, y1));
    }
    out
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

/// Clip a polygon against a half-plane (keep side of `k` on the given axis).
fn clip_halfplane(poly: &[Point2], axis: Axis, k: f64, keep_ge: bool, eps: f64) -> Vec<Point2> {
    if poly.is_empty() {
        return Vec::new();
    }
    let coord = |p: Point2| match axis {
        Axis::X => p.0,
        Axis::Y => p.1,
    };
    let inside = |p: Point2| {
        if keep_ge {
            coord(p) >= k - eps
        } else {
            coord(p) <= k + eps
        }
    };
    let intersect = |a: Point2, b: Point2| -> Point2 {
        let av = coord(a);
        let bv = coord(b);
        let dv = bv - av;
        if dv.abs() <= eps {
            return a;
        }
        let t = ((k - av) / dv).clamp(0.0, 1.0);
        (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
    };

    let mut out = Vec::new();
    let mut prev = *poly.last().unwrap();
    let mut prev_in = inside(prev);
    for &cur in poly {
        let cur_in = inside(cur);
        if cur_in {
            if !prev_in {
                out.push(intersect(prev, cur));
            }
            out.push(cur);
        } else if prev_in {
            out.push(intersect(prev, cur));
        }
        prev = cur;
        prev_in = cur_in;
    }
    out
}

/// Subtract an axis-aligned rect from an arbitrary simple polygon by
/// partitioning P \ R into left/right/below/above clipped regions.
fn subtract_rect_from_poly(poly: &[Point2], cut: Rect, eps: f64) -> Vec<UvPolygon> {
    let (x0, x1, y0, y1) = cut;
    if poly.len() < 3 {
        return Vec::new();
    }
    let left = clip_halfplane(poly, Axis::X, x0, false, eps);
    let right = clip_halfplane(poly, Axis::X, x1, true, eps);
    let mid = clip_halfplane(
        &clip_halfplane(poly, Axis::X, x0, true, eps),
        Axis::X,
        x1,
        false,
        eps,
    );
    let bottom = clip_halfplane(&mid, Axis::Y, y0, false, eps);
    let top = clip_halfplane(&mid, Axis::Y, y1, true, eps);

    let mut parts = Vec::new();
    for p in [left, right, bottom, top] {
        if p.len() < 3 || signed_area(&p).abs() <= eps {
            continue;
        }
        parts.push(UvPolygon::from_outer(p));
    }
    parts
}

/// Subtract opening polygons from a wall polygon in UV space.
pub fn subtract_openings(wall: &UvPolygon, openings: &[Vec<Point2>]) -> SubtractResult {
    subtract_openings_eps(wall, openings, EPS_PLANE)
}

/// Same as [`subtract_openings`] with an explicit epsilon.
pub fn subtract_openings_eps(
    wall: &UvPolygon,
    openings: &[Vec<Point2>],
    eps: f64,
) -> SubtractResult {
    if openings.is_empty() {
        return SubtractResult::Polygon(wall.clone());
    }

    // All-rectangular fast path: split into strips per cut.
    if wall.holes.is_empty() {
        if let Some(wall_rect) = as_rect(&wall.outer, eps) {
            let cuts: Option<Vec<Rect>> = openings.iter().map(|o| as_rect(o, eps)).collect();
            if let Some(cuts) = cuts {
                let mut parts = vec![rect_poly(wall_rect.0, wall_rect.1, wall_rect.2, wall_rect.3)];
                for cut in cuts {
                    let mut next = Vec::new();
                    for part in &parts {
                        let rr = as_rect(&part.outer, eps)
                            .expect("strip-split parts stay axis-aligned rectangles");
                        next.extend(subtract_rect(rr, cut, eps));
                    }
                    parts = next;
                }
                return if parts.len() == 1 {
                    SubtractResult::Polygon(parts.into_iter().next().unwrap())
                } else {
                    SubtractResult::MultiPolygon(parts)
                };
            }
        }

        // Non-rect wall, rectangular cuts: half-plane partition per cut.
        let cuts: Option<Vec<Rect>> = openings.iter().map(|o| as_rect(o, eps)).collect();
        if let Some(cuts) = cuts {
            let mut polys = vec![UvPolygon::from_outer(wall.outer.clone())];
            for cut in cuts {
                let mut next = Vec::new();
                for p in &polys {
                    next.extend(subtract_rect_from_poly(&p.outer, cut, eps));
                }
                if !next.is_empty() {
                    polys = next;
                }
            }
            return if polys.len() == 1 {
                SubtractResult::Polygon(polys.into_iter().next().unwrap())
            } else {
                SubtractResult::MultiPolygon(polys)
            };
        }
    }

    // Conservative fallback: keep the wall when no robust Boolean backend fits.
    warn!("non-rectangular opening subtraction unsupported; wall kept unchanged");
    SubtractResult::Polygon(wall.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_4x3() -> UvPolygon {
        UvPolygon::from_outer(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)])
    }

    #[test]
    fn test_no_openings_identity() {
        let w = wall_4x3();
        let r = subtract_openings(&w, &[]);
        assert_eq!(r, SubtractResult::Polygon(w));
    }

    #[test]
    fn test_single_centered_cut_area() {
        let cut = vec![(1.5, 0.9), (2.5, 0.9), (2.5, 2.1), (1.5, 2.1)];
        let r = subtract_openings(&wall_4x3(), &[cut]);
        assert!((r.total_area() - (12.0 - 1.2)).abs() < 1e-6);
        assert!(matches!(r, SubtractResult::MultiPolygon(_)));
    }

    #[test]
    fn test_two_cuts_multipolygon_area() {
        // Two 1x1 cuts out of a 4x3 wall leave area 10.
        let a = vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)];
        let b = vec![(2.5, 0.5), (3.5, 0.5), (3.5, 1.5), (2.5, 1.5)];
        let r = subtract_openings(&wall_4x3(), &[a, b]);
        assert!((r.total_area() - 10.0).abs() < 1e-6);
        let parts = r.polygons();
        assert!(parts.len() >= 2, "expected disjoint solid parts");
    }

    #[test]
    fn test_full_height_cut_splits_wall() {
        let cut = vec![(1.5, 0.0), (2.5, 0.0), (2.5, 3.0), (1.5, 3.0)];
        let r = subtract_openings(&wall_4x3(), &[cut]);
        let parts = r.polygons();
        assert_eq!(parts.len(), 2);
        assert!((r.total_area() - 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_cut_outside_is_noop() {
        let cut = vec![(5.0, 0.0), (6.0, 0.0), (6.0, 1.0), (5.0, 1.0)];
        let r = subtract_openings(&wall_4x3(), &[cut]);
        assert!((r.total_area() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_rect_wall_with_rect_cut() {
        // Pentagon wall with a rectangular cut through the middle.
        let wall = UvPolygon::from_outer(vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 2.0),
            (2.0, 3.0),
            (0.0, 2.0),
        ]);
        let wall_area = wall.area();
        let cut = vec![(1.0, 0.5), (2.0, 0.5), (2.0, 1.5), (1.0, 1.5)];
        let r = subtract_openings(&wall, &[cut]);
        assert!((r.total_area() - (wall_area - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_non_rect_cut_keeps_wall_with_warning() {
        let cut = vec![(1.0, 1.0), (2.0, 1.0), (1.5, 2.0)];
        let r = subtract_openings(&wall_4x3(), &[cut]);
        assert!((r.total_area() - 12.0).abs() < 1e-9);
    }
}
