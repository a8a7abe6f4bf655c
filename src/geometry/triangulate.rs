//! Wall triangulation in UV space
//!
//! Fan triangulation is exact only for polygons without holes. Rings with
//! holes fall back to ear clipping of the outer ring, losing holes, and must
//! emit a warning (the rebuild records it on the wall).

use tracing::warn;

use crate::core::tolerance::{EPS_PLANE, EPS_POS, EPS_WELD};
use crate::geometry::polygon::{ensure_ccw, Point2};
use crate::geometry::subtract::UvPolygon;

/// Triangle as indices into a vertex list.
pub type TriangleIdx = (usize, usize, usize);

/// Triangulated UV polygon: welded vertices plus index triples.
#[derive(Debug, Clone, Default)]
pub struct UvTriangulation {
    pub vertices: Vec<Point2>,
    pub faces: Vec<TriangleIdx>,
    /// True when holes were dropped by the fallback path.
    pub holes_dropped: bool,
}

fn quantized_key(p: Point2) -> (i64, i64) {
    let s = 1.0 / EPS_WELD.max(EPS_POS);
    ((p.0 * s).round() as i64, (p.1 * s).round() as i64)
}

/// Fan triangulation of a convex (or star-shaped from v0) ring.
fn fan_triangulate(poly: &[Point2]) -> UvTriangulation {
    if poly.len() < 3 {
        return UvTriangulation::default();
    }
    let faces = (1..poly.len() - 1).map(|i| (0, i, i + 1)).collect();
    UvTriangulation {
        vertices: poly.to_vec(),
        faces,
        holes_dropped: false,
    }
}

fn tri_area2(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

fn point_in_triangle(p: Point2, a: Point2, b: Point2, c: Point2) -> bool {
    let d1 = tri_area2(p, a, b);
    let d2 = tri_area2(p, b, c);
    let d3 = tri_area2(p, c, a);
    let has_neg = d1 < -EPS_POS || d2 < -EPS_POS || d3 < -EPS_POS;
    let has_pos = d1 > EPS_POS || d2 > EPS_POS || d3 > EPS_POS;
    !(has_neg && has_pos)
}

/// Ear-clipping triangulation of a simple CCW ring.
pub fn ear_clip(ring: &[Point2]) -> UvTriangulation {
    let ring = ensure_ccw(ring);
    let n = ring.len();
    if n < 3 {
        return UvTriangulation::default();
    }
    if n == 3 {
        return fan_triangulate(&ring);
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut faces: Vec<TriangleIdx> = Vec::with_capacity(n - 2);
    let mut guard = 0usize;
    while indices.len() > 3 && guard < n * n {
        guard += 1;
        let m = indices.len();
        let mut clipped = false;
        for k in 0..m {
            let i0 = indices[(k + m - 1) % m];
            let i1 = indices[k];
            let i2 = indices[(k + 1) % m];
            if tri_area2(ring[i0], ring[i1], ring[i2]) <= EPS_PLANE {
                continue; // reflex or degenerate corner
            }
            let mut is_ear = true;
            for &j in &indices {
                if j == i0 || j == i1 || j == i2 {
                    continue;
                }
                if point_in_triangle(ring[j], ring[i0], ring[i1], ring[i2]) {
                    is_ear = false;
                    break;
                }
            }
            if is_ear {
                faces.push((i0, i1, i2));
                indices.remove(k);
                clipped = true;
                break;
            }
        }
        if !clipped {
            // Numerically stuck ring: finish with a fan over what remains.
            break;
        }
    }
    if indices.len() == 3 {
        faces.push((indices[0], indices[1], indices[2]));
    } else if indices.len() > 3 {
        for k in 1..indices.len() - 1 {
            faces.push((indices[0], indices[k], indices[k + 1]));
        }
    }
    UvTriangulation {
        vertices: ring,
        faces,
        holes_dropped: false,
    }
}

/// Triangulate a polygon-with-holes.
///
/// Without holes this is exact ear clipping. With holes, falls back to ear
/// clipping of the outer ring and marks `holes_dropped` with a warning.
pub fn triangulate_polygon_with_holes(poly: &UvPolygon) -> UvTriangulation {
    if poly.holes.is_empty() {
        return ear_clip(&poly.outer);
    }
    warn!(
        holes = poly.holes.len(),
        "constrained triangulation unavailable; holes dropped via outer-ring fallback"
    );
    let mut tri = ear_clip(&poly.outer);
    tri.holes_dropped = true;
    tri
}

/// Weld duplicate vertices in a triangulation (quantized to `EPS_WELD`).
pub fn weld(tri: &UvTriangulation) -> UvTriangulation {
    let mut index: std::collections::BTreeMap<(i64, i64), usize> = std::collections::BTreeMap::new();
    let mut vertices: Vec<Point2> = Vec::new();
    let mut remap: Vec<usize> = Vec::with_capacity(tri.vertices.len());
    for &p in &tri.vertices {
        let key = quantized_key(p);
        let idx = *index.entry(key).or_insert_with(|| {
            vertices.push(p);
            vertices.len() - 1
        });
        remap.push(idx);
    }
    let faces = tri
        .faces
        .iter()
        .map(|&(a, b, c)| (remap[a], remap[b], remap[c]))
        .filter(|&(a, b, c)| a != b && b != c && c != a)
        .collect();
    UvTriangulation {
        vertices,
        faces,
        holes_dropped: tri.holes_dropped,
    }
}

/// Total area covered by a triangulation.
pub fn triangulated_area(tri: &UvTriangulation) -> f64 {
    tri.faces
        .iter()
        .map(|&(a, b, c)| {
            0.5 * tri_area2(tri.vertices[a], tri.vertices[b], tri.vertices[c]).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::signed_area;

    #[test]
    fn test_fan_square() {
        let sq = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        let tri = ear_clip(&sq);
        assert_eq!(tri.faces.len(), 2);
        assert!((triangulated_area(&tri) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_ear_clip_concave() {
        // L-shape, area 3.
        let l = vec![
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ];
        let tri = ear_clip(&l);
        assert_eq!(tri.faces.len(), 4);
        assert!((triangulated_area(&tri) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_holes_fallback_flags_drop() {
        let poly = UvPolygon {
            outer: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)],
            holes: vec![vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 2.0)]],
        };
        let tri = triangulate_polygon_with_holes(&poly);
        assert!(tri.holes_dropped);
        assert!((triangulated_area(&tri) - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_weld_merges_duplicates() {
        let tri = UvTriangulation {
            vertices: vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)],
            faces: vec![(0, 1, 2), (3, 1, 2)],
            holes_dropped: false,
        };
        let welded = weld(&tri);
        assert_eq!(welded.vertices.len(), 3);
        assert_eq!(welded.faces.len(), 2);
    }

    #[test]
    fn test_signed_area_helper_consistency() {
        let sq = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        assert!((signed_area(&sq) - 4.0).abs() < 1e-12);
    }
}
