//! Spatial helpers: snapping, drawing constraints, and picking
//!
//! These back the authoring surface (the GUI shell consumes them); the
//! geometry itself lives in core so it can be tested deterministically.

use glam::DVec3;

use crate::core::tolerance::EPS_POS;
use crate::geometry::polygon::{Point2, Point3};

/// Snap behaviors that may be enabled for a pointer position.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapOptions {
    pub grid: f64,
    pub angle_deg: f64,
    pub enabled: Vec<SnapKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapKind {
    Endpoint,
    Midpoint,
    Segment,
    Intersection,
    Grid,
    Tangent,
    Normal,
}

impl Default for SnapOptions {
    fn default() -> Self {
        Self {
            grid: 0.0,
            angle_deg: 0.0,
            enabled: vec![
                SnapKind::Endpoint,
                SnapKind::Midpoint,
                SnapKind::Segment,
                SnapKind::Intersection,
                SnapKind::Grid,
            ],
        }
    }
}

/// Candidate geometry a snap query searches.
#[derive(Debug, Clone, Default)]
pub struct SnapTargets {
    pub endpoints: Vec<Point2>,
    pub segments: Vec<(Point2, Point2)>,
    pub intersections: Vec<Point2>,
    pub circles: Vec<(Point2, f64)>,
    pub tangent_from: Option<Point2>,
    pub normal_from: Option<Point2>,
    pub origin: Point2,
}

fn dist2(a: Point2, b: Point2) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Snap a point against the targets, preferring the closest hit inside
/// `radius`; applies the optional angle constraint last.
pub fn snap_point(
    point: Point2,
    targets: &SnapTargets,
    options: &SnapOptions,
    radius: f64,
) -> Point2 {
    let mut best = point;
    let mut best_d2 = radius * radius;
    let enabled = |k: SnapKind| options.enabled.contains(&k);

    if enabled(SnapKind::Endpoint) {
        for &e in &targets.endpoints {
            let d2 = dist2(point, e);
            if d2 < best_d2 {
                best = e;
                best_d2 = d2;
            }
        }
    }
    if enabled(SnapKind::Midpoint) {
        for &(a, b) in &targets.segments {
            let m = ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5);
            let d2 = dist2(point, m);
            if d2 < best_d2 {
                best = m;
                best_d2 = d2;
            }
        }
    }
    if enabled(SnapKind::Intersection) {
        for &p in &targets.intersections {
            let d2 = dist2(point, p);
            if d2 < best_d2 {
                best = p;
                best_d2 = d2;
            }
        }
    }
    if enabled(SnapKind::Segment) {
        for &(a, b) in &targets.segments {
            let ab = (b.0 - a.0, b.1 - a.1);
            let ab2 = ab.0 * ab.0 + ab.1 * ab.1;
            if ab2 <= EPS_POS {
                continue;
            }
            let t = (((point.0 - a.0) * ab.0 + (point.1 - a.1) * ab.1) / ab2).clamp(0.0, 1.0);
            let q = (a.0 + ab.0 * t, a.1 + ab.1 * t);
            let d2 = dist2(point, q);
            if d2 < best_d2 {
                best = q;
                best_d2 = d2;
            }
        }
    }
    if enabled(SnapKind::Normal) {
        let reference = targets.normal_from.unwrap_or(point);
        for &(c, r) in &targets.circles {
            let rv = (reference.0 - c.0, reference.1 - c.1);
            let ln = (rv.0 * rv.0 + rv.1 * rv.1).sqrt();
            if ln <= EPS_POS {
                continue;
            }
            let q = (c.0 + rv.0 * r / ln, c.1 + rv.1 * r / ln);
            let d2 = dist2(point, q);
            if d2 < best_d2 {
                best = q;
                best_d2 = d2;
            }
        }
    }
    if enabled(SnapKind::Tangent) {
        if let Some(from) = targets.tangent_from {
            for &(c, r) in &targets.circles {
                let dx = from.0 - c.0;
                let dy = from.1 - c.1;
                let d = (dx * dx + dy * dy).sqrt();
                if d <= r + EPS_POS {
                    continue;
                }
                let a = dy.atan2(dx);
                let b = (r / d).acos();
                for ang in [a + b, a - b] {
                    let q = (c.0 + r * ang.cos(), c.1 + r * ang.sin());
                    let d2 = dist2(point, q);
                    if d2 < best_d2 {
                        best = q;
                        best_d2 = d2;
                    }
                }
            }
        }
    }
    if enabled(SnapKind::Grid) && options.grid > 0.0 {
        let g = options.grid;
        let q = (
            ((point.0 - targets.origin.0) / g).round() * g + targets.origin.0,
            ((point.1 - targets.origin.1) / g).round() * g + targets.origin.1,
        );
        let d2 = dist2(point, q);
        if d2 < best_d2 {
            best = q;
        }
    }

    if options.angle_deg > 0.0 {
        let a = options.angle_deg.to_radians();
        let dx = best.0 - targets.origin.0;
        let dy = best.1 - targets.origin.1;
        let r = (dx * dx + dy * dy).sqrt();
        if r > EPS_POS {
            let ang = (dy.atan2(dx) / a).round() * a;
            best = (
                targets.origin.0 + r * ang.cos(),
                targets.origin.1 + r * ang.sin(),
            );
        }
    }
    best
}

/// Force the segment horizontal or vertical, whichever dominates.
pub fn constrain_orthogonal(start: Point2, current: Point2) -> Point2 {
    let dx = current.0 - start.0;
    let dy = current.1 - start.1;
    if dx.abs() >= dy.abs() {
        (current.0, start.1)
    } else {
        (start.0, current.1)
    }
}

/// Force the segment to a fixed length along its current direction.
pub fn constrain_fixed_length(start: Point2, current: Point2, length: f64) -> Point2 {
    let dx = current.0 - start.0;
    let dy = current.1 - start.1;
    let d = (dx * dx + dy * dy).sqrt();
    if d <= EPS_POS {
        return (start.0 + length, start.1);
    }
    let s = length / d;
    (start.0 + dx * s, start.1 + dy * s)
}

/// Constrain to the reference edge's direction (or its perpendicular).
pub fn constrain_parallel_perpendicular(
    ref_a: Point2,
    ref_b: Point2,
    start: Point2,
    current: Point2,
    perpendicular: bool,
) -> Point2 {
    let vx = ref_b.0 - ref_a.0;
    let vy = ref_b.1 - ref_a.1;
    let ln = (vx * vx + vy * vy).sqrt();
    if ln <= EPS_POS {
        return current;
    }
    let (mut ux, mut uy) = (vx / ln, vy / ln);
    if perpendicular {
        let t = ux;
        ux = -uy;
        uy = t;
    }
    let wx = current.0 - start.0;
    let wy = current.1 - start.1;
    let t = wx * ux + wy * uy;
    (start.0 + t * ux, start.1 + t * uy)
}

/// What a pick query resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    pub kind: PickKind,
    pub id: Option<String>,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickKind {
    Vertex,
    Edge,
    Surface,
    Grid,
    Luminaire,
    None,
}

/// Pickable candidates.
#[derive(Debug, Clone, Default)]
pub struct PickCandidates {
    pub vertices: Vec<(String, Point3)>,
    pub edges: Vec<(String, Point3, Point3)>,
    pub surfaces: Vec<(String, Vec<Point3>)>,
    pub grids: Vec<(String, Point3)>,
    pub luminaires: Vec<(String, Point3)>,
}

fn to_vec3(p: Point3) -> DVec3 {
    DVec3::new(p.0, p.1, p.2)
}

/// Nearest pickable object within `radius` of the click point.
/// Edges use closest-point-on-segment in 3D; surfaces use their centroid.
pub fn pick_nearest(click: Point3, candidates: &PickCandidates, radius: f64) -> PickResult {
    let c = to_vec3(click);
    let mut best = PickResult {
        kind: PickKind::None,
        id: None,
        distance: f64::INFINITY,
    };
    let r2 = radius * radius;
    let mut consider = |kind: PickKind, id: &str, p: DVec3| {
        let dd = (p - c).length_squared();
        if dd < r2 && dd.sqrt() < best.distance {
            best = PickResult {
                kind,
                id: Some(id.to_string()),
                distance: dd.sqrt(),
            };
        }
    };

    for (id, p) in &candidates.vertices {
        consider(PickKind::Vertex, id, to_vec3(*p));
    }
    for (id, p) in &candidates.grids {
        consider(PickKind::Grid, id, to_vec3(*p));
    }
    for (id, p) in &candidates.luminaires {
        consider(PickKind::Luminaire, id, to_vec3(*p));
    }
    for (id, a, b) in &candidates.edges {
        let av = to_vec3(*a);
        let ab = to_vec3(*b) - av;
        let ab2 = ab.length_squared();
        if ab2 <= EPS_POS {
            continue;
        }
        let t = ((c - av).dot(ab) / ab2).clamp(0.0, 1.0);
        consider(PickKind::Edge, id, av + ab * t);
    }
    for (id, verts) in &candidates.surfaces {
        if verts.is_empty() {
            continue;
        }
        let centroid = verts.iter().fold(DVec3::ZERO, |acc, v| acc + to_vec3(*v))
            / verts.len() as f64;
        consider(PickKind::Surface, id, centroid);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_endpoint() {
        let targets = SnapTargets {
            endpoints: vec![(1.0, 1.0)],
            ..Default::default()
        };
        let p = snap_point((1.1, 0.95), &targets, &SnapOptions::default(), 0.25);
        assert_eq!(p, (1.0, 1.0));
    }

    #[test]
    fn test_snap_to_segment_projection() {
        let targets = SnapTargets {
            segments: vec![((0.0, 0.0), (4.0, 0.0))],
            ..Default::default()
        };
        let mut options = SnapOptions::default();
        options.enabled = vec![SnapKind::Segment];
        let p = snap_point((1.5, 0.1), &targets, &options, 0.25);
        assert!((p.0 - 1.5).abs() < 1e-12);
        assert!(p.1.abs() < 1e-12);
    }

    #[test]
    fn test_grid_snap() {
        let targets = SnapTargets::default();
        let options = SnapOptions {
            grid: 0.5,
            ..Default::default()
        };
        let p = snap_point((1.22, 0.74), &targets, &options, 0.25);
        assert_eq!(p, (1.0, 0.5));
    }

    #[test]
    fn test_constrain_orthogonal() {
        assert_eq!(constrain_orthogonal((0.0, 0.0), (3.0, 1.0)), (3.0, 0.0));
        assert_eq!(constrain_orthogonal((0.0, 0.0), (1.0, 3.0)), (0.0, 3.0));
    }

    #[test]
    fn test_constrain_fixed_length() {
        let p = constrain_fixed_length((0.0, 0.0), (3.0, 4.0), 10.0);
        assert!((p.0 - 6.0).abs() < 1e-12);
        assert!((p.1 - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_pick_prefers_nearest() {
        let candidates = PickCandidates {
            vertices: vec![("v1".to_string(), (0.0, 0.0, 0.0))],
            luminaires: vec![("l1".to_string(), (0.05, 0.0, 0.0))],
            ..Default::default()
        };
        let hit = pick_nearest((0.04, 0.0, 0.0), &candidates, 0.5);
        assert_eq!(hit.kind, PickKind::Luminaire);
        assert_eq!(hit.id.as_deref(), Some("l1"));
    }

    #[test]
    fn test_pick_edge_closest_point() {
        let candidates = PickCandidates {
            edges: vec![("e1".to_string(), (0.0, 0.0, 0.0), (10.0, 0.0, 0.0))],
            ..Default::default()
        };
        let hit = pick_nearest((5.0, 0.2, 0.0), &candidates, 0.5);
        assert_eq!(hit.kind, PickKind::Edge);
        assert!((hit.distance - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_pick_none_outside_radius() {
        let candidates = PickCandidates {
            vertices: vec![("v1".to_string(), (9.0, 9.0, 9.0))],
            ..Default::default()
        };
        let hit = pick_nearest((0.0, 0.0, 0.0), &candidates, 0.5);
        assert_eq!(hit.kind, PickKind::None);
        assert!(hit.id.is_none());
    }
}
