//! Circular arcs encoded as edge bulges
//!
//! A bulge is the sagitta ratio of the arc over its chord; 0 means straight.
//! The rebuild samples arc edges into polyline facets.

use crate::core::tolerance::EPS_POS;
use crate::geometry::polygon::Point2;

/// Circular arc between two chord endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl Arc {
    /// Build the arc through `a` and `b` with the given bulge
    /// (`bulge = tan(theta/4)` where theta is the included angle; the
    /// sagitta is `bulge * chord / 2` on the left of a→b for positive bulge).
    pub fn from_bulge(a: Point2, b: Point2, bulge: f64) -> Option<Arc> {
        if bulge.abs() <= EPS_POS {
            return None;
        }
        let chord = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        if chord <= EPS_POS {
            return None;
        }
        let theta = 4.0 * bulge.atan();
        let radius = chord / (2.0 * (theta / 2.0).sin().abs());
        let mid = ((a.0 + b.0) * 0.5, (a.1 + b.1) * 0.5);
        let dir = ((b.0 - a.0) / chord, (b.1 - a.1) / chord);
        let normal = (-dir.1, dir.0);

        // The sagitta point is on the arc; the center lies on the line from
        // it through the chord midpoint, one radius away.
        let sagitta = bulge * chord * 0.5;
        let s_point = (mid.0 + normal.0 * sagitta, mid.1 + normal.1 * sagitta);
        let back = (mid.0 - s_point.0, mid.1 - s_point.1);
        let back_len = (back.0 * back.0 + back.1 * back.1).sqrt().max(EPS_POS);
        let center = (
            s_point.0 + back.0 / back_len * radius,
            s_point.1 + back.1 / back_len * radius,
        );

        let angle_of = |p: Point2| (p.1 - center.1).atan2(p.0 - center.0);
        let start_angle = angle_of(a);
        let raw_end = angle_of(b);
        let mid_angle = angle_of(s_point);
        let tau = std::f64::consts::TAU;
        let ccw = |from: f64, to: f64| (to - from).rem_euclid(tau);
        // Travel in the direction that passes through the sagitta point.
        let end_angle = if ccw(start_angle, mid_angle) <= ccw(start_angle, raw_end) {
            start_angle + ccw(start_angle, raw_end)
        } else {
            start_angle - ccw(raw_end, start_angle)
        };
        Some(Arc {
            center,
            radius,
            start_angle,
            end_angle,
        })
    }

    /// Absolute sweep angle.
    pub fn sweep(&self) -> f64 {
        (self.end_angle - self.start_angle).abs()
    }

    /// Point at parameter `t ∈ [0, 1]` along the arc.
    pub fn point_at(&self, t: f64) -> Point2 {
        let ang = self.start_angle + (self.end_angle - self.start_angle) * t;
        (
            self.center.0 + self.radius * ang.cos(),
            self.center.1 + self.radius * ang.sin(),
        )
    }
}

/// Sample an edge with a bulge into polyline points (endpoints included).
/// Straight edges return the two endpoints.
pub fn sample_bulge_edge(a: Point2, b: Point2, bulge: f64, seg_len: f64) -> Vec<Point2> {
    let arc = match Arc::from_bulge(a, b, bulge) {
        Some(arc) => arc,
        None => return vec![a, b],
    };
    let sweep = arc.sweep().max(1e-9);
    let arc_len = (arc.radius * sweep).abs();
    let step = seg_len.max(0.05);
    let n = ((arc_len / step).ceil() as usize + 1).max(2);
    (0..n)
        .map(|i| arc.point_at(i as f64 / (n - 1) as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_edge_two_points() {
        let pts = sample_bulge_edge((0.0, 0.0), (4.0, 0.0), 0.0, 0.5);
        assert_eq!(pts, vec![(0.0, 0.0), (4.0, 0.0)]);
    }

    #[test]
    fn test_semicircle_bulge_one() {
        // bulge = 1 encodes a half circle: tan(pi/4) = 1.
        let arc = Arc::from_bulge((0.0, 0.0), (2.0, 0.0), 1.0).unwrap();
        assert!((arc.radius - 1.0).abs() < 1e-9);
        assert!((arc.sweep() - std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn test_sampled_endpoints_match_chord() {
        let pts = sample_bulge_edge((0.0, 0.0), (2.0, 0.0), 0.5, 0.25);
        let first = pts.first().unwrap();
        let last = pts.last().unwrap();
        assert!((first.0 - 0.0).abs() < 1e-9 && (first.1 - 0.0).abs() < 1e-9);
        assert!((last.0 - 2.0).abs() < 1e-9 && (last.1 - 0.0).abs() < 1e-9);
        assert!(pts.len() > 2);
    }

    #[test]
    fn test_min_seg_len_clamped() {
        let fine = sample_bulge_edge((0.0, 0.0), (2.0, 0.0), 1.0, 0.0);
        let coarse = sample_bulge_edge((0.0, 0.0), (2.0, 0.0), 1.0, 0.05);
        assert_eq!(fine.len(), coarse.len());
    }
}
