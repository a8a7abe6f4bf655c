//! Opening placement in host-wall UV space
//!
//! An opening either carries an authored UV polygon or resolves to a
//! rectangle from its anchor mode. The center is clamped into the legal span;
//! placement only fails when the wall cannot hold the opening at all.

use tracing::warn;

use crate::core::error::{LuxeraError, Result};
use crate::core::tolerance::EPS_PLANE;
use crate::geometry::basis::{project_points_to_uv, WallBasis};
use crate::geometry::polygon::{Point2, Point3};
use crate::param::model::{AnchorMode, OpeningParam};

/// Resolve the opening's center along U per its anchor mode.
fn resolve_center_u(
    opening: &OpeningParam,
    u_min: f64,
    u_max: f64,
    width: f64,
    peers: &[&OpeningParam],
) -> f64 {
    let span = (u_max - u_min).max(0.0);
    let mut uc = u_min + span * opening.anchor;
    match opening.anchor_mode {
        AnchorMode::Anchor => {}
        AnchorMode::FromStartDistance => {
            let d = opening.from_start_distance.unwrap_or(0.0);
            uc = u_min + d + 0.5 * width;
        }
        AnchorMode::FromEndDistance => {
            let d = opening.from_end_distance.unwrap_or(0.0);
            uc = u_max - d - 0.5 * width;
        }
        AnchorMode::CenterAtFraction | AnchorMode::NearestGridlineCenter => {
            let frac = opening.center_at_fraction.unwrap_or(opening.anchor);
            uc = u_min + span * frac;
        }
        AnchorMode::EqualSpacing => {
            // Peers are the same-wall members of the spacing group, or all
            // equal-spacing openings on the wall when no group is set.
            let mut group: Vec<&OpeningParam> = match &opening.spacing_group_id {
                Some(gid) => peers
                    .iter()
                    .copied()
                    .filter(|p| {
                        p.wall_id == opening.wall_id
                            && p.spacing_group_id.as_deref() == Some(gid.as_str())
                    })
                    .collect(),
                None => peers
                    .iter()
                    .copied()
                    .filter(|p| {
                        p.wall_id == opening.wall_id && p.anchor_mode == AnchorMode::EqualSpacing
                    })
                    .collect(),
            };
            group.sort_by(|a, b| a.id.cmp(&b.id));
            if let Some(idx) = group.iter().position(|p| p.id == opening.id) {
                uc = u_min + span * (idx as f64 + 1.0) / (group.len() as f64 + 1.0);
            } else {
                let frac = opening.center_at_fraction.unwrap_or(opening.anchor);
                uc = u_min + span * frac;
            }
        }
    }

    // Gridline snap applies after anchor resolution when requested.
    let wants_snap =
        opening.snap_to_nearest || opening.anchor_mode == AnchorMode::NearestGridlineCenter;
    if wants_snap {
        if let Some(g) = opening.gridline_spacing {
            if g > EPS_PLANE {
                uc = u_min + ((uc - u_min) / g).round() * g;
            }
        }
    }
    uc
}

/// Opening polygon in host-wall UV coordinates.
///
/// `peers` lists openings on the same wall (equal-spacing resolution).
pub fn opening_uv_polygon(
    opening: &OpeningParam,
    wall_vertices: &[Point3],
    basis: &WallBasis,
    peers: &[&OpeningParam],
) -> Result<Vec<Point2>> {
    if opening.width <= 0.0 || opening.height <= 0.0 {
        return Err(LuxeraError::validation(format!(
            "opening {} width/height must be > 0",
            opening.id
        )));
    }
    if !opening.polygon2d.is_empty() {
        // Authored polygon is already in wall UV space.
        return Ok(opening.polygon2d.clone());
    }

    let wall_uv = project_points_to_uv(wall_vertices, basis);
    let u_min = wall_uv.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let u_max = wall_uv
        .iter()
        .map(|p| p.0)
        .fold(f64::NEG_INFINITY, f64::max);
    let v_min = wall_uv.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let v_max = wall_uv
        .iter()
        .map(|p| p.1)
        .fold(f64::NEG_INFINITY, f64::max);

    let width = opening.width;
    let uc_raw = resolve_center_u(opening, u_min, u_max, width, peers);
    let legal_min = u_min + 0.5 * width;
    let legal_max = u_max - 0.5 * width;
    if legal_max < legal_min - EPS_PLANE {
        warn!(
            opening = %opening.id,
            width,
            span = u_max - u_min,
            "opening does not fit host wall after edits"
        );
        return Err(LuxeraError::OpeningDoesNotFit {
            opening_id: opening.id.clone(),
        });
    }
    // Shift/clamp into the legal span is expected behavior.
    let uc = uc_raw.clamp(legal_min, legal_max);

    let ou0 = (uc - 0.5 * width).max(u_min);
    let ou1 = (ou0 + width).min(u_max);
    let ov0 = v_min + opening.sill;
    let ov1 = (ov0 + opening.height).min(v_max - EPS_PLANE);
    if ou1 - ou0 <= EPS_PLANE || ov1 - ov0 <= EPS_PLANE {
        return Err(LuxeraError::OpeningDoesNotFit {
            opening_id: opening.id.clone(),
        });
    }

    Ok(vec![(ou0, ov0), (ou1, ov0), (ou1, ov1), (ou0, ov1)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::basis::wall_basis;
    use crate::param::model::OpeningParam;

    fn wall() -> Vec<Point3> {
        vec![
            (0.0, 0.0, 0.0),
            (4.0, 0.0, 0.0),
            (4.0, 0.0, 3.0),
            (0.0, 0.0, 3.0),
        ]
    }

    fn basis() -> WallBasis {
        wall_basis("w", &wall()).unwrap()
    }

    #[test]
    fn test_anchor_mode_centered() {
        let op = OpeningParam::new("o1", "w1");
        let uv = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap();
        // 1m wide centered on a 4m wall: [1.5, 2.5], sill 0.9, height 1.2.
        assert!((uv[0].0 - 1.5).abs() < 1e-9);
        assert!((uv[1].0 - 2.5).abs() < 1e-9);
        assert!((uv[0].1 - 0.9).abs() < 1e-9);
        assert!((uv[2].1 - 2.1).abs() < 1e-9);
    }

    #[test]
    fn test_from_start_distance() {
        let mut op = OpeningParam::new("o1", "w1");
        op.anchor_mode = AnchorMode::FromStartDistance;
        op.from_start_distance = Some(0.5);
        let uv = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap();
        assert!((uv[0].0 - 0.5).abs() < 1e-9);
        assert!((uv[1].0 - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_end_distance() {
        let mut op = OpeningParam::new("o1", "w1");
        op.anchor_mode = AnchorMode::FromEndDistance;
        op.from_end_distance = Some(0.5);
        let uv = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap();
        assert!((uv[1].0 - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_equal_spacing_three_peers() {
        let mk = |id: &str| {
            let mut o = OpeningParam::new(id, "w1");
            o.anchor_mode = AnchorMode::EqualSpacing;
            o
        };
        let a = mk("a");
        let b = mk("b");
        let c = mk("c");
        let peers = [&a, &b, &c];
        // Centers at span * k/(N+1): 1.0, 2.0, 3.0 on a 4m wall.
        let uv_a = opening_uv_polygon(&a, &wall(), &basis(), &peers).unwrap();
        let uv_b = opening_uv_polygon(&b, &wall(), &basis(), &peers).unwrap();
        let uv_c = opening_uv_polygon(&c, &wall(), &basis(), &peers).unwrap();
        assert!(((uv_a[0].0 + uv_a[1].0) / 2.0 - 1.0).abs() < 1e-9);
        assert!(((uv_b[0].0 + uv_b[1].0) / 2.0 - 2.0).abs() < 1e-9);
        assert!(((uv_c[0].0 + uv_c[1].0) / 2.0 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_gridline_snap() {
        let mut op = OpeningParam::new("o1", "w1");
        op.anchor_mode = AnchorMode::NearestGridlineCenter;
        op.center_at_fraction = Some(0.45); // raw center 1.8
        op.gridline_spacing = Some(0.5);
        let uv = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap();
        let center = (uv[0].0 + uv[1].0) / 2.0;
        assert!((center - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_too_wide_opening_fails() {
        let mut op = OpeningParam::new("o1", "w1");
        op.width = 5.0;
        let err = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap_err();
        assert!(matches!(err, LuxeraError::OpeningDoesNotFit { .. }));
    }

    #[test]
    fn test_clamped_near_edge() {
        let mut op = OpeningParam::new("o1", "w1");
        op.anchor = 0.0; // raw center at u_min, clamped to width/2
        let uv = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap();
        assert!((uv[0].0 - 0.0).abs() < 1e-9);
        assert!((uv[1].0 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_authored_polygon_passthrough() {
        let mut op = OpeningParam::new("o1", "w1");
        op.polygon2d = vec![(0.2, 0.2), (1.0, 0.2), (0.6, 1.4)];
        let uv = opening_uv_polygon(&op, &wall(), &basis(), &[]).unwrap();
        assert_eq!(uv.len(), 3);
        assert_eq!(uv[2], (0.6, 1.4));
    }
}
