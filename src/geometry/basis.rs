//! Wall-local UV frames and UV projection
//!
//! The wall basis is right-handed orthonormal: `u` from the first edge,
//! `n = u × secondEdge` normalized, `v = n × u`. Anchor semantics and derived
//! ids depend on this frame staying stable across rebuilds, so the first edge
//! is always preferred as U.

use glam::DVec3;

use crate::core::error::{LuxeraError, Result};
use crate::core::tolerance::EPS_POS;
use crate::geometry::polygon::{Point2, Point3};

/// Wall-local orthonormal frame.
#[derive(Debug, Clone, Copy)]
pub struct WallBasis {
    pub origin: DVec3,
    pub u: DVec3,
    pub v: DVec3,
    pub n: DVec3,
}

fn to_vec3(p: Point3) -> DVec3 {
    DVec3::new(p.0, p.1, p.2)
}

/// Compute the wall frame from a surface's vertex ring.
///
/// Fails with `InvalidWallBasis` if no non-collinear third vertex exists.
pub fn wall_basis(surface_id: &str, vertices: &[Point3]) -> Result<WallBasis> {
    if vertices.len() < 3 {
        return Err(LuxeraError::InvalidWallBasis {
            surface_id: surface_id.to_string(),
        });
    }
    let origin = to_vec3(vertices[0]);
    let first = to_vec3(vertices[1]) - origin;
    let lu = first.length();
    if lu <= EPS_POS {
        return Err(LuxeraError::InvalidWallBasis {
            surface_id: surface_id.to_string(),
        });
    }
    let u = first / lu;

    let mut n = None;
    for vtx in vertices.iter().skip(2) {
        let c = u.cross(to_vec3(*vtx) - origin);
        let ln = c.length();
        if ln > EPS_POS {
            n = Some(c / ln);
            break;
        }
    }
    let n = n.ok_or_else(|| LuxeraError::InvalidWallBasis {
        surface_id: surface_id.to_string(),
    })?;

    let v = n.cross(u);
    if v.length() <= EPS_POS {
        return Err(LuxeraError::InvalidWallBasis {
            surface_id: surface_id.to_string(),
        });
    }
    Ok(WallBasis {
        origin,
        u,
        v: v.normalize(),
        n,
    })
}

/// Project 3D points into the wall's UV plane.
pub fn project_points_to_uv(points: &[Point3], basis: &WallBasis) -> Vec<Point2> {
    points
        .iter()
        .map(|p| {
            let d = to_vec3(*p) - basis.origin;
            (d.dot(basis.u), d.dot(basis.v))
        })
        .collect()
}

/// Lift UV points back onto the wall plane in 3D.
pub fn lift_uv_to_3d(points: &[Point2], basis: &WallBasis) -> Vec<Point3> {
    points
        .iter()
        .map(|&(uu, vv)| {
            let p = basis.origin + basis.u * uu + basis.v * vv;
            (p.x, p.y, p.z)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_quad() -> Vec<Point3> {
        vec![
            (0.0, 0.0, 0.0),
            (4.0, 0.0, 0.0),
            (4.0, 0.0, 3.0),
            (0.0, 0.0, 3.0),
        ]
    }

    #[test]
    fn test_basis_is_right_handed_orthonormal() {
        let b = wall_basis("s", &wall_quad()).unwrap();
        assert!((b.u.length() - 1.0).abs() < 1e-12);
        assert!((b.v.length() - 1.0).abs() < 1e-12);
        assert!(b.u.dot(b.v).abs() < 1e-12);
        let n = b.u.cross(b.v);
        assert!((n - b.n).length() < 1e-9);
    }

    #[test]
    fn test_project_roundtrip() {
        let quad = wall_quad();
        let b = wall_basis("s", &quad).unwrap();
        let uv = project_points_to_uv(&quad, &b);
        assert_eq!(uv[0], (0.0, 0.0));
        assert!((uv[1].0 - 4.0).abs() < 1e-12);
        assert!((uv[2].1 - 3.0).abs() < 1e-12);
        let back = lift_uv_to_3d(&uv, &b);
        for (a, bb) in quad.iter().zip(back.iter()) {
            assert!((a.0 - bb.0).abs() < 1e-9);
            assert!((a.1 - bb.1).abs() < 1e-9);
            assert!((a.2 - bb.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_degenerate_wall_fails() {
        let line = vec![(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 0.0, 0.0)];
        let err = wall_basis("bad", &line).unwrap_err();
        assert!(matches!(err, LuxeraError::InvalidWallBasis { .. }));
    }
}
