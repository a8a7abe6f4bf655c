//! Calc-object builders: workplane grids, vertical wall grids, line grids
//!
//! Every builder emits samples in row-major order (j outer, i inner) with a
//! parallel keep-mask, so downstream code can reason about in/out stability.

use glam::DVec3;

use crate::core::error::{LuxeraError, Result};
use crate::geometry::basis::{lift_uv_to_3d, project_points_to_uv, wall_basis};
use crate::geometry::polygon::{point_in_polygon, Point2, Point3};
use crate::project::schema::{OpeningSpec, SurfaceSpec};

/// A sampled rectangular grid on a plane.
#[derive(Debug, Clone, Default)]
pub struct WorkplaneGridGeom {
    pub points_xyz: Vec<Point3>,
    pub mask: Vec<bool>,
    /// Edges between adjacent samples (for visualization).
    pub connectivity: Vec<(usize, usize)>,
    pub rows: usize,
    pub cols: usize,
    pub normal: Point3,
}

/// Build a rows×cols grid over `origin + u*width + v*height`, masked by an
/// optional clip polygon and holes (evaluated in plan XY).
#[allow(clippy::too_many_arguments)]
pub fn build_workplane_grid(
    origin: Point3,
    axis_u: Point3,
    axis_v: Point3,
    width: f64,
    height: f64,
    rows: usize,
    cols: usize,
    clip_polygon: Option<&[Point2]>,
    holes: &[Vec<Point2>],
) -> WorkplaneGridGeom {
    let rows = rows.max(1);
    let cols = cols.max(1);
    let o = DVec3::new(origin.0, origin.1, origin.2);
    let u = DVec3::new(axis_u.0, axis_u.1, axis_u.2);
    let v = DVec3::new(axis_v.0, axis_v.1, axis_v.2);
    let du = width / (cols.max(2) - 1) as f64;
    let dv = height / (rows.max(2) - 1) as f64;

    let mut points = Vec::with_capacity(rows * cols);
    let mut mask = Vec::with_capacity(rows * cols);
    for j in 0..rows {
        for i in 0..cols {
            let p = o + u * (i as f64 * du) + v * (j as f64 * dv);
            let pt = (p.x, p.y, p.z);
            let mut keep = true;
            if let Some(clip) = clip_polygon {
                keep = point_in_polygon((pt.0, pt.1), clip);
                if keep {
                    for h in holes {
                        if point_in_polygon((pt.0, pt.1), h) {
                            keep = false;
                            break;
                        }
                    }
                }
            }
            points.push(pt);
            mask.push(keep);
        }
    }

    let mut connectivity = Vec::new();
    for j in 0..rows {
        for i in 0..cols {
            let idx = j * cols + i;
            if i + 1 < cols {
                connectivity.push((idx, idx + 1));
            }
            if j + 1 < rows {
                connectivity.push((idx, idx + cols));
            }
        }
    }

    let n = u.cross(v);
    let normal = if n.length() <= 1e-12 {
        (0.0, 0.0, 1.0)
    } else {
        let n = n.normalize();
        (n.x, n.y, n.z)
    };

    WorkplaneGridGeom {
        points_xyz: points,
        mask,
        connectivity,
        rows,
        cols,
        normal,
    }
}

/// Keep-mask for UV points against opening polygons.
pub fn mask_points_by_openings(points_uv: &[Point2], opening_uvs: &[Vec<Point2>]) -> Vec<bool> {
    points_uv
        .iter()
        .map(|p| !opening_uvs.iter().any(|poly| point_in_polygon(*p, poly)))
        .collect()
}

/// Build a rectangular grid on a wall surface in its UV extent, optionally
/// clipped to a sub-rectangle, masked by the wall polygon and by openings
/// hosted on the same wall.
pub fn build_vertical_grid_on_wall(
    wall: &SurfaceSpec,
    rows: usize,
    cols: usize,
    openings: &[OpeningSpec],
    subrect: Option<(f64, f64, f64, f64)>,
) -> Result<WorkplaneGridGeom> {
    if wall.vertices.len() < 3 {
        return Err(LuxeraError::validation(
            "vertical grid wall must have at least 3 vertices",
        ));
    }
    let rows = rows.max(1);
    let cols = cols.max(1);
    let basis = wall_basis(&wall.id, &wall.vertices)?;
    let wall_uv = project_points_to_uv(&wall.vertices, &basis);
    let mut u0 = wall_uv.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let mut u1 = wall_uv
        .iter()
        .map(|p| p.0)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut v0 = wall_uv.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let mut v1 = wall_uv
        .iter()
        .map(|p| p.1)
        .fold(f64::NEG_INFINITY, f64::max);
    if let Some((su0, su1, sv0, sv1)) = subrect {
        u0 = u0.max(su0);
        u1 = u1.min(su1);
        v0 = v0.max(sv0);
        v1 = v1.min(sv1);
    }
    if u1 <= u0 || v1 <= v0 {
        return Err(LuxeraError::validation(
            "invalid sub-rectangle bounds for vertical wall grid",
        ));
    }

    let base = lift_uv_to_3d(&[(u0, v0)], &basis)[0];
    let mut grid = build_workplane_grid(
        base,
        (basis.u.x, basis.u.y, basis.u.z),
        (basis.v.x, basis.v.y, basis.v.z),
        u1 - u0,
        v1 - v0,
        rows,
        cols,
        None,
        &[],
    );

    let grid_uv = project_points_to_uv(&grid.points_xyz, &basis);
    let mut mask: Vec<bool> = grid_uv
        .iter()
        .map(|p| point_in_polygon(*p, &wall_uv))
        .collect();

    // Mask out samples inside openings hosted on this wall. Derived openings
    // carry world-space vertices, so project them into this wall's UV.
    let host_ops: Vec<&OpeningSpec> = openings
        .iter()
        .filter(|o| o.host_surface_id == wall.id)
        .collect();
    if !host_ops.is_empty() {
        let opening_uvs: Vec<Vec<Point2>> = host_ops
            .iter()
            .map(|o| project_points_to_uv(&o.vertices, &basis))
            .collect();
        let keep = mask_points_by_openings(&grid_uv, &opening_uvs);
        for (m, k) in mask.iter_mut().zip(keep) {
            *m = *m && k;
        }
    }

    grid.mask = mask;
    grid.normal = (basis.n.x, basis.n.y, basis.n.z);
    Ok(grid)
}

/// Sample a polyline at fixed spacing; the start point is always included.
pub fn sample_line_grid(polyline: &[Point3], spacing: f64) -> Vec<Point3> {
    if polyline.len() < 2 {
        return polyline.to_vec();
    }
    let step = spacing.max(1e-6);
    let mut out = vec![polyline[0]];
    for w in polyline.windows(2) {
        let a = DVec3::new(w[0].0, w[0].1, w[0].2);
        let b = DVec3::new(w[1].0, w[1].1, w[1].2);
        let d = b - a;
        let len = d.length();
        if len <= 1e-12 {
            continue;
        }
        let n = ((len / step).floor() as usize).max(1);
        for j in 1..=n {
            let t = ((j as f64 * step) / len).min(1.0);
            let p = a + d * t;
            out.push((p.x, p.y, p.z));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::SurfaceKind;

    #[test]
    fn test_workplane_grid_row_major() {
        let g = build_workplane_grid(
            (0.0, 0.0, 0.8),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            4.0,
            3.0,
            4,
            5,
            None,
            &[],
        );
        assert_eq!(g.points_xyz.len(), 20);
        assert_eq!(g.mask.len(), 20);
        // Row-major: index 1 advances along U; index `cols` advances along V.
        assert!((g.points_xyz[1].0 - 1.0).abs() < 1e-12);
        assert!((g.points_xyz[5].1 - 1.0).abs() < 1e-12);
        assert_eq!(g.normal, (0.0, 0.0, 1.0));
    }

    #[test]
    fn test_clip_polygon_masks_outside() {
        let clip = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        let g = build_workplane_grid(
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            4.0,
            4.0,
            5,
            5,
            Some(&clip),
            &[],
        );
        let kept = g.mask.iter().filter(|&&m| m).count();
        assert!(kept > 0 && kept < 25);
    }

    #[test]
    fn test_connectivity_count() {
        let g = build_workplane_grid(
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            1.0,
            1.0,
            3,
            3,
            None,
            &[],
        );
        // 3x3 grid: 2 horizontal edges * 3 rows + 2 vertical * 3 cols = 12.
        assert_eq!(g.connectivity.len(), 12);
    }

    #[test]
    fn test_vertical_grid_masks_opening() {
        let wall = SurfaceSpec {
            id: "w".to_string(),
            kind: SurfaceKind::Wall,
            vertices: vec![
                (0.0, 0.0, 0.0),
                (4.0, 0.0, 0.0),
                (4.0, 0.0, 3.0),
                (0.0, 0.0, 3.0),
            ],
            ..Default::default()
        };
        let opening = OpeningSpec {
            id: "o".to_string(),
            host_surface_id: "w".to_string(),
            vertices: vec![
                (1.5, 0.0, 0.9),
                (2.5, 0.0, 0.9),
                (2.5, 0.0, 2.1),
                (1.5, 0.0, 2.1),
            ],
            ..Default::default()
        };
        let with = build_vertical_grid_on_wall(&wall, 6, 8, &[opening], None).unwrap();
        let without = build_vertical_grid_on_wall(&wall, 6, 8, &[], None).unwrap();
        let kept_with = with.mask.iter().filter(|&&m| m).count();
        let kept_without = without.mask.iter().filter(|&&m| m).count();
        assert!(kept_with < kept_without);
    }

    #[test]
    fn test_vertical_grid_bad_subrect() {
        let wall = SurfaceSpec {
            id: "w".to_string(),
            vertices: vec![
                (0.0, 0.0, 0.0),
                (4.0, 0.0, 0.0),
                (4.0, 0.0, 3.0),
                (0.0, 0.0, 3.0),
            ],
            ..Default::default()
        };
        let err =
            build_vertical_grid_on_wall(&wall, 2, 2, &[], Some((3.0, 1.0, 0.0, 1.0))).unwrap_err();
        assert!(matches!(err, LuxeraError::Validation { .. }));
    }

    #[test]
    fn test_line_grid_spacing() {
        let pts = sample_line_grid(&[(0.0, 0.0, 0.0), (2.0, 0.0, 0.0)], 0.5);
        assert_eq!(pts.len(), 5);
        assert!((pts[2].0 - 1.0).abs() < 1e-12);
        assert_eq!(*pts.last().unwrap(), (2.0, 0.0, 0.0));
    }
}
