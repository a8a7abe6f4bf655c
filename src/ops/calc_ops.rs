//! Calc-object operations: workplanes, grids, planes, point sets, line grids

use serde_json::json;

use crate::calc::builders::sample_line_grid;
use crate::calc::masks::{apply_obstacle_masks, apply_opening_proximity_mask};
use crate::core::error::{LuxeraError, Result};
use crate::geometry::polygon::{point_in_polygon, Point2, Point3};
use crate::ops::facade::{execute_op, OpContext, OpOutput};
use crate::ops::transactions::{TransactionManager, TransactionRecord};
use crate::project::schema::{
    CalcGrid, LineGridSpec, PointSetSpec, Project, SurfaceKind, VerticalPlaneSpec, WorkplaneSpec,
};

type OpResult = Result<(OpOutput, TransactionRecord)>;

/// Create a workplane clipped to a room's footprint.
pub fn create_workplane(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    workplane_id: &str,
    room_id: &str,
    elevation: f64,
) -> OpResult {
    let wid = workplane_id.to_string();
    let rid = room_id.to_string();
    let args = json!({"workplane_id": workplane_id, "room_id": room_id, "elevation": elevation});
    execute_op(
        project,
        txm,
        "create_workplane",
        args,
        ctx,
        |p| {
            if p.workplanes.iter().any(|w| w.id == wid) {
                return Err(LuxeraError::validation(format!("workplane exists: {}", wid)));
            }
            p.room(&rid)
                .map(|_| ())
                .ok_or_else(|| LuxeraError::validation(format!("room not found: {}", rid)))
        },
        |p| {
            let clip = p.room(&rid).map(|r| r.polygon()).unwrap_or_default();
            p.workplanes.push(WorkplaneSpec {
                id: wid.clone(),
                name: String::new(),
                elevation,
                room_id: Some(rid.clone()),
                clip_polygon: clip,
            });
            Ok(OpOutput::value(json!({"workplane_id": wid})))
        },
    )
}

/// Derive a calc grid from a room's footprint (or a zone polygon), with
/// `n = max(2, round(extent/spacing)+1)` per axis and all masks applied.
#[allow(clippy::too_many_arguments)]
pub fn create_calc_grid_from_room(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    grid_id: &str,
    room_id: &str,
    elevation: f64,
    spacing: f64,
    zone_id: Option<&str>,
    mask_near_openings: bool,
    opening_mask_margin: f64,
) -> OpResult {
    let gid = grid_id.to_string();
    let rid = room_id.to_string();
    let zid = zone_id.map(str::to_string);
    let args = json!({
        "grid_id": grid_id, "room_id": room_id, "elevation": elevation,
        "spacing": spacing, "zone_id": zone_id,
    });
    execute_op(
        project,
        txm,
        "create_calc_grid_from_room",
        args,
        ctx,
        |p| {
            if p.grid(&gid).is_some() {
                return Err(LuxeraError::validation(format!("grid exists: {}", gid)));
            }
            if spacing <= 0.0 {
                return Err(LuxeraError::validation("grid spacing must be > 0"));
            }
            let has_room =
                p.room(&rid).is_some() || p.param.rooms.iter().any(|r| r.id == rid);
            if !has_room {
                return Err(LuxeraError::validation(format!("room not found: {}", rid)));
            }
            if let Some(z) = &zid {
                if !p.geometry.zones.iter().any(|zz| &zz.id == z) {
                    return Err(LuxeraError::validation(format!("zone not found: {}", z)));
                }
            }
            Ok(())
        },
        |p| {
            let poly: Vec<Point2> = if let Some(z) = &zid {
                p.geometry
                    .zones
                    .iter()
                    .find(|zz| &zz.id == z)
                    .map(|zz| zz.polygon2d.clone())
                    .unwrap_or_default()
            } else if let Some(room) = p.room(&rid) {
                room.polygon()
            } else {
                p.param
                    .rooms
                    .iter()
                    .find(|r| r.id == rid)
                    .and_then(|pr| {
                        p.param
                            .footprints
                            .iter()
                            .find(|f| f.id == pr.footprint_id)
                    })
                    .map(|f| f.polygon2d.clone())
                    .unwrap_or_default()
            };
            if poly.len() < 3 {
                return Err(LuxeraError::validation("room footprint is degenerate"));
            }
            let x0 = poly.iter().map(|v| v.0).fold(f64::INFINITY, f64::min);
            let x1 = poly.iter().map(|v| v.0).fold(f64::NEG_INFINITY, f64::max);
            let y0 = poly.iter().map(|v| v.1).fold(f64::INFINITY, f64::min);
            let y1 = poly.iter().map(|v| v.1).fold(f64::NEG_INFINITY, f64::max);
            let width = x1 - x0;
            let height = y1 - y0;
            let nx = ((width / spacing).round() as usize + 1).max(2);
            let ny = ((height / spacing).round() as usize + 1).max(2);

            let dx = width / (nx - 1) as f64;
            let dy = height / (ny - 1) as f64;
            let mut pts_xy: Vec<Point2> = Vec::with_capacity(nx * ny);
            for j in 0..ny {
                for i in 0..nx {
                    pts_xy.push((x0 + i as f64 * dx, y0 + j as f64 * dy));
                }
            }
            let mut mask: Vec<bool> =
                pts_xy.iter().map(|pt| point_in_polygon(*pt, &poly)).collect();

            let obstacles: Vec<Vec<Point2>> = p
                .geometry
                .no_go_zones
                .iter()
                .filter(|ng| ng.room_id.is_none() || ng.room_id.as_deref() == Some(rid.as_str()))
                .map(|ng| ng.vertices.clone())
                .filter(|v| v.len() >= 3)
                .collect();
            mask = apply_obstacle_masks(&mask, &pts_xy, &obstacles);

            if mask_near_openings && opening_mask_margin > 0.0 {
                let wall_ids: Vec<String> = p
                    .geometry
                    .surfaces
                    .iter()
                    .filter(|s| {
                        s.kind == SurfaceKind::Wall && s.room_id.as_deref() == Some(rid.as_str())
                    })
                    .map(|s| s.id.clone())
                    .collect();
                let opening_polys: Vec<Vec<Point2>> = p
                    .geometry
                    .openings
                    .iter()
                    .filter(|o| wall_ids.contains(&o.host_surface_id))
                    .map(|o| o.vertices.iter().map(|v| (v.0, v.1)).collect())
                    .collect();
                mask = apply_opening_proximity_mask(
                    &mask,
                    &pts_xy,
                    &opening_polys,
                    opening_mask_margin,
                );
            }

            let sample_points: Vec<Point3> = pts_xy
                .iter()
                .enumerate()
                .filter(|(i, _)| mask[*i])
                .map(|(_, pt)| (pt.0, pt.1, elevation))
                .collect();
            p.grids.push(CalcGrid {
                id: gid.clone(),
                name: String::new(),
                origin: (x0, y0),
                width,
                height,
                elevation,
                nx,
                ny,
                room_id: Some(rid.clone()),
                zone_id: zid.clone(),
                sample_mask: mask,
                sample_points,
                mask_near_openings,
                opening_mask_margin,
            });
            Ok(OpOutput::value(json!({"grid_id": gid, "nx": nx, "ny": ny})))
        },
    )
}

/// Create a vertical calculation plane on a host wall.
pub fn create_vertical_plane(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    plane_id: &str,
    host_surface_id: &str,
    rows: usize,
    cols: usize,
    mask_openings: bool,
) -> OpResult {
    let pid = plane_id.to_string();
    let hid = host_surface_id.to_string();
    let args = json!({
        "plane_id": plane_id, "host_surface_id": host_surface_id,
        "rows": rows, "cols": cols,
    });
    execute_op(
        project,
        txm,
        "create_vertical_plane",
        args,
        ctx,
        |p| {
            if p.vertical_planes.iter().any(|v| v.id == pid) {
                return Err(LuxeraError::validation(format!("plane exists: {}", pid)));
            }
            if rows < 1 || cols < 1 {
                return Err(LuxeraError::validation("rows/cols must be >= 1"));
            }
            p.surface(&hid)
                .map(|_| ())
                .ok_or_else(|| LuxeraError::validation(format!("surface not found: {}", hid)))
        },
        |p| {
            p.vertical_planes.push(VerticalPlaneSpec {
                id: pid.clone(),
                name: String::new(),
                host_surface_id: Some(hid.clone()),
                rows,
                cols,
                subrect: None,
                mask_openings,
            });
            Ok(OpOutput::value(json!({"plane_id": pid})))
        },
    )
}

/// Create a free point set.
pub fn create_point_set(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    point_set_id: &str,
    points: &[Point3],
) -> OpResult {
    let pid = point_set_id.to_string();
    let pts = points.to_vec();
    let args = json!({"point_set_id": point_set_id, "points": points.len()});
    execute_op(
        project,
        txm,
        "create_point_set",
        args,
        ctx,
        |p| {
            if p.point_sets.iter().any(|s| s.id == pid) {
                return Err(LuxeraError::validation(format!("point set exists: {}", pid)));
            }
            if pts.is_empty() {
                return Err(LuxeraError::validation("point set needs at least one point"));
            }
            Ok(())
        },
        |p| {
            p.point_sets.push(PointSetSpec {
                id: pid.clone(),
                name: String::new(),
                points: pts.clone(),
            });
            Ok(OpOutput::value(json!({"point_set_id": pid})))
        },
    )
}

/// Create a polyline line grid.
pub fn create_line_grid(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    line_grid_id: &str,
    polyline: &[Point3],
    spacing: f64,
) -> OpResult {
    let lid = line_grid_id.to_string();
    let line = polyline.to_vec();
    let args = json!({"line_grid_id": line_grid_id, "spacing": spacing});
    execute_op(
        project,
        txm,
        "create_line_grid",
        args,
        ctx,
        |p| {
            if p.line_grids.iter().any(|l| l.id == lid) {
                return Err(LuxeraError::validation(format!("line grid exists: {}", lid)));
            }
            if line.len() < 2 {
                return Err(LuxeraError::validation("line grid needs at least 2 points"));
            }
            if spacing <= 0.0 {
                return Err(LuxeraError::validation("line grid spacing must be > 0"));
            }
            Ok(())
        },
        |p| {
            let samples = sample_line_grid(&line, spacing);
            p.line_grids.push(LineGridSpec {
                id: lid.clone(),
                name: String::new(),
                polyline: line.clone(),
                spacing,
            });
            Ok(OpOutput::value(
                json!({"line_grid_id": lid, "samples": samples.len()}),
            ))
        },
    )
}
