//! Scene-building operations
//!
//! Each operation validates against the pre-state, mutates inside a
//! transaction via the facade, and returns the commit record. Operations on
//! param entities run the incremental rebuild and surface its stable-ID map
//! through the transaction metadata.

use serde_json::{json, Value};

use crate::core::error::{LuxeraError, Result};
use crate::geometry::basis::wall_basis;
use crate::geometry::opening_uv::opening_uv_polygon;
use crate::ops::facade::{execute_op, OpContext, OpOutput};
use crate::ops::transactions::{TransactionManager, TransactionRecord};
use crate::param::identity::{surface_id_for_wall_side, WallSide};
use crate::param::model::{FootprintParam, OpeningParam, RoomParam, WallParam};
use crate::param::rebuild::{rebuild, RebuildOptions};
use crate::project::schema::{
    MaterialSpec, Project, RoomSpec, SurfaceKind, SurfaceSpec,
};
use crate::geometry::polygon::{signed_area, Point2, Point3};

type OpResult = Result<(OpOutput, TransactionRecord)>;

/// Create a simple box room in derived geometry.
pub fn create_room(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    room_id: &str,
    name: &str,
    width: f64,
    length: f64,
    height: f64,
    origin: Point3,
) -> OpResult {
    let id = room_id.to_string();
    let args = json!({
        "room_id": room_id, "name": name,
        "width": width, "length": length, "height": height,
    });
    execute_op(
        project,
        txm,
        "create_room",
        args,
        ctx,
        |p| {
            if p.room(&id).is_some() {
                return Err(LuxeraError::validation(format!("room exists: {}", id)));
            }
            if width <= 0.0 || length <= 0.0 || height <= 0.0 {
                return Err(LuxeraError::validation("room dimensions must be > 0"));
            }
            Ok(())
        },
        |p| {
            p.geometry.rooms.push(RoomSpec {
                id: room_id.to_string(),
                name: name.to_string(),
                width,
                length,
                height,
                origin,
                ..Default::default()
            });
            Ok(OpOutput::value(json!({"room_id": room_id})))
        },
    )
}

/// Create a param footprint + room and derive its surfaces.
pub fn create_room_from_footprint(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    room_id: &str,
    footprint_id: &str,
    polygon: &[Point2],
    height: f64,
) -> OpResult {
    let rid = room_id.to_string();
    let fid = footprint_id.to_string();
    let poly = polygon.to_vec();
    let args = json!({
        "room_id": room_id, "footprint_id": footprint_id,
        "polygon": polygon, "height": height,
    });
    execute_op(
        project,
        txm,
        "create_room_from_footprint",
        args,
        ctx,
        |p| {
            if p.param.rooms.iter().any(|r| r.id == rid) {
                return Err(LuxeraError::validation(format!("param room exists: {}", rid)));
            }
            if poly.len() < 3 {
                return Err(LuxeraError::validation("footprint needs at least 3 points"));
            }
            if signed_area(&poly).abs() < 1e-9 {
                return Err(LuxeraError::validation("footprint polygon is degenerate"));
            }
            if height <= 0.0 {
                return Err(LuxeraError::validation("room height must be > 0"));
            }
            Ok(())
        },
        |p| {
            if !p.param.footprints.iter().any(|f| f.id == fid) {
                p.param.footprints.push(FootprintParam {
                    id: fid.clone(),
                    polygon2d: poly.clone(),
                    ..Default::default()
                });
            }
            p.param.rooms.push(RoomParam {
                id: rid.clone(),
                footprint_id: fid.clone(),
                height,
                wall_thickness: 0.2,
                wall_align_mode: Default::default(),
                name: String::new(),
                origin_z: 0.0,
                polygon2d: Vec::new(),
            });
            let result = rebuild(
                &[format!("room:{}", rid)],
                p,
                &RebuildOptions::default(),
            )?;
            Ok(OpOutput::with_rebuild(json!({"room_id": rid}), result))
        },
    )
}

/// Author one wall param per footprint edge of a room.
pub fn create_walls_from_footprint(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    room_id: &str,
) -> OpResult {
    let rid = room_id.to_string();
    execute_op(
        project,
        txm,
        "create_walls_from_footprint",
        json!({"room_id": room_id}),
        ctx,
        |p| {
            let room = p
                .param
                .rooms
                .iter()
                .find(|r| r.id == rid)
                .ok_or_else(|| LuxeraError::validation(format!("param room not found: {}", rid)))?;
            p.param
                .footprints
                .iter()
                .find(|f| f.id == room.footprint_id)
                .ok_or_else(|| {
                    LuxeraError::validation(format!("footprint not found: {}", room.footprint_id))
                })?;
            Ok(())
        },
        |p| {
            let room = p
                .param
                .rooms
                .iter()
                .find(|r| r.id == rid)
                .ok_or_else(|| LuxeraError::validation(format!("param room not found: {}", rid)))?
                .clone();
            let fp = p
                .param
                .footprints
                .iter()
                .find(|f| f.id == room.footprint_id)
                .ok_or_else(|| {
                    LuxeraError::validation(format!("footprint not found: {}", room.footprint_id))
                })?
                .clone();
            let n = fp.polygon2d.len();
            let mut created: Vec<String> = Vec::new();
            for i in 0..n {
                let wall_id = format!("{}:w{:02}", rid, i + 1);
                if p.param.walls.iter().any(|w| w.id == wall_id) {
                    continue;
                }
                p.param.walls.push(WallParam {
                    id: wall_id.clone(),
                    room_id: rid.clone(),
                    edge_ref: (i, (i + 1) % n),
                    thickness: room.wall_thickness,
                    align_mode: room.wall_align_mode,
                    height: None,
                    name: String::new(),
                });
                created.push(wall_id);
            }
            let result = rebuild(&[format!("room:{}", rid)], p, &RebuildOptions::default())?;
            Ok(OpOutput::with_rebuild(json!({"wall_ids": created}), result))
        },
    )
}

/// Add a free wall surface directly to derived geometry.
pub fn create_wall_polygon(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    surface_id: &str,
    room_id: Option<&str>,
    vertices: &[Point3],
) -> OpResult {
    let sid = surface_id.to_string();
    let verts = vertices.to_vec();
    let args = json!({"surface_id": surface_id, "room_id": room_id, "vertices": vertices});
    execute_op(
        project,
        txm,
        "create_wall_polygon",
        args,
        ctx,
        |p| {
            if p.surface(&sid).is_some() {
                return Err(LuxeraError::validation(format!("surface exists: {}", sid)));
            }
            wall_basis(&sid, &verts).map(|_| ())
        },
        |p| {
            p.geometry.surfaces.push(SurfaceSpec {
                id: sid.clone(),
                kind: SurfaceKind::Wall,
                room_id: room_id.map(str::to_string),
                vertices: verts.clone(),
                ..Default::default()
            });
            Ok(OpOutput::value(json!({"surface_id": sid})))
        },
    )
}

fn opening_args(opening: &OpeningParam) -> Value {
    json!({
        "opening_id": opening.id,
        "wall_id": opening.wall_id,
        "width": opening.width,
        "height": opening.height,
        "sill": opening.sill,
        "anchor_mode": serde_json::to_value(opening.anchor_mode).unwrap_or(Value::Null),
    })
}

fn validate_opening_common(project: &Project, opening: &OpeningParam) -> Result<()> {
    if project.param.openings.iter().any(|o| o.id == opening.id) {
        return Err(LuxeraError::validation(format!(
            "opening exists: {}",
            opening.id
        )));
    }
    let hosted = project.param.walls.iter().any(|w| w.id == opening.wall_id)
        || project
            .param
            .shared_walls
            .iter()
            .any(|w| w.id == opening.wall_id);
    if !hosted {
        return Err(LuxeraError::validation(format!(
            "host wall not found: {}",
            opening.wall_id
        )));
    }
    if opening.width <= 0.0 || opening.height <= 0.0 {
        return Err(LuxeraError::validation("opening width/height must be > 0"));
    }
    Ok(())
}

/// Add an opening param; rebuild warns and skips when it does not fit.
pub fn add_opening(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    opening: OpeningParam,
) -> OpResult {
    let op = opening.clone();
    execute_op(
        project,
        txm,
        "add_opening",
        opening_args(&opening),
        ctx,
        |p| validate_opening_common(p, &op),
        move |p| {
            let wall_id = opening.wall_id.clone();
            let oid = opening.id.clone();
            p.param.openings.push(opening);
            let result = rebuild(
                &[format!("wall:{}", wall_id)],
                p,
                &RebuildOptions::default(),
            )?;
            Ok(OpOutput::with_rebuild(json!({"opening_id": oid}), result))
        },
    )
}

/// Explicit placement: hard-fails with `OpeningDoesNotFit` when the wall
/// cannot hold the opening (unlike `add_opening`, which warns and skips).
pub fn place_opening_on_wall(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    opening: OpeningParam,
) -> OpResult {
    let op_for_validate = opening.clone();
    execute_op(
        project,
        txm,
        "place_opening_on_wall",
        opening_args(&opening),
        ctx,
        |p| {
            validate_opening_common(p, &op_for_validate)?;
            // Check fit against the host wall's derived surface.
            let base_id = surface_id_for_wall_side(&op_for_validate.wall_id, WallSide::A);
            let host = p
                .geometry
                .surfaces
                .iter()
                .find(|s| s.id == base_id || s.id.starts_with(&format!("{}:", base_id)))
                .ok_or_else(|| {
                    LuxeraError::validation(format!(
                        "host wall has no derived surface: {}",
                        op_for_validate.wall_id
                    ))
                })?;
            let basis = wall_basis(&host.id, &host.vertices)?;
            opening_uv_polygon(&op_for_validate, &host.vertices, &basis, &[]).map(|_| ())
        },
        move |p| {
            let wall_id = opening.wall_id.clone();
            let oid = opening.id.clone();
            p.param.openings.push(opening);
            let result = rebuild(
                &[format!("wall:{}", wall_id)],
                p,
                &RebuildOptions::default(),
            )?;
            Ok(OpOutput::with_rebuild(json!({"opening_id": oid}), result))
        },
    )
}

/// Edit wall params and propagate through the dependency closure
/// (openings on the wall, grids of the room, shared adjacency).
pub fn edit_wall_and_propagate_adjacency(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    wall_id: &str,
    thickness: Option<f64>,
    height: Option<Option<f64>>,
) -> OpResult {
    let wid = wall_id.to_string();
    let args = json!({"wall_id": wall_id, "thickness": thickness, "height": height});
    execute_op(
        project,
        txm,
        "edit_wall_and_propagate_adjacency",
        args,
        ctx,
        |p| {
            p.param
                .walls
                .iter()
                .find(|w| w.id == wid)
                .map(|_| ())
                .ok_or_else(|| LuxeraError::validation(format!("wall not found: {}", wid)))
        },
        |p| {
            let wall = p
                .param
                .walls
                .iter_mut()
                .find(|w| w.id == wid)
                .ok_or_else(|| LuxeraError::validation(format!("wall not found: {}", wid)))?;
            if let Some(t) = thickness {
                wall.thickness = t;
            }
            if let Some(h) = height {
                wall.height = h;
            }
            let result = rebuild(&[format!("wall:{}", wid)], p, &RebuildOptions::default())?;
            Ok(OpOutput::with_rebuild(json!({"wall_id": wid}), result))
        },
    )
}

/// Re-derive all surfaces of a param room.
pub fn extrude_room_to_surfaces(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    room_id: &str,
) -> OpResult {
    let rid = room_id.to_string();
    execute_op(
        project,
        txm,
        "extrude_room_to_surfaces",
        json!({"room_id": room_id}),
        ctx,
        |p| {
            p.param
                .rooms
                .iter()
                .find(|r| r.id == rid)
                .map(|_| ())
                .ok_or_else(|| LuxeraError::validation(format!("param room not found: {}", rid)))
        },
        |p| {
            let result = rebuild(&[format!("room:{}", rid)], p, &RebuildOptions::default())?;
            Ok(OpOutput::with_rebuild(json!({"room_id": rid}), result))
        },
    )
}

/// Create the material if absent.
pub fn ensure_material(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    material_id: &str,
    name: &str,
    reflectance: f64,
) -> OpResult {
    let mid = material_id.to_string();
    let args = json!({"material_id": material_id, "name": name, "reflectance": reflectance});
    execute_op(
        project,
        txm,
        "ensure_material",
        args,
        ctx,
        |_| {
            if !(0.0..=1.0).contains(&reflectance) {
                return Err(LuxeraError::validation("reflectance must be in [0, 1]"));
            }
            Ok(())
        },
        |p| {
            if !p.materials.iter().any(|m| m.id == mid) {
                p.materials.push(MaterialSpec {
                    id: mid.clone(),
                    name: name.to_string(),
                    reflectance,
                    transmittance: 0.0,
                });
            }
            Ok(OpOutput::value(json!({"material_id": mid})))
        },
    )
}

/// Assign a material to a set of surfaces.
pub fn assign_material_to_surface_set(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    material_id: &str,
    surface_ids: &[String],
) -> OpResult {
    let mid = material_id.to_string();
    let ids = surface_ids.to_vec();
    let args = json!({"material_id": material_id, "surface_ids": surface_ids});
    execute_op(
        project,
        txm,
        "assign_material_to_surface_set",
        args,
        ctx,
        |p| {
            if !p.materials.iter().any(|m| m.id == mid) {
                return Err(LuxeraError::validation(format!(
                    "material not found: {}",
                    mid
                )));
            }
            for sid in &ids {
                if p.surface(sid).is_none() {
                    return Err(LuxeraError::validation(format!(
                        "surface not found: {}",
                        sid
                    )));
                }
            }
            Ok(())
        },
        |p| {
            let mut assigned = 0usize;
            for s in &mut p.geometry.surfaces {
                if ids.contains(&s.id) {
                    s.material_id = Some(mid.clone());
                    assigned += 1;
                }
            }
            Ok(OpOutput::value(json!({"assigned": assigned})))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Project, TransactionManager, OpContext) {
        (Project::new("t"), TransactionManager::new(), OpContext::default())
    }

    fn square() -> Vec<Point2> {
        vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)]
    }

    #[test]
    fn test_create_room_from_footprint_derives_surfaces() {
        let (mut p, mut txm, ctx) = fixture();
        create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0).unwrap();
        create_walls_from_footprint(&mut p, &mut txm, &ctx, "r1").unwrap();
        // floor + ceiling + 4 walls
        assert_eq!(p.geometry.surfaces.len(), 6);
        assert_eq!(p.param.walls.len(), 4);
        assert_eq!(p.agent_history.len(), 2);
    }

    #[test]
    fn test_duplicate_room_rejected() {
        let (mut p, mut txm, ctx) = fixture();
        create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0).unwrap();
        let err =
            create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0)
                .unwrap_err();
        assert!(matches!(err, LuxeraError::Validation { .. }));
    }

    #[test]
    fn test_add_opening_splits_wall() {
        let (mut p, mut txm, ctx) = fixture();
        create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0).unwrap();
        create_walls_from_footprint(&mut p, &mut txm, &ctx, "r1").unwrap();
        let before = p.geometry.surfaces.len();
        let (out, rec) =
            add_opening(&mut p, &mut txm, &ctx, OpeningParam::new("o1", "r1:w01")).unwrap();
        assert_eq!(out.value["opening_id"], "o1");
        assert!(p.geometry.surfaces.len() > before);
        assert!(!rec.delta.stable_id_map.is_empty());
    }

    #[test]
    fn test_place_opening_hard_fails_when_too_wide() {
        let (mut p, mut txm, ctx) = fixture();
        create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0).unwrap();
        create_walls_from_footprint(&mut p, &mut txm, &ctx, "r1").unwrap();
        let mut opening = OpeningParam::new("giant", "r1:w01");
        opening.width = 50.0;
        let err = place_opening_on_wall(&mut p, &mut txm, &ctx, opening).unwrap_err();
        assert!(matches!(err, LuxeraError::OpeningDoesNotFit { .. }));
        assert!(!p.param.openings.iter().any(|o| o.id == "giant"));
    }

    #[test]
    fn test_assign_material_roundtrip() {
        let (mut p, mut txm, ctx) = fixture();
        create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0).unwrap();
        create_walls_from_footprint(&mut p, &mut txm, &ctx, "r1").unwrap();
        ensure_material(&mut p, &mut txm, &ctx, "mat_wall", "Wall paint", 0.7).unwrap();
        let wall_id = surface_id_for_wall_side("r1:w01", WallSide::A);
        assign_material_to_surface_set(&mut p, &mut txm, &ctx, "mat_wall", &[wall_id.clone()])
            .unwrap();
        assert_eq!(
            p.surface(&wall_id).unwrap().material_id.as_deref(),
            Some("mat_wall")
        );
    }

    #[test]
    fn test_edit_wall_propagates() {
        let (mut p, mut txm, ctx) = fixture();
        create_room_from_footprint(&mut p, &mut txm, &ctx, "r1", "f1", &square(), 3.0).unwrap();
        create_walls_from_footprint(&mut p, &mut txm, &ctx, "r1").unwrap();
        let (_, rec) = edit_wall_and_propagate_adjacency(
            &mut p,
            &mut txm,
            &ctx,
            "r1:w01",
            None,
            Some(Some(2.5)),
        )
        .unwrap();
        assert!(rec
            .delta
            .derived_regen_summary
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            > 0);
        let wall_surface = surface_id_for_wall_side("r1:w01", WallSide::A);
        let s = p.surface(&wall_surface).unwrap();
        let zmax = s.vertices.iter().map(|v| v.2).fold(f64::NEG_INFINITY, f64::max);
        assert!((zmax - 2.5).abs() < 1e-9);
    }
}
