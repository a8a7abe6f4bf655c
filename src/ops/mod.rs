//! Transactional operation layer
//!
//! - `transactions`: begin/commit/rollback, grouping, undo/redo
//! - `delta`: typed change sets, inversion, application with rebuild replay
//! - `diff`: per-kind collection diffing over the project JSON
//! - `facade`: the execute harness (approval gate, hash bracket, audit)
//! - `scene_ops` / `calc_ops`: the concrete operation set
//! - `replay`: audit-log verification and scene reconstruction

pub mod calc_ops;
pub mod delta;
pub mod diff;
pub mod facade;
pub mod replay;
pub mod scene_ops;
pub mod transactions;

use serde_json::Value;

use crate::core::error::Result;
use crate::geometry::polygon::{Point2, Point3};
use crate::param::model::OpeningParam;
use crate::project::schema::Project;

pub use delta::{apply_delta, invert, Delta, DeltaItem};
pub use diff::diff_project;
pub use facade::{execute_op, OpContext, OpOutput, OpSource};
pub use transactions::{TransactionManager, TransactionRecord};

/// Closed set of operations with typed args. Dispatch goes through this enum
/// rather than string op names.
#[derive(Debug, Clone)]
pub enum Operation {
    CreateRoom {
        room_id: String,
        name: String,
        width: f64,
        length: f64,
        height: f64,
        origin: Point3,
    },
    CreateRoomFromFootprint {
        room_id: String,
        footprint_id: String,
        polygon: Vec<Point2>,
        height: f64,
    },
    CreateWallsFromFootprint {
        room_id: String,
    },
    CreateWallPolygon {
        surface_id: String,
        room_id: Option<String>,
        vertices: Vec<Point3>,
    },
    AddOpening {
        opening: OpeningParam,
    },
    PlaceOpeningOnWall {
        opening: OpeningParam,
    },
    EditWallAndPropagateAdjacency {
        wall_id: String,
        thickness: Option<f64>,
        height: Option<Option<f64>>,
    },
    ExtrudeRoomToSurfaces {
        room_id: String,
    },
    EnsureMaterial {
        material_id: String,
        name: String,
        reflectance: f64,
    },
    AssignMaterialToSurfaceSet {
        material_id: String,
        surface_ids: Vec<String>,
    },
    CreateWorkplane {
        workplane_id: String,
        room_id: String,
        elevation: f64,
    },
    CreateCalcGridFromRoom {
        grid_id: String,
        room_id: String,
        elevation: f64,
        spacing: f64,
        zone_id: Option<String>,
        mask_near_openings: bool,
        opening_mask_margin: f64,
    },
    CreateVerticalPlane {
        plane_id: String,
        host_surface_id: String,
        rows: usize,
        cols: usize,
        mask_openings: bool,
    },
    CreatePointSet {
        point_set_id: String,
        points: Vec<Point3>,
    },
    CreateLineGrid {
        line_grid_id: String,
        polyline: Vec<Point3>,
        spacing: f64,
    },
}

/// Dispatch one operation to its implementation.
pub fn dispatch(
    project: &mut Project,
    txm: &mut TransactionManager,
    ctx: &OpContext,
    op: Operation,
) -> Result<Value> {
    let (out, _record) = match op {
        Operation::CreateRoom {
            room_id,
            name,
            width,
            length,
            height,
            origin,
        } => scene_ops::create_room(
            project, txm, ctx, &room_id, &name, width, length, height, origin,
        )?,
        Operation::CreateRoomFromFootprint {
            room_id,
            footprint_id,
            polygon,
            height,
        } => scene_ops::create_room_from_footprint(
            project,
            txm,
            ctx,
            &room_id,
            &footprint_id,
            &polygon,
            height,
        )?,
        Operation::CreateWallsFromFootprint { room_id } => {
            scene_ops::create_walls_from_footprint(project, txm, ctx, &room_id)?
        }
        Operation::CreateWallPolygon {
            surface_id,
            room_id,
            vertices,
        } => scene_ops::create_wall_polygon(
            project,
            txm,
            ctx,
            &surface_id,
            room_id.as_deref(),
            &vertices,
        )?,
        Operation::AddOpening { opening } => scene_ops::add_opening(project, txm, ctx, opening)?,
        Operation::PlaceOpeningOnWall { opening } => {
            scene_ops::place_opening_on_wall(project, txm, ctx, opening)?
        }
        Operation::EditWallAndPropagateAdjacency {
            wall_id,
            thickness,
            height,
        } => scene_ops::edit_wall_and_propagate_adjacency(
            project, txm, ctx, &wall_id, thickness, height,
        )?,
        Operation::ExtrudeRoomToSurfaces { room_id } => {
            scene_ops::extrude_room_to_surfaces(project, txm, ctx, &room_id)?
        }
        Operation::EnsureMaterial {
            material_id,
            name,
            reflectance,
        } => scene_ops::ensure_material(project, txm, ctx, &material_id, &name, reflectance)?,
        Operation::AssignMaterialToSurfaceSet {
            material_id,
            surface_ids,
        } => scene_ops::assign_material_to_surface_set(
            project,
            txm,
            ctx,
            &material_id,
            &surface_ids,
        )?,
        Operation::CreateWorkplane {
            workplane_id,
            room_id,
            elevation,
        } => calc_ops::create_workplane(project, txm, ctx, &workplane_id, &room_id, elevation)?,
        Operation::CreateCalcGridFromRoom {
            grid_id,
            room_id,
            elevation,
            spacing,
            zone_id,
            mask_near_openings,
            opening_mask_margin,
        } => calc_ops::create_calc_grid_from_room(
            project,
            txm,
            ctx,
            &grid_id,
            &room_id,
            elevation,
            spacing,
            zone_id.as_deref(),
            mask_near_openings,
            opening_mask_margin,
        )?,
        Operation::CreateVerticalPlane {
            plane_id,
            host_surface_id,
            rows,
            cols,
            mask_openings,
        } => calc_ops::create_vertical_plane(
            project,
            txm,
            ctx,
            &plane_id,
            &host_surface_id,
            rows,
            cols,
            mask_openings,
        )?,
        Operation::CreatePointSet {
            point_set_id,
            points,
        } => calc_ops::create_point_set(project, txm, ctx, &point_set_id, &points)?,
        Operation::CreateLineGrid {
            line_grid_id,
            polyline,
            spacing,
        } => calc_ops::create_line_grid(project, txm, ctx, &line_grid_id, &polyline, spacing)?,
    };
    Ok(out.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_create_room() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        let ctx = OpContext::default();
        let out = dispatch(
            &mut project,
            &mut txm,
            &ctx,
            Operation::CreateRoom {
                room_id: "r1".to_string(),
                name: "Office".to_string(),
                width: 4.0,
                length: 3.0,
                height: 3.0,
                origin: (0.0, 0.0, 0.0),
            },
        )
        .unwrap();
        assert_eq!(out["room_id"], "r1");
        assert!(project.room("r1").is_some());
    }

    #[test]
    fn test_dispatch_chain_room_grid() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        let ctx = OpContext::default();
        dispatch(
            &mut project,
            &mut txm,
            &ctx,
            Operation::CreateRoom {
                room_id: "r1".to_string(),
                name: String::new(),
                width: 6.0,
                length: 8.0,
                height: 3.0,
                origin: (0.0, 0.0, 0.0),
            },
        )
        .unwrap();
        let out = dispatch(
            &mut project,
            &mut txm,
            &ctx,
            Operation::CreateCalcGridFromRoom {
                grid_id: "g1".to_string(),
                room_id: "r1".to_string(),
                elevation: 0.8,
                spacing: 0.5,
                zone_id: None,
                mask_near_openings: false,
                opening_mask_margin: 0.0,
            },
        )
        .unwrap();
        assert_eq!(out["nx"], 13);
        assert_eq!(out["ny"], 17);
    }
}
