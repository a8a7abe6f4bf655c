//! Incremental rebuild: param → derived surfaces, openings, and grids
//!
//! The rebuild walks the dependency DAG from the edited ids, regenerates the
//! affected rooms in lexicographic order, and emits a stable-ID map so
//! references survive wall splits. All tie-breaks use lexicographic id order,
//! which makes the output byte-identical across runs.

use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::calc::masks::{apply_obstacle_masks, apply_opening_proximity_mask};
use crate::core::error::{LuxeraError, Result};
use crate::geometry::arc::sample_bulge_edge;
use crate::geometry::basis::{lift_uv_to_3d, project_points_to_uv, wall_basis};
use crate::geometry::opening_uv::opening_uv_polygon;
use crate::geometry::polygon::{point_in_polygon, Point2, Point3};
use crate::geometry::subtract::{subtract_openings, SubtractResult, UvPolygon};
use crate::geometry::triangulate::{triangulate_polygon_with_holes, weld};
use crate::param::graph::build_param_graph;
use crate::param::identity::{
    surface_id_for_ceiling, surface_id_for_floor, surface_id_for_shared_wall,
    surface_id_for_wall_side, WallSide,
};
use crate::param::model::{FootprintParam, OpeningKind, OpeningParam, RoomParam, WallParam};
use crate::project::schema::{OpeningSpec, Project, SurfaceKind, SurfaceSpec};
use crate::project::selection::remap_selection_sets;

/// Options for the rebuild pass.
#[derive(Debug, Clone, Copy)]
pub struct RebuildOptions {
    /// Facet length for bulge arcs, clamped to a 0.05 m minimum.
    pub seg_len: f64,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self { seg_len: 0.5 }
    }
}

/// Result of one rebuild pass.
#[derive(Debug, Clone, Default)]
pub struct RebuildResult {
    pub regenerated: BTreeSet<String>,
    pub stable_id_map: BTreeMap<String, Vec<String>>,
    pub attachment_remap: BTreeMap<String, String>,
}

/// Derived surfaces for one room.
#[derive(Debug, Clone)]
pub struct DerivedRoomGeometry {
    pub room_id: String,
    pub floor: SurfaceSpec,
    pub ceiling: SurfaceSpec,
    pub walls: Vec<SurfaceSpec>,
}

impl DerivedRoomGeometry {
    pub fn surfaces(&self) -> Vec<SurfaceSpec> {
        let mut out = vec![self.floor.clone(), self.ceiling.clone()];
        out.extend(self.walls.iter().cloned());
        out
    }
}

fn room_param<'a>(project: &'a Project, room_id: &str) -> Result<&'a RoomParam> {
    project
        .param
        .rooms
        .iter()
        .find(|r| r.id == room_id)
        .ok_or_else(|| LuxeraError::validation(format!("param room not found: {}", room_id)))
}

fn footprint<'a>(project: &'a Project, footprint_id: &str) -> Result<&'a FootprintParam> {
    project
        .param
        .footprints
        .iter()
        .find(|f| f.id == footprint_id)
        .ok_or_else(|| LuxeraError::validation(format!("footprint not found: {}", footprint_id)))
}

/// Footprint outer ring with bulge edges faceted into polyline segments.
fn outer_with_bulges(fp: &FootprintParam, seg_len: f64) -> Vec<Point2> {
    let poly = &fp.polygon2d;
    if poly.len() < 3 {
        return poly.clone();
    }
    let n = poly.len();
    let mut out: Vec<Point2> = Vec::new();
    for i in 0..n {
        let j = (i + 1) % n;
        let seg = sample_bulge_edge(poly[i], poly[j], fp.edge_bulge(i, j), seg_len);
        if out.is_empty() {
            out.extend(seg);
        } else {
            out.extend(seg.into_iter().skip(1));
        }
    }
    // The ring is implicit-closed; the last sampled point duplicates the first.
    if out.len() > 1 {
        let first = out[0];
        let last = *out.last().unwrap();
        if (first.0 - last.0).abs() < 1e-12 && (first.1 - last.1).abs() < 1e-12 {
            out.pop();
        }
    }
    out
}

/// Explicit walls for a room, or synthesized edge walls when none authored.
fn walls_for_room(project: &Project, room_id: &str, n_edges: usize) -> Vec<WallParam> {
    let authored: Vec<WallParam> = project
        .param
        .walls
        .iter()
        .filter(|w| w.room_id == room_id)
        .cloned()
        .collect();
    if !authored.is_empty() {
        return authored;
    }
    (0..n_edges)
        .map(|i| WallParam {
            id: format!("{}:wall:{}", room_id, i),
            room_id: room_id.to_string(),
            edge_ref: (i, (i + 1) % n_edges),
            thickness: 0.2,
            align_mode: Default::default(),
            height: None,
            name: String::new(),
        })
        .collect()
}

fn quad(a: Point2, b: Point2, z0: f64, z1: f64) -> Vec<Point3> {
    vec![
        (a.0, a.1, z0),
        (b.0, b.1, z0),
        (b.0, b.1, z1),
        (a.0, a.1, z1),
    ]
}

fn child_surface(parent: &SurfaceSpec, id: String, vertices: Vec<Point3>) -> SurfaceSpec {
    SurfaceSpec {
        id,
        name: parent.name.clone(),
        kind: parent.kind,
        room_id: parent.room_id.clone(),
        material_id: parent.material_id.clone(),
        vertices,
        layer: parent.layer.clone(),
        tags: parent.tags.clone(),
        two_sided: parent.two_sided,
        wall_room_side_a: parent.wall_room_side_a.clone(),
        wall_room_side_b: parent.wall_room_side_b.clone(),
        wall_material_side_a: parent.wall_material_side_a.clone(),
        wall_material_side_b: parent.wall_material_side_b.clone(),
    }
}

/// Split a wall surface by its openings: one polygon-with-holes triangulates
/// into `<id>:tri<k>` faces; a disjoint multipolygon emits `<id>` (k = 0)
/// then `<id>:part<k>` parts. Openings that do not fit are skipped with a
/// warning.
fn surface_parts_with_openings(
    surface: &SurfaceSpec,
    opening_params: &[&OpeningParam],
) -> Vec<SurfaceSpec> {
    if opening_params.is_empty() {
        return vec![surface.clone()];
    }
    let basis = match wall_basis(&surface.id, &surface.vertices) {
        Ok(b) => b,
        Err(_) => return vec![surface.clone()],
    };
    let wall_uv = project_points_to_uv(&surface.vertices, &basis);
    let (wu0, wu1) = wall_uv
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.0), hi.max(p.0))
        });
    let (wv0, wv1) = wall_uv
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.1), hi.max(p.1))
        });

    let mut op_uvs: Vec<Vec<Point2>> = Vec::new();
    for op in opening_params {
        let uv = match opening_uv_polygon(op, &surface.vertices, &basis, opening_params) {
            Ok(uv) => uv,
            Err(LuxeraError::OpeningDoesNotFit { opening_id }) => {
                warn!(opening = %opening_id, wall = %surface.id, "opening skipped during rebuild");
                continue;
            }
            Err(_) => continue,
        };
        let (u_lo, u_hi) = uv
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.0), hi.max(p.0))
            });
        let (v_lo, v_hi) = uv
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.1), hi.max(p.1))
            });
        if u_hi <= wu0 || u_lo >= wu1 || v_hi <= wv0 || v_lo >= wv1 {
            continue;
        }
        op_uvs.push(uv);
    }
    if op_uvs.is_empty() {
        return vec![surface.clone()];
    }

    let cut = subtract_openings(&UvPolygon::from_outer(wall_uv), &op_uvs);
    let polygons = match &cut {
        SubtractResult::Polygon(p) => vec![p.clone()],
        SubtractResult::MultiPolygon(ps) => ps.clone(),
    };
    if polygons.is_empty() {
        return vec![surface.clone()];
    }

    let mut out = Vec::new();
    let mut k = 0usize;
    for poly in &polygons {
        if !poly.holes.is_empty() {
            let tri = weld(&triangulate_polygon_with_holes(poly));
            for &(a, b, c) in &tri.faces {
                let id = if k == 0 {
                    surface.id.clone()
                } else {
                    format!("{}:tri{}", surface.id, k)
                };
                let verts =
                    lift_uv_to_3d(&[tri.vertices[a], tri.vertices[b], tri.vertices[c]], &basis);
                out.push(child_surface(surface, id, verts));
                k += 1;
            }
            continue;
        }
        let id = if k == 0 {
            surface.id.clone()
        } else {
            format!("{}:part{}", surface.id, k)
        };
        out.push(child_surface(
            surface,
            id,
            lift_uv_to_3d(&poly.outer, &basis),
        ));
        k += 1;
    }
    out
}

/// Regenerate the derived surfaces of one authored wall.
pub fn rebuild_wall(
    wall_id: &str,
    project: &Project,
    opts: &RebuildOptions,
) -> Result<Vec<SurfaceSpec>> {
    let wall = project
        .param
        .walls
        .iter()
        .find(|w| w.id == wall_id)
        .ok_or_else(|| LuxeraError::validation(format!("wall not found: {}", wall_id)))?;
    let room = room_param(project, &wall.room_id)?;
    let fp = footprint(project, &room.footprint_id)?;
    let poly = &fp.polygon2d;
    if poly.len() < 3 {
        return Err(LuxeraError::validation(format!(
            "footprint has fewer than 3 points: {}",
            fp.id
        )));
    }
    let (i0, i1) = wall.edge_ref;
    if i0 >= poly.len() || i1 >= poly.len() {
        return Err(LuxeraError::validation(format!(
            "wall edge_ref out of range for wall {}: ({}, {})",
            wall.id, i0, i1
        )));
    }
    let z0 = room.origin_z;
    let z1 = z0 + wall.height.unwrap_or(room.height);
    let base_id = surface_id_for_wall_side(&wall.id, WallSide::A);
    let faceted = sample_bulge_edge(poly[i0], poly[i1], fp.edge_bulge(i0, i1), opts.seg_len);

    let mut wall_surfaces: Vec<SurfaceSpec> = Vec::new();
    for k in 0..faceted.len() - 1 {
        let id = if k == 0 {
            base_id.clone()
        } else {
            format!("{}:seg{}", base_id, k)
        };
        wall_surfaces.push(SurfaceSpec {
            id,
            name: if wall.name.is_empty() {
                wall.id.clone()
            } else {
                wall.name.clone()
            },
            kind: SurfaceKind::Wall,
            room_id: Some(room.id.clone()),
            vertices: quad(faceted[k], faceted[k + 1], z0, z1),
            ..Default::default()
        });
    }

    let opening_params: Vec<&OpeningParam> = project
        .param
        .openings
        .iter()
        .filter(|o| o.wall_id == wall.id)
        .collect();
    if opening_params.is_empty() {
        return Ok(wall_surfaces);
    }
    let mut out = Vec::new();
    for s in &wall_surfaces {
        out.extend(surface_parts_with_openings(s, &opening_params));
    }
    Ok(out)
}

/// Regenerate a shared wall's surface (single mesh carrying both sides).
pub fn rebuild_shared_wall(
    shared_wall_id: &str,
    project: &Project,
    _opts: &RebuildOptions,
) -> Result<Vec<SurfaceSpec>> {
    let wall = project
        .param
        .shared_walls
        .iter()
        .find(|w| w.id == shared_wall_id)
        .ok_or_else(|| {
            LuxeraError::validation(format!("shared wall not found: {}", shared_wall_id))
        })?;
    let room = room_param(project, &wall.room_a)?;
    let z0 = room.origin_z;
    let z1 = z0 + wall.height.unwrap_or(room.height);
    let (a, b) = wall.edge_geom;
    let surface = SurfaceSpec {
        id: surface_id_for_shared_wall(&wall.id),
        name: if wall.name.is_empty() {
            wall.id.clone()
        } else {
            wall.name.clone()
        },
        kind: SurfaceKind::Wall,
        room_id: None,
        material_id: wall
            .wall_material_side_a
            .clone()
            .or_else(|| wall.wall_material_side_b.clone()),
        vertices: quad(a, b, z0, z1),
        layer: Some("shared_wall".to_string()),
        tags: vec![
            format!("room_a={}", wall.room_a),
            format!("room_b={}", wall.room_b.clone().unwrap_or_default()),
        ],
        two_sided: true,
        wall_room_side_a: Some(wall.room_a.clone()),
        wall_room_side_b: wall.room_b.clone(),
        wall_material_side_a: wall.wall_material_side_a.clone(),
        wall_material_side_b: wall.wall_material_side_b.clone(),
    };
    let opening_params: Vec<&OpeningParam> = project
        .param
        .openings
        .iter()
        .filter(|o| o.wall_id == wall.id)
        .collect();
    Ok(surface_parts_with_openings(&surface, &opening_params))
}

/// Regenerate floor, ceiling, and all walls of a room.
pub fn rebuild_room(
    room_id: &str,
    project: &Project,
    opts: &RebuildOptions,
) -> Result<DerivedRoomGeometry> {
    let room = room_param(project, room_id)?;
    let fp = footprint(project, &room.footprint_id)?;
    let raw_poly = &fp.polygon2d;
    if raw_poly.len() < 3 {
        return Err(LuxeraError::validation(format!(
            "footprint has fewer than 3 points: {}",
            fp.id
        )));
    }
    let poly = outer_with_bulges(fp, opts.seg_len);
    let z0 = room.origin_z;
    let z1 = room.origin_z + room.height;

    let display = if room.name.is_empty() {
        room.id.clone()
    } else {
        room.name.clone()
    };
    let floor = SurfaceSpec {
        id: surface_id_for_floor(&room.id),
        name: format!("{} Floor", display),
        kind: SurfaceKind::Floor,
        room_id: Some(room.id.clone()),
        vertices: poly.iter().map(|&(x, y)| (x, y, z0)).collect(),
        ..Default::default()
    };
    let ceiling = SurfaceSpec {
        id: surface_id_for_ceiling(&room.id),
        name: format!("{} Ceiling", display),
        kind: SurfaceKind::Ceiling,
        room_id: Some(room.id.clone()),
        vertices: poly.iter().rev().map(|&(x, y)| (x, y, z1)).collect(),
        ..Default::default()
    };

    let mut walls: Vec<SurfaceSpec> = Vec::new();
    let mut room_walls = walls_for_room(project, &room.id, raw_poly.len());
    room_walls.sort_by(|a, b| a.id.cmp(&b.id));
    for w in &room_walls {
        let authored = project.param.walls.iter().any(|pw| pw.id == w.id);
        if authored {
            walls.extend(rebuild_wall(&w.id, project, opts)?);
        } else {
            walls.push(SurfaceSpec {
                id: surface_id_for_wall_side(&w.id, WallSide::A),
                name: w.id.clone(),
                kind: SurfaceKind::Wall,
                room_id: Some(room.id.clone()),
                vertices: quad(raw_poly[w.edge_ref.0], raw_poly[w.edge_ref.1], z0, z1),
                ..Default::default()
            });
        }
    }
    let mut shared: Vec<_> = project
        .param
        .shared_walls
        .iter()
        .filter(|w| w.room_a == room_id || w.room_b.as_deref() == Some(room_id))
        .collect();
    shared.sort_by(|a, b| a.id.cmp(&b.id));
    for sw in shared {
        walls.extend(rebuild_shared_wall(&sw.id, project, opts)?);
    }

    Ok(DerivedRoomGeometry {
        room_id: room.id.clone(),
        floor,
        ceiling,
        walls,
    })
}

/// Surface id prefix that hosts an opening (wall side A or shared wall).
fn wall_surface_prefix_for_opening(project: &Project, opening: &OpeningParam) -> Option<String> {
    if project.param.walls.iter().any(|w| w.id == opening.wall_id) {
        return Some(surface_id_for_wall_side(&opening.wall_id, WallSide::A));
    }
    if project
        .param
        .shared_walls
        .iter()
        .any(|w| w.id == opening.wall_id)
    {
        return Some(surface_id_for_shared_wall(&opening.wall_id));
    }
    None
}

/// Build derived opening specs and glazing surfaces for one room.
fn build_param_openings_for_room(
    room_id: &str,
    project: &Project,
    wall_surfaces: &[&SurfaceSpec],
    old_surfaces_by_id: &BTreeMap<String, SurfaceSpec>,
) -> (Vec<OpeningSpec>, Vec<SurfaceSpec>, BTreeSet<String>) {
    let mut room_wall_ids: BTreeSet<&str> = project
        .param
        .walls
        .iter()
        .filter(|w| w.room_id == room_id)
        .map(|w| w.id.as_str())
        .collect();
    room_wall_ids.extend(
        project
            .param
            .shared_walls
            .iter()
            .filter(|w| w.room_a == room_id || w.room_b.as_deref() == Some(room_id))
            .map(|w| w.id.as_str()),
    );
    let mut param_openings: Vec<&OpeningParam> = project
        .param
        .openings
        .iter()
        .filter(|o| room_wall_ids.contains(o.wall_id.as_str()))
        .collect();
    param_openings.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out_openings = Vec::new();
    let mut out_glazing = Vec::new();
    let mut opening_ids = BTreeSet::new();

    for op in &param_openings {
        let Some(prefix) = wall_surface_prefix_for_opening(project, op) else {
            continue;
        };
        let peers: Vec<&OpeningParam> = param_openings
            .iter()
            .copied()
            .filter(|p| p.wall_id == op.wall_id)
            .collect();
        let mut candidates: Vec<&&SurfaceSpec> = wall_surfaces
            .iter()
            .filter(|s| s.id == prefix || s.id.starts_with(&format!("{}:", prefix)))
            .collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let mut placed: Option<(String, Vec<Point3>)> = None;
        for s in candidates {
            let basis = match wall_basis(&s.id, &s.vertices) {
                Ok(b) => b,
                Err(_) => continue,
            };
            match opening_uv_polygon(op, &s.vertices, &basis, &peers) {
                Ok(uv) => {
                    placed = Some((s.id.clone(), lift_uv_to_3d(&uv, &basis)));
                    break;
                }
                Err(_) => continue,
            }
        }
        let Some((host_id, verts)) = placed else {
            continue;
        };
        let kind = match op.kind {
            OpeningKind::Window => "window",
            OpeningKind::Door => "door",
            OpeningKind::Void => "void",
        };
        out_openings.push(OpeningSpec {
            id: op.id.clone(),
            name: op.id.clone(),
            kind: kind.to_string(),
            host_surface_id: host_id,
            vertices: verts.clone(),
            is_daylight_aperture: op.kind == OpeningKind::Window,
            visible_transmittance: op.visible_transmittance,
        });
        opening_ids.insert(op.id.clone());
        if op.kind == OpeningKind::Window {
            let gid = format!("{}:glazing", op.id);
            let material_id = op.glazing_material_id.clone().or_else(|| {
                old_surfaces_by_id
                    .get(&gid)
                    .and_then(|s| s.material_id.clone())
            });
            out_glazing.push(SurfaceSpec {
                id: gid.clone(),
                name: format!("{} Glazing", op.id),
                kind: SurfaceKind::Custom,
                room_id: Some(room_id.to_string()),
                material_id,
                vertices: verts,
                ..Default::default()
            });
        }
    }
    (out_openings, out_glazing, opening_ids)
}

/// Regenerate a room's derived surfaces in the project, preserving materials
/// and rebuilding opening specs plus glazing.
pub fn rebuild_surfaces_for_room(
    room_id: &str,
    project: &mut Project,
    opts: &RebuildOptions,
) -> Result<DerivedRoomGeometry> {
    let derived = rebuild_room(room_id, project, opts)?;
    let mut new_surfaces = derived.surfaces();
    let new_ids: BTreeSet<String> = new_surfaces.iter().map(|s| s.id.clone()).collect();
    let old_by_id: BTreeMap<String, SurfaceSpec> = project
        .geometry
        .surfaces
        .iter()
        .map(|s| (s.id.clone(), s.clone()))
        .collect();

    // Material preservation: exact id, then parent prefix for split children.
    for s in &mut new_surfaces {
        if s.material_id.is_none() {
            if let Some(old) = old_by_id.get(&s.id) {
                s.material_id = old.material_id.clone();
            }
        }
        if s.material_id.is_none() {
            let parent_id = s
                .id
                .split(":part")
                .next()
                .unwrap_or(&s.id)
                .split(":tri")
                .next()
                .unwrap_or(&s.id)
                .to_string();
            if let Some(old) = old_by_id.get(&parent_id) {
                if old.material_id.is_some() {
                    s.material_id = old.material_id.clone();
                }
            }
        }
    }

    let wall_refs: Vec<&SurfaceSpec> = new_surfaces
        .iter()
        .filter(|s| s.kind == SurfaceKind::Wall)
        .collect();
    let (opening_specs, glazing_surfaces, opening_ids) =
        build_param_openings_for_room(room_id, project, &wall_refs, &old_by_id);
    let glazing_ids: BTreeSet<String> = glazing_surfaces.iter().map(|s| s.id.clone()).collect();

    let shared_prefixes: Vec<String> = project
        .param
        .shared_walls
        .iter()
        .filter(|w| w.room_a == room_id || w.room_b.as_deref() == Some(room_id))
        .map(|w| surface_id_for_shared_wall(&w.id))
        .collect();

    let retained: Vec<SurfaceSpec> = project
        .geometry
        .surfaces
        .iter()
        .filter(|s| {
            if new_ids.contains(&s.id) || glazing_ids.contains(&s.id) {
                return false;
            }
            if s.room_id.as_deref() == Some(room_id)
                && matches!(
                    s.kind,
                    SurfaceKind::Wall | SurfaceKind::Floor | SurfaceKind::Ceiling
                )
            {
                return false;
            }
            !shared_prefixes.iter().any(|p| {
                s.id == *p
                    || s.id.starts_with(&format!("{}:part", p))
                    || s.id.starts_with(&format!("{}:tri", p))
            })
        })
        .cloned()
        .collect();

    let mut surfaces = retained;
    surfaces.extend(new_surfaces);
    surfaces.extend(glazing_surfaces);
    project.geometry.surfaces = surfaces;

    if !opening_ids.is_empty() {
        let mut openings: Vec<OpeningSpec> = project
            .geometry
            .openings
            .iter()
            .filter(|o| !opening_ids.contains(&o.id))
            .cloned()
            .collect();
        openings.extend(opening_specs);
        project.geometry.openings = openings;
    }
    Ok(derived)
}

fn grid_xy_points(grid: &crate::project::schema::CalcGrid) -> Vec<Point2> {
    let nx = grid.nx.max(1);
    let ny = grid.ny.max(1);
    let dx = grid.width / (nx.max(2) - 1) as f64;
    let dy = grid.height / (ny.max(2) - 1) as f64;
    let mut out = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            out.push((
                grid.origin.0 + i as f64 * dx,
                grid.origin.1 + j as f64 * dy,
            ));
        }
    }
    out
}

/// Re-clip the grids bound to a room against its current footprint, obstacle
/// polygons, and (optionally) opening proximity.
fn reclip_grids_for_room(project: &mut Project, room_id: &str) -> Vec<String> {
    let base_poly: Vec<Point2> = if let Some(room) = project.room(room_id) {
        room.polygon()
    } else if let Some(pr) = project.param.rooms.iter().find(|r| r.id == room_id) {
        project
            .param
            .footprints
            .iter()
            .find(|f| f.id == pr.footprint_id)
            .map(|f| f.polygon2d.clone())
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    if base_poly.len() < 3 {
        return Vec::new();
    }

    let obstacles: Vec<Vec<Point2>> = project
        .geometry
        .no_go_zones
        .iter()
        .filter(|ng| ng.room_id.is_none() || ng.room_id.as_deref() == Some(room_id))
        .map(|ng| ng.vertices.clone())
        .filter(|p| p.len() >= 3)
        .collect();

    let room_wall_ids: BTreeSet<String> = project
        .geometry
        .surfaces
        .iter()
        .filter(|s| s.kind == SurfaceKind::Wall && s.room_id.as_deref() == Some(room_id))
        .map(|s| s.id.clone())
        .collect();
    let opening_polys: Vec<Vec<Point2>> = project
        .geometry
        .openings
        .iter()
        .filter(|o| room_wall_ids.contains(&o.host_surface_id) && o.vertices.len() >= 2)
        .map(|o| o.vertices.iter().map(|v| (v.0, v.1)).collect())
        .collect();

    let zone_lookup: BTreeMap<String, Vec<Point2>> = project
        .geometry
        .zones
        .iter()
        .map(|z| (z.id.clone(), z.polygon2d.clone()))
        .collect();
    let zone_holes: BTreeMap<String, Vec<Vec<Point2>>> = project
        .param
        .zones
        .iter()
        .map(|z| {
            (
                z.id.clone(),
                z.holes2d
                    .iter()
                    .filter(|h| h.len() >= 3)
                    .cloned()
                    .collect(),
            )
        })
        .collect();

    let mut changed = Vec::new();
    for grid in &mut project.grids {
        if grid.room_id.as_deref() != Some(room_id) {
            continue;
        }
        let mut poly = base_poly.clone();
        let mut holes: Vec<Vec<Point2>> = Vec::new();
        if let Some(zone_id) = &grid.zone_id {
            if let Some(zp) = zone_lookup.get(zone_id) {
                if zp.len() >= 3 {
                    poly = zp.clone();
                }
            }
            if let Some(zh) = zone_holes.get(zone_id) {
                holes = zh.clone();
            }
        }
        let pts_xy = grid_xy_points(grid);
        let mut mask: Vec<bool> = pts_xy.iter().map(|p| point_in_polygon(*p, &poly)).collect();
        for (i, p) in pts_xy.iter().enumerate() {
            if mask[i] && holes.iter().any(|h| point_in_polygon(*p, h)) {
                mask[i] = false;
            }
        }
        mask = apply_obstacle_masks(&mask, &pts_xy, &obstacles);
        if grid.mask_near_openings && grid.opening_mask_margin > 0.0 {
            mask = apply_opening_proximity_mask(
                &mask,
                &pts_xy,
                &opening_polys,
                grid.opening_mask_margin,
            );
        }
        let z = grid.elevation;
        grid.sample_mask = mask.clone();
        grid.sample_points = pts_xy
            .iter()
            .enumerate()
            .filter(|(i, _)| mask[*i])
            .map(|(_, p)| (p.0, p.1, z))
            .collect();
        changed.push(grid.id.clone());
    }
    changed
}

fn bbox_xy(vertices: &[Point3]) -> (f64, f64, f64, f64) {
    let mut b = (
        f64::INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NEG_INFINITY,
    );
    for v in vertices {
        b.0 = b.0.min(v.0);
        b.1 = b.1.min(v.1);
        b.2 = b.2.max(v.0);
        b.3 = b.3.max(v.1);
    }
    b
}

fn bbox_overlap(a: (f64, f64, f64, f64), b: (f64, f64, f64, f64)) -> f64 {
    let ix = (a.2.min(b.2) - a.0.max(b.0)).max(0.0);
    let iy = (a.3.min(b.3) - a.1.max(b.1)).max(0.0);
    ix * iy
}

/// Incremental param rebuild from edited entity ids.
///
/// Returns regenerated ids, a stable old→new id map, and attachment remaps.
pub fn rebuild(
    edited_ids: &[String],
    project: &mut Project,
    opts: &RebuildOptions,
) -> Result<RebuildResult> {
    let graph = build_param_graph(project);
    let affected = graph.affected(edited_ids);

    let mut room_ids: BTreeSet<String> = BTreeSet::new();
    for aid in &affected {
        if let Some(rid) = aid.strip_prefix("room:") {
            room_ids.insert(rid.to_string());
        } else if let Some(wid) = aid.strip_prefix("wall:") {
            if let Some(w) = project.param.walls.iter().find(|x| x.id == wid) {
                room_ids.insert(w.room_id.clone());
            }
        } else if let Some(fid) = aid.strip_prefix("footprint:") {
            for r in &project.param.rooms {
                if r.footprint_id == fid {
                    room_ids.insert(r.id.clone());
                }
            }
        } else if let Some(zid) = aid.strip_prefix("zone:") {
            if let Some(z) = project.param.zones.iter().find(|x| x.id == zid) {
                room_ids.insert(z.room_id.clone());
            }
        }
    }

    // Entities may have been deleted by the edit itself (undo replay);
    // only rooms that still resolve to a footprint can regenerate.
    room_ids.retain(|rid| {
        project
            .param
            .rooms
            .iter()
            .find(|r| &r.id == rid)
            .map(|r| project.param.footprints.iter().any(|f| f.id == r.footprint_id))
            .unwrap_or(false)
    });

    let mut result = RebuildResult::default();

    for room_id in &room_ids {
        let old_room_surfaces: Vec<SurfaceSpec> = project
            .geometry
            .surfaces
            .iter()
            .filter(|s| {
                s.room_id.as_deref() == Some(room_id.as_str())
                    && matches!(
                        s.kind,
                        SurfaceKind::Wall | SurfaceKind::Floor | SurfaceKind::Ceiling
                    )
            })
            .cloned()
            .collect();
        let old_ids: BTreeSet<String> = old_room_surfaces.iter().map(|s| s.id.clone()).collect();

        rebuild_surfaces_for_room(room_id, project, opts)?;

        let new_room_surfaces: Vec<SurfaceSpec> = project
            .geometry
            .surfaces
            .iter()
            .filter(|s| {
                s.room_id.as_deref() == Some(room_id.as_str())
                    && matches!(
                        s.kind,
                        SurfaceKind::Wall | SurfaceKind::Floor | SurfaceKind::Ceiling
                    )
            })
            .cloned()
            .collect();
        let new_ids: BTreeSet<String> = new_room_surfaces.iter().map(|s| s.id.clone()).collect();
        result.regenerated.extend(new_ids.iter().cloned());

        for oid in &old_ids {
            if new_ids.contains(oid) {
                result.stable_id_map.insert(oid.clone(), vec![oid.clone()]);
                continue;
            }
            let children: Vec<String> = new_ids
                .iter()
                .filter(|nid| {
                    nid.starts_with(&format!("{}:part", oid)) || nid.starts_with(&format!("{}:tri", oid))
                })
                .cloned()
                .collect();
            if !children.is_empty() {
                for c in &children {
                    result.attachment_remap.insert(c.clone(), oid.clone());
                }
                result.stable_id_map.insert(oid.clone(), children);
                continue;
            }
            // Overlap fallback: best matching new surface of the same kind
            // by XY bbox overlap; ties break on id.
            let old = old_room_surfaces.iter().find(|s| &s.id == oid);
            if let Some(old) = old {
                let bo = bbox_xy(&old.vertices);
                let mut ranked: Vec<(String, f64)> = new_room_surfaces
                    .iter()
                    .filter(|s| s.kind == old.kind)
                    .map(|s| (s.id.clone(), bbox_overlap(bo, bbox_xy(&s.vertices))))
                    .collect();
                ranked.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });
                if let Some((best_id, overlap)) = ranked.into_iter().next() {
                    if overlap > 0.0 {
                        result
                            .stable_id_map
                            .insert(oid.clone(), vec![best_id.clone()]);
                        result.attachment_remap.insert(best_id, oid.clone());
                        continue;
                    }
                }
            }
            result.stable_id_map.insert(oid.clone(), Vec::new());
        }

        // Remap host references of planes and openings through the map.
        for vp in &mut project.vertical_planes {
            if let Some(hs) = &vp.host_surface_id {
                if let Some(children) = result.stable_id_map.get(hs) {
                    if let Some(first) = children.first() {
                        let first = first.clone();
                        result
                            .attachment_remap
                            .insert(format!("vertical_plane:{}", vp.id), first.clone());
                        vp.host_surface_id = Some(first);
                    }
                }
            }
        }
        for op in &mut project.geometry.openings {
            if let Some(children) = result.stable_id_map.get(&op.host_surface_id) {
                if let Some(first) = children.first() {
                    let first = first.clone();
                    result
                        .attachment_remap
                        .insert(format!("opening:{}", op.id), first.clone());
                    op.host_surface_id = first;
                }
            }
        }

        for gid in reclip_grids_for_room(project, room_id) {
            result.regenerated.insert(format!("grid:{}", gid));
        }
    }

    remap_selection_sets(project, &result.stable_id_map, &result.attachment_remap);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::model::{FootprintParam, RoomParam, WallParam};
    use crate::project::schema::CalcGrid;

    fn seed_project() -> Project {
        let mut p = Project::new("t");
        p.param.footprints.push(FootprintParam {
            id: "f1".to_string(),
            polygon2d: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)],
            ..Default::default()
        });
        p.param.rooms.push(RoomParam {
            id: "r1".to_string(),
            footprint_id: "f1".to_string(),
            height: 3.0,
            wall_thickness: 0.2,
            wall_align_mode: Default::default(),
            name: String::new(),
            origin_z: 0.0,
            polygon2d: Vec::new(),
        });
        for i in 0..4usize {
            p.param.walls.push(WallParam {
                id: format!("w{:02}", i + 1),
                room_id: "r1".to_string(),
                edge_ref: (i, (i + 1) % 4),
                thickness: 0.2,
                align_mode: Default::default(),
                height: None,
                name: String::new(),
            });
        }
        p
    }

    #[test]
    fn test_rebuild_room_produces_six_surfaces() {
        let mut p = seed_project();
        let res = rebuild(
            &["room:r1".to_string()],
            &mut p,
            &RebuildOptions::default(),
        )
        .unwrap();
        // floor + ceiling + 4 walls
        assert_eq!(p.geometry.surfaces.len(), 6);
        assert_eq!(res.regenerated.len(), 6);
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let mut a = seed_project();
        let mut b = seed_project();
        rebuild(&["room:r1".to_string()], &mut a, &RebuildOptions::default()).unwrap();
        rebuild(&["room:r1".to_string()], &mut b, &RebuildOptions::default()).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_opening_splits_wall_and_emits_parts() {
        let mut p = seed_project();
        p.param.openings.push(OpeningParam::new("o1", "w01"));
        rebuild(&["room:r1".to_string()], &mut p, &RebuildOptions::default()).unwrap();
        let base = surface_id_for_wall_side("w01", WallSide::A);
        let parts: Vec<_> = p
            .geometry
            .surfaces
            .iter()
            .filter(|s| s.id == base || s.id.starts_with(&format!("{}:part", base)))
            .collect();
        assert!(parts.len() >= 2, "opening should split the wall");
        // The derived opening spec and glazing exist.
        assert!(p.geometry.openings.iter().any(|o| o.id == "o1"));
        assert!(p.geometry.surfaces.iter().any(|s| s.id == "o1:glazing"));
    }

    #[test]
    fn test_material_preserved_across_footprint_edit() {
        let mut p = seed_project();
        rebuild(&["room:r1".to_string()], &mut p, &RebuildOptions::default()).unwrap();
        let wall_surface_id = surface_id_for_wall_side("w01", WallSide::A);
        for s in &mut p.geometry.surfaces {
            if s.id == wall_surface_id {
                s.material_id = Some("mat_wall".to_string());
            }
        }
        // Move footprint vertex 0.
        p.param.footprints[0].polygon2d[0] = (-1.0, 0.0);
        let res = rebuild(
            &["footprint:f1".to_string()],
            &mut p,
            &RebuildOptions::default(),
        )
        .unwrap();
        let s = p
            .geometry
            .surfaces
            .iter()
            .find(|s| s.id == wall_surface_id)
            .expect("wall surface still present");
        assert_eq!(s.material_id.as_deref(), Some("mat_wall"));
        assert!((s.vertices[0].0 - (-1.0)).abs() < 1e-9);
        assert!(res.stable_id_map.contains_key(&wall_surface_id));
    }

    #[test]
    fn test_grid_reclipped_on_rebuild() {
        let mut p = seed_project();
        p.grids.push(CalcGrid {
            id: "g1".to_string(),
            room_id: Some("r1".to_string()),
            origin: (0.0, 0.0),
            width: 4.0,
            height: 3.0,
            elevation: 0.8,
            nx: 5,
            ny: 4,
            ..Default::default()
        });
        let res = rebuild(&["room:r1".to_string()], &mut p, &RebuildOptions::default()).unwrap();
        assert!(res.regenerated.contains("grid:g1"));
        let g = p.grid("g1").unwrap();
        assert_eq!(g.sample_mask.len(), 20);
        let kept = g.sample_mask.iter().filter(|&&m| m).count();
        assert_eq!(g.sample_points.len(), kept);
    }

    #[test]
    fn test_oversized_opening_skipped_with_wall_intact() {
        let mut p = seed_project();
        let mut op = OpeningParam::new("huge", "w01");
        op.width = 10.0;
        p.param.openings.push(op);
        rebuild(&["room:r1".to_string()], &mut p, &RebuildOptions::default()).unwrap();
        let base = surface_id_for_wall_side("w01", WallSide::A);
        assert!(p.geometry.surfaces.iter().any(|s| s.id == base));
        assert!(!p.geometry.openings.iter().any(|o| o.id == "huge"));
    }
}
