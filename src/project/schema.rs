//! Project state: the aggregate of all authored and derived entities
//!
//! The project owns every entity exclusively. Scene graph nodes and selection
//! sets reference entities by id only. `to_value()` produces the JSON form
//! used for persistence, diffing, and canonical hashing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::identity::content_hash_of;
use crate::geometry::polygon::{Point2, Point3};
use crate::param::model::ParamModel;

/// Current project schema version; `migrate_project` upgrades older files.
pub const SCHEMA_VERSION: u32 = 5;

/// Surface kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    #[default]
    Wall,
    Floor,
    Ceiling,
    Custom,
}

/// A room volume (derived or imported).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoomSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub origin: Point3,
    #[serde(default)]
    pub footprint: Vec<Point2>,
    #[serde(default)]
    pub floor_reflectance: Option<f64>,
    #[serde(default)]
    pub wall_reflectance: Option<f64>,
    #[serde(default)]
    pub ceiling_reflectance: Option<f64>,
    #[serde(default)]
    pub layer_id: Option<String>,
    #[serde(default)]
    pub level_id: Option<String>,
}

impl RoomSpec {
    /// Footprint polygon, falling back to the origin/width/length rectangle.
    pub fn polygon(&self) -> Vec<Point2> {
        if !self.footprint.is_empty() {
            return self.footprint.clone();
        }
        let (x0, y0, _) = self.origin;
        let x1 = x0 + self.width;
        let y1 = y0 + self.length;
        vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
    }
}

/// A planar surface (derived or imported).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SurfaceSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: SurfaceKind,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub material_id: Option<String>,
    pub vertices: Vec<Point3>,
    #[serde(default)]
    pub layer: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub two_sided: bool,
    #[serde(default)]
    pub wall_room_side_a: Option<String>,
    #[serde(default)]
    pub wall_room_side_b: Option<String>,
    #[serde(default)]
    pub wall_material_side_a: Option<String>,
    #[serde(default)]
    pub wall_material_side_b: Option<String>,
}

/// A derived or imported opening hosted on a surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OpeningSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    pub host_surface_id: String,
    pub vertices: Vec<Point3>,
    #[serde(default)]
    pub is_daylight_aperture: bool,
    #[serde(default)]
    pub visible_transmittance: Option<f64>,
}

/// A free-standing obstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ObstructionSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub vertices: Vec<Point3>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub layer: Option<String>,
}

/// A building level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LevelSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub elevation: f64,
}

/// A derived zone (clipping region for grids).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ZoneSpec {
    pub id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub polygon2d: Vec<Point2>,
}

/// A keep-out region that masks grid samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NoGoZoneSpec {
    pub id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    pub vertices: Vec<Point2>,
}

/// All spatial entities of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceSpec>,
    #[serde(default)]
    pub openings: Vec<OpeningSpec>,
    #[serde(default)]
    pub obstructions: Vec<ObstructionSpec>,
    #[serde(default)]
    pub levels: Vec<LevelSpec>,
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
    #[serde(default)]
    pub no_go_zones: Vec<NoGoZoneSpec>,
    #[serde(default = "default_unit")]
    pub length_unit: String,
    #[serde(default)]
    pub source_length_unit: Option<String>,
    #[serde(default = "default_scale")]
    pub scale_to_meters: f64,
    #[serde(default)]
    pub axis_transform_applied: Option<String>,
}

fn default_unit() -> String {
    "m".to_string()
}
fn default_scale() -> f64 {
    1.0
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            rooms: Vec::new(),
            surfaces: Vec::new(),
            openings: Vec::new(),
            obstructions: Vec::new(),
            levels: Vec::new(),
            zones: Vec::new(),
            no_go_zones: Vec::new(),
            length_unit: default_unit(),
            source_length_unit: None,
            scale_to_meters: default_scale(),
            axis_transform_applied: None,
        }
    }
}

/// Reflectance/transmittance material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MaterialSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reflectance: f64,
    #[serde(default)]
    pub transmittance: f64,
}

/// Photometric asset reference (IES/LDT), content-addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PhotometryAsset {
    pub id: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Normalized metadata: manufacturer, catalog, cct, cri, beam, lumens.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl PhotometryAsset {
    /// Rated luminous flux in lumens from normalized metadata.
    pub fn lumens(&self) -> f64 {
        self.metadata
            .get("lumens")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// Luminaire family grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LuminaireFamily {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub asset_id: Option<String>,
}

/// Rotation as Euler ZYX, aim+up, or an explicit 3x3 matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationSpec {
    #[serde(default = "default_rotation_type")]
    pub r#type: String,
    #[serde(default)]
    pub euler_deg: Option<Point3>,
    #[serde(default)]
    pub aim: Option<Point3>,
    #[serde(default)]
    pub up: Option<Point3>,
    #[serde(default)]
    pub matrix: Option<Vec<Vec<f64>>>,
}

fn default_rotation_type() -> String {
    "euler_zyx".to_string()
}

impl Default for RotationSpec {
    fn default() -> Self {
        Self {
            r#type: default_rotation_type(),
            euler_deg: None,
            aim: None,
            up: None,
            matrix: None,
        }
    }
}

/// Position + rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TransformSpec {
    pub position: Point3,
    #[serde(default)]
    pub rotation: RotationSpec,
}

/// A placed luminaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuminaireInstance {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub photometry_asset_id: String,
    pub transform: TransformSpec,
    #[serde(default = "default_factor")]
    pub maintenance_factor: f64,
    #[serde(default = "default_factor")]
    pub flux_multiplier: f64,
    #[serde(default)]
    pub tilt_deg: f64,
    #[serde(default)]
    pub family_id: Option<String>,
}

fn default_factor() -> f64 {
    1.0
}

impl Default for LuminaireInstance {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            photometry_asset_id: String::new(),
            transform: TransformSpec::default(),
            maintenance_factor: default_factor(),
            flux_multiplier: default_factor(),
            tilt_deg: 0.0,
            family_id: None,
        }
    }
}

/// A horizontal calculation grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CalcGrid {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub origin: Point2,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub elevation: f64,
    pub nx: usize,
    pub ny: usize,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    /// Row-major (j outer, i inner) keep mask, length nx*ny.
    #[serde(default)]
    pub sample_mask: Vec<bool>,
    /// Exactly the in-mask samples, in row-major order.
    #[serde(default)]
    pub sample_points: Vec<Point3>,
    #[serde(default)]
    pub mask_near_openings: bool,
    #[serde(default)]
    pub opening_mask_margin: f64,
}

/// A workplane (horizontal plane with clip polygon).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkplaneSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub clip_polygon: Vec<Point2>,
}

/// A vertical rectangle in wall UV space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct VerticalPlaneSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host_surface_id: Option<String>,
    #[serde(default)]
    pub rows: usize,
    #[serde(default)]
    pub cols: usize,
    #[serde(default)]
    pub subrect: Option<(f64, f64, f64, f64)>,
    #[serde(default)]
    pub mask_openings: bool,
}

/// An arbitrary plane given by origin + two axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArbitraryPlaneSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub origin: Point3,
    pub axis_u: Point3,
    pub axis_v: Point3,
    pub width: f64,
    pub height: f64,
    pub rows: usize,
    pub cols: usize,
}

/// A free point set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PointSetSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub points: Vec<Point3>,
}

/// A polyline sampled at fixed spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LineGridSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub polyline: Vec<Point3>,
    pub spacing: f64,
}

/// A roadway definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoadwaySpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lane_count: usize,
    #[serde(default)]
    pub lane_width: f64,
    #[serde(default)]
    pub length: f64,
}

/// A roadway lane grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RoadwayGridSpec {
    pub id: String,
    #[serde(default)]
    pub roadway_id: String,
    #[serde(default)]
    pub lane_index: usize,
    pub nx: usize,
    pub ny: usize,
}

/// An escape route polyline with width and sample spacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRouteSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub polyline: Vec<Point3>,
    #[serde(default = "default_route_width")]
    pub width: f64,
    #[serde(default = "default_route_spacing")]
    pub spacing: f64,
}

fn default_route_width() -> f64 {
    2.0
}
fn default_route_spacing() -> f64 {
    0.5
}

impl Default for EscapeRouteSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            polyline: Vec::new(),
            width: default_route_width(),
            spacing: default_route_spacing(),
        }
    }
}

/// A glare observer view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GlareViewSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub position: Point3,
    pub look_dir: Point3,
    #[serde(default)]
    pub up_dir: Point3,
    #[serde(default)]
    pub fov_deg: f64,
}

/// Compliance thresholds referenced by jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComplianceProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target_lux: f64,
    #[serde(default)]
    pub min_uniformity: f64,
}

/// Display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub order: i64,
}

fn default_true() -> bool {
    true
}

impl Default for LayerSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            visible: true,
            order: 0,
        }
    }
}

/// An authored 2D symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Symbol2DSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub polyline: Vec<Point2>,
}

/// A placed block instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlockInstanceSpec {
    pub id: String,
    #[serde(default)]
    pub symbol_id: String,
    #[serde(default)]
    pub position: Point2,
    #[serde(default)]
    pub rotation_deg: f64,
}

/// A live or explicit selection of object ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectionSetSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub object_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A project variant: diff ops plus luminaire overrides and dimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProjectVariant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub diff_ops: Vec<Value>,
    /// luminaire id -> {flux_multiplier, maintenance_factor, tilt_deg}
    #[serde(default)]
    pub luminaire_overrides: BTreeMap<String, BTreeMap<String, f64>>,
    /// luminaire id -> dimming factor
    #[serde(default)]
    pub dimming_schemes: BTreeMap<String, f64>,
}

/// Job type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    #[default]
    Direct,
    Radiosity,
    Daylight,
    Emergency,
    Roadway,
}

/// A calculation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub daylight: Option<Value>,
    #[serde(default)]
    pub emergency: Option<Value>,
    /// Calc-object ids this job evaluates (grids, planes, point sets, routes).
    #[serde(default)]
    pub target_ids: Vec<String>,
    #[serde(default)]
    pub compliance_profile_id: Option<String>,
}

fn default_backend() -> String {
    "native".to_string()
}

impl Default for JobSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            job_type: JobType::default(),
            backend: default_backend(),
            settings: BTreeMap::new(),
            seed: 0,
            daylight: None,
            emergency: None,
            target_ids: Vec::new(),
            compliance_profile_id: None,
        }
    }
}

/// Reference to an immutable result directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JobResultRef {
    pub job_id: String,
    pub job_hash: String,
    pub result_dir: String,
    #[serde(default)]
    pub summary: BTreeMap<String, Value>,
}

/// The whole project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub geometry: Geometry,
    #[serde(default)]
    pub materials: Vec<MaterialSpec>,
    #[serde(default)]
    pub photometry_assets: Vec<PhotometryAsset>,
    #[serde(default)]
    pub luminaire_families: Vec<LuminaireFamily>,
    #[serde(default)]
    pub luminaires: Vec<LuminaireInstance>,
    #[serde(default)]
    pub grids: Vec<CalcGrid>,
    #[serde(default)]
    pub workplanes: Vec<WorkplaneSpec>,
    #[serde(default)]
    pub vertical_planes: Vec<VerticalPlaneSpec>,
    #[serde(default)]
    pub arbitrary_planes: Vec<ArbitraryPlaneSpec>,
    #[serde(default)]
    pub point_sets: Vec<PointSetSpec>,
    #[serde(default)]
    pub line_grids: Vec<LineGridSpec>,
    #[serde(default)]
    pub roadways: Vec<RoadwaySpec>,
    #[serde(default)]
    pub roadway_grids: Vec<RoadwayGridSpec>,
    #[serde(default)]
    pub escape_routes: Vec<EscapeRouteSpec>,
    #[serde(default)]
    pub glare_views: Vec<GlareViewSpec>,
    #[serde(default)]
    pub compliance_profiles: Vec<ComplianceProfile>,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub symbols_2d: Vec<Symbol2DSpec>,
    #[serde(default)]
    pub block_instances: Vec<BlockInstanceSpec>,
    #[serde(default)]
    pub selection_sets: Vec<SelectionSetSpec>,
    #[serde(default)]
    pub variants: Vec<ProjectVariant>,
    #[serde(default)]
    pub active_variant_id: Option<String>,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub results: Vec<JobResultRef>,
    #[serde(default)]
    pub param: ParamModel,
    #[serde(default)]
    pub agent_history: Vec<Value>,
    /// Directory of the project file on disk; not part of content hashing.
    #[serde(skip)]
    pub root_dir: Option<std::path::PathBuf>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for Project {
    fn default() -> Self {
        Self::new("")
    }
}

impl Project {
    pub fn new(name: &str) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: name.to_string(),
            geometry: Geometry::default(),
            materials: Vec::new(),
            photometry_assets: Vec::new(),
            luminaire_families: Vec::new(),
            luminaires: Vec::new(),
            grids: Vec::new(),
            workplanes: Vec::new(),
            vertical_planes: Vec::new(),
            arbitrary_planes: Vec::new(),
            point_sets: Vec::new(),
            line_grids: Vec::new(),
            roadways: Vec::new(),
            roadway_grids: Vec::new(),
            escape_routes: Vec::new(),
            glare_views: Vec::new(),
            compliance_profiles: Vec::new(),
            layers: Vec::new(),
            symbols_2d: Vec::new(),
            block_instances: Vec::new(),
            selection_sets: Vec::new(),
            variants: Vec::new(),
            active_variant_id: None,
            jobs: Vec::new(),
            results: Vec::new(),
            param: ParamModel::default(),
            agent_history: Vec::new(),
            root_dir: None,
        }
    }

    /// JSON form used for persistence, diffing, and hashing.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("project serialization cannot fail")
    }

    /// Canonical bytes of the full project (sorted keys, rounded floats).
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        crate::core::identity::canonical_bytes(&self.to_value())
    }

    /// Content hash excluding audit history and undo/redo state.
    pub fn content_hash(&self) -> String {
        content_hash_of(&self.to_value())
    }

    pub fn room(&self, id: &str) -> Option<&RoomSpec> {
        self.geometry.rooms.iter().find(|r| r.id == id)
    }

    pub fn surface(&self, id: &str) -> Option<&SurfaceSpec> {
        self.geometry.surfaces.iter().find(|s| s.id == id)
    }

    pub fn job(&self, id: &str) -> Option<&JobSpec> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn asset(&self, id: &str) -> Option<&PhotometryAsset> {
        self.photometry_assets.iter().find(|a| a.id == id)
    }

    pub fn grid(&self, id: &str) -> Option<&CalcGrid> {
        self.grids.iter().find(|g| g.id == id)
    }

    pub fn grid_mut(&mut self, id: &str) -> Option<&mut CalcGrid> {
        self.grids.iter_mut().find(|g| g.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_project_hash_is_stable() {
        let a = Project::new("demo");
        let b = Project::new("demo");
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_hash_ignores_agent_history() {
        let a = Project::new("demo");
        let mut b = Project::new("demo");
        b.agent_history.push(serde_json::json!({"action": "x"}));
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_hash_tracks_geometry() {
        let a = Project::new("demo");
        let mut b = Project::new("demo");
        b.geometry.rooms.push(RoomSpec {
            id: "r1".to_string(),
            width: 4.0,
            length: 3.0,
            height: 3.0,
            ..Default::default()
        });
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_room_polygon_fallback_rectangle() {
        let room = RoomSpec {
            id: "r1".to_string(),
            width: 4.0,
            length: 3.0,
            origin: (1.0, 2.0, 0.0),
            ..Default::default()
        };
        let poly = room.polygon();
        assert_eq!(poly, vec![(1.0, 2.0), (5.0, 2.0), (5.0, 5.0), (1.0, 5.0)]);
    }

    #[test]
    fn test_roundtrip_serde() {
        let mut p = Project::new("demo");
        p.jobs.push(JobSpec {
            id: "j1".to_string(),
            job_type: JobType::Direct,
            seed: 7,
            ..Default::default()
        });
        let v = p.to_value();
        let back: Project = serde_json::from_value(v).unwrap();
        assert_eq!(back.jobs[0].seed, 7);
        assert_eq!(back.content_hash(), p.content_hash());
    }

    #[test]
    fn test_asset_lumens_from_metadata() {
        let mut asset = PhotometryAsset {
            id: "a1".to_string(),
            ..Default::default()
        };
        asset
            .metadata
            .insert("lumens".to_string(), serde_json::json!(3200.0));
        assert_eq!(asset.lumens(), 3200.0);
    }
}
