//! Import pipeline: staged, severity-gated geometry intake
//!
//! Stages run in strict order; each yields `{status, details, warnings,
//! errors}` and an erroring stage halts the rest. The PolicyGate classifies
//! repair severity and blocks `extreme` geometry unless `force_extreme` is
//! set.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::error::Result;
use crate::geometry::bvh::Bvh;
use crate::geometry::doctor::{repair_mesh, scene_health_report, SceneHealthReport};
use crate::geometry::polygon::make_polygon_valid;
use crate::import::axis::{
    apply_axis_conversion, describe_axis_conversion, AxisConvention, Handedness, UpAxis,
};
use crate::import::neutral::{
    detect_layer_map, load_neutral_document, normalize_units, resolve_space_boundaries,
    NeutralDocument,
};
use crate::project::schema::Project;
use crate::runner::direct::build_occluder_triangles;
use crate::scene::build::build_scene_graph_from_project;

/// One pipeline stage outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStage {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ImportStage {
    fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: "ok".to_string(),
            details: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn error(name: &str, message: String) -> Self {
        Self {
            name: name.to_string(),
            status: "error".to_string(),
            details: BTreeMap::new(),
            errors: vec![message],
            warnings: Vec::new(),
        }
    }

    fn detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Full pipeline report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportPipelineReport {
    pub source_file: String,
    pub format: String,
    pub stages: Vec<ImportStage>,
    #[serde(default)]
    pub scene_health: Option<SceneHealthReport>,
    #[serde(default)]
    pub layer_map: BTreeMap<String, String>,
}

/// Pipeline output: the normalized geometry (None when blocked) + report.
#[derive(Debug)]
pub struct ImportPipelineResult {
    pub geometry: Option<NeutralDocument>,
    pub report: ImportPipelineReport,
}

/// Repair policy severity and action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairPolicyDecision {
    pub severity: Severity,
    pub action: &'static str,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Low,
    Medium,
    Extreme,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::Extreme => "extreme",
        }
    }
}

/// Import pipeline options.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub layer_overrides: BTreeMap<String, String>,
    pub force_extreme: bool,
    pub target_up_axis: Option<UpAxis>,
    pub target_handedness: Option<Handedness>,
}

const NON_MANIFOLD_EXTREME: usize = 512;
const DEGENERATE_EXTREME: usize = 4096;

/// Classify repair severity from health counts and repair outcomes.
pub fn classify_repair_policy(
    health: &SceneHealthReport,
    repair_errors: &[String],
    repair_warnings: &[String],
    semantic_count: usize,
    triangle_count: usize,
    has_raw_content: bool,
) -> RepairPolicyDecision {
    let counts = &health.counts;
    let mut reasons = Vec::new();

    let severe_errors: Vec<&String> = repair_errors
        .iter()
        .filter(|e| e.as_str() != "No vertices." && e.as_str() != "No triangles.")
        .collect();
    if !severe_errors.is_empty() {
        reasons.push("repair_errors_present".to_string());
    }
    if counts.degenerate_triangles > 0 {
        reasons.push(format!("degenerate_triangles={}", counts.degenerate_triangles));
    }
    if counts.non_manifold_edges > 0 {
        reasons.push(format!("non_manifold_edges={}", counts.non_manifold_edges));
    }
    if counts.self_intersections_approx > 0 {
        reasons.push(format!(
            "self_intersections_approx={}",
            counts.self_intersections_approx
        ));
    }
    if counts.open_boundary_edges > 0 {
        reasons.push(format!("open_boundary_edges={}", counts.open_boundary_edges));
    }
    if counts.disconnected_components > 1 {
        reasons.push(format!(
            "disconnected_components={}",
            counts.disconnected_components
        ));
    }

    if !severe_errors.is_empty()
        || counts.non_manifold_edges > NON_MANIFOLD_EXTREME
        || counts.degenerate_triangles > DEGENERATE_EXTREME
    {
        return RepairPolicyDecision {
            severity: Severity::Extreme,
            action: "block",
            reasons,
        };
    }
    if semantic_count == 0 && triangle_count == 0 && !has_raw_content {
        reasons.push("no_semantic_or_mesh_geometry".to_string());
        return RepairPolicyDecision {
            severity: Severity::Extreme,
            action: "block",
            reasons,
        };
    }
    if counts.non_manifold_edges > 0
        || counts.self_intersections_approx > 0
        || counts.degenerate_triangles > 0
    {
        return RepairPolicyDecision {
            severity: Severity::Medium,
            action: "warn_continue",
            reasons,
        };
    }
    if counts.open_boundary_edges > 0
        || counts.disconnected_components > 1
        || !repair_warnings.is_empty()
    {
        return RepairPolicyDecision {
            severity: Severity::Low,
            action: "auto_repair",
            reasons,
        };
    }
    RepairPolicyDecision {
        severity: Severity::Ok,
        action: "none",
        reasons: Vec::new(),
    }
}

fn project_from_doc(doc: &NeutralDocument, name: &str) -> Project {
    let mut project = Project::new(name);
    project.geometry.rooms = doc.rooms.clone();
    project.geometry.surfaces = doc.surfaces.clone();
    project.geometry.openings = doc.openings.clone();
    project.geometry.obstructions = doc.obstructions.clone();
    project.geometry.levels = doc.levels.clone();
    project.geometry.length_unit = doc.length_unit.clone();
    project.geometry.source_length_unit = Some(doc.length_unit.clone());
    project.geometry.scale_to_meters = doc.scale_to_meters;
    project
}

fn reorient_doc(doc: &mut NeutralDocument, matrix: &glam::DMat4) {
    for surface in &mut doc.surfaces {
        surface.vertices = apply_axis_conversion(&surface.vertices, matrix);
    }
    for opening in &mut doc.openings {
        opening.vertices = apply_axis_conversion(&opening.vertices, matrix);
    }
    for obstruction in &mut doc.obstructions {
        obstruction.vertices = apply_axis_conversion(&obstruction.vertices, matrix);
    }
    for room in &mut doc.rooms {
        let (x0, y0, z0) = room.origin;
        let corners = apply_axis_conversion(
            &[
                (x0, y0, z0),
                (x0 + room.width, y0 + room.length, z0 + room.height),
            ],
            matrix,
        );
        let (ax, ay, az) = corners[0];
        let (bx, by, bz) = corners[1];
        room.origin = (ax.min(bx), ay.min(by), az.min(bz));
        room.width = (bx - ax).abs();
        room.length = (by - ay).abs();
        room.height = (bz - az).abs();
        room.footprint = room
            .footprint
            .iter()
            .map(|&(x, y)| {
                let p = apply_axis_conversion(&[(x, y, 0.0)], matrix)[0];
                (p.0, p.1)
            })
            .collect();
    }
}

fn source_convention(doc: &NeutralDocument) -> AxisConvention {
    AxisConvention {
        up_axis: if doc.source_up_axis.eq_ignore_ascii_case("Y_UP") {
            UpAxis::YUp
        } else {
            UpAxis::ZUp
        },
        handedness: if doc.source_handedness.eq_ignore_ascii_case("LEFT_HANDED") {
            Handedness::LeftHanded
        } else {
            Handedness::RightHanded
        },
    }
}

/// Run the full import pipeline over a neutral-document JSON file.
pub fn run_import_pipeline(path: &Path, options: &ImportOptions) -> Result<ImportPipelineResult> {
    let mut stages: Vec<ImportStage> = Vec::new();
    let mut report = ImportPipelineReport {
        source_file: path.to_string_lossy().into_owned(),
        ..Default::default()
    };

    // RawImport: parse into the neutral container, detect layer semantics.
    let mut doc = match load_neutral_document(path) {
        Ok(doc) => doc,
        Err(err) => {
            stages.push(ImportStage::error("RawImport", err.to_string()));
            report.stages = stages;
            return Ok(ImportPipelineResult {
                geometry: None,
                report,
            });
        }
    };
    report.format = doc.format.clone();
    let mut layer_map = detect_layer_map(&doc.layers);
    for (k, v) in &options.layer_overrides {
        layer_map.insert(k.to_uppercase(), v.clone());
    }
    report.layer_map = layer_map.clone();
    stages.push(
        ImportStage::ok("RawImport")
            .detail("path", json!(report.source_file))
            .detail("format", json!(doc.format))
            .detail(
                "layers",
                json!(layer_map.keys().cloned().collect::<Vec<_>>()),
            )
            .detail("block_instances", json!(doc.block_instance_count))
            .detail("units", json!(doc.length_unit)),
    );

    // NormalizedGeometry: unit scale + source-axis -> canonical rotation.
    let source = source_convention(&doc);
    let to_canonical = describe_axis_conversion(source, AxisConvention::default());
    let source_unit = doc.length_unit.clone();
    let source_scale = doc.scale_to_meters;
    normalize_units(&mut doc);
    if !to_canonical.is_identity() {
        reorient_doc(&mut doc, &to_canonical.matrix);
    }
    stages.push(
        ImportStage::ok("NormalizedGeometry")
            .detail("length_unit", json!(doc.length_unit))
            .detail("source_length_unit", json!(source_unit))
            .detail("scale_to_meters", json!(source_scale))
            .detail(
                "axis_transform_applied",
                json!(to_canonical.axis_transform_applied),
            )
            .detail(
                "axis_matrix",
                json!(to_canonical
                    .matrix
                    .to_cols_array_2d()
                    .iter()
                    .map(|c| c.to_vec())
                    .collect::<Vec<_>>()),
            ),
    );

    // SemanticExtraction: counts + space-boundary resolution.
    resolve_space_boundaries(&mut doc);
    let semantic_count =
        doc.rooms.len() + doc.surfaces.len() + doc.openings.len() + doc.obstructions.len();
    stages.push(
        ImportStage::ok("SemanticExtraction")
            .detail("rooms", json!(doc.rooms.len()))
            .detail("surfaces", json!(doc.surfaces.len()))
            .detail("openings", json!(doc.openings.len()))
            .detail("levels", json!(doc.levels.len()))
            .detail("obstructions", json!(doc.obstructions.len())),
    );

    // Repair2D: fix room footprints.
    let mut poly_warnings = Vec::new();
    for room in &mut doc.rooms {
        if room.footprint.len() >= 3 {
            let fixed = make_polygon_valid(&room.footprint);
            if fixed != room.footprint {
                poly_warnings.push(format!("room:{} footprint repaired", room.id));
            }
            room.footprint = fixed;
        }
    }
    let mut repair2d = ImportStage::ok("Repair2D");
    repair2d.warnings = poly_warnings;
    stages.push(repair2d);

    // RepairHeal: triangle diagnostics + repair over all occluders.
    let probe = project_from_doc(&doc, "import_probe");
    let tris = build_occluder_triangles(&probe);
    let health = scene_health_report(&tris);
    let repaired = repair_mesh(&tris);
    let mut heal = ImportStage::ok("RepairHeal")
        .detail("triangles_before", json!(tris.len()))
        .detail("triangles_after", json!(repaired.triangles.len()));
    heal.warnings = repaired.warnings.clone();
    heal.errors = repaired.errors.clone();
    stages.push(heal);
    report.scene_health = Some(health.clone());

    // PolicyGate: severity classification.
    let has_raw_content = !layer_map.is_empty() || doc.block_instance_count > 0;
    let decision = classify_repair_policy(
        &health,
        &repaired.errors,
        &repaired.warnings,
        semantic_count,
        tris.len(),
        has_raw_content,
    );
    let mut gate = ImportStage::ok("PolicyGate")
        .detail("severity", json!(decision.severity.as_str()))
        .detail("action", json!(decision.action))
        .detail("reasons", json!(decision.reasons));
    match decision.severity {
        Severity::Low => gate
            .warnings
            .push("Low-severity defects auto-repaired.".to_string()),
        Severity::Medium => gate
            .warnings
            .push("Medium-severity defects detected; import continued with warnings.".to_string()),
        Severity::Extreme => {
            if options.force_extreme {
                gate.warnings
                    .push("Extreme defects detected; import forced to continue.".to_string());
            } else {
                gate.status = "error".to_string();
                gate.errors.push(
                    "Extreme geometry defects detected; import blocked unless force_extreme."
                        .to_string(),
                );
            }
        }
        Severity::Ok => {}
    }
    let blocked = gate.status == "error";
    stages.push(gate);
    if blocked {
        report.stages = stages;
        return Ok(ImportPipelineResult {
            geometry: None,
            report,
        });
    }

    // PostAxisReorient: optional second transformation to a target frame.
    let target = AxisConvention {
        up_axis: options.target_up_axis.unwrap_or_default(),
        handedness: options.target_handedness.unwrap_or_default(),
    };
    let post = describe_axis_conversion(AxisConvention::default(), target);
    if !post.is_identity() {
        reorient_doc(&mut doc, &post.matrix);
        let mut stage = ImportStage::ok("PostAxisReorient")
            .detail("post_axis_transform_applied", json!(post.axis_transform_applied));
        stage
            .warnings
            .push("Geometry reoriented for target convention.".to_string());
        stages.push(stage);
    }

    // SceneBuild: scene graph + BVH over the imported occluders.
    let scene_project = project_from_doc(&doc, "import_scene");
    let graph = build_scene_graph_from_project(&scene_project);
    let bvh = Bvh::build(build_occluder_triangles(&scene_project));
    stages.push(
        ImportStage::ok("SceneBuild")
            .detail("scene_nodes", json!(graph.node_count()))
            .detail("rooms", json!(graph.rooms.len()))
            .detail("bvh_triangles", json!(bvh.triangle_count())),
    );

    report.stages = stages;
    Ok(ImportPipelineResult {
        geometry: Some(doc),
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::{RoomSpec, SurfaceSpec};
    use std::fs;

    fn write_doc(dir: &Path, doc: &NeutralDocument) -> std::path::PathBuf {
        let path = dir.join("import.json");
        fs::write(&path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
        path
    }

    fn doc_with_room() -> NeutralDocument {
        let mut doc = NeutralDocument {
            format: "IFC".to_string(),
            layers: vec!["A-WALL".to_string()],
            ..Default::default()
        };
        doc.rooms.push(RoomSpec {
            id: "r1".to_string(),
            width: 4.0,
            length: 3.0,
            height: 3.0,
            ..Default::default()
        });
        doc.surfaces.push(SurfaceSpec {
            id: "s1".to_string(),
            vertices: vec![
                (0.0, 0.0, 0.0),
                (4.0, 0.0, 0.0),
                (4.0, 0.0, 3.0),
                (0.0, 0.0, 3.0),
            ],
            ..Default::default()
        });
        doc
    }

    #[test]
    fn test_pipeline_happy_path_stage_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), &doc_with_room());
        let result = run_import_pipeline(&path, &ImportOptions::default()).unwrap();
        assert!(result.geometry.is_some());
        let names: Vec<&str> = result.report.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "RawImport",
                "NormalizedGeometry",
                "SemanticExtraction",
                "Repair2D",
                "RepairHeal",
                "PolicyGate",
                "SceneBuild",
            ]
        );
        assert!(result.report.stages.iter().all(|s| s.status != "error"));
    }

    #[test]
    fn test_empty_source_blocked_as_extreme() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), &NeutralDocument::default());
        let result = run_import_pipeline(&path, &ImportOptions::default()).unwrap();
        assert!(result.geometry.is_none());
        let gate = result
            .report
            .stages
            .iter()
            .find(|s| s.name == "PolicyGate")
            .unwrap();
        assert_eq!(gate.status, "error");
        assert_eq!(gate.details["severity"], "extreme");
        // Pipeline halts: no SceneBuild stage after the gate error.
        assert!(!result.report.stages.iter().any(|s| s.name == "SceneBuild"));
    }

    #[test]
    fn test_force_extreme_continues() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), &NeutralDocument::default());
        let options = ImportOptions {
            force_extreme: true,
            ..Default::default()
        };
        let result = run_import_pipeline(&path, &options).unwrap();
        assert!(result.geometry.is_some());
        assert!(result.report.stages.iter().any(|s| s.name == "SceneBuild"));
    }

    #[test]
    fn test_missing_file_stops_at_raw_import() {
        let result =
            run_import_pipeline(Path::new("/no/such.json"), &ImportOptions::default()).unwrap();
        assert!(result.geometry.is_none());
        assert_eq!(result.report.stages.len(), 1);
        assert_eq!(result.report.stages[0].name, "RawImport");
        assert_eq!(result.report.stages[0].status, "error");
    }

    #[test]
    fn test_unit_and_axis_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = doc_with_room();
        doc.length_unit = "mm".to_string();
        doc.scale_to_meters = 0.001;
        doc.source_up_axis = "Y_UP".to_string();
        doc.surfaces[0].vertices = vec![
            (0.0, 0.0, 0.0),
            (4000.0, 0.0, 0.0),
            (4000.0, 3000.0, 0.0),
            (0.0, 3000.0, 0.0),
        ];
        let path = write_doc(dir.path(), &doc);
        let result = run_import_pipeline(&path, &ImportOptions::default()).unwrap();
        let geo = result.geometry.unwrap();
        assert_eq!(geo.length_unit, "m");
        // Y-up source: the +Y extent lands on canonical +Z after rotation.
        let zmax = geo.surfaces[0]
            .vertices
            .iter()
            .map(|v| v.2)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((zmax - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_layer_override_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), &doc_with_room());
        let mut options = ImportOptions::default();
        options
            .layer_overrides
            .insert("a-wall".to_string(), "room".to_string());
        let result = run_import_pipeline(&path, &options).unwrap();
        assert_eq!(result.report.layer_map["A-WALL"], "room");
    }
}
