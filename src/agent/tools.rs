//! Agent tool surface
//!
//! Strict command-layer API the runtime is allowed to use. All file reads
//! and writes go through the depth-gated helpers: `read_text`/`write_text`
//! are only legal while a tool call is on the stack, which keeps runtime
//! code from doing file I/O outside a tool call.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::agent::audit::append_audit_event;
use crate::core::error::{LuxeraError, Result};
use crate::geometry::polygon::Point2;
use crate::ops::delta::{apply_delta, Delta, DeltaItem};
use crate::project::io::{load_project, save_project};
use crate::project::schema::Project;
use crate::runner::run_job;

/// Result envelope for every tool call.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub ok: bool,
    pub requires_approval: bool,
    pub message: String,
    pub data: BTreeMap<String, Value>,
}

impl ToolResult {
    pub fn ok(message: &str) -> Self {
        Self {
            ok: true,
            message: message.to_string(),
            ..Default::default()
        }
    }

    pub fn fail(message: &str) -> Self {
        Self {
            ok: false,
            message: message.to_string(),
            ..Default::default()
        }
    }

    pub fn needs_approval(message: &str) -> Self {
        Self {
            ok: false,
            requires_approval: true,
            message: message.to_string(),
            ..Default::default()
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }
}

/// A proposed change set: ordered add/update/remove ops over typed
/// collections, previewable before approval.
#[derive(Debug, Clone, Default)]
pub struct ProjectDiff {
    pub ops: Vec<DiffOp>,
}

#[derive(Debug, Clone)]
pub struct DiffOp {
    pub op: String,
    pub kind: String,
    pub id: String,
    pub payload: Value,
}

impl ProjectDiff {
    /// Convert to a delta and apply through the delta machinery.
    pub fn apply(&self, project: &mut Project) -> Result<()> {
        let mut delta = Delta::default();
        for op in &self.ops {
            let item = DeltaItem {
                kind: op.kind.clone(),
                id: op.id.clone(),
                before: None,
                after: Some(op.payload.clone()),
            };
            match op.op.as_str() {
                "add" => delta.created.push(item),
                "update" => delta.updated.push(item),
                "remove" => delta.deleted.push(DeltaItem {
                    before: Some(Value::Null),
                    after: None,
                    ..item
                }),
                _ => {}
            }
        }
        apply_delta(project, &delta)
    }
}

/// RAII guard that marks a tool call on the stack.
struct ToolCallGuard<'a> {
    depth: &'a Cell<u32>,
}

impl<'a> ToolCallGuard<'a> {
    fn enter(depth: &'a Cell<u32>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for ToolCallGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// The command-layer tool surface.
#[derive(Default)]
pub struct AgentTools {
    tool_call_depth: Cell<u32>,
}

impl AgentTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tool-call nesting depth. Zero means no tool is running, so
    /// file I/O through this surface is illegal.
    pub fn tool_call_depth(&self) -> u32 {
        self.tool_call_depth.get()
    }

    /// Depth-gated file read.
    pub fn read_text(&self, path: &Path) -> Result<String> {
        if self.tool_call_depth.get() == 0 {
            return Err(LuxeraError::tool(
                "file read outside a tool call is not permitted",
            ));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Depth-gated file write.
    pub fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        if self.tool_call_depth.get() == 0 {
            return Err(LuxeraError::tool(
                "file write outside a tool call is not permitted",
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Open a project from disk.
    pub fn open_project(&self, project_path: &Path) -> Result<(Project, PathBuf)> {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let project = load_project(project_path)?;
        Ok((project, project_path.to_path_buf()))
    }

    /// Save a project back to disk.
    pub fn save_project(&self, project: &Project, project_path: &Path) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        match save_project(project, project_path) {
            Ok(()) => ToolResult::ok("Project saved")
                .with("project_path", json!(project_path.to_string_lossy())),
            Err(e) => ToolResult::fail(&e.to_string()),
        }
    }

    /// Load the per-project agent memory store.
    pub fn load_context_memory(&self, project_path: &Path) -> BTreeMap<String, Value> {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let path = memory_path(project_path);
        match self.read_text(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }

    /// Persist the per-project agent memory store.
    pub fn save_context_memory(
        &self,
        project_path: &Path,
        memory: &BTreeMap<String, Value>,
    ) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let path = memory_path(project_path);
        let text = match serde_json::to_string_pretty(memory) {
            Ok(t) => t,
            Err(e) => return ToolResult::fail(&e.to_string()),
        };
        match self.write_text(&path, &text) {
            Ok(()) => ToolResult::ok("Memory saved"),
            Err(e) => ToolResult::fail(&e.to_string()),
        }
    }

    /// Write a session artifact under `.luxera/agent_sessions/`.
    pub fn save_session_artifact(
        &self,
        project_path: &Path,
        runtime_id: &str,
        payload: &Value,
    ) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let dir = project_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(".luxera")
            .join("agent_sessions");
        let path = dir.join(format!("{}.json", runtime_id));
        let text = match serde_json::to_string_pretty(payload) {
            Ok(t) => t,
            Err(e) => return ToolResult::fail(&e.to_string()),
        };
        match self.write_text(&path, &text) {
            Ok(()) => {
                ToolResult::ok("Session artifact saved").with("path", json!(path.to_string_lossy()))
            }
            Err(e) => ToolResult::fail(&e.to_string()),
        }
    }

    /// Import geometry via the staged pipeline into the project.
    pub fn import_geometry(&self, project: &mut Project, file_path: &str) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let options = crate::import::pipeline::ImportOptions::default();
        let result = match crate::import::pipeline::run_import_pipeline(
            Path::new(file_path),
            &options,
        ) {
            Ok(r) => r,
            Err(e) => return ToolResult::fail(&e.to_string()),
        };
        match result.geometry {
            Some(doc) => {
                project.geometry.rooms = doc.rooms;
                project.geometry.surfaces = doc.surfaces;
                project.geometry.openings = doc.openings;
                project.geometry.obstructions = doc.obstructions;
                project.geometry.levels = doc.levels;
                append_audit_event(
                    project,
                    "agent.tools.import_geometry",
                    "Import geometry via tool API.",
                    vec![],
                    vec![],
                    vec![],
                    json!({"file_path": file_path}),
                );
                ToolResult::ok("Geometry imported")
                    .with("rooms", json!(project.geometry.rooms.len()))
                    .with("surfaces", json!(project.geometry.surfaces.len()))
            }
            None => {
                let gate_error = result
                    .report
                    .stages
                    .iter()
                    .rev()
                    .find(|s| s.status == "error")
                    .map(|s| s.errors.join("; "))
                    .unwrap_or_else(|| "import failed".to_string());
                ToolResult::fail(&gate_error)
            }
        }
    }

    /// Drop degenerate surfaces and derive box rooms for orphans.
    pub fn clean_geometry(&self, project: &mut Project, detect_rooms: bool) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let before = project.geometry.surfaces.len();
        project.geometry.surfaces.retain(|s| s.vertices.len() >= 3);
        let dropped = before - project.geometry.surfaces.len();
        let mut detected = 0usize;
        if detect_rooms && project.geometry.rooms.is_empty() {
            // Bound every surface into one detected room volume.
            let mut min = (f64::INFINITY, f64::INFINITY, f64::INFINITY);
            let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
            for s in &project.geometry.surfaces {
                for v in &s.vertices {
                    min.0 = min.0.min(v.0);
                    min.1 = min.1.min(v.1);
                    min.2 = min.2.min(v.2);
                    max.0 = max.0.max(v.0);
                    max.1 = max.1.max(v.1);
                    max.2 = max.2.max(v.2);
                }
            }
            if min.0.is_finite() && max.0 - min.0 > 0.0 && max.1 - min.1 > 0.0 {
                project.geometry.rooms.push(crate::project::schema::RoomSpec {
                    id: "room_detected_1".to_string(),
                    name: "Detected room".to_string(),
                    width: max.0 - min.0,
                    length: max.1 - min.1,
                    height: (max.2 - min.2).max(2.5),
                    origin: min,
                    ..Default::default()
                });
                detected = 1;
            }
        }
        ToolResult::ok("Geometry cleaned")
            .with("dropped_surfaces", json!(dropped))
            .with("detected_rooms", json!(detected))
    }

    /// Add a rectangular calc grid with a full keep-mask.
    #[allow(clippy::too_many_arguments)]
    pub fn add_grid(
        &self,
        project: &mut Project,
        name: &str,
        width: f64,
        height: f64,
        elevation: f64,
        nx: usize,
        ny: usize,
    ) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        if width <= 0.0 || height <= 0.0 || nx < 2 || ny < 2 {
            return ToolResult::fail("grid dimensions must be positive with nx, ny >= 2");
        }
        let grid_id = format!("grid_{:02}", project.grids.len() + 1);
        let dx = width / (nx - 1) as f64;
        let dy = height / (ny - 1) as f64;
        let mut sample_points = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                sample_points.push((i as f64 * dx, j as f64 * dy, elevation));
            }
        }
        project.grids.push(crate::project::schema::CalcGrid {
            id: grid_id.clone(),
            name: name.to_string(),
            origin: (0.0, 0.0),
            width,
            height,
            elevation,
            nx,
            ny,
            sample_mask: vec![true; nx * ny],
            sample_points,
            ..Default::default()
        });
        ToolResult::ok("Grid added").with("grid_id", json!(grid_id))
    }

    /// Propose a deterministic luminaire layout diff for a target lux level.
    pub fn propose_layout_diff(
        &self,
        project: &Project,
        target_lux: f64,
        max_rows: usize,
        max_cols: usize,
    ) -> Result<(ProjectDiff, ToolResult)> {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let Some(asset) = project.photometry_assets.first() else {
            return Err(LuxeraError::tool("no photometry asset available for layout"));
        };
        let room_poly: Vec<Point2> = project
            .geometry
            .rooms
            .first()
            .map(|r| r.polygon())
            .unwrap_or_else(|| vec![(0.0, 0.0), (6.0, 0.0), (6.0, 8.0), (0.0, 8.0)]);
        let x0 = room_poly.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let x1 = room_poly.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
        let y0 = room_poly.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let y1 = room_poly.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);
        let area = (x1 - x0) * (y1 - y0);
        let lumens = asset.lumens().max(1.0);
        // Lumen method with a fixed utilization and maintenance assumption.
        let needed_flux = target_lux * area / (0.5 * 0.8);
        let count = ((needed_flux / lumens).ceil() as usize).max(1);
        let cols = ((count as f64).sqrt().ceil() as usize).clamp(1, max_cols.max(1));
        let rows = (count.div_ceil(cols)).clamp(1, max_rows.max(1));

        let mount_z = project
            .geometry
            .rooms
            .first()
            .map(|r| r.origin.2 + r.height - 0.2)
            .unwrap_or(2.8);
        let mut ops = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let idx = r * cols + c;
                let x = x0 + (x1 - x0) * (c as f64 + 0.5) / cols as f64;
                let y = y0 + (y1 - y0) * (r as f64 + 0.5) / rows as f64;
                let id = format!("lum_auto_{:02}", idx + 1);
                ops.push(DiffOp {
                    op: "add".to_string(),
                    kind: "luminaire".to_string(),
                    id: id.clone(),
                    payload: json!({
                        "id": id,
                        "name": format!("Auto {}", idx + 1),
                        "photometry_asset_id": asset.id,
                        "transform": {"position": [x, y, mount_z], "rotation": {"type": "euler_zyx"}},
                        "maintenance_factor": 0.8,
                        "flux_multiplier": 1.0,
                        "tilt_deg": 0.0,
                    }),
                });
            }
        }
        let diff = ProjectDiff { ops };
        let result = ToolResult::ok("Layout diff proposed")
            .with("count", json!(diff.ops.len()))
            .with("rows", json!(rows))
            .with("cols", json!(cols));
        Ok((diff, result))
    }

    /// Apply a previously proposed diff; requires explicit approval.
    pub fn apply_diff(
        &self,
        project: &mut Project,
        diff: &ProjectDiff,
        approved: bool,
    ) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        if !approved {
            return ToolResult::needs_approval("Apply diff requires explicit approval");
        }
        match diff.apply(project) {
            Ok(()) => {
                append_audit_event(
                    project,
                    "agent.tools.apply_diff",
                    "Apply approved diff via tool API.",
                    vec![json!({"ops": diff.ops.len()})],
                    vec![],
                    vec![],
                    json!({}),
                );
                ToolResult::ok("Diff applied").with("ops", json!(diff.ops.len()))
            }
            Err(e) => ToolResult::fail(&e.to_string()),
        }
    }

    /// Run a job; requires explicit approval.
    pub fn run_job(&self, project: &mut Project, job_id: &str, approved: bool) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        if !approved {
            return ToolResult::needs_approval("Run job requires explicit approval");
        }
        match run_job(project, job_id) {
            Ok(reference) => ToolResult::ok("Job completed")
                .with("job_id", json!(reference.job_id))
                .with("job_hash", json!(reference.job_hash))
                .with("result_dir", json!(reference.result_dir)),
            Err(e) => ToolResult::fail(&e.to_string()),
        }
    }

    /// Summarize the latest result for a job.
    pub fn summarize_results(&self, project: &Project, job_id: &str) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        match project.results.iter().rev().find(|r| r.job_id == job_id) {
            Some(reference) => ToolResult::ok("Summary").with(
                "summary",
                Value::Object(reference.summary.clone().into_iter().collect()),
            ),
            None => ToolResult::fail(&format!("Result not found for job: {}", job_id)),
        }
    }

    /// Validate the project for one job (or all jobs).
    pub fn validate_project(&self, project: &Project, job_id: Option<&str>) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        let jobs: Vec<_> = match job_id {
            Some(id) => match project.job(id) {
                Some(j) => vec![j.clone()],
                None => return ToolResult::fail(&format!("Job not found: {}", id)),
            },
            None => project.jobs.clone(),
        };
        for job in &jobs {
            if let Err(e) = crate::runner::validate_project_for_job(project, job) {
                return ToolResult::fail(&e.to_string());
            }
        }
        ToolResult::ok("Project validation passed")
    }

    /// Compare variants over a job.
    pub fn compare_variants(
        &self,
        project_path: &Path,
        job_id: &str,
        variant_ids: &[String],
        baseline: Option<&str>,
    ) -> ToolResult {
        let _guard = ToolCallGuard::enter(&self.tool_call_depth);
        match crate::project::variants::run_job_for_variants(
            project_path,
            job_id,
            variant_ids,
            baseline,
        ) {
            Ok(result) => ToolResult::ok("Variants compared")
                .with("out_dir", json!(result.out_dir.to_string_lossy()))
                .with("rows", json!(result.rows.len())),
            Err(e) => ToolResult::fail(&e.to_string()),
        }
    }
}

fn memory_path(project_path: &Path) -> PathBuf {
    project_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".luxera")
        .join("agent_memory.json")
}
