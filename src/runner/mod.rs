//! Deterministic calculation runner
//!
//! `run_job` hashes the full input set (job, project without results/audit,
//! photometry file contents, solver and backend versions) into a job hash.
//! The result directory is content-addressed by that hash: presence of a
//! parseable `result.json` is the cache hit. Artifacts are written write-if-
//! absent, so concurrent identical runs are mutually compatible.

pub mod direct;

pub use direct::{CancellationToken, ObjectStats};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::debug;

use crate::core::error::{LuxeraError, Result};
use crate::core::identity::{canonical_bytes, sha256_file, sha256_hex};
use crate::geometry::bvh::Bvh;
use crate::geometry::doctor::scene_health_report;
use crate::project::io::results_root;
use crate::project::schema::{JobResultRef, JobSpec, JobType, Project};
use crate::runner::direct::{build_occluder_triangles, evaluate_illuminance, object_stats};

/// Version of the evaluation semantics; enters the job hash.
pub const SOLVER_VERSION: &str = "1.0.0";

/// Version of the built-in backend; enters the job hash.
pub const BACKEND_VERSION: &str = "native-1.0.0";

/// Validate the project for one job: referenced assets, targets, photometric
/// system, and unit normalization.
pub fn validate_project_for_job(project: &Project, job: &JobSpec) -> Result<()> {
    if project.geometry.length_unit != "m" {
        return Err(LuxeraError::validation(format!(
            "project units must be normalized to meters, found {}",
            project.geometry.length_unit
        )));
    }
    for lum in &project.luminaires {
        let asset = project.asset(&lum.photometry_asset_id).ok_or_else(|| {
            LuxeraError::validation(format!(
                "luminaire {} references missing asset {}",
                lum.id, lum.photometry_asset_id
            ))
        })?;
        if let Some(system) = asset.metadata.get("photometry_type").and_then(Value::as_str) {
            if system != "C" {
                return Err(LuxeraError::validation(format!(
                    "asset {} uses unsupported photometric system {} (only C-gamma)",
                    asset.id, system
                )));
            }
        }
    }
    for target in &job.target_ids {
        let known = project.grid(target).is_some()
            || project.point_sets.iter().any(|s| &s.id == target)
            || project.line_grids.iter().any(|l| &l.id == target)
            || project.vertical_planes.iter().any(|v| &v.id == target)
            || project.arbitrary_planes.iter().any(|a| &a.id == target)
            || project.escape_routes.iter().any(|r| &r.id == target)
            || project.roadway_grids.iter().any(|r| &r.id == target);
        if !known {
            return Err(LuxeraError::validation(format!(
                "job {} targets unknown calc object {}",
                job.id, target
            )));
        }
    }
    Ok(())
}

/// SHA-256 content hashes of every referenced photometry asset. The file
/// hash, not the path, enters the job hash.
fn asset_content_hashes(project: &Project) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for asset in &project.photometry_assets {
        let hash = match &asset.path {
            Some(path) if Path::new(path).exists() => sha256_file(Path::new(path))?,
            _ => asset
                .content_hash
                .clone()
                .unwrap_or_else(|| sha256_hex(asset.id.as_bytes())),
        };
        out.insert(asset.id.clone(), hash);
    }
    Ok(out)
}

/// Compute the content-addressed job hash.
pub fn compute_job_hash(project: &Project, job: &JobSpec) -> Result<String> {
    let mut project_value = project.to_value();
    if let Value::Object(ref mut map) = project_value {
        map.remove("results");
        map.remove("agent_history");
    }
    let payload = json!({
        "job": serde_json::to_value(job)?,
        "project": project_value,
        "asset_content_hashes": asset_content_hashes(project)?,
        "solver_version": SOLVER_VERSION,
        "backend_version": BACKEND_VERSION,
    });
    Ok(sha256_hex(&canonical_bytes(&payload)))
}

fn stats_value(stats: &ObjectStats) -> Value {
    json!({
        "min": stats.min,
        "mean": stats.mean,
        "max": stats.max,
        "uniformity": stats.uniformity,
        "count": stats.count,
    })
}

fn write_if_absent(path: &Path, contents: &[u8]) -> Result<()> {
    if !path.exists() {
        fs::write(path, contents)?;
    }
    Ok(())
}

fn csv_for_samples(samples: &[(f64, f64, f64)], values: &[f64]) -> String {
    let mut out = String::from("x,y,z,E_lux\n");
    for (p, e) in samples.iter().zip(values.iter()) {
        out.push_str(&format!("{:.6},{:.6},{:.6},{:.6}\n", p.0, p.1, p.2, e));
    }
    out
}

struct EvaluatedObject {
    kind: &'static str,
    id: String,
    csv_name: String,
    samples: Vec<(f64, f64, f64)>,
    values: Vec<f64>,
    stats: ObjectStats,
}

/// Evaluate every calc object the job targets (or all, when untargeted).
fn evaluate_objects(
    project: &Project,
    job: &JobSpec,
    cancel: &CancellationToken,
) -> Result<Vec<EvaluatedObject>> {
    let occlusion = job
        .settings
        .get("occlusion")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let bvh = if occlusion {
        Some(Bvh::build(build_occluder_triangles(project)))
    } else {
        None
    };
    let wants = |id: &str| job.target_ids.is_empty() || job.target_ids.iter().any(|t| t == id);
    let up = (0.0, 0.0, 1.0);
    let mut out = Vec::new();

    let mut grids: Vec<_> = project.grids.iter().collect();
    grids.sort_by(|a, b| a.id.cmp(&b.id));
    for grid in grids {
        if !wants(&grid.id) {
            continue;
        }
        let values =
            evaluate_illuminance(project, &grid.sample_points, up, bvh.as_ref(), cancel)?;
        out.push(EvaluatedObject {
            kind: "grid",
            id: grid.id.clone(),
            csv_name: format!("grid_{}.csv", grid.id),
            samples: grid.sample_points.clone(),
            stats: object_stats(&values),
            values,
        });
    }

    let mut point_sets: Vec<_> = project.point_sets.iter().collect();
    point_sets.sort_by(|a, b| a.id.cmp(&b.id));
    for ps in point_sets {
        if !wants(&ps.id) {
            continue;
        }
        let values = evaluate_illuminance(project, &ps.points, up, bvh.as_ref(), cancel)?;
        out.push(EvaluatedObject {
            kind: "point_set",
            id: ps.id.clone(),
            csv_name: format!("points_{}.csv", ps.id),
            samples: ps.points.clone(),
            stats: object_stats(&values),
            values,
        });
    }

    let mut line_grids: Vec<_> = project.line_grids.iter().collect();
    line_grids.sort_by(|a, b| a.id.cmp(&b.id));
    for lg in line_grids {
        if !wants(&lg.id) {
            continue;
        }
        let samples = crate::calc::builders::sample_line_grid(&lg.polyline, lg.spacing);
        let values = evaluate_illuminance(project, &samples, up, bvh.as_ref(), cancel)?;
        out.push(EvaluatedObject {
            kind: "line_grid",
            id: lg.id.clone(),
            csv_name: format!("line_{}.csv", lg.id),
            samples,
            stats: object_stats(&values),
            values,
        });
    }

    let mut routes: Vec<_> = project.escape_routes.iter().collect();
    routes.sort_by(|a, b| a.id.cmp(&b.id));
    for route in routes {
        if !wants(&route.id) {
            continue;
        }
        let samples = crate::calc::builders::sample_line_grid(&route.polyline, route.spacing);
        let values = evaluate_illuminance(project, &samples, up, bvh.as_ref(), cancel)?;
        out.push(EvaluatedObject {
            kind: "escape_route",
            id: route.id.clone(),
            csv_name: format!("route_{}.csv", route.id),
            samples,
            stats: object_stats(&values),
            values,
        });
    }

    let mut vplanes: Vec<_> = project.vertical_planes.iter().collect();
    vplanes.sort_by(|a, b| a.id.cmp(&b.id));
    for vp in vplanes {
        if !wants(&vp.id) {
            continue;
        }
        let Some(host_id) = &vp.host_surface_id else {
            continue;
        };
        let Some(wall) = project.surface(host_id) else {
            continue;
        };
        let openings = if vp.mask_openings {
            project.geometry.openings.clone()
        } else {
            Vec::new()
        };
        let grid = crate::calc::builders::build_vertical_grid_on_wall(
            wall,
            vp.rows.max(2),
            vp.cols.max(2),
            &openings,
            vp.subrect,
        )?;
        let samples: Vec<(f64, f64, f64)> = grid
            .points_xyz
            .iter()
            .zip(grid.mask.iter())
            .filter(|(_, &m)| m)
            .map(|(p, _)| *p)
            .collect();
        let values =
            evaluate_illuminance(project, &samples, grid.normal, bvh.as_ref(), cancel)?;
        out.push(EvaluatedObject {
            kind: "vertical_plane",
            id: vp.id.clone(),
            csv_name: format!("vplane_{}.csv", vp.id),
            samples,
            stats: object_stats(&values),
            values,
        });
    }

    let mut road_grids: Vec<_> = project.roadway_grids.iter().collect();
    road_grids.sort_by(|a, b| a.id.cmp(&b.id));
    for (n, rg) in road_grids.iter().enumerate() {
        if !wants(&rg.id) {
            continue;
        }
        let roadway = project.roadways.iter().find(|r| r.id == rg.roadway_id);
        let (length, lane_width) = roadway.map(|r| (r.length, r.lane_width)).unwrap_or((0.0, 0.0));
        if length <= 0.0 || lane_width <= 0.0 {
            continue;
        }
        let y0 = rg.lane_index as f64 * lane_width;
        let grid = crate::calc::builders::build_workplane_grid(
            (0.0, y0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 0.0),
            length,
            lane_width,
            rg.ny.max(2),
            rg.nx.max(2),
            None,
            &[],
        );
        let values =
            evaluate_illuminance(project, &grid.points_xyz, up, bvh.as_ref(), cancel)?;
        out.push(EvaluatedObject {
            kind: "roadway_grid",
            id: rg.id.clone(),
            csv_name: format!("road_grid_{}.csv", n),
            samples: grid.points_xyz.clone(),
            stats: object_stats(&values),
            values,
        });
    }

    Ok(out)
}

fn compliance_verdict(project: &Project, job: &JobSpec, worst: &ObjectStats) -> Value {
    let profile = job
        .compliance_profile_id
        .as_ref()
        .and_then(|id| project.compliance_profiles.iter().find(|c| &c.id == id));
    match profile {
        None => Value::Null,
        Some(p) => {
            let pass = worst.mean >= p.target_lux && worst.uniformity >= p.min_uniformity;
            Value::String(format!(
                "{}: mean {:.1} lx vs target {:.1} lx, U0 {:.2} vs {:.2} ({})",
                if pass { "COMPLIANT" } else { "NON-COMPLIANT" },
                worst.mean,
                p.target_lux,
                worst.uniformity,
                p.min_uniformity,
                p.id
            ))
        }
    }
}

fn job_type_str(t: JobType) -> &'static str {
    match t {
        JobType::Direct => "direct",
        JobType::Radiosity => "radiosity",
        JobType::Daylight => "daylight",
        JobType::Emergency => "emergency",
        JobType::Roadway => "roadway",
    }
}

/// Execute the job against a results root, writing canonical artifacts, and
/// return the result reference. Cache hits return without recomputation.
pub fn run_job_at(
    project: &Project,
    job_id: &str,
    root: &Path,
    cancel: &CancellationToken,
) -> Result<JobResultRef> {
    let job = project
        .job(job_id)
        .ok_or_else(|| LuxeraError::validation(format!("job not found: {}", job_id)))?
        .clone();
    validate_project_for_job(project, &job)?;
    let job_hash = compute_job_hash(project, &job)?;
    let dir = root.join(&job_hash);
    let result_json = dir.join("result.json");

    // Cache hit: a parseable result.json under the hash directory.
    if result_json.exists() {
        if let Ok(raw) = fs::read_to_string(&result_json) {
            if let Ok(parsed) = serde_json::from_str::<Value>(&raw) {
                debug!(job = %job_id, hash = %job_hash, "result cache hit");
                let summary: BTreeMap<String, Value> = parsed
                    .get("summary")
                    .and_then(Value::as_object)
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                    .unwrap_or_default();
                return Ok(JobResultRef {
                    job_id: job_id.to_string(),
                    job_hash,
                    result_dir: dir.to_string_lossy().into_owned(),
                    summary,
                });
            }
        }
        // Corrupt cache entry: fall through and recompute.
    }

    let objects = evaluate_objects(project, &job, cancel)?;
    fs::create_dir_all(&dir)?;

    let mut per_object = serde_json::Map::new();
    let mut all_values: Vec<f64> = Vec::new();
    let mut tables: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for obj in &objects {
        write_if_absent(
            &dir.join(&obj.csv_name),
            csv_for_samples(&obj.samples, &obj.values).as_bytes(),
        )?;
        per_object.insert(obj.id.clone(), stats_value(&obj.stats));
        all_values.extend(obj.values.iter().copied());
        tables.entry(obj.kind.to_string()).or_default().push(json!({
            "id": obj.id,
            "stats": stats_value(&obj.stats),
            "csv": obj.csv_name,
        }));
    }
    let worst = object_stats(&all_values);
    let compliance = compliance_verdict(project, &job, &worst);

    let mut summary: BTreeMap<String, Value> = BTreeMap::new();
    summary.insert("min_lux".to_string(), json!(worst.min));
    summary.insert("mean_lux".to_string(), json!(worst.mean));
    summary.insert("max_lux".to_string(), json!(worst.max));
    summary.insert("uniformity".to_string(), json!(worst.uniformity));
    summary.insert("sample_count".to_string(), json!(worst.count));
    summary.insert("objects".to_string(), Value::Object(per_object.clone()));
    summary.insert("compliance".to_string(), compliance.clone());

    let assets = asset_content_hashes(project)?;
    let result_payload = json!({
        "job": serde_json::to_value(&job)?,
        "summary": summary,
        "assets": assets,
        "solver": SOLVER_VERSION,
        "backend": job.backend,
        "units": "lux",
        "coordinate_convention": "Z_UP/RIGHT_HANDED",
        "assumptions": [
            "isotropic point-source intensity from rated lumens",
            "cosine incidence on the sample plane normal",
        ],
        "unsupported_features": [],
    });
    write_if_absent(
        &result_json,
        serde_json::to_string_pretty(&result_payload)?.as_bytes(),
    )?;
    write_if_absent(
        &dir.join("summary.json"),
        serde_json::to_string_pretty(&json!({
            "per_object": per_object,
            "worst_case": stats_value(&worst),
            "compliance": compliance,
        }))?
        .as_bytes(),
    )?;
    write_if_absent(
        &dir.join("tables.json"),
        serde_json::to_string_pretty(&serde_json::to_value(&tables)?)?.as_bytes(),
    )?;
    write_if_absent(
        &dir.join("manifest.json"),
        serde_json::to_string_pretty(&json!({
            "job_hash": job_hash,
            "job_type": job_type_str(job.job_type),
            "seed": job.seed,
            "solver_version": SOLVER_VERSION,
            "backend_version": BACKEND_VERSION,
            "photometry_hashes": assets,
            "settings": job.settings,
            "coordinate_convention": "Z_UP/RIGHT_HANDED",
        }))?
        .as_bytes(),
    )?;
    // The heal report is emitted regardless of success.
    let health = scene_health_report(&build_occluder_triangles(project));
    write_if_absent(
        &dir.join("geometry_heal_report.json"),
        serde_json::to_string_pretty(&serde_json::to_value(&health)?)?.as_bytes(),
    )?;

    Ok(JobResultRef {
        job_id: job_id.to_string(),
        job_hash,
        result_dir: dir.to_string_lossy().into_owned(),
        summary,
    })
}

fn project_results_root(project: &Project) -> PathBuf {
    match &project.root_dir {
        Some(dir) => results_root(dir),
        None => results_root(Path::new(".")),
    }
}

/// Run a job and append the result reference to the project.
pub fn run_job(project: &mut Project, job_id: &str) -> Result<JobResultRef> {
    let root = project_results_root(project);
    let cancel = CancellationToken::new();
    let reference = run_job_at(project, job_id, &root, &cancel)?;
    project
        .results
        .retain(|r| !(r.job_id == reference.job_id && r.job_hash == reference.job_hash));
    project.results.push(reference.clone());
    Ok(reference)
}

/// Run a job against an in-memory project clone without mutating it
/// (variant compare uses this).
pub fn run_job_in_memory(project: &Project, job_id: &str) -> Result<JobResultRef> {
    let root = project_results_root(project);
    run_job_at(project, job_id, &root, &CancellationToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::{CalcGrid, LuminaireInstance, PhotometryAsset, TransformSpec};
    use serde_json::json;

    fn runnable_project(dir: &Path) -> Project {
        let mut p = Project::new("t");
        p.root_dir = Some(dir.to_path_buf());
        let mut asset = PhotometryAsset {
            id: "a1".to_string(),
            format: "IES".to_string(),
            ..Default::default()
        };
        asset.metadata.insert("lumens".to_string(), json!(2000.0));
        p.photometry_assets.push(asset);
        p.luminaires.push(LuminaireInstance {
            id: "l1".to_string(),
            photometry_asset_id: "a1".to_string(),
            transform: TransformSpec {
                position: (2.0, 1.5, 2.8),
                ..Default::default()
            },
            maintenance_factor: 1.0,
            flux_multiplier: 1.0,
            ..Default::default()
        });
        p.grids.push(CalcGrid {
            id: "g1".to_string(),
            origin: (0.0, 0.0),
            width: 4.0,
            height: 3.0,
            elevation: 0.8,
            nx: 5,
            ny: 4,
            sample_mask: vec![true; 20],
            sample_points: (0..4)
                .flat_map(|j| (0..5).map(move |i| (i as f64, j as f64 * 0.75, 0.8)))
                .collect(),
            ..Default::default()
        });
        p.jobs.push(JobSpec {
            id: "j1".to_string(),
            seed: 42,
            ..Default::default()
        });
        p
    }

    #[test]
    fn test_job_hash_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let p = runnable_project(dir.path());
        let job = p.job("j1").unwrap();
        assert_eq!(
            compute_job_hash(&p, job).unwrap(),
            compute_job_hash(&p, job).unwrap()
        );
    }

    #[test]
    fn test_job_hash_tracks_flux_change() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = runnable_project(dir.path());
        let mut p2 = runnable_project(dir.path());
        p2.luminaires[0].flux_multiplier = 1.0001;
        let h1 = compute_job_hash(&p1, p1.job("j1").unwrap()).unwrap();
        let h2 = compute_job_hash(&p2, p2.job("j1").unwrap()).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_job_hash_ignores_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = runnable_project(dir.path());
        let h1 = compute_job_hash(&p, &p.job("j1").unwrap().clone()).unwrap();
        p.results.push(JobResultRef {
            job_id: "j1".to_string(),
            job_hash: "x".to_string(),
            result_dir: "y".to_string(),
            summary: BTreeMap::new(),
        });
        let h2 = compute_job_hash(&p, &p.job("j1").unwrap().clone()).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_run_job_writes_artifacts_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = runnable_project(dir.path());
        let first = run_job(&mut p, "j1").unwrap();
        let result_dir = PathBuf::from(&first.result_dir);
        for artifact in [
            "result.json",
            "summary.json",
            "manifest.json",
            "tables.json",
            "geometry_heal_report.json",
            "grid_g1.csv",
        ] {
            assert!(result_dir.join(artifact).exists(), "missing {}", artifact);
        }
        assert_eq!(p.results.len(), 1);

        // Second run: same hash, cache hit, result set unchanged.
        let second = run_job(&mut p, "j1").unwrap();
        assert_eq!(first.job_hash, second.job_hash);
        assert_eq!(p.results.len(), 1);
    }

    #[test]
    fn test_grid_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = runnable_project(dir.path());
        let reference = run_job(&mut p, "j1").unwrap();
        let csv =
            fs::read_to_string(PathBuf::from(&reference.result_dir).join("grid_g1.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "x,y,z,E_lux");
        assert_eq!(lines.count(), 20);
    }

    #[test]
    fn test_unknown_job_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = runnable_project(dir.path());
        assert!(run_job(&mut p, "nope").is_err());
    }

    #[test]
    fn test_unknown_target_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = runnable_project(dir.path());
        p.jobs[0].target_ids.push("ghost".to_string());
        let err = run_job(&mut p, "j1").unwrap_err();
        assert!(matches!(err, LuxeraError::Validation { .. }));
    }

    #[test]
    fn test_summary_contains_compliance_with_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = runnable_project(dir.path());
        p.compliance_profiles.push(crate::project::schema::ComplianceProfile {
            id: "cp1".to_string(),
            name: String::new(),
            target_lux: 1.0e9,
            min_uniformity: 0.0,
        });
        p.jobs[0].compliance_profile_id = Some("cp1".to_string());
        let reference = run_job(&mut p, "j1").unwrap();
        let verdict = reference.summary.get("compliance").unwrap();
        assert!(verdict.as_str().unwrap().contains("NON-COMPLIANT"));
    }
}
