//! Variant compare: apply variant overrides, run the job per variant, and
//! produce delta tables against a baseline
//!
//! Order of application per variant: luminaire overrides, then dimming
//! schemes (multiplicative on flux), then the variant's diff ops.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::core::error::{LuxeraError, Result};
use crate::core::identity::sha256_hex;
use crate::ops::delta::{apply_delta, Delta, DeltaItem};
use crate::project::io::{load_project, results_root};
use crate::project::schema::{Project, ProjectVariant};
use crate::runner::run_job_in_memory;

/// Result of a variant compare run.
#[derive(Debug, Clone)]
pub struct VariantCompareResult {
    pub out_dir: PathBuf,
    pub compare_json: PathBuf,
    pub compare_csv: PathBuf,
    pub rows: Vec<BTreeMap<String, Value>>,
}

/// Diff-op kinds a variant may carry.
const VARIANT_KINDS: &[&str] = &[
    "room",
    "surface",
    "opening",
    "obstruction",
    "level",
    "escape_route",
    "luminaire",
    "grid",
    "job",
    "material",
    "asset",
    "family",
];

fn variant_to_delta(variant: &ProjectVariant) -> Delta {
    let mut delta = Delta::default();
    for raw in &variant.diff_ops {
        let Some(op) = raw.get("op").and_then(Value::as_str) else {
            continue;
        };
        let Some(kind) = raw.get("kind").and_then(Value::as_str) else {
            continue;
        };
        let Some(id) = raw.get("id").and_then(Value::as_str) else {
            continue;
        };
        if !VARIANT_KINDS.contains(&kind) {
            continue;
        }
        let payload = raw.get("payload").cloned();
        let item = DeltaItem {
            kind: kind.to_string(),
            id: id.to_string(),
            before: None,
            after: payload,
        };
        match op {
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
    delta
}

/// Clone the base project and apply one variant to the clone.
pub fn apply_variant(base: &Project, variant: &ProjectVariant) -> Result<Project> {
    let mut project = base.clone();

    for (lum_id, overrides) in &variant.luminaire_overrides {
        if let Some(lum) = project.luminaires.iter_mut().find(|l| &l.id == lum_id) {
            if let Some(v) = overrides.get("flux_multiplier") {
                lum.flux_multiplier = *v;
            }
            if let Some(v) = overrides.get("maintenance_factor") {
                lum.maintenance_factor = *v;
            }
            if let Some(v) = overrides.get("tilt_deg") {
                lum.tilt_deg = *v;
            }
        }
    }
    for (lum_id, factor) in &variant.dimming_schemes {
        if let Some(lum) = project.luminaires.iter_mut().find(|l| &l.id == lum_id) {
            lum.flux_multiplier *= factor;
        }
    }
    apply_delta(&mut project, &variant_to_delta(variant))?;
    Ok(project)
}

fn collect_metric_keys(rows: &[BTreeMap<String, Value>]) -> Vec<String> {
    let mut keys: BTreeSet<String> = BTreeSet::new();
    for row in rows {
        if let Some(summary) = row.get("summary").and_then(Value::as_object) {
            for (k, v) in summary {
                if v.is_number() {
                    keys.insert(k.clone());
                }
            }
        }
    }
    keys.into_iter().collect()
}

/// Run one job across the given variants and write compare artifacts.
pub fn run_job_for_variants(
    project_path: &Path,
    job_id: &str,
    variant_ids: &[String],
    baseline_variant_id: Option<&str>,
) -> Result<VariantCompareResult> {
    let project = load_project(project_path)?;
    let project_dir = project_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let variant_by_id: BTreeMap<&str, &ProjectVariant> = project
        .variants
        .iter()
        .map(|v| (v.id.as_str(), v))
        .collect();
    let missing: Vec<&String> = variant_ids
        .iter()
        .filter(|v| !variant_by_id.contains_key(v.as_str()))
        .collect();
    if !missing.is_empty() {
        return Err(LuxeraError::validation(format!(
            "unknown variant ids: {}",
            missing
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }
    if let Some(baseline) = baseline_variant_id {
        if !variant_ids.iter().any(|v| v == baseline) {
            return Err(LuxeraError::validation(
                "baseline_variant_id must be one of variant_ids",
            ));
        }
    }

    let token = format!("{}|{}", job_id, variant_ids.join("|"));
    let out_dir = results_root(&project_dir).join(format!(
        "variants_{}",
        &sha256_hex(token.as_bytes())[..16]
    ));
    fs::create_dir_all(&out_dir)?;

    let mut raw_rows: Vec<BTreeMap<String, Value>> = Vec::new();
    for vid in variant_ids {
        let variant = variant_by_id[vid.as_str()];
        let mut varied = apply_variant(&project, variant)?;
        varied.root_dir = Some(project_dir.clone());
        let reference = run_job_in_memory(&varied, job_id)?;
        let mut row = BTreeMap::new();
        row.insert("variant_id".to_string(), json!(variant.id));
        row.insert("variant_name".to_string(), json!(variant.name));
        row.insert("job_hash".to_string(), json!(reference.job_hash));
        row.insert("result_dir".to_string(), json!(reference.result_dir));
        row.insert(
            "summary".to_string(),
            Value::Object(reference.summary.clone().into_iter().collect()),
        );
        raw_rows.push(row);
    }

    let metric_keys = collect_metric_keys(&raw_rows);
    let baseline_id = baseline_variant_id
        .map(str::to_string)
        .or_else(|| variant_ids.first().cloned());
    let baseline_summary: BTreeMap<String, Value> = raw_rows
        .iter()
        .find(|r| {
            r.get("variant_id").and_then(Value::as_str) == baseline_id.as_deref()
        })
        .and_then(|r| r.get("summary"))
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let mut rows: Vec<BTreeMap<String, Value>> = Vec::new();
    for raw in &raw_rows {
        let mut line: BTreeMap<String, Value> = BTreeMap::new();
        for key in ["variant_id", "variant_name", "job_hash", "result_dir"] {
            line.insert(key.to_string(), raw.get(key).cloned().unwrap_or(Value::Null));
        }
        let summary = raw.get("summary").and_then(Value::as_object);
        for key in &metric_keys {
            let value = summary.and_then(|s| s.get(key)).cloned().unwrap_or(Value::Null);
            if let (Some(v), Some(b)) = (
                value.as_f64(),
                baseline_summary.get(key).and_then(Value::as_f64),
            ) {
                line.insert(format!("delta_{}", key), json!(v - b));
            }
            line.insert(key.clone(), value);
        }
        rows.push(line);
    }

    let compare_json = out_dir.join("variants_compare.json");
    fs::write(
        &compare_json,
        serde_json::to_string_pretty(&json!({
            "job_id": job_id,
            "variant_ids": variant_ids,
            "baseline_variant_id": baseline_id,
            "metrics": metric_keys,
            "rows": rows,
        }))?,
    )?;

    let compare_csv = out_dir.join("variants_compare.csv");
    let delta_keys: Vec<String> = metric_keys.iter().map(|k| format!("delta_{}", k)).collect();
    let mut fieldnames: Vec<String> = vec![
        "variant_id".to_string(),
        "variant_name".to_string(),
        "job_hash".to_string(),
        "result_dir".to_string(),
    ];
    fieldnames.extend(metric_keys.iter().cloned());
    fieldnames.extend(delta_keys);
    let mut csv = fieldnames.join(",");
    csv.push('\n');
    for row in &rows {
        let cells: Vec<String> = fieldnames
            .iter()
            .map(|f| match row.get(f) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            })
            .collect();
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    fs::write(&compare_csv, csv)?;

    Ok(VariantCompareResult {
        out_dir,
        compare_json,
        compare_csv,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::io::save_project;
    use crate::project::schema::{
        CalcGrid, JobSpec, LuminaireInstance, PhotometryAsset, TransformSpec,
    };

    fn two_luminaire_project() -> Project {
        let mut p = Project::new("variants");
        let mut asset = PhotometryAsset {
            id: "a1".to_string(),
            format: "IES".to_string(),
            ..Default::default()
        };
        asset.metadata.insert("lumens".to_string(), json!(1000.0));
        p.photometry_assets.push(asset);
        for (id, x) in [("l1", 1.0), ("l2", 3.0)] {
            p.luminaires.push(LuminaireInstance {
                id: id.to_string(),
                photometry_asset_id: "a1".to_string(),
                transform: TransformSpec {
                    position: (x, 1.5, 2.8),
                    ..Default::default()
                },
                maintenance_factor: 1.0,
                flux_multiplier: 1.0,
                ..Default::default()
            });
        }
        p.grids.push(CalcGrid {
            id: "g1".to_string(),
            origin: (0.0, 0.0),
            width: 4.0,
            height: 3.0,
            elevation: 0.8,
            nx: 3,
            ny: 3,
            sample_mask: vec![true; 9],
            sample_points: (0..3)
                .flat_map(|j| (0..3).map(move |i| (i as f64 * 2.0, j as f64 * 1.5, 0.8)))
                .collect(),
            ..Default::default()
        });
        p.jobs.push(JobSpec {
            id: "j1".to_string(),
            ..Default::default()
        });
        p.variants.push(ProjectVariant {
            id: "base".to_string(),
            name: "Baseline".to_string(),
            ..Default::default()
        });
        let mut dim = ProjectVariant {
            id: "dim".to_string(),
            name: "Dimmed".to_string(),
            ..Default::default()
        };
        let mut overrides = BTreeMap::new();
        overrides.insert("flux_multiplier".to_string(), 0.5);
        dim.luminaire_overrides.insert("l1".to_string(), overrides);
        p.variants.push(dim);
        p
    }

    #[test]
    fn test_apply_variant_overrides_and_dimming() {
        let base = two_luminaire_project();
        let mut variant = ProjectVariant {
            id: "v".to_string(),
            ..Default::default()
        };
        let mut overrides = BTreeMap::new();
        overrides.insert("flux_multiplier".to_string(), 0.8);
        variant.luminaire_overrides.insert("l1".to_string(), overrides);
        variant.dimming_schemes.insert("l1".to_string(), 0.5);
        let varied = apply_variant(&base, &variant).unwrap();
        // Override then dimming: 0.8 * 0.5.
        assert!((varied.luminaires[0].flux_multiplier - 0.4).abs() < 1e-12);
        assert_eq!(varied.luminaires[1].flux_multiplier, 1.0);
    }

    #[test]
    fn test_variant_compare_delta_signs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.json");
        save_project(&two_luminaire_project(), &path).unwrap();
        let result = run_job_for_variants(
            &path,
            "j1",
            &["base".to_string(), "dim".to_string()],
            Some("base"),
        )
        .unwrap();
        assert!(result.compare_json.exists());
        assert!(result.compare_csv.exists());
        let base_row = &result.rows[0];
        let dim_row = &result.rows[1];
        assert_eq!(
            base_row.get("delta_mean_lux").and_then(Value::as_f64),
            Some(0.0)
        );
        let dim_delta = dim_row.get("delta_mean_lux").and_then(Value::as_f64).unwrap();
        assert!(dim_delta < 0.0, "dimmed variant should lose mean lux");
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.json");
        save_project(&two_luminaire_project(), &path).unwrap();
        let err = run_job_for_variants(&path, "j1", &["ghost".to_string()], None).unwrap_err();
        assert!(matches!(err, LuxeraError::Validation { .. }));
    }

    #[test]
    fn test_baseline_must_be_selected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.json");
        save_project(&two_luminaire_project(), &path).unwrap();
        let err =
            run_job_for_variants(&path, "j1", &["base".to_string()], Some("dim")).unwrap_err();
        assert!(matches!(err, LuxeraError::Validation { .. }));
    }
}
