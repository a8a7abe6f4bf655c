//! Project persistence: atomic save, load, schema migration
//!
//! The project file is rewritten atomically (write-to-temp + rename).
//! `migrate_project` applies ordered migrations keyed by `schema_version`.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::core::error::{LuxeraError, Result};
use crate::project::schema::{Project, SCHEMA_VERSION};

/// Apply ordered migrations to a raw project value.
pub fn migrate_project(mut data: Value) -> Value {
    let mut version = data
        .get("schema_version")
        .and_then(Value::as_u64)
        .unwrap_or(1) as u32;

    while version < SCHEMA_VERSION {
        match version {
            // v1 -> v2: param layer introduced.
            1 => {
                if data.get("param").is_none() {
                    data["param"] = json!({});
                }
            }
            // v2 -> v3: variants and active_variant_id.
            2 => {
                if data.get("variants").is_none() {
                    data["variants"] = json!([]);
                }
                if data.get("active_variant_id").is_none() {
                    data["active_variant_id"] = Value::Null;
                }
            }
            // v3 -> v4: selection sets and layers.
            3 => {
                if data.get("selection_sets").is_none() {
                    data["selection_sets"] = json!([]);
                }
                if data.get("layers").is_none() {
                    data["layers"] = json!([]);
                }
            }
            // v4 -> v5: roadway and escape-route calc targets.
            4 => {
                for key in ["roadways", "roadway_grids", "escape_routes", "glare_views"] {
                    if data.get(key).is_none() {
                        data[key] = json!([]);
                    }
                }
            }
            _ => {}
        }
        version += 1;
        data["schema_version"] = json!(version);
    }
    data
}

/// Save a project atomically next to its final path.
pub fn save_project(project: &Project, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pretty = serde_json::to_string_pretty(&crate::core::identity::canonicalize(
        &project.to_value(),
    ))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, pretty.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Load a project, migrating older schema versions.
pub fn load_project(path: &Path) -> Result<Project> {
    if !path.exists() {
        return Err(LuxeraError::ProjectNotFound {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&raw)?;
    let data = migrate_project(data);
    let mut project: Project = serde_json::from_value(data)?;
    project.root_dir = path.parent().map(Path::to_path_buf);
    Ok(project)
}

/// Content-addressed results root for a project directory.
pub fn results_root(project_dir: &Path) -> std::path::PathBuf {
    project_dir.join(".luxera").join("results")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.json");
        let mut project = Project::new("demo");
        project.name = "demo".to_string();
        save_project(&project, &path).unwrap();
        let loaded = load_project(&path).unwrap();
        assert_eq!(loaded.content_hash(), project.content_hash());
        assert_eq!(loaded.root_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_atomic_save_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proj.json");
        save_project(&Project::new("demo"), &path).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_migration_from_v1() {
        let old = json!({"schema_version": 1, "name": "legacy"});
        let migrated = migrate_project(old);
        assert_eq!(migrated["schema_version"], SCHEMA_VERSION);
        assert!(migrated["param"].is_object());
        assert!(migrated["variants"].is_array());
        assert!(migrated["escape_routes"].is_array());
        let project: Project = serde_json::from_value(migrated).unwrap();
        assert_eq!(project.name, "legacy");
    }

    #[test]
    fn test_missing_file_error() {
        let err = load_project(Path::new("/nonexistent/proj.json")).unwrap_err();
        assert!(matches!(err, LuxeraError::ProjectNotFound { .. }));
    }
}
