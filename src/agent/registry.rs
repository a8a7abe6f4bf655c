//! Tool registry: named, permission-tagged tool descriptions
//!
//! Entries declare their parameters explicitly; `json_schemas()` emits a
//! JSON-Schema object per tool. Permission tags (`project_edit`, `run_job`,
//! `export`) gate approval requirements at the runtime layer.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::core::error::{LuxeraError, Result};

/// Permission class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionTag {
    ProjectEdit,
    RunJob,
    Export,
}

impl PermissionTag {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionTag::ProjectEdit => "project_edit",
            PermissionTag::RunJob => "run_job",
            PermissionTag::Export => "export",
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone)]
pub struct ToolParam {
    pub name: String,
    pub type_name: String,
    pub required: bool,
    pub default: Option<Value>,
}

impl ToolParam {
    pub fn required(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &str, type_name: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            required: false,
            default: Some(default),
        }
    }

    fn schema_type(&self) -> Option<&'static str> {
        match self.type_name.as_str() {
            "str" | "path" => Some("string"),
            "float" => Some("number"),
            "int" => Some("integer"),
            "bool" => Some("boolean"),
            "list" => Some("array"),
            "dict" => Some("object"),
            // Complex in-memory types (Project, ProjectDiff) have no wire type.
            _ => None,
        }
    }
}

/// A registered tool description.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub params: Vec<ToolParam>,
    pub permission_tag: PermissionTag,
}

/// The named tool surface.
#[derive(Debug, Default)]
pub struct AgentToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
}

impl AgentToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, params: Vec<ToolParam>, permission_tag: PermissionTag) {
        self.tools.insert(
            name.to_string(),
            ToolSpec {
                name: name.to_string(),
                params,
                permission_tag,
            },
        );
    }

    pub fn get(&self, name: &str) -> Result<&ToolSpec> {
        self.tools
            .get(name)
            .ok_or_else(|| LuxeraError::tool(format!("tool not registered: {}", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Whether a tool's permission tag requires human approval.
    pub fn requires_approval(&self, name: &str) -> Result<bool> {
        Ok(matches!(
            self.get(name)?.permission_tag,
            PermissionTag::RunJob | PermissionTag::ProjectEdit
        ))
    }

    /// Tool name -> {schema, permission_tag}.
    pub fn describe(&self) -> BTreeMap<String, Value> {
        self.tools
            .iter()
            .map(|(name, spec)| {
                (
                    name.clone(),
                    json!({
                        "permission_tag": spec.permission_tag.as_str(),
                        "params": spec.params.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
                    }),
                )
            })
            .collect()
    }

    /// Emit a JSON-Schema object per tool from the declared parameters.
    pub fn json_schemas(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (name, spec) in &self.tools {
            let mut props = serde_json::Map::new();
            let mut required: Vec<String> = Vec::new();
            for param in &spec.params {
                let mut prop = serde_json::Map::new();
                if let Some(t) = param.schema_type() {
                    prop.insert("type".to_string(), json!(t));
                }
                if let Some(default) = &param.default {
                    prop.insert("default".to_string(), default.clone());
                }
                if param.required {
                    required.push(param.name.clone());
                }
                props.insert(param.name.clone(), Value::Object(prop));
            }
            required.sort();
            out.insert(
                name.clone(),
                json!({
                    "type": "object",
                    "title": name,
                    "additionalProperties": false,
                    "properties": props,
                    "required": required,
                }),
            );
        }
        out
    }
}

/// The default tool surface exposed to the runtime.
pub fn build_default_registry() -> AgentToolRegistry {
    let mut registry = AgentToolRegistry::new();
    registry.register(
        "project.open",
        vec![ToolParam::required("project_path", "path")],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "project.save",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("project_path", "path"),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "context.load",
        vec![ToolParam::required("project_path", "path")],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "context.update",
        vec![
            ToolParam::required("project_path", "path"),
            ToolParam::required("memory", "dict"),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "session.save",
        vec![
            ToolParam::required("project_path", "path"),
            ToolParam::required("runtime_id", "str"),
            ToolParam::required("payload", "dict"),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "project.validate",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::optional("job_id", "str", Value::Null),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "geom.import",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("file_path", "str"),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "geom.clean",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::optional("detect_rooms", "bool", json!(true)),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "project.grid.add",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("name", "str"),
            ToolParam::required("width", "float"),
            ToolParam::required("height", "float"),
            ToolParam::optional("elevation", "float", json!(0.8)),
            ToolParam::required("nx", "int"),
            ToolParam::required("ny", "int"),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "project.diff.propose_layout",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("target_lux", "float"),
            ToolParam::optional("max_rows", "int", json!(6)),
            ToolParam::optional("max_cols", "int", json!(6)),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "project.diff.apply",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("diff", "ProjectDiff"),
            ToolParam::optional("approved", "bool", json!(false)),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "job.run",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("job_id", "str"),
            ToolParam::optional("approved", "bool", json!(false)),
        ],
        PermissionTag::RunJob,
    );
    registry.register(
        "results.summarize",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("job_id", "str"),
        ],
        PermissionTag::ProjectEdit,
    );
    registry.register(
        "variant.compare",
        vec![
            ToolParam::required("project_path", "path"),
            ToolParam::required("job_id", "str"),
            ToolParam::required("variant_ids", "list"),
            ToolParam::optional("baseline_variant_id", "str", Value::Null),
        ],
        PermissionTag::RunJob,
    );
    registry.register(
        "report.bundle",
        vec![
            ToolParam::required("project", "Project"),
            ToolParam::required("job_id", "str"),
            ToolParam::required("out_path", "str"),
        ],
        PermissionTag::Export,
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_has_core_tools() {
        let registry = build_default_registry();
        for name in [
            "project.open",
            "job.run",
            "project.diff.apply",
            "session.save",
            "variant.compare",
        ] {
            assert!(registry.get(name).is_ok(), "missing tool {}", name);
        }
    }

    #[test]
    fn test_unknown_tool_rejected() {
        let registry = build_default_registry();
        assert!(registry.get("teleport").is_err());
    }

    #[test]
    fn test_json_schema_shape() {
        let registry = build_default_registry();
        let schemas = registry.json_schemas();
        let run = &schemas["job.run"];
        assert_eq!(run["type"], "object");
        assert_eq!(run["title"], "job.run");
        assert_eq!(run["additionalProperties"], false);
        let required: Vec<&str> = run["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(required.contains(&"job_id"));
        assert!(!required.contains(&"approved"));
        assert_eq!(run["properties"]["approved"]["default"], false);
        assert_eq!(run["properties"]["job_id"]["type"], "string");
        // Project is an in-memory type with no wire schema.
        assert!(run["properties"]["project"].get("type").is_none());
    }

    #[test]
    fn test_permission_tags_gate_approval() {
        let registry = build_default_registry();
        assert!(registry.requires_approval("job.run").unwrap());
        assert!(registry.requires_approval("project.diff.apply").unwrap());
        assert!(!registry.requires_approval("report.bundle").unwrap());
    }
}
