//! Agent runtime: intent interpretation with approval gating
//!
//! The runtime is a stateless request handler. It parses the intent string
//! for keywords (several may be active at once), proposes diffs through the
//! tool surface, applies them only under explicit approvals, and never
//! claims compliance without an executed result. Every request writes a
//! session artifact and appends an audit event — all through tool calls.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde_json::{json, Value};

use crate::agent::audit::append_audit_event;
use crate::agent::registry::{build_default_registry, AgentToolRegistry};
use crate::agent::tools::{AgentTools, ProjectDiff};
use crate::core::error::Result;
use crate::core::identity::sha256_hex;

/// An action the runtime proposes or performs.
#[derive(Debug, Clone)]
pub struct RuntimeAction {
    pub kind: String,
    pub requires_approval: bool,
    pub payload: Value,
}

impl RuntimeAction {
    fn to_value(&self) -> Value {
        json!({
            "kind": self.kind,
            "requires_approval": self.requires_approval,
            "payload": self.payload,
        })
    }
}

/// Response of one runtime request.
#[derive(Debug, Default)]
pub struct RuntimeResponse {
    pub plan: String,
    pub diff_preview: Value,
    pub run_manifest: BTreeMap<String, Value>,
    pub actions: Vec<RuntimeAction>,
    pub produced_artifacts: Vec<String>,
    pub warnings: Vec<String>,
    pub compliance_claimed: bool,
}

/// Approvals passed alongside an intent.
#[derive(Debug, Clone, Default)]
pub struct Approvals {
    pub apply_diff: bool,
    pub run_job: bool,
    /// When set, only the listed diff-op keys are applied.
    pub selected_diff_ops: Option<Vec<String>>,
}

/// The stateless intent-interpreting runtime.
pub struct AgentRuntime {
    tools: AgentTools,
    registry: AgentToolRegistry,
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRuntime {
    pub fn new() -> Self {
        Self {
            tools: AgentTools::new(),
            registry: build_default_registry(),
        }
    }

    pub fn registry(&self) -> &AgentToolRegistry {
        &self.registry
    }

    fn deterministic_id(project_name: &str, intent: &str) -> String {
        sha256_hex(format!("{}\n{}", project_name, intent.trim().to_lowercase()).as_bytes())[..16]
            .to_string()
    }

    fn numeric_tokens(intent: &str) -> Vec<f64> {
        let re = Regex::new(r"-?\d+(?:\.\d+)?").expect("static regex");
        re.find_iter(intent)
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .collect()
    }

    fn path_after_keyword(intent: &str, keyword: &str) -> Option<String> {
        let tokens: Vec<&str> = intent.split_whitespace().collect();
        tokens
            .iter()
            .position(|t| t.eq_ignore_ascii_case(keyword))
            .and_then(|i| tokens.get(i + 1))
            .map(|s| s.to_string())
    }

    fn diff_op_key(index: usize, op: &crate::agent::tools::DiffOp) -> String {
        format!("{}:{}:{}:{}", index, op.op, op.kind, op.id)
    }

    fn diff_preview(diff: &ProjectDiff) -> Value {
        let ops: Vec<Value> = diff
            .ops
            .iter()
            .enumerate()
            .map(|(i, op)| {
                let fields: Vec<String> = op
                    .payload
                    .as_object()
                    .map(|m| m.keys().cloned().collect())
                    .unwrap_or_default();
                json!({
                    "key": Self::diff_op_key(i, op),
                    "index": i,
                    "op": op.op,
                    "kind": op.kind,
                    "id": op.id,
                    "payload_fields": fields,
                })
            })
            .collect();
        json!({"ops": ops, "count": diff.ops.len()})
    }

    fn filtered_diff(diff: ProjectDiff, selected: &Option<Vec<String>>) -> ProjectDiff {
        match selected {
            None => diff,
            Some(keys) => ProjectDiff {
                ops: diff
                    .ops
                    .into_iter()
                    .enumerate()
                    .filter(|(i, op)| keys.contains(&Self::diff_op_key(*i, op)))
                    .map(|(_, op)| op)
                    .collect(),
            },
        }
    }

    /// Handle one intent against a project file.
    pub fn execute(
        &self,
        project_path: &Path,
        intent: &str,
        approvals: &Approvals,
    ) -> Result<RuntimeResponse> {
        let (mut project, ppath) = self.tools.open_project(project_path)?;
        let mut memory = self.tools.load_context_memory(&ppath);
        let lintent = intent.trim().to_lowercase();
        let mut response = RuntimeResponse {
            plan: "Interpret intent, propose diff if needed, require approvals for apply/run, \
                   and produce artifacts."
                .to_string(),
            diff_preview: json!({"ops": [], "count": 0}),
            ..Default::default()
        };
        let mut tool_calls: Vec<Value> = Vec::new();
        let runtime_id = Self::deterministic_id(&project.name, intent);
        response
            .run_manifest
            .insert("runtime_id".to_string(), json!(runtime_id));
        response
            .run_manifest
            .insert("intent".to_string(), json!(intent));
        response
            .run_manifest
            .insert("project".to_string(), json!(project.name));

        // Import: command style `import <path>`.
        if lintent.contains("import") {
            match Self::path_after_keyword(intent, "import") {
                Some(file_path) => {
                    let result = self.tools.import_geometry(&mut project, &file_path);
                    tool_calls.push(json!({"tool": "geom.import", "file_path": file_path}));
                    if !result.ok {
                        response.warnings.push(result.message);
                    }
                }
                None => response
                    .warnings
                    .push("Import intent requires a file path.".to_string()),
            }
        }

        if lintent.contains("detect rooms") || lintent.contains("clean geometry") {
            let result = self.tools.clean_geometry(&mut project, true);
            tool_calls.push(json!({"tool": "geom.clean", "detect_rooms": true}));
            if !result.ok {
                response.warnings.push(result.message);
            }
        }

        if lintent.starts_with("/grid") || lintent.contains("grid") {
            let nums = Self::numeric_tokens(&lintent);
            let elevation = nums.first().copied().unwrap_or(0.8);
            let spacing = nums.get(1).copied().unwrap_or(0.25).max(0.1);
            let (width, height) = project
                .geometry
                .rooms
                .first()
                .map(|r| (r.width, r.length))
                .unwrap_or((6.0, 8.0));
            let nx = ((width / spacing).round() as usize + 1).max(2);
            let ny = ((height / spacing).round() as usize + 1).max(2);
            let result = self
                .tools
                .add_grid(&mut project, "Agent Grid", width, height, elevation, nx, ny);
            tool_calls.push(json!({
                "tool": "project.grid.add", "elevation": elevation,
                "spacing": spacing, "nx": nx, "ny": ny,
            }));
            if !result.ok {
                response.warnings.push(result.message);
            }
        }

        // Layout placement and the optimizer both propose luminaire diffs.
        let wants_layout = lintent.contains("place")
            || lintent.contains("layout")
            || (lintent.contains("hit") && lintent.contains("lux"));
        let wants_optimize = lintent.contains("optimize") || lintent.contains("optimizer");
        if wants_layout || wants_optimize {
            let mut target = memory
                .get("preferred_target_lux")
                .and_then(Value::as_f64)
                .unwrap_or(500.0);
            for n in Self::numeric_tokens(&lintent) {
                if n > 0.0 {
                    target = n;
                }
            }
            memory.insert("preferred_target_lux".to_string(), json!(target));
            let bound = if wants_optimize { 8 } else { 6 };
            match self.tools.propose_layout_diff(&project, target, bound, bound) {
                Ok((diff, result)) => {
                    tool_calls.push(json!({
                        "tool": "project.diff.propose_layout",
                        "target_lux": target,
                        "mode": if wants_optimize { "optimizer" } else { "layout" },
                    }));
                    response.diff_preview = Self::diff_preview(&diff);
                    response.actions.push(RuntimeAction {
                        kind: "apply_diff".to_string(),
                        requires_approval: true,
                        payload: json!({"op_count": diff.ops.len()}),
                    });
                    if !result.ok {
                        response.warnings.push(result.message);
                    }
                    if approvals.apply_diff {
                        let selected = Self::filtered_diff(diff, &approvals.selected_diff_ops);
                        let applied = self.tools.apply_diff(&mut project, &selected, true);
                        tool_calls.push(json!({
                            "tool": "project.diff.apply",
                            "approved": true,
                            "selected_ops": selected.ops.len(),
                        }));
                        if !applied.ok {
                            response.warnings.push(applied.message);
                        }
                    }
                }
                Err(e) => response.warnings.push(e.to_string()),
            }
        }

        if lintent.contains("run") {
            let mut job_id = project.jobs.first().map(|j| j.id.clone()).unwrap_or_default();
            let tokens: Vec<&str> = lintent.split_whitespace().collect();
            for (i, t) in tokens.iter().enumerate() {
                if *t == "job" {
                    if let Some(next) = tokens.get(i + 1) {
                        job_id = next.to_string();
                    }
                }
            }
            if job_id.is_empty() {
                response.warnings.push("No job found to run.".to_string());
            } else {
                response.actions.push(RuntimeAction {
                    kind: "run_job".to_string(),
                    requires_approval: true,
                    payload: json!({"job_id": job_id}),
                });
                if approvals.run_job {
                    let result = self.tools.run_job(&mut project, &job_id, true);
                    tool_calls.push(json!({"tool": "job.run", "job_id": job_id, "approved": true}));
                    if result.ok {
                        if let Some(dir) = result.data.get("result_dir").and_then(Value::as_str) {
                            response.produced_artifacts.push(dir.to_string());
                        }
                        response.run_manifest.insert(
                            "run_result".to_string(),
                            Value::Object(result.data.clone().into_iter().collect()),
                        );
                    } else {
                        response.warnings.push(result.message);
                    }
                }
            }
        }

        if lintent.contains("summarize") || lintent.contains("summary") {
            if let Some(reference) = project.results.last() {
                let job_id = reference.job_id.clone();
                let result = self.tools.summarize_results(&project, &job_id);
                tool_calls.push(json!({"tool": "results.summarize", "job_id": job_id}));
                if result.ok {
                    response.run_manifest.insert(
                        "latest_summary".to_string(),
                        result.data.get("summary").cloned().unwrap_or(Value::Null),
                    );
                } else {
                    response.warnings.push(result.message);
                }
            }
        }

        if lintent.contains("report") || lintent.contains("heatmap") || lintent.contains("client") {
            if project.results.is_empty() {
                response
                    .warnings
                    .push("Cannot export report: no job results available.".to_string());
            } else {
                // Rendering templates are external; expose the export action.
                response.actions.push(RuntimeAction {
                    kind: "export_report".to_string(),
                    requires_approval: false,
                    payload: json!({
                        "job_id": project.results.last().map(|r| r.job_id.clone()),
                        "kind": if lintent.contains("client") { "client_bundle" } else { "report" },
                    }),
                });
            }
        }

        // Compliance guardrail: never claim compliance without an executed
        // result whose summary carries a compliance verdict.
        if lintent.contains("compliance") {
            response.compliance_claimed = false;
            if project.results.is_empty() {
                response
                    .warnings
                    .push("Compliance cannot be declared without running jobs.".to_string());
                if let Some(job) = project.jobs.first() {
                    response.actions.push(RuntimeAction {
                        kind: "run_job".to_string(),
                        requires_approval: true,
                        payload: json!({"job_id": job.id, "reason": "compliance_assistant"}),
                    });
                }
            } else if let Some(latest) = project.results.last() {
                response.run_manifest.insert(
                    "compliance_source_job".to_string(),
                    json!(latest.job_id),
                );
                let verdict = latest.summary.get("compliance").cloned().unwrap_or(Value::Null);
                if let Some(text) = verdict.as_str() {
                    response.compliance_claimed = true;
                    if text.contains("NON-COMPLIANT") {
                        response.warnings.push(
                            "Latest result is non-compliant; proposing corrective layout diff."
                                .to_string(),
                        );
                    }
                }
                response
                    .run_manifest
                    .insert("compliance_summary".to_string(), verdict);
            }
        }

        // Session artifact + audit event, both through tool calls.
        let actions_value: Vec<Value> = response.actions.iter().map(RuntimeAction::to_value).collect();
        let artifact = json!({
            "runtime_id": runtime_id,
            "intent": intent,
            "plan": response.plan,
            "tool_calls": tool_calls,
            "actions": actions_value,
            "warnings": response.warnings,
        });
        let saved = self
            .tools
            .save_session_artifact(&ppath, &runtime_id, &artifact);
        if saved.ok {
            if let Some(path) = saved.data.get("path").and_then(Value::as_str) {
                response.produced_artifacts.push(path.to_string());
            }
        }
        append_audit_event(
            &mut project,
            "agent.runtime.execute",
            &response.plan,
            tool_calls,
            response.produced_artifacts.clone(),
            response.warnings.clone(),
            json!({"runtime_id": runtime_id, "intent": intent}),
        );
        self.tools.save_project(&project, &ppath);
        self.tools.save_context_memory(&ppath, &memory);

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::io::save_project;
    use crate::project::presets::rectangular_office;

    fn project_on_disk(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("proj.json");
        save_project(&rectangular_office("agent_demo"), &path).unwrap();
        path
    }

    #[test]
    fn test_compliance_refused_without_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_on_disk(dir.path());
        let runtime = AgentRuntime::new();
        let response = runtime
            .execute(&path, "check compliance", &Approvals::default())
            .unwrap();
        assert!(!response.compliance_claimed);
        assert!(response
            .warnings
            .iter()
            .any(|w| w.contains("Compliance cannot be declared without running jobs")));
        let run_action = response
            .actions
            .iter()
            .find(|a| a.kind == "run_job")
            .expect("run_job action proposed");
        assert!(run_action.requires_approval);
    }

    #[test]
    fn test_run_gated_until_approved() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_on_disk(dir.path());
        let runtime = AgentRuntime::new();

        let gated = runtime
            .execute(&path, "run the job", &Approvals::default())
            .unwrap();
        assert!(gated.produced_artifacts.iter().all(|a| !a.contains("results")));
        assert!(gated.actions.iter().any(|a| a.kind == "run_job"));

        let approved = runtime
            .execute(
                &path,
                "run the job",
                &Approvals {
                    run_job: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(approved
            .produced_artifacts
            .iter()
            .any(|a| a.contains("results")));
        assert!(approved.run_manifest.contains_key("run_result"));
    }

    #[test]
    fn test_layout_proposes_diff_without_applying() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_on_disk(dir.path());
        let runtime = AgentRuntime::new();
        let response = runtime
            .execute(&path, "place luminaires to hit 500 lux", &Approvals::default())
            .unwrap();
        assert!(response.diff_preview["count"].as_u64().unwrap() > 0);
        // Without approval the project on disk keeps its original luminaires.
        let reloaded = crate::project::io::load_project(&path).unwrap();
        assert_eq!(reloaded.luminaires.len(), 1);
    }

    #[test]
    fn test_session_artifact_written_every_turn() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_on_disk(dir.path());
        let runtime = AgentRuntime::new();
        let response = runtime.execute(&path, "summarize", &Approvals::default()).unwrap();
        let artifact = response
            .produced_artifacts
            .iter()
            .find(|a| a.contains("agent_sessions"))
            .expect("session artifact path");
        assert!(Path::new(artifact).exists());
        let reloaded = crate::project::io::load_project(&path).unwrap();
        assert!(reloaded
            .agent_history
            .iter()
            .any(|e| e["action"] == "agent.runtime.execute"));
    }

    #[test]
    fn test_memory_persists_target_lux() {
        let dir = tempfile::tempdir().unwrap();
        let path = project_on_disk(dir.path());
        let runtime = AgentRuntime::new();
        runtime
            .execute(&path, "layout for 750 lux", &Approvals::default())
            .unwrap();
        let memory = runtime.tools.load_context_memory(&path);
        assert_eq!(memory["preferred_target_lux"], json!(750.0));
    }

    #[test]
    fn test_runtime_id_deterministic() {
        assert_eq!(
            AgentRuntime::deterministic_id("p", "Run Job"),
            AgentRuntime::deterministic_id("p", "run job")
        );
        assert_ne!(
            AgentRuntime::deterministic_id("p", "a"),
            AgentRuntime::deterministic_id("p", "b")
        );
    }
}
