//! Agent audit events
//!
//! Events append to `project.agent_history` and persist with the project.
//! `created_at` is informational only; it is excluded from content hashing
//! along with the rest of the history.

use chrono::Utc;
use serde_json::{json, Value};

use crate::core::identity::{sha256_hex};
use crate::project::schema::Project;

/// Append an agent audit event and return its id.
pub fn append_audit_event(
    project: &mut Project,
    action: &str,
    plan: &str,
    tool_calls: Vec<Value>,
    artifacts: Vec<String>,
    warnings: Vec<String>,
    metadata: Value,
) -> String {
    // Deterministic event id from action + current history length.
    let event_id = sha256_hex(
        format!("{}#{}", action, project.agent_history.len()).as_bytes(),
    )[..16]
        .to_string();
    project.agent_history.push(json!({
        "id": event_id,
        "created_at": Utc::now().to_rfc3339(),
        "action": action,
        "plan": plan,
        "tool_calls": tool_calls,
        "artifacts": artifacts,
        "warnings": warnings,
        "metadata": metadata,
    }));
    event_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_appended_with_fields() {
        let mut p = Project::new("t");
        let id = append_audit_event(
            &mut p,
            "agent.runtime.execute",
            "plan text",
            vec![json!({"tool": "run_job"})],
            vec!["out/result".to_string()],
            vec![],
            json!({"runtime_id": "abc"}),
        );
        assert_eq!(p.agent_history.len(), 1);
        let event = &p.agent_history[0];
        assert_eq!(event["id"], Value::String(id));
        assert_eq!(event["action"], "agent.runtime.execute");
        assert_eq!(event["metadata"]["runtime_id"], "abc");
    }

    #[test]
    fn test_event_does_not_change_content_hash() {
        let mut p = Project::new("t");
        let h0 = p.content_hash();
        append_audit_event(&mut p, "a", "p", vec![], vec![], vec![], json!({}));
        assert_eq!(p.content_hash(), h0);
    }
}
