//! Audit-log replay
//!
//! Replays `ops.*` events from the audit history onto a scene graph and
//! verifies the before/after hash chain: each event's `before_hash` must
//! equal the previous event's `after_hash`. In strict mode a break is a
//! `HashMismatch` error; otherwise it is reported in the result.

use serde_json::Value;

use crate::core::error::{LuxeraError, Result};
use crate::project::schema::Project;
use crate::scene::build::build_scene_graph_from_project;
use crate::scene::graph::{SceneGraph, SceneNode};

/// Outcome of a replay pass.
#[derive(Debug)]
pub struct ReplayResult {
    pub scene_graph: SceneGraph,
    pub applied_events: usize,
    pub skipped_events: usize,
    pub hash_chain_ok: bool,
}

/// Replay the audit history onto a fresh scene graph.
pub fn replay_agent_history_to_scene_graph(
    project: &Project,
    strict_hash_chain: bool,
) -> Result<ReplayResult> {
    let mut graph = build_scene_graph_from_project(project);
    let mut applied = 0usize;
    let mut skipped = 0usize;
    let mut hash_ok = true;
    let mut prev_after: Option<String> = None;

    for (index, event) in project.agent_history.iter().enumerate() {
        let Some(action) = event.get("action").and_then(Value::as_str) else {
            skipped += 1;
            continue;
        };
        if !action.starts_with("ops.") {
            skipped += 1;
            continue;
        }
        let before = event.get("before_hash").and_then(Value::as_str);
        if let (Some(prev), Some(before)) = (&prev_after, before) {
            if prev != before {
                if strict_hash_chain {
                    return Err(LuxeraError::HashMismatch {
                        index,
                        expected: prev.clone(),
                        found: before.to_string(),
                    });
                }
                hash_ok = false;
            }
        }
        prev_after = event
            .get("after_hash")
            .and_then(Value::as_str)
            .map(str::to_string);

        let args = event.get("args").cloned().unwrap_or(Value::Null);
        if apply_event(&mut graph, action, &args) {
            applied += 1;
        } else {
            skipped += 1;
        }
    }

    Ok(ReplayResult {
        scene_graph: graph,
        applied_events: applied,
        skipped_events: skipped,
        hash_chain_ok: hash_ok,
    })
}

fn apply_event(graph: &mut SceneGraph, action: &str, args: &Value) -> bool {
    let str_arg = |key: &str| args.get(key).and_then(Value::as_str).map(str::to_string);
    match action {
        "ops.create_room" | "ops.create_room_from_footprint" => {
            if let Some(rid) = str_arg("room_id") {
                let node_id = format!("room:{}", rid);
                if !graph.has_node(&node_id) {
                    let parent = graph.has_node("group:rooms").then(|| "group:rooms".to_string());
                    let _ = graph.add_node(SceneNode::new(&node_id, &rid, "room", parent));
                }
            }
            true
        }
        "ops.create_wall_polygon" => {
            if let Some(sid) = str_arg("surface_id") {
                let node_id = format!("surface:{}", sid);
                if !graph.has_node(&node_id) {
                    let parent = str_arg("room_id")
                        .map(|r| format!("room:{}", r))
                        .filter(|p| graph.has_node(p));
                    let _ = graph.add_node(SceneNode::new(&node_id, &sid, "wall", parent));
                }
            }
            true
        }
        "ops.add_opening" | "ops.place_opening_on_wall" => {
            if let Some(oid) = str_arg("opening_id") {
                let node_id = format!("opening:{}", oid);
                if !graph.has_node(&node_id) {
                    let _ = graph.add_node(SceneNode::new(&node_id, &oid, "opening", None));
                }
            }
            true
        }
        "ops.create_calc_grid_from_room" => {
            if let Some(gid) = str_arg("grid_id") {
                let node_id = format!("grid:{}", gid);
                if !graph.has_node(&node_id) {
                    let parent = str_arg("room_id")
                        .map(|r| format!("room:{}", r))
                        .filter(|p| graph.has_node(p))
                        .or_else(|| graph.has_node("group:calcs").then(|| "group:calcs".to_string()));
                    let _ = graph.add_node(SceneNode::new(&node_id, &gid, "grid", parent));
                }
            }
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replay_applies_known_events() {
        let mut project = Project::new("t");
        project.agent_history.push(json!({
            "action": "ops.create_room",
            "args": {"room_id": "r1"},
            "before_hash": "a", "after_hash": "b",
        }));
        project.agent_history.push(json!({
            "action": "ops.create_calc_grid_from_room",
            "args": {"grid_id": "g1", "room_id": "r1"},
            "before_hash": "b", "after_hash": "c",
        }));
        let result = replay_agent_history_to_scene_graph(&project, true).unwrap();
        assert_eq!(result.applied_events, 2);
        assert!(result.hash_chain_ok);
        assert!(result.scene_graph.has_node("room:r1"));
        assert!(result.scene_graph.has_node("grid:g1"));
    }

    #[test]
    fn test_broken_chain_detected() {
        let mut project = Project::new("t");
        project.agent_history.push(json!({
            "action": "ops.create_room", "args": {"room_id": "r1"},
            "before_hash": "a", "after_hash": "b",
        }));
        project.agent_history.push(json!({
            "action": "ops.create_room", "args": {"room_id": "r2"},
            "before_hash": "WRONG", "after_hash": "c",
        }));
        let lenient = replay_agent_history_to_scene_graph(&project, false).unwrap();
        assert!(!lenient.hash_chain_ok);
        let strict = replay_agent_history_to_scene_graph(&project, true);
        assert!(matches!(strict, Err(LuxeraError::HashMismatch { .. })));
    }

    #[test]
    fn test_non_ops_events_skipped() {
        let mut project = Project::new("t");
        project
            .agent_history
            .push(json!({"action": "agent.runtime.execute"}));
        let result = replay_agent_history_to_scene_graph(&project, true).unwrap();
        assert_eq!(result.applied_events, 0);
        assert_eq!(result.skipped_events, 1);
    }
}
