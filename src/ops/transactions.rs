//! Transaction manager: begin/commit/rollback, grouping, undo/redo
//!
//! Each commit diffs the current project against the snapshot taken at
//! `begin`, so the delta is correct regardless of how many intermediate
//! writes the mutation performed. A project has at most one active
//! transaction and at most one active group; undo/redo require neither.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::core::error::{LuxeraError, Result};
use crate::ops::delta::{apply_delta, invert, Delta};
use crate::ops::diff::diff_project;
use crate::project::schema::Project;

/// A committed transaction with its delta and hash bracket.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub op_name: String,
    pub args: Value,
    pub delta: Delta,
    pub before_hash: String,
    pub after_hash: String,
    pub group_id: Option<String>,
    pub grouped_ops: Vec<String>,
}

struct ActiveTransaction {
    op_name: String,
    args: Value,
    before: Value,
}

struct ActiveGroup {
    group_id: String,
    args: Value,
    before: Value,
    records: Vec<TransactionRecord>,
}

/// Extra metadata a commit can attach (from a rebuild result).
#[derive(Debug, Clone, Default)]
pub struct CommitMeta {
    pub stable_id_map: Option<BTreeMap<String, Vec<String>>>,
    pub attachment_remap: Option<BTreeMap<String, String>>,
    pub derived_regen_summary: Option<BTreeMap<String, Value>>,
}

/// Per-project transaction manager.
#[derive(Default)]
pub struct TransactionManager {
    active: Option<ActiveTransaction>,
    group: Option<ActiveGroup>,
    undo_stack: Vec<TransactionRecord>,
    redo_stack: Vec<TransactionRecord>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_group_active(&self) -> bool {
        self.group.is_some()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Snapshot the project and open a transaction.
    pub fn begin(&mut self, project: &Project, op_name: &str, args: Value) -> Result<()> {
        if self.active.is_some() {
            return Err(LuxeraError::transaction("transaction already active"));
        }
        self.active = Some(ActiveTransaction {
            op_name: op_name.to_string(),
            args,
            before: project.to_value(),
        });
        Ok(())
    }

    /// Open a transaction group; subsequent commits collect into it.
    pub fn begin_group(&mut self, project: &Project, group_id: &str, args: Value) -> Result<()> {
        if self.group.is_some() {
            return Err(LuxeraError::transaction("transaction group already active"));
        }
        self.group = Some(ActiveGroup {
            group_id: group_id.to_string(),
            args,
            before: project.to_value(),
            records: Vec::new(),
        });
        Ok(())
    }

    /// Close the group into a single merged record pushed to undo.
    pub fn end_group(
        &mut self,
        project: &Project,
        before_hash: &str,
        after_hash: &str,
    ) -> Result<Option<TransactionRecord>> {
        let grp = self
            .group
            .take()
            .ok_or_else(|| LuxeraError::transaction("no active transaction group"))?;
        if grp.records.is_empty() {
            return Ok(None);
        }
        let after = project.to_value();
        let mut delta = diff_project(&grp.before, &after);

        // Merge metadata from the grouped records.
        let mut stable: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut attach: BTreeMap<String, String> = BTreeMap::new();
        let mut regen_ids: BTreeSet<String> = BTreeSet::new();
        for r in &grp.records {
            stable.extend(r.delta.stable_id_map.clone());
            attach.extend(r.delta.attachment_remap.clone());
            if let Some(ids) = r
                .delta
                .derived_regen_summary
                .get("regenerated_ids")
                .and_then(Value::as_array)
            {
                for id in ids {
                    if let Some(s) = id.as_str() {
                        regen_ids.insert(s.to_string());
                    }
                }
            }
        }
        delta.stable_id_map = stable;
        delta.attachment_remap = attach;
        delta.derived_regen_summary.insert(
            "regenerated_ids".to_string(),
            Value::Array(regen_ids.iter().cloned().map(Value::String).collect()),
        );
        delta.derived_regen_summary.insert(
            "count".to_string(),
            Value::Number(regen_ids.len().into()),
        );
        delta.derived_regen_summary.insert(
            "group_id".to_string(),
            Value::String(grp.group_id.clone()),
        );

        let record = TransactionRecord {
            op_name: grp.group_id.clone(),
            args: grp.args,
            delta,
            before_hash: before_hash.to_string(),
            after_hash: after_hash.to_string(),
            group_id: Some(grp.group_id),
            grouped_ops: grp.records.iter().map(|r| r.op_name.clone()).collect(),
        };
        self.undo_stack.push(record.clone());
        self.redo_stack.clear();
        Ok(Some(record))
    }

    /// Diff against the begin snapshot and commit. Inside a group the record
    /// collects into the group instead of the undo stack.
    pub fn commit(
        &mut self,
        project: &Project,
        before_hash: &str,
        after_hash: &str,
        meta: CommitMeta,
    ) -> Result<TransactionRecord> {
        let active = self
            .active
            .take()
            .ok_or_else(|| LuxeraError::transaction("no active transaction"))?;
        let after = project.to_value();
        let mut delta = diff_project(&active.before, &after);
        if let Some(stable) = meta.stable_id_map {
            delta.stable_id_map = stable;
        }
        if let Some(attach) = meta.attachment_remap {
            delta.attachment_remap = attach;
        }
        if let Some(regen) = meta.derived_regen_summary {
            delta.derived_regen_summary = regen;
        }
        let record = TransactionRecord {
            op_name: active.op_name,
            args: active.args,
            delta,
            before_hash: before_hash.to_string(),
            after_hash: after_hash.to_string(),
            group_id: None,
            grouped_ops: Vec::new(),
        };
        if let Some(group) = &mut self.group {
            group.records.push(record.clone());
        } else {
            self.undo_stack.push(record.clone());
            self.redo_stack.clear();
        }
        Ok(record)
    }

    /// Restore the project from the begin snapshot.
    pub fn rollback(&mut self, project: &mut Project) -> Result<()> {
        let active = self
            .active
            .take()
            .ok_or_else(|| LuxeraError::transaction("no active transaction"))?;
        let restored: Project = serde_json::from_value(active.before)?;
        let root = project.root_dir.clone();
        *project = restored;
        project.root_dir = root;
        Ok(())
    }

    /// Pop the top undo record and apply its inverted delta.
    pub fn undo(&mut self, project: &mut Project) -> Result<bool> {
        if self.active.is_some() {
            return Err(LuxeraError::transaction("cannot undo inside a transaction"));
        }
        let Some(record) = self.undo_stack.pop() else {
            return Ok(false);
        };
        apply_delta(project, &invert(&record.delta))?;
        self.redo_stack.push(record);
        Ok(true)
    }

    /// Pop the top redo record and re-apply its delta.
    pub fn redo(&mut self, project: &mut Project) -> Result<bool> {
        if self.active.is_some() {
            return Err(LuxeraError::transaction("cannot redo inside a transaction"));
        }
        let Some(record) = self.redo_stack.pop() else {
            return Ok(false);
        };
        apply_delta(project, &record.delta)?;
        self.undo_stack.push(record);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::MaterialSpec;
    use serde_json::json;

    fn add_material(project: &mut Project, id: &str, reflectance: f64) {
        project.materials.push(MaterialSpec {
            id: id.to_string(),
            reflectance,
            ..Default::default()
        });
    }

    #[test]
    fn test_begin_commit_produces_delta() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        txm.begin(&project, "add_material", json!({})).unwrap();
        add_material(&mut project, "m1", 0.5);
        let rec = txm
            .commit(&project, "h0", "h1", CommitMeta::default())
            .unwrap();
        assert_eq!(rec.delta.created.len(), 1);
        assert_eq!(txm.undo_depth(), 1);
    }

    #[test]
    fn test_nested_begin_fails() {
        let project = Project::new("t");
        let mut txm = TransactionManager::new();
        txm.begin(&project, "a", json!({})).unwrap();
        assert!(txm.begin(&project, "b", json!({})).is_err());
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        let hash_before = project.content_hash();
        txm.begin(&project, "a", json!({})).unwrap();
        add_material(&mut project, "m1", 0.5);
        txm.rollback(&mut project).unwrap();
        assert_eq!(project.content_hash(), hash_before);
        assert!(project.materials.is_empty());
    }

    #[test]
    fn test_undo_redo_roundtrip() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        let h0 = project.content_hash();
        txm.begin(&project, "a", json!({})).unwrap();
        add_material(&mut project, "m1", 0.5);
        txm.commit(&project, "h0", "h1", CommitMeta::default())
            .unwrap();
        let h1 = project.content_hash();

        assert!(txm.undo(&mut project).unwrap());
        assert_eq!(project.content_hash(), h0);
        assert!(txm.redo(&mut project).unwrap());
        assert_eq!(project.content_hash(), h1);
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        txm.begin(&project, "a", json!({})).unwrap();
        add_material(&mut project, "m1", 0.5);
        txm.commit(&project, "", "", CommitMeta::default()).unwrap();
        txm.undo(&mut project).unwrap();
        assert_eq!(txm.redo_depth(), 1);

        txm.begin(&project, "b", json!({})).unwrap();
        add_material(&mut project, "m2", 0.3);
        txm.commit(&project, "", "", CommitMeta::default()).unwrap();
        assert_eq!(txm.redo_depth(), 0);
    }

    #[test]
    fn test_group_merges_records() {
        let mut project = Project::new("t");
        let mut txm = TransactionManager::new();
        let h0 = project.content_hash();
        txm.begin_group(&project, "grp", json!({})).unwrap();

        txm.begin(&project, "a", json!({})).unwrap();
        add_material(&mut project, "m1", 0.5);
        txm.commit(&project, "", "", CommitMeta::default()).unwrap();

        txm.begin(&project, "b", json!({})).unwrap();
        add_material(&mut project, "m2", 0.3);
        txm.commit(&project, "", "", CommitMeta::default()).unwrap();

        // Grouped commits do not push to undo individually.
        assert_eq!(txm.undo_depth(), 0);
        let rec = txm.end_group(&project, "", "").unwrap().unwrap();
        assert_eq!(rec.grouped_ops, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(rec.delta.created.len(), 2);
        assert_eq!(txm.undo_depth(), 1);

        // One undo reverts the whole group.
        txm.undo(&mut project).unwrap();
        assert_eq!(project.content_hash(), h0);
    }

    #[test]
    fn test_nested_group_fails() {
        let project = Project::new("t");
        let mut txm = TransactionManager::new();
        txm.begin_group(&project, "g1", json!({})).unwrap();
        assert!(txm.begin_group(&project, "g2", json!({})).is_err());
    }

    #[test]
    fn test_empty_group_yields_none() {
        let project = Project::new("t");
        let mut txm = TransactionManager::new();
        txm.begin_group(&project, "g", json!({})).unwrap();
        assert!(txm.end_group(&project, "", "").unwrap().is_none());
    }
}
