//! Operation facade: validated, transactional, audited mutations
//!
//! Every stateful operation runs through `execute_op`: approval gate,
//! validation, hash bracket, transaction, audit event. A failing mutation
//! rolls the project back and propagates the error. Dispatch is a closed
//! enum of op kinds with typed args (`Operation`), not string routing.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::core::error::{LuxeraError, Result};
use crate::ops::transactions::{CommitMeta, TransactionManager, TransactionRecord};
use crate::param::rebuild::RebuildResult;
use crate::project::schema::Project;

/// Who is performing an operation and under what approval state.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub user: String,
    pub source: OpSource,
    pub require_approval: bool,
    pub approved: bool,
    pub run_id: Option<String>,
}

/// Mutation source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpSource {
    Gui,
    Agent,
    Cli,
}

impl OpSource {
    pub fn as_str(self) -> &'static str {
        match self {
            OpSource::Gui => "gui",
            OpSource::Agent => "agent",
            OpSource::Cli => "cli",
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self {
            user: "system".to_string(),
            source: OpSource::Gui,
            require_approval: false,
            approved: true,
            run_id: None,
        }
    }
}

/// What a mutation produced: a result value plus an optional rebuild.
#[derive(Debug, Default)]
pub struct OpOutput {
    pub value: Value,
    pub rebuild: Option<RebuildResult>,
}

impl OpOutput {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            rebuild: None,
        }
    }

    pub fn with_rebuild(value: Value, rebuild: RebuildResult) -> Self {
        Self {
            value,
            rebuild: Some(rebuild),
        }
    }
}

fn commit_meta(rebuild: &Option<RebuildResult>) -> CommitMeta {
    match rebuild {
        None => CommitMeta::default(),
        Some(r) => {
            let mut regen: BTreeMap<String, Value> = BTreeMap::new();
            let ids: Vec<Value> = r
                .regenerated
                .iter()
                .cloned()
                .map(Value::String)
                .collect();
            regen.insert("count".to_string(), Value::Number(ids.len().into()));
            regen.insert("regenerated_ids".to_string(), Value::Array(ids));
            CommitMeta {
                stable_id_map: Some(r.stable_id_map.clone()),
                attachment_remap: Some(r.attachment_remap.clone()),
                derived_regen_summary: Some(regen),
            }
        }
    }
}

/// Append an `ops.*` audit event to the project history.
pub fn record_event(
    project: &mut Project,
    op_name: &str,
    args: Value,
    ctx: &OpContext,
    before_hash: &str,
    after_hash: &str,
) {
    project.agent_history.push(json!({
        "action": format!("ops.{}", op_name),
        "source": ctx.source.as_str(),
        "user": ctx.user,
        "run_id": ctx.run_id,
        "require_approval": ctx.require_approval,
        "approved": ctx.approved,
        "before_hash": before_hash,
        "after_hash": after_hash,
        "args": args,
    }));
}

/// Run one operation end to end.
///
/// 1. Agent-sourced unapproved operations fail with `ApprovalRequired`.
/// 2. `validate` checks structural preconditions against the pre-state.
/// 3. The mutation runs inside a transaction bracketed by content hashes.
/// 4. Commit produces the record; an audit event is appended.
/// 5. Errors in `mutate` roll the project back and propagate.
pub fn execute_op<V, M>(
    project: &mut Project,
    txm: &mut TransactionManager,
    op_name: &str,
    args: Value,
    ctx: &OpContext,
    validate: V,
    mutate: M,
) -> Result<(OpOutput, TransactionRecord)>
where
    V: FnOnce(&Project) -> Result<()>,
    M: FnOnce(&mut Project) -> Result<OpOutput>,
{
    if ctx.source == OpSource::Agent && ctx.require_approval && !ctx.approved {
        return Err(LuxeraError::ApprovalRequired {
            op_name: op_name.to_string(),
        });
    }
    validate(project)?;

    let before_hash = project.content_hash();
    txm.begin(project, op_name, args.clone())?;
    let output = match mutate(project) {
        Ok(out) => out,
        Err(err) => {
            txm.rollback(project)?;
            return Err(err);
        }
    };
    let after_hash = project.content_hash();
    let record = txm.commit(project, &before_hash, &after_hash, commit_meta(&output.rebuild))?;

    let mut event_args = args;
    if let Value::Object(ref mut map) = event_args {
        map.insert(
            "tx".to_string(),
            json!({
                "created": record.delta.created.len(),
                "updated": record.delta.updated.len(),
                "deleted": record.delta.deleted.len(),
                "param_changes": record.delta.param_changes,
                "derived_regen_summary": record.delta.derived_regen_summary,
                "stable_id_map_count": record.delta.stable_id_map.len(),
            }),
        );
    }
    record_event(project, op_name, event_args, ctx, &before_hash, &after_hash);
    Ok((output, record))
}
