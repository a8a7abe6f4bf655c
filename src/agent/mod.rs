//! Agent runtime and tool surface
//!
//! - `runtime`: intent interpretation with approval gating
//! - `tools`: the strict command-layer tool surface (depth-gated file I/O)
//! - `registry`: named, permission-tagged tool descriptions with JSON schemas
//! - `audit`: audit events appended to the project history

pub mod audit;
pub mod registry;
pub mod runtime;
pub mod tools;

pub use registry::{build_default_registry, AgentToolRegistry, PermissionTag};
pub use runtime::{AgentRuntime, Approvals, RuntimeAction, RuntimeResponse};
pub use tools::{AgentTools, ProjectDiff, ToolResult};
