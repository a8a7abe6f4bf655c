//! Luxera - deterministic lighting-design core
//!
//! This library provides the tightly coupled subsystems that make the engine
//! correct, incremental, and deterministic:
//! - a parametric geometry model with an incremental rebuild DAG
//! - a transactional operation layer with typed deltas and undo/redo
//! - a staged, severity-gated import pipeline
//! - a content-addressed calculation runner
//! - an approval-gated agent runtime over a named tool registry
//!
//! # Architecture
//!
//! This crate follows the "Library-First" pattern:
//! - **lib.rs** (this file): pure logic, no CLI concerns
//! - **bin/luxera.rs**: thin wrapper that calls the library
//!
//! GUI shells, report renderers, and file-format parsers are external
//! collaborators; they consume this crate's state and normalized data.

pub mod agent;
pub mod calc;
pub mod core;
pub mod geometry;
pub mod import;
pub mod ops;
pub mod param;
pub mod project;
pub mod runner;
pub mod scene;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export the most commonly used types.
pub use crate::core::{LuxeraError, Result};
pub use crate::ops::{OpContext, Operation, TransactionManager};
pub use crate::project::{load_project, save_project, Project};
pub use crate::runner::{run_job, CancellationToken};
