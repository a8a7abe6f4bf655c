//! Parametric model layer
//!
//! - `model`: authored footprints, rooms, walls, openings, zones, slabs
//! - `identity`: deterministic derived-surface ids
//! - `graph`: the dependency DAG between param and derived entities
//! - `rebuild`: incremental regeneration with stable-ID remapping

pub mod graph;
pub mod identity;
pub mod model;
pub mod rebuild;

pub use graph::{build_param_graph, ParamGraph};
pub use model::ParamModel;
pub use rebuild::{rebuild, RebuildOptions, RebuildResult};
