//! Project state and persistence
//!
//! - `schema`: the aggregate of all entities
//! - `io`: atomic save/load and schema migration
//! - `selection`: live selection-set queries and rebuild remapping
//! - `variants`: variant compare over the runner
//! - `presets`: small built-in starting projects

pub mod io;
pub mod presets;
pub mod schema;
pub mod selection;
pub mod variants;

pub use io::{load_project, migrate_project, results_root, save_project};
pub use schema::Project;
pub use selection::{refresh_selection_sets, remap_selection_sets};
pub use variants::{apply_variant, run_job_for_variants};
