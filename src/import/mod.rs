//! Import pipeline
//!
//! - `neutral`: the normalized container format parsers yield
//! - `axis`: axis conventions and conversion matrices
//! - `pipeline`: the staged, severity-gated intake

pub mod axis;
pub mod neutral;
pub mod pipeline;

pub use axis::{AxisConvention, Handedness, UpAxis};
pub use neutral::NeutralDocument;
pub use pipeline::{
    run_import_pipeline, ImportOptions, ImportPipelineReport, ImportPipelineResult, Severity,
};
