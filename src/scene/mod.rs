//! Scene graph layer
//!
//! - `graph`: hierarchical transforms with cached world matrices
//! - `build`: construction from project state

pub mod build;
pub mod graph;

pub use build::build_scene_graph_from_project;
pub use graph::{SceneGraph, SceneNode};
