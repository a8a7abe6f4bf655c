//! Geometry kernel
//!
//! - `polygon`: 2D ring validity, repair, point-in-polygon, Boolean fallbacks
//! - `basis`: wall-local UV frames and projection
//! - `arc`: bulge-encoded circular arcs and faceting
//! - `opening_uv`: anchor-mode resolution and opening rectangles in UV
//! - `subtract`: opening subtraction (strip split / half-plane clip)
//! - `triangulate`: fan/ear-clip triangulation with documented hole fallback
//! - `bvh`: SAH bounding volume hierarchy and occlusion queries
//! - `spatial`: snapping, drawing constraints, picking
//! - `doctor`: mesh health diagnostics and repair

pub mod arc;
pub mod basis;
pub mod bvh;
pub mod doctor;
pub mod opening_uv;
pub mod polygon;
pub mod spatial;
pub mod subtract;
pub mod triangulate;

pub use basis::{lift_uv_to_3d, project_points_to_uv, wall_basis, WallBasis};
pub use bvh::{Aabb, Bvh, Triangle};
pub use polygon::{
    make_polygon_valid, point_in_polygon, polygon_intersection, polygon_union, signed_area,
    Point2, Point3,
};
pub use subtract::{subtract_openings, SubtractResult, UvPolygon};
