//! Calculation-object geometry
//!
//! - `builders`: workplane/vertical/line grids with canonical sample order
//! - `masks`: obstacle and opening-proximity sample masks

pub mod builders;
pub mod masks;

pub use builders::{
    build_vertical_grid_on_wall, build_workplane_grid, sample_line_grid, WorkplaneGridGeom,
};
pub use masks::{apply_obstacle_masks, apply_opening_proximity_mask, mask_points_by_polygons};
