//! Authored parametric entities
//!
//! Plain data per the project schema. Constraints are checked at operation
//! time, not at construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::polygon::Point2;

/// Wall alignment relative to the footprint edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WallAlign {
    Inside,
    Outside,
    #[default]
    Center,
}

/// Opening kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OpeningKind {
    #[default]
    Window,
    Door,
    Void,
}

/// Rule that positions an opening's center along the host wall's U axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMode {
    #[default]
    Anchor,
    FromStartDistance,
    FromEndDistance,
    CenterAtFraction,
    NearestGridlineCenter,
    EqualSpacing,
}

/// Authored footprint: an ordered 2D ring with optional per-edge bulges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FootprintParam {
    pub id: String,
    pub polygon2d: Vec<Point2>,
    /// Stable vertex ids parallel to `polygon2d` (optional).
    #[serde(default)]
    pub vertex_ids: Vec<String>,
    /// Stable edge ids parallel to the ring's edges (optional).
    #[serde(default)]
    pub edge_ids: Vec<String>,
    /// Bulge per edge key (`"i:j"` index pair or stable edge id).
    /// 0 = straight, nonzero = circular-arc sagitta ratio.
    #[serde(default)]
    pub edge_bulges: BTreeMap<String, f64>,
}

/// Authored room referencing a footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomParam {
    pub id: String,
    pub footprint_id: String,
    pub height: f64,
    #[serde(default = "default_thickness")]
    pub wall_thickness: f64,
    #[serde(default)]
    pub wall_align_mode: WallAlign,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub origin_z: f64,
    /// Optional override footprint ring.
    #[serde(default)]
    pub polygon2d: Vec<Point2>,
}

fn default_thickness() -> f64 {
    0.2
}

/// Authored wall bound to a footprint edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallParam {
    pub id: String,
    pub room_id: String,
    /// (start, end) index into the footprint ring.
    pub edge_ref: (usize, usize),
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    #[serde(default)]
    pub align_mode: WallAlign,
    /// Optional per-wall height override.
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub name: String,
}

/// Authored wall shared between two rooms (or one room and the exterior).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedWallParam {
    pub id: String,
    pub edge_geom: (Point2, Point2),
    pub room_a: String,
    #[serde(default)]
    pub room_b: Option<String>,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    #[serde(default)]
    pub align_mode: WallAlign,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub wall_material_side_a: Option<String>,
    #[serde(default)]
    pub wall_material_side_b: Option<String>,
}

/// Authored opening hosted on a wall or shared wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningParam {
    pub id: String,
    pub wall_id: String,
    #[serde(default)]
    pub anchor_mode: AnchorMode,
    /// Fraction along the wall span for the `anchor` mode.
    #[serde(default = "default_anchor")]
    pub anchor: f64,
    #[serde(default)]
    pub from_start_distance: Option<f64>,
    #[serde(default)]
    pub from_end_distance: Option<f64>,
    #[serde(default)]
    pub center_at_fraction: Option<f64>,
    #[serde(default)]
    pub gridline_spacing: Option<f64>,
    #[serde(default)]
    pub snap_to_nearest: bool,
    #[serde(default)]
    pub spacing_group_id: Option<String>,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default = "default_sill")]
    pub sill: f64,
    #[serde(default)]
    pub kind: OpeningKind,
    #[serde(default)]
    pub visible_transmittance: Option<f64>,
    #[serde(default)]
    pub glazing_material_id: Option<String>,
    /// Authored UV polygon overriding the parametric rectangle.
    #[serde(default)]
    pub polygon2d: Vec<Point2>,
}

fn default_anchor() -> f64 {
    0.5
}
fn default_width() -> f64 {
    1.0
}
fn default_height() -> f64 {
    1.2
}
fn default_sill() -> f64 {
    0.9
}

/// Authored zone polygon inside a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ZoneParam {
    pub id: String,
    pub room_id: String,
    #[serde(default)]
    pub polygon2d: Vec<Point2>,
    #[serde(default)]
    pub holes2d: Vec<Vec<Point2>>,
    #[serde(default)]
    pub rule_pack_id: Option<String>,
}

/// Authored slab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabParam {
    pub id: String,
    pub room_id: String,
    #[serde(default = "default_thickness")]
    pub thickness: f64,
    #[serde(default)]
    pub elevation: f64,
}

/// The full authored layer of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParamModel {
    #[serde(default)]
    pub footprints: Vec<FootprintParam>,
    #[serde(default)]
    pub rooms: Vec<RoomParam>,
    #[serde(default)]
    pub walls: Vec<WallParam>,
    #[serde(default)]
    pub shared_walls: Vec<SharedWallParam>,
    #[serde(default)]
    pub openings: Vec<OpeningParam>,
    #[serde(default)]
    pub slabs: Vec<SlabParam>,
    #[serde(default)]
    pub zones: Vec<ZoneParam>,
}

impl OpeningParam {
    /// Minimal constructor used by operations and tests.
    pub fn new(id: &str, wall_id: &str) -> Self {
        Self {
            id: id.to_string(),
            wall_id: wall_id.to_string(),
            anchor_mode: AnchorMode::Anchor,
            anchor: default_anchor(),
            from_start_distance: None,
            from_end_distance: None,
            center_at_fraction: None,
            gridline_spacing: None,
            snap_to_nearest: false,
            spacing_group_id: None,
            width: default_width(),
            height: default_height(),
            sill: default_sill(),
            kind: OpeningKind::Window,
            visible_transmittance: None,
            glazing_material_id: None,
            polygon2d: Vec::new(),
        }
    }
}

impl FootprintParam {
    /// Bulge for edge (i0, i1), resolved through stable edge ids first.
    pub fn edge_bulge(&self, i0: usize, i1: usize) -> f64 {
        if i0 < self.edge_ids.len() {
            if let Some(b) = self.edge_bulges.get(&self.edge_ids[i0]) {
                return *b;
            }
        }
        self.edge_bulges
            .get(&format!("{}:{}", i0, i1))
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_defaults() {
        let op = OpeningParam::new("o1", "w1");
        assert_eq!(op.anchor, 0.5);
        assert_eq!(op.width, 1.0);
        assert_eq!(op.kind, OpeningKind::Window);
        assert_eq!(op.anchor_mode, AnchorMode::Anchor);
    }

    #[test]
    fn test_edge_bulge_lookup_by_index_key() {
        let mut fp = FootprintParam {
            id: "f1".to_string(),
            polygon2d: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0), (0.0, 3.0)],
            ..Default::default()
        };
        fp.edge_bulges.insert("0:1".to_string(), 0.25);
        assert_eq!(fp.edge_bulge(0, 1), 0.25);
        assert_eq!(fp.edge_bulge(1, 2), 0.0);
    }

    #[test]
    fn test_edge_bulge_prefers_stable_edge_id() {
        let mut fp = FootprintParam {
            id: "f1".to_string(),
            polygon2d: vec![(0.0, 0.0), (4.0, 0.0), (4.0, 3.0)],
            edge_ids: vec!["e0".to_string(), "e1".to_string(), "e2".to_string()],
            ..Default::default()
        };
        fp.edge_bulges.insert("e0".to_string(), 0.5);
        fp.edge_bulges.insert("0:1".to_string(), 0.1);
        assert_eq!(fp.edge_bulge(0, 1), 0.5);
    }

    #[test]
    fn test_anchor_mode_serde_names() {
        let j = serde_json::to_string(&AnchorMode::NearestGridlineCenter).unwrap();
        assert_eq!(j, "\"nearest_gridline_center\"");
        let back: AnchorMode = serde_json::from_str("\"equal_spacing\"").unwrap();
        assert_eq!(back, AnchorMode::EqualSpacing);
    }
}
