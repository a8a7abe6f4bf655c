//! Neutral import container
//!
//! Format parsers (DXF/IFC/OBJ/glTF) are external collaborators; what they
//! yield is this normalized document. A JSON loader is provided so pipelines
//! and tests can run against serialized neutral documents. Layer-name
//! semantics and space/boundary resolution operate on the neutral data.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{LuxeraError, Result};
use crate::project::schema::{
    LevelSpec, ObstructionSpec, OpeningSpec, RoomSpec, SurfaceSpec,
};

/// Semantic category a source layer maps to.
pub const LAYER_WALL: &str = "wall";
pub const LAYER_DOOR: &str = "door";
pub const LAYER_WINDOW: &str = "window";
pub const LAYER_ROOM: &str = "room";
pub const LAYER_GRID: &str = "grid";
pub const LAYER_UNMAPPED: &str = "unmapped";

/// What a format parser yields: normalized entities plus source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeutralDocument {
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub block_instance_count: usize,
    /// Source length unit (e.g. "mm"); scale_to_meters normalizes it.
    #[serde(default = "default_unit")]
    pub length_unit: String,
    #[serde(default = "default_scale")]
    pub scale_to_meters: f64,
    /// Source up axis: "Z_UP" or "Y_UP".
    #[serde(default = "default_up")]
    pub source_up_axis: String,
    /// Source handedness: "RIGHT_HANDED" or "LEFT_HANDED".
    #[serde(default = "default_hand")]
    pub source_handedness: String,
    #[serde(default)]
    pub rooms: Vec<RoomSpec>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceSpec>,
    #[serde(default)]
    pub openings: Vec<OpeningSpec>,
    #[serde(default)]
    pub obstructions: Vec<ObstructionSpec>,
    #[serde(default)]
    pub levels: Vec<LevelSpec>,
    /// Space-boundary hints: surface id -> candidate room ids.
    #[serde(default)]
    pub space_boundaries: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

fn default_unit() -> String {
    "m".to_string()
}
fn default_scale() -> f64 {
    1.0
}
fn default_up() -> String {
    "Z_UP".to_string()
}
fn default_hand() -> String {
    "RIGHT_HANDED".to_string()
}

impl Default for NeutralDocument {
    fn default() -> Self {
        Self {
            source_file: String::new(),
            format: String::new(),
            layers: Vec::new(),
            block_instance_count: 0,
            length_unit: default_unit(),
            scale_to_meters: default_scale(),
            source_up_axis: default_up(),
            source_handedness: default_hand(),
            rooms: Vec::new(),
            surfaces: Vec::new(),
            openings: Vec::new(),
            obstructions: Vec::new(),
            levels: Vec::new(),
            space_boundaries: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }
}

/// Load a neutral document from a JSON file.
pub fn load_neutral_document(path: &Path) -> Result<NeutralDocument> {
    if !path.exists() {
        return Err(LuxeraError::import(
            "RawImport",
            format!("source file not found: {}", path.display()),
        ));
    }
    let raw = std::fs::read_to_string(path)?;
    let mut doc: NeutralDocument = serde_json::from_str(&raw)
        .map_err(|e| LuxeraError::import("RawImport", format!("unparseable source: {}", e)))?;
    if doc.source_file.is_empty() {
        doc.source_file = path.to_string_lossy().into_owned();
    }
    Ok(doc)
}

/// Detect layer semantics by substring match, uppercased.
pub fn detect_layer_map(layers: &[String]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for layer in layers {
        let upper = layer.to_uppercase();
        let semantic = if upper.contains("WALL") {
            LAYER_WALL
        } else if upper.contains("DOOR") {
            LAYER_DOOR
        } else if upper.contains("WINDOW") {
            LAYER_WINDOW
        } else if upper.contains("ROOM") || upper.contains("SPACE") {
            LAYER_ROOM
        } else if upper.contains("GRID") {
            LAYER_GRID
        } else {
            LAYER_UNMAPPED
        };
        out.insert(upper, semantic.to_string());
    }
    out
}

/// Resolve surface-to-room assignments from space-boundary hints. Conflicts
/// break deterministically toward the lexicographically lowest room id.
pub fn resolve_space_boundaries(doc: &mut NeutralDocument) {
    let boundaries = doc.space_boundaries.clone();
    for surface in &mut doc.surfaces {
        if surface.room_id.is_some() {
            continue;
        }
        if let Some(candidates) = boundaries.get(&surface.id) {
            let mut sorted = candidates.clone();
            sorted.sort();
            if let Some(first) = sorted.first() {
                surface.room_id = Some(first.clone());
            }
        }
    }
}

/// Scale all geometry into meters; resets `scale_to_meters` to 1.
pub fn normalize_units(doc: &mut NeutralDocument) {
    let s = doc.scale_to_meters;
    if (s - 1.0).abs() < 1e-15 {
        doc.length_unit = "m".to_string();
        return;
    }
    let scale3 = |p: &mut (f64, f64, f64)| {
        p.0 *= s;
        p.1 *= s;
        p.2 *= s;
    };
    for room in &mut doc.rooms {
        room.width *= s;
        room.length *= s;
        room.height *= s;
        scale3(&mut room.origin);
        for p in &mut room.footprint {
            p.0 *= s;
            p.1 *= s;
        }
    }
    for surface in &mut doc.surfaces {
        for v in &mut surface.vertices {
            scale3(v);
        }
    }
    for opening in &mut doc.openings {
        for v in &mut opening.vertices {
            scale3(v);
        }
    }
    for obstruction in &mut doc.obstructions {
        for v in &mut obstruction.vertices {
            scale3(v);
        }
        if let Some(h) = &mut obstruction.height {
            *h *= s;
        }
    }
    for level in &mut doc.levels {
        level.elevation *= s;
    }
    doc.length_unit = "m".to_string();
    doc.scale_to_meters = 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_detection() {
        let layers = vec![
            "A-WALL-EXT".to_string(),
            "doors_level_1".to_string(),
            "WINDOW".to_string(),
            "Space_Boundaries".to_string(),
            "COLUMN-GRID".to_string(),
            "furniture".to_string(),
        ];
        let map = detect_layer_map(&layers);
        assert_eq!(map["A-WALL-EXT"], LAYER_WALL);
        assert_eq!(map["DOORS_LEVEL_1"], LAYER_DOOR);
        assert_eq!(map["WINDOW"], LAYER_WINDOW);
        assert_eq!(map["SPACE_BOUNDARIES"], LAYER_ROOM);
        assert_eq!(map["COLUMN-GRID"], LAYER_GRID);
        assert_eq!(map["FURNITURE"], LAYER_UNMAPPED);
    }

    #[test]
    fn test_space_boundary_conflict_breaks_low() {
        let mut doc = NeutralDocument::default();
        doc.surfaces.push(SurfaceSpec {
            id: "s1".to_string(),
            vertices: vec![(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (1.0, 0.0, 1.0)],
            ..Default::default()
        });
        doc.space_boundaries.insert(
            "s1".to_string(),
            vec!["room_b".to_string(), "room_a".to_string()],
        );
        resolve_space_boundaries(&mut doc);
        assert_eq!(doc.surfaces[0].room_id.as_deref(), Some("room_a"));
    }

    #[test]
    fn test_unit_normalization_mm() {
        let mut doc = NeutralDocument {
            length_unit: "mm".to_string(),
            scale_to_meters: 0.001,
            ..Default::default()
        };
        doc.surfaces.push(SurfaceSpec {
            id: "s1".to_string(),
            vertices: vec![(1000.0, 0.0, 0.0), (2000.0, 0.0, 0.0), (2000.0, 0.0, 3000.0)],
            ..Default::default()
        });
        normalize_units(&mut doc);
        assert_eq!(doc.length_unit, "m");
        assert_eq!(doc.scale_to_meters, 1.0);
        assert!((doc.surfaces[0].vertices[1].0 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_missing_file_is_import_error() {
        let err = load_neutral_document(Path::new("/no/such/file.json")).unwrap_err();
        assert!(matches!(err, LuxeraError::Import { .. }));
    }
}
