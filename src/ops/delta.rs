//! Typed deltas over project collections
//!
//! A `Delta` carries full before/after payloads per item, so inversion is
//! mechanical. Applying a delta routes each item to its typed collection and
//! then replays the param rebuild for any edited param ids, reconstructing
//! derived state deterministically.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::{LuxeraError, Result};
use crate::param::rebuild::{rebuild, RebuildOptions};
use crate::project::schema::Project;

/// One created/updated/deleted item with its payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaItem {
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
}

/// Summary of param-level changes inside a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParamChanges {
    #[serde(default)]
    pub created: Vec<String>,
    #[serde(default)]
    pub updated: Vec<String>,
    #[serde(default)]
    pub deleted: Vec<String>,
}

/// The full change set produced by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Delta {
    #[serde(default)]
    pub created: Vec<DeltaItem>,
    #[serde(default)]
    pub updated: Vec<DeltaItem>,
    #[serde(default)]
    pub deleted: Vec<DeltaItem>,
    #[serde(default)]
    pub param_changes: ParamChanges,
    #[serde(default)]
    pub derived_regen_summary: BTreeMap<String, Value>,
    /// Old surface id -> surviving/child ids.
    #[serde(default)]
    pub stable_id_map: BTreeMap<String, Vec<String>>,
    /// Child id -> parent id it was remapped from.
    #[serde(default)]
    pub attachment_remap: BTreeMap<String, String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Invert a delta: created⇄deleted, before⇄after, maps reversed.
pub fn invert(delta: &Delta) -> Delta {
    let flip = |item: &DeltaItem| DeltaItem {
        kind: item.kind.clone(),
        id: item.id.clone(),
        before: item.after.clone(),
        after: item.before.clone(),
    };
    let mut inv_stable: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (parent, children) in &delta.stable_id_map {
        for child in children {
            inv_stable
                .entry(child.clone())
                .or_default()
                .push(parent.clone());
        }
    }
    let inv_attach: BTreeMap<String, String> = delta
        .attachment_remap
        .iter()
        .map(|(k, v)| (v.clone(), k.clone()))
        .collect();
    Delta {
        created: delta.deleted.iter().map(flip).collect(),
        updated: delta.updated.iter().map(flip).collect(),
        deleted: delta.created.iter().map(flip).collect(),
        param_changes: delta.param_changes.clone(),
        derived_regen_summary: delta.derived_regen_summary.clone(),
        stable_id_map: inv_stable,
        attachment_remap: inv_attach,
    }
}

/// Namespace prefix for a param kind, if the kind is a param collection.
pub fn param_namespace(kind: &str) -> Option<&'static str> {
    match kind {
        "param_footprint" => Some("footprint"),
        "param_room" => Some("room"),
        "param_wall" => Some("wall"),
        "param_opening" => Some("opening"),
        "param_zone" => Some("zone"),
        "param_shared_wall" => Some("shared_wall"),
        "param_slab" => Some("slab"),
        _ => None,
    }
}

enum Mutation<'a> {
    Delete(&'a str),
    Update(&'a str, &'a Value),
    Create(&'a str, &'a Value),
}

fn mutate_typed<T>(collection: &mut Vec<T>, id_of: fn(&T) -> &str, m: &Mutation) -> Result<()>
where
    T: DeserializeOwned,
{
    match m {
        Mutation::Delete(id) => {
            collection.retain(|item| id_of(item) != *id);
        }
        Mutation::Update(id, payload) => {
            if let Some(idx) = collection.iter().position(|item| id_of(item) == *id) {
                collection[idx] = serde_json::from_value((*payload).clone())?;
            }
        }
        Mutation::Create(id, payload) => {
            if !collection.iter().any(|item| id_of(item) == *id) {
                collection.push(serde_json::from_value((*payload).clone())?);
            }
        }
    }
    Ok(())
}

fn route(project: &mut Project, kind: &str, m: Mutation) -> Result<()> {
    use crate::param::model::*;
    use crate::project::schema::*;
    match kind {
        "room" => mutate_typed(&mut project.geometry.rooms, |x: &RoomSpec| &x.id, &m),
        "surface" => mutate_typed(&mut project.geometry.surfaces, |x: &SurfaceSpec| &x.id, &m),
        "opening" => mutate_typed(&mut project.geometry.openings, |x: &OpeningSpec| &x.id, &m),
        "obstruction" => mutate_typed(
            &mut project.geometry.obstructions,
            |x: &ObstructionSpec| &x.id,
            &m,
        ),
        "level" => mutate_typed(&mut project.geometry.levels, |x: &LevelSpec| &x.id, &m),
        "zone" => mutate_typed(&mut project.geometry.zones, |x: &ZoneSpec| &x.id, &m),
        "no_go_zone" => mutate_typed(
            &mut project.geometry.no_go_zones,
            |x: &NoGoZoneSpec| &x.id,
            &m,
        ),
        "material" => mutate_typed(&mut project.materials, |x: &MaterialSpec| &x.id, &m),
        "grid" => mutate_typed(&mut project.grids, |x: &CalcGrid| &x.id, &m),
        "workplane" => mutate_typed(&mut project.workplanes, |x: &WorkplaneSpec| &x.id, &m),
        "vertical_plane" => mutate_typed(
            &mut project.vertical_planes,
            |x: &VerticalPlaneSpec| &x.id,
            &m,
        ),
        "arbitrary_plane" => mutate_typed(
            &mut project.arbitrary_planes,
            |x: &ArbitraryPlaneSpec| &x.id,
            &m,
        ),
        "point_set" => mutate_typed(&mut project.point_sets, |x: &PointSetSpec| &x.id, &m),
        "line_grid" => mutate_typed(&mut project.line_grids, |x: &LineGridSpec| &x.id, &m),
        "glare_view" => mutate_typed(&mut project.glare_views, |x: &GlareViewSpec| &x.id, &m),
        "escape_route" => mutate_typed(&mut project.escape_routes, |x: &EscapeRouteSpec| &x.id, &m),
        "roadway" => mutate_typed(&mut project.roadways, |x: &RoadwaySpec| &x.id, &m),
        "roadway_grid" => mutate_typed(
            &mut project.roadway_grids,
            |x: &RoadwayGridSpec| &x.id,
            &m,
        ),
        "luminaire" => mutate_typed(&mut project.luminaires, |x: &LuminaireInstance| &x.id, &m),
        "asset" => mutate_typed(
            &mut project.photometry_assets,
            |x: &PhotometryAsset| &x.id,
            &m,
        ),
        "family" => mutate_typed(
            &mut project.luminaire_families,
            |x: &LuminaireFamily| &x.id,
            &m,
        ),
        "compliance_profile" => mutate_typed(
            &mut project.compliance_profiles,
            |x: &ComplianceProfile| &x.id,
            &m,
        ),
        "variant" => mutate_typed(&mut project.variants, |x: &ProjectVariant| &x.id, &m),
        "layer" => mutate_typed(&mut project.layers, |x: &LayerSpec| &x.id, &m),
        "symbol_2d" => mutate_typed(&mut project.symbols_2d, |x: &Symbol2DSpec| &x.id, &m),
        "block_instance" => mutate_typed(
            &mut project.block_instances,
            |x: &BlockInstanceSpec| &x.id,
            &m,
        ),
        "selection_set" => mutate_typed(
            &mut project.selection_sets,
            |x: &SelectionSetSpec| &x.id,
            &m,
        ),
        "job" => mutate_typed(&mut project.jobs, |x: &JobSpec| &x.id, &m),
        "param_footprint" => mutate_typed(
            &mut project.param.footprints,
            |x: &FootprintParam| &x.id,
            &m,
        ),
        "param_room" => mutate_typed(&mut project.param.rooms, |x: &RoomParam| &x.id, &m),
        "param_wall" => mutate_typed(&mut project.param.walls, |x: &WallParam| &x.id, &m),
        "param_shared_wall" => mutate_typed(
            &mut project.param.shared_walls,
            |x: &SharedWallParam| &x.id,
            &m,
        ),
        "param_opening" => mutate_typed(&mut project.param.openings, |x: &OpeningParam| &x.id, &m),
        "param_slab" => mutate_typed(&mut project.param.slabs, |x: &SlabParam| &x.id, &m),
        "param_zone" => mutate_typed(&mut project.param.zones, |x: &ZoneParam| &x.id, &m),
        other => Err(LuxeraError::validation(format!(
            "unsupported delta kind: {}",
            other
        ))),
    }
}

/// Apply a delta: deletes, then updates, then creates, each kind-routed.
/// Param edits trigger a rebuild so derived geometry stays in sync.
pub fn apply_delta(project: &mut Project, delta: &Delta) -> Result<()> {
    for item in &delta.deleted {
        route(project, &item.kind, Mutation::Delete(&item.id))?;
    }
    for item in &delta.updated {
        if let Some(after) = &item.after {
            route(project, &item.kind, Mutation::Update(&item.id, after))?;
        }
    }
    for item in &delta.created {
        if let Some(after) = &item.after {
            route(project, &item.kind, Mutation::Create(&item.id, after))?;
        }
    }

    let mut edited: Vec<String> = Vec::new();
    for item in delta
        .created
        .iter()
        .chain(delta.updated.iter())
        .chain(delta.deleted.iter())
    {
        if let Some(ns) = param_namespace(&item.kind) {
            edited.push(format!("{}:{}", ns, item.id));
        }
    }
    if !edited.is_empty() {
        edited.sort();
        edited.dedup();
        // Replay the rebuild; partially-applied param states (mid undo) are
        // tolerated because deleted entities drop out of the room set.
        if let Err(err) = rebuild(&edited, project, &RebuildOptions::default()) {
            tracing::debug!(error = %err, "post-delta rebuild incomplete");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invert_swaps_created_deleted() {
        let delta = Delta {
            created: vec![DeltaItem {
                kind: "material".to_string(),
                id: "m1".to_string(),
                before: None,
                after: Some(json!({"id": "m1", "reflectance": 0.5})),
            }],
            ..Default::default()
        };
        let inv = invert(&delta);
        assert!(inv.created.is_empty());
        assert_eq!(inv.deleted.len(), 1);
        assert_eq!(inv.deleted[0].before.as_ref().unwrap()["id"], "m1");
    }

    #[test]
    fn test_invert_stable_map_child_to_parent() {
        let mut delta = Delta::default();
        delta.stable_id_map.insert(
            "s1".to_string(),
            vec!["s1:part1".to_string(), "s1:part2".to_string()],
        );
        let inv = invert(&delta);
        assert_eq!(inv.stable_id_map["s1:part1"], vec!["s1".to_string()]);
        assert_eq!(inv.stable_id_map["s1:part2"], vec!["s1".to_string()]);
    }

    #[test]
    fn test_apply_create_update_delete() {
        let mut p = Project::new("t");
        let create = Delta {
            created: vec![DeltaItem {
                kind: "material".to_string(),
                id: "m1".to_string(),
                before: None,
                after: Some(json!({"id": "m1", "name": "White", "reflectance": 0.8})),
            }],
            ..Default::default()
        };
        apply_delta(&mut p, &create).unwrap();
        assert_eq!(p.materials.len(), 1);

        let update = Delta {
            updated: vec![DeltaItem {
                kind: "material".to_string(),
                id: "m1".to_string(),
                before: Some(json!({"id": "m1", "name": "White", "reflectance": 0.8})),
                after: Some(json!({"id": "m1", "name": "White", "reflectance": 0.6})),
            }],
            ..Default::default()
        };
        apply_delta(&mut p, &update).unwrap();
        assert_eq!(p.materials[0].reflectance, 0.6);

        let delete = invert(&create);
        apply_delta(&mut p, &delete).unwrap();
        assert!(p.materials.is_empty());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut p = Project::new("t");
        let delta = Delta {
            created: vec![DeltaItem {
                kind: "starship".to_string(),
                id: "x".to_string(),
                before: None,
                after: Some(json!({"id": "x"})),
            }],
            ..Default::default()
        };
        assert!(apply_delta(&mut p, &delta).is_err());
    }

    #[test]
    fn test_param_create_triggers_rebuild() {
        let mut p = Project::new("t");
        let delta = Delta {
            created: vec![
                DeltaItem {
                    kind: "param_footprint".to_string(),
                    id: "f1".to_string(),
                    before: None,
                    after: Some(json!({
                        "id": "f1",
                        "polygon2d": [[0.0, 0.0], [4.0, 0.0], [4.0, 3.0], [0.0, 3.0]]
                    })),
                },
                DeltaItem {
                    kind: "param_room".to_string(),
                    id: "r1".to_string(),
                    before: None,
                    after: Some(json!({
                        "id": "r1", "footprint_id": "f1", "height": 3.0
                    })),
                },
            ],
            ..Default::default()
        };
        apply_delta(&mut p, &delta).unwrap();
        // Rebuild derived floor/ceiling/walls from the created param state.
        assert!(!p.geometry.surfaces.is_empty());
    }
}
