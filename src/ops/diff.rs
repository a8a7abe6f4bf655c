//! Project diffing: per-kind collection set difference
//!
//! Operates on the JSON form so it is uniform across all ~30 typed
//! collections, param collections included. Ids are compared per kind and
//! payload inequality yields updates.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::ops::delta::{Delta, DeltaItem, ParamChanges};

/// (kind, path into the project JSON) for every diffed collection.
const DIFF_SPECS: &[(&str, &[&str])] = &[
    ("room", &["geometry", "rooms"]),
    ("surface", &["geometry", "surfaces"]),
    ("opening", &["geometry", "openings"]),
    ("obstruction", &["geometry", "obstructions"]),
    ("level", &["geometry", "levels"]),
    ("zone", &["geometry", "zones"]),
    ("no_go_zone", &["geometry", "no_go_zones"]),
    ("material", &["materials"]),
    ("grid", &["grids"]),
    ("workplane", &["workplanes"]),
    ("vertical_plane", &["vertical_planes"]),
    ("arbitrary_plane", &["arbitrary_planes"]),
    ("point_set", &["point_sets"]),
    ("line_grid", &["line_grids"]),
    ("glare_view", &["glare_views"]),
    ("escape_route", &["escape_routes"]),
    ("roadway", &["roadways"]),
    ("roadway_grid", &["roadway_grids"]),
    ("compliance_profile", &["compliance_profiles"]),
    ("luminaire", &["luminaires"]),
    ("asset", &["photometry_assets"]),
    ("family", &["luminaire_families"]),
    ("variant", &["variants"]),
    ("layer", &["layers"]),
    ("symbol_2d", &["symbols_2d"]),
    ("block_instance", &["block_instances"]),
    ("selection_set", &["selection_sets"]),
    ("job", &["jobs"]),
    ("param_footprint", &["param", "footprints"]),
    ("param_room", &["param", "rooms"]),
    ("param_wall", &["param", "walls"]),
    ("param_shared_wall", &["param", "shared_walls"]),
    ("param_opening", &["param", "openings"]),
    ("param_slab", &["param", "slabs"]),
    ("param_zone", &["param", "zones"]),
];

fn collection<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    let mut cur = value;
    for key in path {
        match cur.get(key) {
            Some(v) => cur = v,
            None => return &[],
        }
    }
    cur.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn index_by_id(items: &[Value]) -> BTreeMap<String, &Value> {
    let mut out = BTreeMap::new();
    for item in items {
        if let Some(id) = item.get("id").and_then(Value::as_str) {
            out.insert(id.to_string(), item);
        }
    }
    out
}

/// Diff one collection by kind and path.
pub fn diff_collections(before: &Value, after: &Value, kind: &str, path: &[&str]) -> Delta {
    let b_idx = index_by_id(collection(before, path));
    let a_idx = index_by_id(collection(after, path));
    let mut delta = Delta::default();

    for (id, item) in &a_idx {
        if !b_idx.contains_key(id) {
            delta.created.push(DeltaItem {
                kind: kind.to_string(),
                id: id.clone(),
                before: None,
                after: Some((*item).clone()),
            });
        }
    }
    for (id, item) in &b_idx {
        if !a_idx.contains_key(id) {
            delta.deleted.push(DeltaItem {
                kind: kind.to_string(),
                id: id.clone(),
                before: Some((*item).clone()),
                after: None,
            });
        }
    }
    for (id, a_item) in &a_idx {
        if let Some(b_item) = b_idx.get(id) {
            if a_item != b_item {
                delta.updated.push(DeltaItem {
                    kind: kind.to_string(),
                    id: id.clone(),
                    before: Some((*b_item).clone()),
                    after: Some((*a_item).clone()),
                });
            }
        }
    }
    delta
}

/// Diff the whole project (JSON form) across every typed collection.
pub fn diff_project(before: &Value, after: &Value) -> Delta {
    let mut out = Delta::default();
    for (kind, path) in DIFF_SPECS {
        let d = diff_collections(before, after, kind, path);
        out.created.extend(d.created);
        out.updated.extend(d.updated);
        out.deleted.extend(d.deleted);
    }
    out.param_changes = ParamChanges {
        created: out
            .created
            .iter()
            .filter(|i| i.kind.starts_with("param_"))
            .map(|i| i.id.clone())
            .collect(),
        updated: out
            .updated
            .iter()
            .filter(|i| i.kind.starts_with("param_"))
            .map(|i| i.id.clone())
            .collect(),
        deleted: out
            .deleted
            .iter()
            .filter(|i| i.kind.starts_with("param_"))
            .map(|i| i.id.clone())
            .collect(),
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::{MaterialSpec, Project};

    #[test]
    fn test_diff_identity_is_empty() {
        let p = Project::new("t");
        let v = p.to_value();
        let delta = diff_project(&v, &v);
        assert!(delta.is_empty());
    }

    #[test]
    fn test_diff_detects_create() {
        let before = Project::new("t");
        let mut after = before.clone();
        after.materials.push(MaterialSpec {
            id: "m1".to_string(),
            reflectance: 0.5,
            ..Default::default()
        });
        let delta = diff_project(&before.to_value(), &after.to_value());
        assert_eq!(delta.created.len(), 1);
        assert_eq!(delta.created[0].kind, "material");
        assert!(delta.updated.is_empty());
        assert!(delta.deleted.is_empty());
    }

    #[test]
    fn test_diff_detects_update_and_delete() {
        let mut before = Project::new("t");
        before.materials.push(MaterialSpec {
            id: "m1".to_string(),
            reflectance: 0.5,
            ..Default::default()
        });
        before.materials.push(MaterialSpec {
            id: "m2".to_string(),
            reflectance: 0.3,
            ..Default::default()
        });
        let mut after = before.clone();
        after.materials[0].reflectance = 0.7;
        after.materials.remove(1);
        let delta = diff_project(&before.to_value(), &after.to_value());
        assert_eq!(delta.updated.len(), 1);
        assert_eq!(delta.deleted.len(), 1);
        assert_eq!(delta.deleted[0].id, "m2");
    }

    #[test]
    fn test_param_changes_summarized() {
        let before = Project::new("t");
        let mut after = before.clone();
        after
            .param
            .footprints
            .push(crate::param::model::FootprintParam {
                id: "f1".to_string(),
                polygon2d: vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
                ..Default::default()
            });
        let delta = diff_project(&before.to_value(), &after.to_value());
        assert_eq!(delta.param_changes.created, vec!["f1".to_string()]);
    }
}
