//! Selection sets: live queries and rebuild remapping
//!
//! A set either lists explicit `object_ids` or carries a `query` string.
//! Query prefixes: `walls_in_room:<id>`, `ceilings_in_storey:<id>`,
//! `material:<id>`, `tag:<name>`, `layer:<id>`.

use std::collections::{BTreeMap, BTreeSet};

use crate::project::schema::{Project, SurfaceKind};

fn surface_ids<F>(project: &Project, predicate: F) -> Vec<String>
where
    F: Fn(&crate::project::schema::SurfaceSpec) -> bool,
{
    project
        .geometry
        .surfaces
        .iter()
        .filter(|s| predicate(s))
        .map(|s| s.id.clone())
        .collect()
}

pub fn query_all_walls_in_room(project: &Project, room_id: &str) -> Vec<String> {
    surface_ids(project, |s| {
        s.kind == SurfaceKind::Wall && s.room_id.as_deref() == Some(room_id)
    })
}

pub fn query_all_ceilings_in_storey(project: &Project, level_id: &str) -> Vec<String> {
    let room_ids: BTreeSet<&str> = project
        .geometry
        .rooms
        .iter()
        .filter(|r| r.level_id.as_deref() == Some(level_id))
        .map(|r| r.id.as_str())
        .collect();
    surface_ids(project, |s| {
        s.kind == SurfaceKind::Ceiling
            && s.room_id
                .as_deref()
                .map(|r| room_ids.contains(r))
                .unwrap_or(false)
    })
}

pub fn query_by_material(project: &Project, material_id: &str) -> Vec<String> {
    surface_ids(project, |s| s.material_id.as_deref() == Some(material_id))
}

pub fn query_by_tag(project: &Project, tag: &str) -> Vec<String> {
    surface_ids(project, |s| s.tags.iter().any(|t| t == tag))
}

pub fn query_by_layer(project: &Project, layer_id: &str) -> Vec<String> {
    surface_ids(project, |s| s.layer.as_deref() == Some(layer_id))
}

fn evaluate_query(project: &Project, query: &str) -> Vec<String> {
    let q = query.trim();
    if let Some(arg) = q.strip_prefix("walls_in_room:") {
        return query_all_walls_in_room(project, arg);
    }
    if let Some(arg) = q.strip_prefix("ceilings_in_storey:") {
        return query_all_ceilings_in_storey(project, arg);
    }
    if let Some(arg) = q.strip_prefix("material:") {
        return query_by_material(project, arg);
    }
    if let Some(arg) = q.strip_prefix("tag:") {
        return query_by_tag(project, arg);
    }
    if let Some(arg) = q.strip_prefix("layer:") {
        return query_by_layer(project, arg);
    }
    Vec::new()
}

/// Re-evaluate all query-backed selection sets.
pub fn refresh_selection_sets(project: &mut Project) {
    let mut resolved: Vec<(usize, Vec<String>)> = Vec::new();
    for (i, s) in project.selection_sets.iter().enumerate() {
        if let Some(query) = &s.query {
            let ids: BTreeSet<String> = evaluate_query(project, query).into_iter().collect();
            resolved.push((i, ids.into_iter().collect()));
        }
    }
    for (i, ids) in resolved {
        project.selection_sets[i].object_ids = ids;
    }
}

/// Substitute ids through the stable-ID map after rebuild: a remapped id is
/// replaced by its children; ids that became split parents gain all children.
pub fn remap_selection_sets(
    project: &mut Project,
    stable_id_map: &BTreeMap<String, Vec<String>>,
    attachment_remap: &BTreeMap<String, String>,
) {
    let mut reverse_parent: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (child, parent) in attachment_remap {
        reverse_parent
            .entry(parent.as_str())
            .or_default()
            .insert(child.as_str());
    }
    for set in &mut project.selection_sets {
        let mut remapped: BTreeSet<String> = BTreeSet::new();
        for oid in &set.object_ids {
            if let Some(children) = stable_id_map.get(oid) {
                if !children.is_empty() {
                    remapped.extend(children.iter().cloned());
                    continue;
                }
            }
            if let Some(children) = reverse_parent.get(oid.as_str()) {
                remapped.extend(children.iter().map(|c| c.to_string()));
            } else {
                remapped.insert(oid.clone());
            }
        }
        set.object_ids = remapped.into_iter().collect();
    }
    refresh_selection_sets(project);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::{SelectionSetSpec, SurfaceSpec};

    fn project_with_surfaces() -> Project {
        let mut p = Project::new("t");
        p.geometry.surfaces.push(SurfaceSpec {
            id: "s_wall".to_string(),
            kind: SurfaceKind::Wall,
            room_id: Some("r1".to_string()),
            material_id: Some("m1".to_string()),
            tags: vec!["north".to_string()],
            ..Default::default()
        });
        p.geometry.surfaces.push(SurfaceSpec {
            id: "s_floor".to_string(),
            kind: SurfaceKind::Floor,
            room_id: Some("r1".to_string()),
            ..Default::default()
        });
        p
    }

    #[test]
    fn test_query_walls_in_room() {
        let mut p = project_with_surfaces();
        p.selection_sets.push(SelectionSetSpec {
            id: "sel".to_string(),
            query: Some("walls_in_room:r1".to_string()),
            ..Default::default()
        });
        refresh_selection_sets(&mut p);
        assert_eq!(p.selection_sets[0].object_ids, vec!["s_wall".to_string()]);
    }

    #[test]
    fn test_query_by_material_and_tag() {
        let p = project_with_surfaces();
        assert_eq!(query_by_material(&p, "m1"), vec!["s_wall".to_string()]);
        assert_eq!(query_by_tag(&p, "north"), vec!["s_wall".to_string()]);
        assert!(query_by_tag(&p, "south").is_empty());
    }

    #[test]
    fn test_remap_substitutes_children() {
        let mut p = project_with_surfaces();
        p.selection_sets.push(SelectionSetSpec {
            id: "sel".to_string(),
            object_ids: vec!["s_wall".to_string()],
            ..Default::default()
        });
        let mut stable = BTreeMap::new();
        stable.insert(
            "s_wall".to_string(),
            vec!["s_wall:part1".to_string(), "s_wall:part2".to_string()],
        );
        remap_selection_sets(&mut p, &stable, &BTreeMap::new());
        assert_eq!(
            p.selection_sets[0].object_ids,
            vec!["s_wall:part1".to_string(), "s_wall:part2".to_string()]
        );
    }

    #[test]
    fn test_remap_keeps_unmapped_ids() {
        let mut p = project_with_surfaces();
        p.selection_sets.push(SelectionSetSpec {
            id: "sel".to_string(),
            object_ids: vec!["s_floor".to_string()],
            ..Default::default()
        });
        remap_selection_sets(&mut p, &BTreeMap::new(), &BTreeMap::new());
        assert_eq!(p.selection_sets[0].object_ids, vec!["s_floor".to_string()]);
    }
}
