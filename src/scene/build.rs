//! Scene graph construction from project state

use crate::project::schema::Project;
use crate::scene::graph::{SceneGraph, SceneNode, SceneRoom};

/// Build a scene graph mirroring the project's rooms, surfaces, openings,
/// luminaires, and grids. Nodes reference entities by id only.
pub fn build_scene_graph_from_project(project: &Project) -> SceneGraph {
    let mut graph = SceneGraph::new();
    for group in ["group:rooms", "group:surfaces", "group:calcs", "group:luminaires"] {
        let name = group.split(':').nth(1).unwrap_or(group);
        let _ = graph.add_node(SceneNode::new(group, name, "group", None));
    }

    for room in &project.geometry.rooms {
        let node_id = format!("room:{}", room.id);
        let _ = graph.add_node(SceneNode::new(
            &node_id,
            if room.name.is_empty() { &room.id } else { &room.name },
            "room",
            Some("group:rooms".to_string()),
        ));
        graph.rooms.push(SceneRoom {
            id: room.id.clone(),
            name: room.name.clone(),
            boundary_polygon: room.polygon(),
            height: room.height,
            surface_refs: project
                .geometry
                .surfaces
                .iter()
                .filter(|s| s.room_id.as_deref() == Some(room.id.as_str()))
                .map(|s| s.id.clone())
                .collect(),
        });
    }

    for surface in &project.geometry.surfaces {
        let node_id = format!("surface:{}", surface.id);
        let parent = surface
            .room_id
            .as_ref()
            .map(|r| format!("room:{}", r))
            .filter(|p| graph.has_node(p))
            .unwrap_or_else(|| "group:surfaces".to_string());
        let mut node = SceneNode::new(
            &node_id,
            if surface.name.is_empty() { &surface.id } else { &surface.name },
            "surface",
            Some(parent),
        )
        .with_mesh_ref(&surface.id);
        node.material_ref = surface.material_id.clone();
        let _ = graph.add_node(node);
    }

    for opening in &project.geometry.openings {
        let node_id = format!("opening:{}", opening.id);
        let parent = format!("surface:{}", opening.host_surface_id);
        let parent = graph.has_node(&parent).then_some(parent);
        let _ = graph.add_node(
            SceneNode::new(&node_id, &opening.id, "opening", parent).with_mesh_ref(&opening.id),
        );
    }

    for lum in &project.luminaires {
        let node_id = format!("luminaire:{}", lum.id);
        let _ = graph.add_node(
            SceneNode::new(
                &node_id,
                if lum.name.is_empty() { &lum.id } else { &lum.name },
                "luminaire",
                Some("group:luminaires".to_string()),
            )
            .with_translation(lum.transform.position),
        );
    }

    for grid in &project.grids {
        let node_id = format!("grid:{}", grid.id);
        let parent = grid
            .room_id
            .as_ref()
            .map(|r| format!("room:{}", r))
            .filter(|p| graph.has_node(p))
            .unwrap_or_else(|| "group:calcs".to_string());
        let _ = graph.add_node(SceneNode::new(&node_id, &grid.id, "grid", Some(parent)));
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::schema::{CalcGrid, RoomSpec, SurfaceKind, SurfaceSpec};

    #[test]
    fn test_build_hierarchy() {
        let mut p = Project::new("t");
        p.geometry.rooms.push(RoomSpec {
            id: "r1".to_string(),
            width: 4.0,
            length: 3.0,
            height: 3.0,
            ..Default::default()
        });
        p.geometry.surfaces.push(SurfaceSpec {
            id: "s1".to_string(),
            kind: SurfaceKind::Wall,
            room_id: Some("r1".to_string()),
            vertices: vec![
                (0.0, 0.0, 0.0),
                (4.0, 0.0, 0.0),
                (4.0, 0.0, 3.0),
                (0.0, 0.0, 3.0),
            ],
            ..Default::default()
        });
        p.grids.push(CalcGrid {
            id: "g1".to_string(),
            room_id: Some("r1".to_string()),
            width: 4.0,
            height: 3.0,
            nx: 2,
            ny: 2,
            ..Default::default()
        });
        let graph = build_scene_graph_from_project(&p);
        assert!(graph.has_node("room:r1"));
        assert!(graph.has_node("surface:s1"));
        assert!(graph.has_node("grid:g1"));
        assert_eq!(graph.node("surface:s1").unwrap().parent.as_deref(), Some("room:r1"));
        assert_eq!(graph.rooms.len(), 1);
        assert_eq!(graph.rooms[0].surface_refs, vec!["s1".to_string()]);
    }

    #[test]
    fn test_orphan_surface_falls_back_to_group() {
        let mut p = Project::new("t");
        p.geometry.surfaces.push(SurfaceSpec {
            id: "free".to_string(),
            vertices: vec![
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
            ],
            ..Default::default()
        });
        let graph = build_scene_graph_from_project(&p);
        assert_eq!(
            graph.node("surface:free").unwrap().parent.as_deref(),
            Some("group:surfaces")
        );
    }
}
