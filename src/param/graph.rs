//! Dependency DAG over namespaced param and derived entity ids
//!
//! Edges encode "depends-on": the source must rebuild before the target.
//! `affected` is the transitive closure over forward edges, so an edited
//! footprint reaches its rooms, their walls, and every derived surface.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::project::schema::Project;

/// Typed directed dependency graph keyed by namespaced string ids.
#[derive(Debug, Default)]
pub struct ParamGraph {
    graph: DiGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
    kinds: BTreeMap<String, String>,
}

impl ParamGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if absent.
    pub fn add_node(&mut self, entity_id: &str, kind: &str) {
        if !self.index.contains_key(entity_id) {
            let idx = self.graph.add_node(entity_id.to_string());
            self.index.insert(entity_id.to_string(), idx);
        }
        self.kinds.insert(entity_id.to_string(), kind.to_string());
    }

    /// Add a depends-on edge; missing endpoints are created as untyped nodes.
    pub fn add_edge(&mut self, depends_on: &str, dependent: &str) {
        if !self.index.contains_key(depends_on) {
            self.add_node(depends_on, "");
        }
        if !self.index.contains_key(dependent) {
            self.add_node(dependent, "");
        }
        let a = self.index[depends_on];
        let b = self.index[dependent];
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    pub fn kind_of(&self, entity_id: &str) -> Option<&str> {
        self.kinds.get(entity_id).map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// BFS over forward edges: every entity transitively affected by the
    /// start set (start ids included). Neighbor order is sorted by id so the
    /// closure is reproducible.
    pub fn affected(&self, start_ids: &[String]) -> BTreeSet<String> {
        let mut out: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = start_ids.iter().cloned().collect();
        while let Some(cur) = queue.pop_front() {
            if !out.insert(cur.clone()) {
                continue;
            }
            let Some(&idx) = self.index.get(&cur) else {
                continue;
            };
            let mut next: Vec<String> = self
                .graph
                .neighbors_directed(idx, petgraph::Direction::Outgoing)
                .map(|n| self.graph[n].clone())
                .collect();
            next.sort();
            for n in next {
                if !out.contains(&n) {
                    queue.push_back(n);
                }
            }
        }
        out
    }
}

/// Build the dependency DAG between param entities and derived artifacts.
///
/// Node ids are namespaced: `footprint:X`, `room:X`, `wall:X`, `opening:X`,
/// `shared_wall:X`, `zone:X`, `grid:X`, `surface:<kind>:X`.
pub fn build_param_graph(project: &Project) -> ParamGraph {
    let mut g = ParamGraph::new();
    let param = &project.param;

    for fp in &param.footprints {
        g.add_node(&format!("footprint:{}", fp.id), "footprint");
    }
    for room in &param.rooms {
        let rid = format!("room:{}", room.id);
        g.add_node(&rid, "room");
        let floor = format!("surface:floor:{}", room.id);
        let ceiling = format!("surface:ceiling:{}", room.id);
        g.add_node(&floor, "derived_surface");
        g.add_node(&ceiling, "derived_surface");
        g.add_edge(&rid, &floor);
        g.add_edge(&rid, &ceiling);
        g.add_edge(&format!("footprint:{}", room.footprint_id), &rid);
    }
    for wall in &param.walls {
        let wid = format!("wall:{}", wall.id);
        let sid = format!("surface:wall:{}", wall.id);
        g.add_node(&wid, "wall");
        g.add_node(&sid, "derived_surface");
        g.add_edge(&format!("room:{}", wall.room_id), &wid);
        g.add_edge(&wid, &sid);
    }
    for sw in &param.shared_walls {
        let swid = format!("shared_wall:{}", sw.id);
        let sid = format!("surface:shared_wall:{}", sw.id);
        g.add_node(&swid, "shared_wall");
        g.add_node(&sid, "derived_surface");
        g.add_edge(&format!("room:{}", sw.room_a), &swid);
        if let Some(room_b) = &sw.room_b {
            g.add_edge(&format!("room:{}", room_b), &swid);
        }
        g.add_edge(&swid, &sid);
    }
    for op in &param.openings {
        let oid = format!("opening:{}", op.id);
        g.add_node(&oid, "opening");
        g.add_edge(&format!("wall:{}", op.wall_id), &oid);
        g.add_edge(&oid, &format!("surface:wall:{}", op.wall_id));
    }
    for zone in &param.zones {
        let zid = format!("zone:{}", zone.id);
        g.add_node(&zid, "zone");
        g.add_edge(&format!("room:{}", zone.room_id), &zid);
    }
    for grid in &project.grids {
        if grid.id.is_empty() {
            continue;
        }
        let gid = format!("grid:{}", grid.id);
        g.add_node(&gid, "derived_grid");
        if let Some(room_id) = &grid.room_id {
            g.add_edge(&format!("room:{}", room_id), &gid);
        }
        if let Some(zone_id) = &grid.zone_id {
            g.add_edge(&format!("zone:{}", zone_id), &gid);
        }
    }
    g
}
