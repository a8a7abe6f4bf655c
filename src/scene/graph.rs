//! Scene graph with lazily cached world transforms
//!
//! Nodes reference project entities by id (weak references, no ownership).
//! World matrices are computed on demand and cached; changing a parent or a
//! local transform invalidates the node and all its descendants. Instance
//! references allow sharing meshes by id.

use std::collections::BTreeMap;

use glam::{DMat4, DVec3};

use crate::core::error::{LuxeraError, Result};
use crate::geometry::polygon::Point2;

/// A node in the scene hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub id: String,
    pub name: String,
    pub node_type: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub local_transform: DMat4,
    pub world_cache: Option<DMat4>,
    pub mesh_ref: Option<String>,
    pub material_ref: Option<String>,
    /// Shared authored geometry for instancing.
    pub instance_ref: Option<String>,
}

impl SceneNode {
    pub fn new(id: &str, name: &str, node_type: &str, parent: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            node_type: node_type.to_string(),
            parent,
            children: Vec::new(),
            local_transform: DMat4::IDENTITY,
            world_cache: None,
            mesh_ref: None,
            material_ref: None,
            instance_ref: None,
        }
    }

    pub fn with_translation(mut self, xyz: (f64, f64, f64)) -> Self {
        self.local_transform = DMat4::from_translation(DVec3::new(xyz.0, xyz.1, xyz.2));
        self
    }

    pub fn with_mesh_ref(mut self, mesh_ref: &str) -> Self {
        self.mesh_ref = Some(mesh_ref.to_string());
        self
    }
}

/// A room summary held by the graph for viewer consumers.
#[derive(Debug, Clone)]
pub struct SceneRoom {
    pub id: String,
    pub name: String,
    pub boundary_polygon: Vec<Point2>,
    pub height: f64,
    pub surface_refs: Vec<String>,
}

/// Hierarchical scene graph.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<String, SceneNode>,
    pub rooms: Vec<SceneRoom>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn node(&self, node_id: &str) -> Result<&SceneNode> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| LuxeraError::validation(format!("unknown scene node: {}", node_id)))
    }

    /// Add a node; registers it under its parent and invalidates its subtree.
    pub fn add_node(&mut self, node: SceneNode) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(LuxeraError::validation(format!(
                "scene node already exists: {}",
                node.id
            )));
        }
        let id = node.id.clone();
        let parent = node.parent.clone();
        self.nodes.insert(id.clone(), node);
        if let Some(parent_id) = parent {
            let parent = self.nodes.get_mut(&parent_id).ok_or_else(|| {
                LuxeraError::validation(format!("unknown parent node: {}", parent_id))
            })?;
            if !parent.children.contains(&id) {
                parent.children.push(id.clone());
            }
        }
        self.invalidate_world_cache(&id)?;
        Ok(())
    }

    /// Reparent a node; invalidates its subtree.
    pub fn set_parent(&mut self, node_id: &str, parent_id: Option<&str>) -> Result<()> {
        let old_parent = self.node(node_id)?.parent.clone();
        if old_parent.as_deref() == parent_id {
            return Ok(());
        }
        if let Some(old) = old_parent {
            if let Some(p) = self.nodes.get_mut(&old) {
                p.children.retain(|c| c != node_id);
            }
        }
        if let Some(new_parent) = parent_id {
            let p = self.nodes.get_mut(new_parent).ok_or_else(|| {
                LuxeraError::validation(format!("unknown parent node: {}", new_parent))
            })?;
            if !p.children.iter().any(|c| c == node_id) {
                p.children.push(node_id.to_string());
            }
        }
        if let Some(n) = self.nodes.get_mut(node_id) {
            n.parent = parent_id.map(str::to_string);
        }
        self.invalidate_world_cache(node_id)
    }

    /// Replace a node's local transform; invalidates its subtree.
    pub fn set_local_transform(&mut self, node_id: &str, transform: DMat4) -> Result<()> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| LuxeraError::validation(format!("unknown scene node: {}", node_id)))?;
        node.local_transform = transform;
        self.invalidate_world_cache(node_id)
    }

    /// Drop cached world matrices for a node and all descendants.
    pub fn invalidate_world_cache(&mut self, node_id: &str) -> Result<()> {
        let mut stack = vec![node_id.to_string()];
        while let Some(cur) = stack.pop() {
            let node = self
                .nodes
                .get_mut(&cur)
                .ok_or_else(|| LuxeraError::validation(format!("unknown scene node: {}", cur)))?;
            node.world_cache = None;
            stack.extend(node.children.iter().cloned());
        }
        Ok(())
    }

    /// World transform, computed lazily and cached.
    pub fn world_transform(&mut self, node_id: &str) -> Result<DMat4> {
        let (cached, parent, local) = {
            let node = self.node(node_id)?;
            (node.world_cache, node.parent.clone(), node.local_transform)
        };
        if let Some(world) = cached {
            return Ok(world);
        }
        let world = match parent {
            None => local,
            Some(parent_id) => self.world_transform(&parent_id)? * local,
        };
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.world_cache = Some(world);
        }
        Ok(world)
    }
}
